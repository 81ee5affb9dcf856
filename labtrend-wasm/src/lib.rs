//! Bridge WASM <-> JavaScript cho biểu đồ và huy hiệu kết quả xét nghiệm.

use labtrend_core::{
    EngineConfig, HistoryPoint, LabRecord, LabTrendError, ParameterConfig, ParameterResult,
    UnknownParameterPolicy,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_wasm_bindgen::from_value;
use wasm_bindgen::prelude::*;

#[derive(Deserialize)]
struct JsEngineConfig {
    #[serde(default)]
    unknown_parameter_policy: Option<UnknownParameterPolicy>,
    #[serde(default)]
    default_min: Option<f64>,
    #[serde(default)]
    default_max: Option<f64>,
    #[serde(default)]
    trend_window: Option<usize>,
    #[serde(default)]
    baseline_confidence: Option<u8>,
}

impl From<JsEngineConfig> for EngineConfig {
    fn from(cfg: JsEngineConfig) -> Self {
        let mut base = EngineConfig::default();
        if let Some(policy) = cfg.unknown_parameter_policy {
            base.unknown_parameter_policy = policy;
        }
        if let Some(min) = cfg.default_min {
            base.default_min = min;
        }
        if let Some(max) = cfg.default_max {
            base.default_max = max;
        }
        if let Some(window) = cfg.trend_window {
            base.trend_window = window;
        }
        if let Some(confidence) = cfg.baseline_confidence {
            base.baseline_confidence = confidence;
        }
        base
    }
}

/// Lịch sử của một chỉ số, sắp xếp theo ngày tăng dần.
#[wasm_bindgen(js_name = getParameterHistory)]
pub fn get_parameter_history(
    labs: JsValue,
    test_name: &str,
    parameter_name: &str,
    config: Option<JsValue>,
) -> Result<JsValue, JsValue> {
    init_panic_hook();
    let labs = read_labs(labs)?;
    let cfg = read_config(config)?;
    let history =
        labtrend_engine::get_parameter_history_with(&labs, test_name, parameter_name, &cfg);
    write("lịch sử", &history)
}

/// Phần trăm thay đổi giữa hai điểm gần nhất; `undefined` khi không tính được.
#[wasm_bindgen(js_name = calculateChangePercentage)]
pub fn calculate_change_percentage(history: JsValue) -> Result<Option<f64>, JsValue> {
    init_panic_hook();
    let history: Vec<HistoryPoint> = read("lịch sử", history)?;
    Ok(labtrend_engine::calculate_change_percentage(&history).map(|change| change as f64))
}

#[wasm_bindgen(js_name = generateTemplateInsights)]
pub fn generate_template_insights(
    parameter: JsValue,
    parameter_config: JsValue,
    history: JsValue,
    test_name: &str,
    config: Option<JsValue>,
) -> Result<JsValue, JsValue> {
    init_panic_hook();
    let parameter: ParameterResult = read("kết quả chỉ số", parameter)?;
    let parameter_config: Option<ParameterConfig> = read("cấu hình chỉ số", parameter_config)?;
    let history: Vec<HistoryPoint> = read("lịch sử", history)?;
    let cfg = read_config(config)?;

    let insights = labtrend_engine::generate_template_insights_with(
        &parameter,
        parameter_config.as_ref(),
        &history,
        test_name,
        &cfg,
    );
    write("insight", &insights)
}

/// Vị trí trên thanh trượt: số trong [0, 100] hoặc mốc phân loại.
#[wasm_bindgen(js_name = mapValueToPosition)]
pub fn map_value_to_position(
    parameter: JsValue,
    parameter_config: JsValue,
    config: Option<JsValue>,
) -> Result<JsValue, JsValue> {
    init_panic_hook();
    let parameter: ParameterResult = read("kết quả chỉ số", parameter)?;
    let parameter_config: Option<ParameterConfig> = read("cấu hình chỉ số", parameter_config)?;
    let cfg = read_config(config)?;

    let position =
        labtrend_engine::map_value_to_position_with(&parameter, parameter_config.as_ref(), &cfg);
    write("vị trí", &position)
}

#[wasm_bindgen(js_name = summarizeParameter)]
pub fn summarize_parameter(
    labs: JsValue,
    test_name: &str,
    parameter_name: &str,
    config: Option<JsValue>,
) -> Result<JsValue, JsValue> {
    init_panic_hook();
    let labs = read_labs(labs)?;
    let cfg = read_config(config)?;

    let report = labtrend_engine::summarize_parameter(&labs, test_name, parameter_name, &cfg)
        .map_err(|err| JsValue::from_str(&format_lab_error(err)))?;
    write("báo cáo", &report)
}

fn init_panic_hook() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

fn read_labs(labs: JsValue) -> Result<Vec<LabRecord>, JsValue> {
    let payload = from_value::<serde_json::Value>(labs)
        .map_err(|err| JsValue::from_str(&format!("Không đọc được JSON xét nghiệm: {err}")))?;
    labtrend_engine::parse_labs_value(&payload)
        .map_err(|err| JsValue::from_str(&format_lab_error(err)))
}

fn read_config(config: Option<JsValue>) -> Result<EngineConfig, JsValue> {
    match config {
        Some(js_cfg) if !js_cfg.is_undefined() && !js_cfg.is_null() => {
            let cfg: JsEngineConfig = from_value(js_cfg)
                .map_err(|err| JsValue::from_str(&format!("Không đọc được config: {err}")))?;
            Ok(EngineConfig::from(cfg))
        }
        _ => Ok(EngineConfig::default()),
    }
}

fn read<T: DeserializeOwned>(label: &str, value: JsValue) -> Result<T, JsValue> {
    from_value(value).map_err(|err| JsValue::from_str(&format!("Không đọc được {label}: {err}")))
}

fn write<T: Serialize>(label: &str, value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|err| JsValue::from_str(&format!("Không serialize {label}: {err}")))
}

fn format_lab_error(err: LabTrendError) -> String {
    format!("Lab trend error: {err}")
}

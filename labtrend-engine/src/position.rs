//! Slider positions for the current value of a parameter.

use labtrend_core::{
    classify_value, CategoryMarker, EngineConfig, ParameterConfig, ParameterResult, ParsedValue,
    ResultStatus, SliderPosition,
};

/// Slider position for the current value, using the default engine config.
pub fn map_value_to_position(
    parameter: &ParameterResult,
    config: Option<&ParameterConfig>,
) -> SliderPosition {
    map_value_to_position_with(parameter, config, &EngineConfig::default())
}

/// Numeric and ratio values map linearly onto the reference range, clamped to
/// `[0, 100]`; categorical values map to a discrete marker.
pub fn map_value_to_position_with(
    parameter: &ParameterResult,
    config: Option<&ParameterConfig>,
    engine: &EngineConfig,
) -> SliderPosition {
    let value = ParsedValue::parse(&parameter.value, config.map(|c| c.kind));

    match config {
        Some(config) if !config.kind.is_quantitative() => {
            let categories = config.categories();
            SliderPosition::Category(CategoryMarker {
                label: value.raw().to_string(),
                index: categories.iter().position(|item| *item == value.raw()),
                total: categories.len(),
                normal: classify_value(&value, Some(config), engine) == ResultStatus::Normal,
            })
        }
        _ => {
            let (min, max) = config
                .map(|config| config.bounds(engine))
                .unwrap_or((engine.default_min, engine.default_max));
            SliderPosition::Percent(percent_within(value.number(), min, max))
        }
    }
}

fn percent_within(value: Option<f64>, min: f64, max: f64) -> f64 {
    let Some(value) = value else {
        return 0.0;
    };

    if max.is_nan() || min.is_nan() || max <= min {
        return if value <= min { 0.0 } else { 100.0 };
    }

    let percent = (value - min) / (max - min) * 100.0;
    if percent.is_nan() {
        0.0
    } else {
        percent.clamp(0.0, 100.0)
    }
}

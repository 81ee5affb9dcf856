//! Mô hình dữ liệu lõi cho lịch sử chỉ số xét nghiệm và phân loại theo khoảng tham chiếu.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Chính sách mặc định khi không tìm thấy cấu hình cho chỉ số.
pub const UNKNOWN_PARAMETER_POLICY: UnknownParameterPolicy = UnknownParameterPolicy::TreatAsNormal;

/// Số điểm tối thiểu để xác định một xu hướng.
pub const MIN_TREND_POINTS: usize = 3;

/// Cách xử lý chỉ số không có `ParameterConfig` tương ứng.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum UnknownParameterPolicy {
    #[default]
    TreatAsNormal,
    TreatAsAbnormal,
}

/// Cấu hình điều chỉnh phân loại, phát hiện xu hướng và insight.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    pub unknown_parameter_policy: UnknownParameterPolicy,
    /// Cận dưới dùng khi cấu hình bỏ trống `min`.
    pub default_min: f64,
    /// Cận trên dùng khi cấu hình bỏ trống `max`.
    pub default_max: f64,
    /// Số điểm gần nhất xét khi tìm xu hướng.
    pub trend_window: usize,
    /// Độ tin cậy (%) gắn với insight theo dõi định kỳ.
    pub baseline_confidence: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            unknown_parameter_policy: UNKNOWN_PARAMETER_POLICY,
            default_min: 0.0,
            default_max: 100.0,
            trend_window: 3,
            baseline_confidence: 95,
        }
    }
}

impl EngineConfig {
    /// Cửa sổ xu hướng thực tế, không bao giờ nhỏ hơn `MIN_TREND_POINTS`.
    pub fn effective_trend_window(&self) -> usize {
        self.trend_window.max(MIN_TREND_POINTS)
    }
}

/// Kiểu dữ liệu của một chỉ số.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    Numeric,
    Ratio,
    Categorical,
}

impl ParameterKind {
    pub fn is_quantitative(self) -> bool {
        matches!(self, ParameterKind::Numeric | ParameterKind::Ratio)
    }
}

/// Quy tắc hợp lệ của một chỉ số trong một loại xét nghiệm.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParameterConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParameterKind,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub normal_values: Option<Vec<String>>,
}

impl ParameterConfig {
    /// Khoảng tham chiếu sau khi áp giá trị mặc định.
    pub fn bounds(&self, engine: &EngineConfig) -> (f64, f64) {
        (
            self.min.unwrap_or(engine.default_min),
            self.max.unwrap_or(engine.default_max),
        )
    }

    /// Các giá trị phân loại được chấp nhận, bỏ trùng lặp, giữ thứ tự cấu hình.
    pub fn categories(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for value in self.normal_values.iter().flatten() {
            if !seen.contains(&value.as_str()) {
                seen.push(value);
            }
        }
        seen
    }
}

/// Kết quả của một chỉ số trong một lần xét nghiệm.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParameterResult {
    pub parameter_name: String,
    #[serde(deserialize_with = "string_or_number")]
    pub value: String,
}

/// Một lần thực hiện xét nghiệm của bệnh nhân.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LabRecord {
    pub test_name: String,
    /// Ngày xét nghiệm ở dạng văn bản gốc, có thể thiếu hoặc sai định dạng.
    #[serde(default)]
    pub test_date: Option<String>,
    #[serde(default)]
    pub results: Vec<ParameterResult>,
    #[serde(default)]
    pub test_config: Vec<ParameterConfig>,
}

impl LabRecord {
    pub fn result(&self, parameter_name: &str) -> Option<&ParameterResult> {
        self.results
            .iter()
            .find(|result| result.parameter_name == parameter_name)
    }

    pub fn parameter_config(&self, parameter_name: &str) -> Option<&ParameterConfig> {
        find_parameter_config(&self.test_config, parameter_name)
    }
}

/// Tra cứu cấu hình của chỉ số theo tên (phân biệt hoa thường, lấy mục đầu tiên).
pub fn find_parameter_config<'a>(
    configs: &'a [ParameterConfig],
    parameter_name: &str,
) -> Option<&'a ParameterConfig> {
    configs.iter().find(|config| config.name == parameter_name)
}

/// Giá trị đã được đọc một lần tại biên dữ liệu.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParsedValue {
    Numeric { raw: String, value: f64 },
    /// Chỉ số định lượng nhưng không đọc được số.
    Unparsable { raw: String },
    Categorical { raw: String },
}

impl ParsedValue {
    /// Đọc giá trị theo kiểu chỉ số; không có kiểu thì thử số trước, rồi tới phân loại.
    pub fn parse(raw: &str, kind: Option<ParameterKind>) -> Self {
        let raw_owned = raw.to_string();
        match kind {
            Some(kind) if !kind.is_quantitative() => ParsedValue::Categorical { raw: raw_owned },
            Some(_) => match leading_number(raw) {
                Some(value) => ParsedValue::Numeric {
                    raw: raw_owned,
                    value,
                },
                None => ParsedValue::Unparsable { raw: raw_owned },
            },
            None => match leading_number(raw) {
                Some(value) => ParsedValue::Numeric {
                    raw: raw_owned,
                    value,
                },
                None => ParsedValue::Categorical { raw: raw_owned },
            },
        }
    }

    pub fn raw(&self) -> &str {
        match self {
            ParsedValue::Numeric { raw, .. }
            | ParsedValue::Unparsable { raw }
            | ParsedValue::Categorical { raw } => raw,
        }
    }

    pub fn number(&self) -> Option<f64> {
        match self {
            ParsedValue::Numeric { value, .. } => Some(*value),
            _ => None,
        }
    }
}

/// Đọc số thực ở đầu chuỗi (ví dụ "12.0 g/dL" -> 12.0, "1:160" -> 1.0, "5e3" -> 5000).
pub fn leading_number(raw: &str) -> Option<f64> {
    let token = raw.trim();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;

    for (idx, ch) in token.char_indices() {
        match ch {
            '+' | '-' if idx == 0 => {}
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end = idx + ch.len_utf8();
    }

    if !seen_digit {
        return None;
    }

    // Phần mũ chỉ được nhận khi có ít nhất một chữ số sau `e`.
    let rest = &token[end..];
    if rest.starts_with(&['e', 'E'][..]) {
        let exponent = rest[1..].strip_prefix(&['+', '-'][..]).unwrap_or(&rest[1..]);
        let digits = exponent
            .bytes()
            .take_while(|byte| byte.is_ascii_digit())
            .count();
        if digits > 0 {
            end += rest.len() - exponent.len() + digits;
        }
    }

    token[..end]
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Trạng thái của một kết quả so với khoảng tham chiếu.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Normal,
    Abnormal,
}

/// Phân loại giá trị theo cấu hình; hàm thuần, không có trạng thái ẩn.
pub fn classify_value(
    value: &ParsedValue,
    config: Option<&ParameterConfig>,
    engine: &EngineConfig,
) -> ResultStatus {
    let Some(config) = config else {
        return match engine.unknown_parameter_policy {
            UnknownParameterPolicy::TreatAsNormal => ResultStatus::Normal,
            UnknownParameterPolicy::TreatAsAbnormal => ResultStatus::Abnormal,
        };
    };

    if config.kind.is_quantitative() {
        let (min, max) = config.bounds(engine);
        return match value.number() {
            Some(v) if min <= v && v <= max => ResultStatus::Normal,
            _ => ResultStatus::Abnormal,
        };
    }

    match &config.normal_values {
        Some(allowed) if !allowed.iter().any(|item| item == value.raw()) => ResultStatus::Abnormal,
        _ => ResultStatus::Normal,
    }
}

/// Một điểm trong chuỗi lịch sử của chỉ số.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryPoint {
    pub date: DateTime<Utc>,
    pub value: ParsedValue,
    pub status: ResultStatus,
}

/// Hướng thay đổi liên tục của các kết quả gần nhất.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
}

/// Mức độ rủi ro của insight.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Mức ảnh hưởng hiển thị kèm insight.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Impact {
    #[serde(rename = "Strong Impact")]
    Strong,
    #[serde(rename = "Medium Impact")]
    Medium,
    #[serde(rename = "Low Impact")]
    Low,
}

impl Impact {
    pub fn as_str(&self) -> &'static str {
        match self {
            Impact::Strong => "Strong Impact",
            Impact::Medium => "Medium Impact",
            Impact::Low => "Low Impact",
        }
    }
}

/// Insight đã phân mức rủi ro; chỉ một trong `impact` và `percentage` có giá trị.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RiskInsight {
    pub date: DateTime<Utc>,
    pub risk_level: RiskLevel,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<Impact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<u8>,
}

/// Vị trí trên thanh trượt hiển thị.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum SliderPosition {
    /// Phần trăm trong đoạn [0, 100].
    Percent(f64),
    Category(CategoryMarker),
}

/// Mốc rời rạc cho chỉ số phân loại.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryMarker {
    pub label: String,
    /// Vị trí trong danh sách giá trị cho phép; `None` nếu không thuộc danh sách.
    pub index: Option<usize>,
    pub total: usize,
    pub normal: bool,
}

/// Lỗi ở biên dữ liệu (đọc JSON, lập báo cáo).
#[derive(Debug, thiserror::Error)]
pub enum LabTrendError {
    #[error("Dữ liệu đầu vào thiếu thông tin tối thiểu")]
    MissingData,
    #[error("Không đọc được dữ liệu: {0}")]
    Parse(String),
    #[error("Không có kết quả cho chỉ số {parameter} trong xét nghiệm {test}")]
    ParameterNotFound { test: String, parameter: String },
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawValue {
        Text(String),
        Number(f64),
    }

    Ok(match RawValue::deserialize(deserializer)? {
        RawValue::Text(text) => text,
        RawValue::Number(number) => number.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric(name: &str, min: Option<f64>, max: Option<f64>) -> ParameterConfig {
        ParameterConfig {
            name: name.to_string(),
            kind: ParameterKind::Numeric,
            unit: Some("g/dL".to_string()),
            min,
            max,
            normal_values: None,
        }
    }

    fn categorical(name: &str, allowed: Option<&[&str]>) -> ParameterConfig {
        ParameterConfig {
            name: name.to_string(),
            kind: ParameterKind::Categorical,
            unit: None,
            min: None,
            max: None,
            normal_values: allowed.map(|values| values.iter().map(|v| v.to_string()).collect()),
        }
    }

    #[test]
    fn leading_number_reads_numeric_prefix() {
        assert_eq!(leading_number("12.0"), Some(12.0));
        assert_eq!(leading_number(" 7.5 g/dL"), Some(7.5));
        assert_eq!(leading_number("1:160"), Some(1.0));
        assert_eq!(leading_number("-3"), Some(-3.0));
        assert_eq!(leading_number("Positive"), None);
        assert_eq!(leading_number("-"), None);
        assert_eq!(leading_number(""), None);
        assert_eq!(leading_number("inf"), None);
    }

    #[test]
    fn leading_number_reads_exponent_form() {
        assert_eq!(leading_number("5e3"), Some(5000.0));
        assert_eq!(leading_number("1.2E-2"), Some(0.012));
        assert_eq!(leading_number("4.5e+9 /L"), Some(4.5e9));
        assert_eq!(leading_number("3e"), Some(3.0));
        assert_eq!(leading_number("3e-"), Some(3.0));
        assert_eq!(leading_number("2 e5"), Some(2.0));
        assert_eq!(leading_number("1e999"), None);
    }

    #[test]
    fn exponent_values_classify_against_bounds() {
        let engine = EngineConfig::default();
        let config = numeric("WBC", Some(4000.0), Some(11000.0));
        let status = |raw: &str| {
            classify_value(
                &ParsedValue::parse(raw, Some(config.kind)),
                Some(&config),
                &engine,
            )
        };

        assert_eq!(status("5e3"), ResultStatus::Normal);
        assert_eq!(status("1.2e4"), ResultStatus::Abnormal);
    }

    #[test]
    fn ratio_values_classify_by_leading_term() {
        let engine = EngineConfig::default();
        let config = ParameterConfig {
            kind: ParameterKind::Ratio,
            unit: None,
            ..numeric("ANA titer", Some(0.0), Some(1.0))
        };
        let status = |raw: &str| {
            classify_value(
                &ParsedValue::parse(raw, Some(config.kind)),
                Some(&config),
                &engine,
            )
        };

        assert_eq!(ParsedValue::parse("1:160", Some(config.kind)).number(), Some(1.0));
        assert_eq!(status("1:160"), ResultStatus::Normal);
        assert_eq!(status("1:40"), ResultStatus::Normal);
        assert_eq!(status("2:1"), ResultStatus::Abnormal);
        assert_eq!(status("negative"), ResultStatus::Abnormal);
    }

    #[test]
    fn trend_window_never_drops_below_three_points() {
        let narrow = EngineConfig {
            trend_window: 2,
            ..EngineConfig::default()
        };
        assert_eq!(narrow.effective_trend_window(), MIN_TREND_POINTS);

        let wide = EngineConfig {
            trend_window: 5,
            ..EngineConfig::default()
        };
        assert_eq!(wide.effective_trend_window(), 5);
    }

    #[test]
    fn parse_respects_parameter_kind() {
        assert_eq!(
            ParsedValue::parse("Negative", Some(ParameterKind::Numeric)),
            ParsedValue::Unparsable {
                raw: "Negative".to_string()
            }
        );
        assert_eq!(
            ParsedValue::parse("12", Some(ParameterKind::Categorical)).number(),
            None
        );
        assert_eq!(ParsedValue::parse("4.2", None).number(), Some(4.2));
        assert_eq!(
            ParsedValue::parse("Clear", None),
            ParsedValue::Categorical {
                raw: "Clear".to_string()
            }
        );
    }

    #[test]
    fn numeric_bounds_are_inclusive() {
        let engine = EngineConfig::default();
        let config = numeric("Hemoglobin", Some(13.5), Some(17.5));
        let status = |raw: &str| {
            classify_value(
                &ParsedValue::parse(raw, Some(config.kind)),
                Some(&config),
                &engine,
            )
        };

        assert_eq!(status("13.5"), ResultStatus::Normal);
        assert_eq!(status("17.5"), ResultStatus::Normal);
        assert_eq!(status("15"), ResultStatus::Normal);
        assert_eq!(status("13.4"), ResultStatus::Abnormal);
        assert_eq!(status("17.6"), ResultStatus::Abnormal);
        assert_eq!(status("not measured"), ResultStatus::Abnormal);
    }

    #[test]
    fn missing_bounds_fall_back_to_defaults() {
        let engine = EngineConfig::default();
        let config = numeric("Score", None, None);
        let status = |raw: &str| {
            classify_value(
                &ParsedValue::parse(raw, Some(config.kind)),
                Some(&config),
                &engine,
            )
        };

        assert_eq!(status("0"), ResultStatus::Normal);
        assert_eq!(status("100"), ResultStatus::Normal);
        assert_eq!(status("100.1"), ResultStatus::Abnormal);
        assert_eq!(status("-1"), ResultStatus::Abnormal);
    }

    #[test]
    fn categorical_membership_is_case_sensitive() {
        let engine = EngineConfig::default();
        let config = categorical("Nitrite", Some(&["Negative", "Trace"]));
        let status = |raw: &str| {
            classify_value(
                &ParsedValue::parse(raw, Some(config.kind)),
                Some(&config),
                &engine,
            )
        };

        assert_eq!(status("Negative"), ResultStatus::Normal);
        assert_eq!(status("Trace"), ResultStatus::Normal);
        assert_eq!(status("negative"), ResultStatus::Abnormal);
        assert_eq!(status("Positive"), ResultStatus::Abnormal);
    }

    #[test]
    fn categorical_without_allowed_values_is_normal() {
        let engine = EngineConfig::default();
        let config = categorical("Color", None);
        let value = ParsedValue::parse("Amber", Some(config.kind));
        assert_eq!(
            classify_value(&value, Some(&config), &engine),
            ResultStatus::Normal
        );
    }

    #[test]
    fn unknown_parameter_follows_policy() {
        let value = ParsedValue::parse("999", None);
        let lenient = EngineConfig::default();
        assert_eq!(classify_value(&value, None, &lenient), ResultStatus::Normal);

        let strict = EngineConfig {
            unknown_parameter_policy: UnknownParameterPolicy::TreatAsAbnormal,
            ..EngineConfig::default()
        };
        assert_eq!(classify_value(&value, None, &strict), ResultStatus::Abnormal);
    }

    #[test]
    fn config_resolver_matches_exact_name() {
        let configs = vec![
            numeric("Hemoglobin", Some(13.5), Some(17.5)),
            numeric("Platelets", Some(150.0), Some(450.0)),
        ];

        assert_eq!(
            find_parameter_config(&configs, "Platelets").map(|c| c.min),
            Some(Some(150.0))
        );
        assert!(find_parameter_config(&configs, "hemoglobin").is_none());
        assert!(find_parameter_config(&[], "Hemoglobin").is_none());
    }

    #[test]
    fn categories_are_deduplicated_in_order() {
        let config = categorical("Clarity", Some(&["Clear", "Hazy", "Clear"]));
        assert_eq!(config.categories(), vec!["Clear", "Hazy"]);
    }

    #[test]
    fn lab_record_deserializes_backend_payload() {
        let payload = r#"{
            "testName": "Complete Blood Count",
            "testDate": "2024-01-10",
            "results": [
                { "parameterName": "Hemoglobin", "value": 12.5 },
                { "parameterName": "Platelets", "value": "250" }
            ],
            "testConfig": [
                { "name": "Hemoglobin", "type": "numeric", "unit": "g/dL", "min": 13.5, "max": 17.5 },
                { "name": "Urine Color", "type": "categorical", "normalValues": ["Yellow"] }
            ]
        }"#;

        let record: LabRecord = serde_json::from_str(payload).expect("payload hợp lệ");
        assert_eq!(record.test_name, "Complete Blood Count");
        assert_eq!(
            record.result("Hemoglobin").map(|r| r.value.as_str()),
            Some("12.5")
        );
        assert_eq!(
            record.result("Platelets").map(|r| r.value.as_str()),
            Some("250")
        );
        assert_eq!(
            record.parameter_config("Urine Color").map(|c| c.kind),
            Some(ParameterKind::Categorical)
        );
        assert!(record.parameter_config("Platelets").is_none());
    }

    #[test]
    fn insight_serializes_only_the_weight_it_carries() {
        let insight = RiskInsight {
            date: DateTime::parse_from_rfc3339("2024-03-01T00:00:00Z")
                .expect("ngày hợp lệ")
                .with_timezone(&Utc),
            risk_level: RiskLevel::High,
            title: "Abnormal Hemoglobin".to_string(),
            description: String::new(),
            impact: Some(Impact::Strong),
            percentage: None,
        };

        let value = serde_json::to_value(&insight).expect("serialize insight");
        assert_eq!(value["riskLevel"], "high");
        assert_eq!(value["impact"], "Strong Impact");
        assert!(value.get("percentage").is_none());
    }
}

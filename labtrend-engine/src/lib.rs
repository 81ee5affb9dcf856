//! Lab parameter history, change, trend and insight analytics over in-memory lab records.

mod change;
mod history;
mod insights;
mod position;
mod trend;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use labtrend_core::{
    EngineConfig, HistoryPoint, LabRecord, LabTrendError, ParsedValue, ResultStatus, RiskInsight,
    SliderPosition, TrendDirection,
};

pub use change::calculate_change_percentage;
pub use history::{get_parameter_history, get_parameter_history_with, parse_test_date};
pub use insights::{
    generate_template_insights, generate_template_insights_at, generate_template_insights_with,
    InsightBuilder,
};
pub use position::{map_value_to_position, map_value_to_position_with};
pub use trend::detect_trend;

/// Read lab records from a JSON string.
pub fn parse_labs_str(labs_json: &str) -> Result<Vec<LabRecord>, LabTrendError> {
    let value: Value =
        serde_json::from_str(labs_json).map_err(|err| LabTrendError::Parse(err.to_string()))?;
    parse_labs_value(&value)
}

/// Read lab records from a JSON array, or from an object carrying a `labs` array.
pub fn parse_labs_value(payload: &Value) -> Result<Vec<LabRecord>, LabTrendError> {
    let records = match payload {
        Value::Array(_) => payload,
        Value::Object(object) => object.get("labs").ok_or(LabTrendError::MissingData)?,
        other => {
            return Err(LabTrendError::Parse(format!(
                "Expected an array of lab records, received {}",
                json_kind(other)
            )))
        }
    };

    if !records.is_array() {
        return Err(LabTrendError::Parse(format!(
            "Expected `labs` to be an array, received {}",
            json_kind(records)
        )));
    }

    serde_json::from_value(records.clone()).map_err(|err| LabTrendError::Parse(err.to_string()))
}

/// Everything the consultation view renders for one parameter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParameterReport {
    pub test_name: String,
    pub parameter_name: String,
    pub unit: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub latest_value: ParsedValue,
    pub latest_status: ResultStatus,
    pub history: Vec<HistoryPoint>,
    pub change_percentage: Option<i64>,
    pub trend: Option<TrendDirection>,
    pub position: SliderPosition,
    pub insights: Vec<RiskInsight>,
}

/// Build the report for `parameter_name` from the most recent dated record that carries it.
pub fn summarize_parameter(
    labs: &[LabRecord],
    test_name: &str,
    parameter_name: &str,
    config: &EngineConfig,
) -> Result<ParameterReport, LabTrendError> {
    let latest = labs
        .iter()
        .filter(|lab| lab.test_name == test_name)
        .filter_map(|lab| {
            let date = history::present_date(lab).and_then(parse_test_date)?;
            let result = lab.result(parameter_name)?;
            Some((date, lab, result))
        })
        .max_by_key(|(date, _, _)| *date);

    let Some((_, record, current)) = latest else {
        return Err(LabTrendError::ParameterNotFound {
            test: test_name.to_string(),
            parameter: parameter_name.to_string(),
        });
    };

    let parameter_config = record.parameter_config(parameter_name);
    let history = get_parameter_history_with(labs, test_name, parameter_name, config);
    let latest_value = ParsedValue::parse(&current.value, parameter_config.map(|c| c.kind));
    let latest_status = labtrend_core::classify_value(&latest_value, parameter_config, config);

    let generated_at = Utc::now();
    let insights = generate_template_insights_at(
        current,
        parameter_config,
        &history,
        test_name,
        config,
        generated_at,
    );

    tracing::debug!(
        test = test_name,
        parameter = parameter_name,
        points = history.len(),
        insights = insights.len(),
        "Parameter report assembled"
    );

    Ok(ParameterReport {
        test_name: test_name.to_string(),
        parameter_name: parameter_name.to_string(),
        unit: parameter_config.and_then(|c| c.unit.clone()),
        generated_at,
        change_percentage: calculate_change_percentage(&history),
        trend: detect_trend(&history, config.effective_trend_window()),
        position: map_value_to_position_with(current, parameter_config, config),
        latest_value,
        latest_status,
        history,
        insights,
    })
}

/// Distinct parameter names reported for `test_name`, in first-seen order.
pub fn list_parameters(labs: &[LabRecord], test_name: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for result in labs
        .iter()
        .filter(|lab| lab.test_name == test_name)
        .flat_map(|lab| lab.results.iter())
    {
        if !names.contains(&result.parameter_name) {
            names.push(result.parameter_name.clone());
        }
    }
    names
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

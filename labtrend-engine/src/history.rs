//! Chronological reconstruction of one parameter across a patient's lab records.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use labtrend_core::{classify_value, EngineConfig, HistoryPoint, LabRecord, ParsedValue};

/// History of `parameter_name` within `test_name`, oldest first, using the default engine config.
pub fn get_parameter_history(
    labs: &[LabRecord],
    test_name: &str,
    parameter_name: &str,
) -> Vec<HistoryPoint> {
    get_parameter_history_with(labs, test_name, parameter_name, &EngineConfig::default())
}

/// History of `parameter_name` within `test_name`, oldest first.
///
/// Records without a date, without the parameter, or whose date cannot be
/// read contribute no point. Same-date points keep their input order.
pub fn get_parameter_history_with(
    labs: &[LabRecord],
    test_name: &str,
    parameter_name: &str,
    engine: &EngineConfig,
) -> Vec<HistoryPoint> {
    let mut points: Vec<HistoryPoint> = labs
        .iter()
        .filter(|lab| lab.test_name == test_name)
        .filter_map(|lab| {
            let raw_date = present_date(lab)?;
            let result = lab.result(parameter_name)?;

            let Some(date) = parse_test_date(raw_date) else {
                tracing::warn!(
                    test = test_name,
                    parameter = parameter_name,
                    date = raw_date,
                    "Skipping lab record with unreadable test date"
                );
                return None;
            };

            let config = lab.parameter_config(parameter_name);
            let value = ParsedValue::parse(&result.value, config.map(|c| c.kind));
            let status = classify_value(&value, config, engine);

            Some(HistoryPoint {
                date,
                value,
                status,
            })
        })
        .collect();

    points.sort_by_key(|point| point.date);
    points
}

/// Reads a lab date: RFC 3339, a naive date-time (taken as UTC) or a plain date.
pub fn parse_test_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

pub(crate) fn present_date(lab: &LabRecord) -> Option<&str> {
    lab.test_date
        .as_deref()
        .filter(|date| !date.trim().is_empty())
}

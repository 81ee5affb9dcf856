//! Template insights for one parameter: current status, trend, then baseline monitoring.

use chrono::{DateTime, Utc};
use labtrend_core::{
    classify_value, EngineConfig, HistoryPoint, Impact, ParameterConfig, ParameterKind,
    ParameterResult, ParsedValue, ResultStatus, RiskInsight, RiskLevel, TrendDirection,
};

use crate::trend::detect_trend;

/// Collects insights into their display slots.
///
/// `build` always yields status, trend, baseline in that order, whatever order
/// the slots were filled in.
#[derive(Debug, Default)]
pub struct InsightBuilder {
    status: Option<RiskInsight>,
    trend: Option<RiskInsight>,
    baseline: Option<RiskInsight>,
}

impl InsightBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, insight: RiskInsight) -> Self {
        self.status = Some(insight);
        self
    }

    pub fn trend(mut self, insight: Option<RiskInsight>) -> Self {
        self.trend = insight;
        self
    }

    pub fn baseline(mut self, insight: RiskInsight) -> Self {
        self.baseline = Some(insight);
        self
    }

    pub fn build(self) -> Vec<RiskInsight> {
        [self.status, self.trend, self.baseline]
            .into_iter()
            .flatten()
            .collect()
    }
}

/// Insights for the current result, dated now, using the default engine config.
pub fn generate_template_insights(
    parameter: &ParameterResult,
    config: Option<&ParameterConfig>,
    history: &[HistoryPoint],
    test_name: &str,
) -> Vec<RiskInsight> {
    generate_template_insights_with(
        parameter,
        config,
        history,
        test_name,
        &EngineConfig::default(),
    )
}

pub fn generate_template_insights_with(
    parameter: &ParameterResult,
    config: Option<&ParameterConfig>,
    history: &[HistoryPoint],
    test_name: &str,
    engine: &EngineConfig,
) -> Vec<RiskInsight> {
    generate_template_insights_at(parameter, config, history, test_name, engine, Utc::now())
}

/// Same as [`generate_template_insights_with`] with an explicit generation timestamp.
pub fn generate_template_insights_at(
    parameter: &ParameterResult,
    config: Option<&ParameterConfig>,
    history: &[HistoryPoint],
    test_name: &str,
    engine: &EngineConfig,
    now: DateTime<Utc>,
) -> Vec<RiskInsight> {
    let name = parameter.parameter_name.as_str();

    // Classified from the current value, not the last history point.
    let current = ParsedValue::parse(&parameter.value, config.map(|c| c.kind));
    let status = classify_value(&current, config, engine);

    let trend = detect_trend(history, engine.effective_trend_window())
        .map(|direction| trend_insight(name, direction, history, test_name, engine, now));

    InsightBuilder::new()
        .baseline(baseline_insight(name, test_name, engine, now))
        .trend(trend)
        .status(status_insight(name, &current, status, config, test_name, engine, now))
        .build()
}

fn status_insight(
    name: &str,
    current: &ParsedValue,
    status: ResultStatus,
    config: Option<&ParameterConfig>,
    test_name: &str,
    engine: &EngineConfig,
    now: DateTime<Utc>,
) -> RiskInsight {
    let shown = display_value(current, config);
    let reference = describe_reference(config, engine);

    let (risk_level, title, description, impact) = match status {
        ResultStatus::Abnormal => {
            let finding = match (current, &reference, config.map(|c| c.kind)) {
                (ParsedValue::Unparsable { .. }, _, _) => {
                    "could not be read as a number.".to_string()
                }
                (_, Some(range), Some(ParameterKind::Categorical)) => {
                    format!("is not among the expected results ({range}).")
                }
                (_, Some(range), _) => format!("is outside the reference range of {range}."),
                (_, None, _) => "has no reference range configured.".to_string(),
            };
            (
                RiskLevel::High,
                format!("Abnormal {name}"),
                format!(
                    "Current {name} of {shown} {finding} Review with the care team and consider a repeat {test_name} to confirm."
                ),
                Impact::Strong,
            )
        }
        ResultStatus::Normal => {
            let finding = match reference {
                Some(range) => format!("is within the reference range of {range}."),
                None => "has no reference range configured.".to_string(),
            };
            (
                RiskLevel::Low,
                format!("Normal {name}"),
                format!("Current {name} of {shown} {finding} Continue routine monitoring."),
                Impact::Low,
            )
        }
    };

    RiskInsight {
        date: now,
        risk_level,
        title,
        description,
        impact: Some(impact),
        percentage: None,
    }
}

fn trend_insight(
    name: &str,
    direction: TrendDirection,
    history: &[HistoryPoint],
    test_name: &str,
    engine: &EngineConfig,
    now: DateTime<Utc>,
) -> RiskInsight {
    let window = engine.effective_trend_window().min(history.len());
    let path = history[history.len() - window..]
        .iter()
        .map(|point| point.value.raw().trim())
        .collect::<Vec<_>>()
        .join(" → ");

    let (title, movement) = match direction {
        TrendDirection::Increasing => ("Trending Upward", "risen"),
        TrendDirection::Decreasing => ("Trending Downward", "fallen"),
    };

    RiskInsight {
        date: now,
        risk_level: RiskLevel::Medium,
        title: title.to_string(),
        description: format!(
            "{name} has {movement} across the last {window} {test_name} results ({path}). Watch whether the direction continues at the next test."
        ),
        impact: Some(Impact::Medium),
        percentage: None,
    }
}

fn baseline_insight(
    name: &str,
    test_name: &str,
    engine: &EngineConfig,
    now: DateTime<Utc>,
) -> RiskInsight {
    RiskInsight {
        date: now,
        risk_level: RiskLevel::Low,
        title: "Regular Monitoring".to_string(),
        description: format!(
            "Keep {name} under regular review with scheduled {test_name} testing to build a reliable baseline."
        ),
        impact: None,
        percentage: Some(engine.baseline_confidence),
    }
}

fn display_value(value: &ParsedValue, config: Option<&ParameterConfig>) -> String {
    let raw = value.raw().trim();
    match config {
        Some(config) if value.number().is_some() => match config.unit.as_deref() {
            Some(unit) if !unit.trim().is_empty() => format!("{raw} {}", unit.trim()),
            _ => raw.to_string(),
        },
        _ => raw.to_string(),
    }
}

fn describe_reference(config: Option<&ParameterConfig>, engine: &EngineConfig) -> Option<String> {
    let config = config?;
    match config.kind {
        ParameterKind::Numeric | ParameterKind::Ratio => {
            let (min, max) = config.bounds(engine);
            let range = format!("{}-{}", format_numeric(min), format_numeric(max));
            Some(match config.unit.as_deref() {
                Some(unit) if !unit.trim().is_empty() => format!("{range} {}", unit.trim()),
                _ => range,
            })
        }
        ParameterKind::Categorical => {
            let categories = config.categories();
            if categories.is_empty() {
                None
            } else {
                Some(categories.join(", "))
            }
        }
    }
}

fn format_numeric(value: f64) -> String {
    if value.fract().abs() < f64::EPSILON {
        format!("{value:.0}")
    } else {
        format!("{value}")
    }
}

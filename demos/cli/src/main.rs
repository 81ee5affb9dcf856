use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use labtrend_core::{EngineConfig, SliderPosition, UnknownParameterPolicy};
use labtrend_engine::{list_parameters, parse_labs_str, summarize_parameter};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "warn,labtrend_engine=info,labtrend_cli=info";

#[derive(Parser, Debug)]
#[command(
    name = "labtrend",
    about = "Tóm tắt lịch sử và xu hướng một chỉ số xét nghiệm từ file JSON."
)]
struct Args {
    /// Đường dẫn tới file JSON chứa danh sách xét nghiệm.
    #[arg(short, long)]
    input: PathBuf,

    /// Tên xét nghiệm, ví dụ "Complete Blood Count".
    #[arg(short, long)]
    test: String,

    /// Tên chỉ số; bỏ trống để liệt kê các chỉ số của xét nghiệm.
    #[arg(short, long)]
    parameter: Option<String>,

    /// In toàn bộ báo cáo dạng JSON.
    #[arg(long)]
    json: bool,

    /// Coi chỉ số không có cấu hình là bất thường.
    #[arg(long)]
    treat_unknown_as_abnormal: bool,

    /// Số kết quả gần nhất dùng để xét xu hướng (tối thiểu 3).
    #[arg(long, default_value_t = 3)]
    trend_window: usize,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let data = std::fs::read_to_string(&args.input)
        .with_context(|| format!("Không đọc được file {:?}", args.input))?;
    let labs = parse_labs_str(&data)?;

    let Some(parameter) = args.parameter.as_deref() else {
        let names = list_parameters(&labs, &args.test);
        if names.is_empty() {
            println!("No results recorded for {}", args.test);
        }
        for name in names {
            println!("{name}");
        }
        return Ok(());
    };

    let config = EngineConfig {
        unknown_parameter_policy: if args.treat_unknown_as_abnormal {
            UnknownParameterPolicy::TreatAsAbnormal
        } else {
            UnknownParameterPolicy::TreatAsNormal
        },
        trend_window: args.trend_window,
        ..EngineConfig::default()
    };

    let report = summarize_parameter(&labs, &args.test, parameter, &config)?;
    tracing::info!(
        test = %args.test,
        parameter,
        points = report.history.len(),
        "Report generated"
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let change = report
        .change_percentage
        .map(|pct| format!("{pct:+}%"))
        .unwrap_or_else(|| "n/a".to_string());
    let position = match &report.position {
        SliderPosition::Percent(pct) => format!("{pct:.0}%"),
        SliderPosition::Category(marker) => match marker.index {
            Some(index) => format!("{} ({}/{})", marker.label, index + 1, marker.total),
            None => format!("{} (outside expected values)", marker.label),
        },
    };

    println!(
        "{} / {}\nGenerated at: {}\nResults: {}\nLatest: {} ({:?})\nChange: {}\nPosition: {}",
        report.test_name,
        report.parameter_name,
        report.generated_at,
        report.history.len(),
        report.latest_value.raw(),
        report.latest_status,
        change,
        position
    );
    for insight in &report.insights {
        let weight = match (insight.impact, insight.percentage) {
            (Some(impact), _) => impact.as_str().to_string(),
            (None, Some(pct)) => format!("{pct}% confidence"),
            (None, None) => String::new(),
        };
        println!(
            "[{:?}] {} ({weight}): {}",
            insight.risk_level, insight.title, insight.description
        );
    }

    Ok(())
}

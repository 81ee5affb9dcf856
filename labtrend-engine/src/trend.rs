use labtrend_core::{HistoryPoint, TrendDirection, MIN_TREND_POINTS};

/// Strictly monotonic movement across the last `window` points (at least three).
pub fn detect_trend(history: &[HistoryPoint], window: usize) -> Option<TrendDirection> {
    let window = window.max(MIN_TREND_POINTS);
    if history.len() < window {
        return None;
    }

    let values = history[history.len() - window..]
        .iter()
        .map(|point| point.value.number())
        .collect::<Option<Vec<f64>>>()?;

    if values.windows(2).all(|pair| pair[1] > pair[0]) {
        Some(TrendDirection::Increasing)
    } else if values.windows(2).all(|pair| pair[1] < pair[0]) {
        Some(TrendDirection::Decreasing)
    } else {
        None
    }
}

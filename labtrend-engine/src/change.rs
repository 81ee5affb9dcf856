use labtrend_core::HistoryPoint;

/// Signed percentage change between the two most recent points.
///
/// `None` when there are fewer than two points, either value is not numeric,
/// or the previous value is zero.
pub fn calculate_change_percentage(history: &[HistoryPoint]) -> Option<i64> {
    let [.., previous, current] = history else {
        return None;
    };

    let previous = previous.value.number()?;
    let current = current.value.number()?;
    if previous == 0.0 {
        return None;
    }

    let change = ((current - previous) / previous * 100.0).round();
    change.is_finite().then_some(change as i64)
}

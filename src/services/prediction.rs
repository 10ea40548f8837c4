//! Workload prediction from trailing ticket history.
//!
//! Predictions are a planning aid, not a commitment: they blend the
//! worker's closure rate over a trailing window with the availability
//! already on the calendar for the requested day.

use chrono::NaiveDate;

use crate::backlog::WorkerStats;
use crate::models::WorkloadPrediction;

/// How far back the ticket history feeding a prediction reaches, in days.
pub const TRAILING_WINDOW_DAYS: u32 = 30;

/// Efficiency reported for workers with no usable history.
const NEUTRAL_EFFICIENCY: f64 = 1.0;

/// Compute the prediction for one future day.
///
/// With no history at all the prediction is neutral: zero expected
/// closures and an efficiency of 1.0.
pub fn compute_prediction(
    date: NaiveDate,
    available_minutes: i64,
    stats: Option<&WorkerStats>,
) -> WorkloadPrediction {
    WorkloadPrediction::new(
        date,
        predicted_daily_closures(stats),
        available_minutes,
        efficiency(stats),
    )
}

/// Mean tickets closed per observed day over the trailing window.
fn predicted_daily_closures(stats: Option<&WorkerStats>) -> f64 {
    match stats {
        Some(s) if s.days_observed > 0 => f64::from(s.tickets_closed) / f64::from(s.days_observed),
        _ => 0.0,
    }
}

/// Ratio of closed to assigned tickets, clamped to `[0, 1]`.
fn efficiency(stats: Option<&WorkerStats>) -> f64 {
    match stats {
        Some(s) if s.tickets_assigned > 0 => {
            (f64::from(s.tickets_closed) / f64::from(s.tickets_assigned)).clamp(0.0, 1.0)
        }
        _ => NEUTRAL_EFFICIENCY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 9, 7).unwrap()
    }

    fn stats(closed: u32, assigned: u32, days: u32) -> WorkerStats {
        WorkerStats {
            tickets_closed: closed,
            tickets_assigned: assigned,
            days_observed: days,
        }
    }

    #[test]
    fn test_prediction_from_history() {
        let p = compute_prediction(day(), 480, Some(&stats(45, 60, 30)));
        assert_eq!(p.date, day());
        assert_eq!(p.available_time_minutes, 480);
        assert!((p.predicted_ticket_count - 1.5).abs() < 1e-9);
        assert!((p.efficiency - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_no_history_is_neutral() {
        let p = compute_prediction(day(), 300, None);
        assert_eq!(p.predicted_ticket_count, 0.0);
        assert_eq!(p.efficiency, 1.0);
    }

    #[test]
    fn test_zero_observed_days_predicts_zero_closures() {
        let p = compute_prediction(day(), 300, Some(&stats(10, 20, 0)));
        assert_eq!(p.predicted_ticket_count, 0.0);
        assert!((p.efficiency - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_efficiency_clamped_when_closures_exceed_assignments() {
        // Closures can outnumber assignments when the window catches
        // tickets assigned before it opened.
        let p = compute_prediction(day(), 300, Some(&stats(30, 20, 30)));
        assert_eq!(p.efficiency, 1.0);
    }

    #[test]
    fn test_zero_assignments_is_neutral_efficiency() {
        let p = compute_prediction(day(), 300, Some(&stats(0, 0, 15)));
        assert_eq!(p.efficiency, 1.0);
    }
}

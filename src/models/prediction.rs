use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Per-day workload forecast. Derived on demand, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkloadPrediction {
    pub date: NaiveDate,
    /// Moving-average estimate of tickets this worker closes per day
    pub predicted_ticket_count: f64,
    /// Sum of the day's availability-slot minutes
    pub available_time_minutes: i64,
    /// Historical closed/assigned ratio in [0, 1]
    pub efficiency: f64,
}

impl WorkloadPrediction {
    pub fn new(
        date: NaiveDate,
        predicted_ticket_count: f64,
        available_time_minutes: i64,
        efficiency: f64,
    ) -> Self {
        Self {
            date,
            predicted_ticket_count,
            available_time_minutes,
            efficiency,
        }
    }
}

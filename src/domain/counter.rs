//! Cumulative coin/prize counter readings.

use crate::domain::MachineId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Odometer-style snapshot of a machine's mechanical counters on a report date.
///
/// At most one reading exists per (machine, report_date).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterReading {
    pub machine_id: MachineId,
    pub report_date: NaiveDate,
    pub coin_count: i64,
    pub prize_count: i64,
}

/// Coins and prizes sold within a period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterDelta {
    pub coins: i64,
    pub prizes: i64,
}

impl CounterDelta {
    /// `max(0, end - baseline)` per counter; a missing baseline counts from zero.
    pub fn between(end: &CounterReading, baseline: Option<&CounterReading>) -> Self {
        let (base_coins, base_prizes) = baseline
            .map(|b| (b.coin_count, b.prize_count))
            .unwrap_or((0, 0));
        CounterDelta {
            coins: end.coin_count.saturating_sub(base_coins).max(0),
            prizes: end.prize_count.saturating_sub(base_prizes).max(0),
        }
    }
}

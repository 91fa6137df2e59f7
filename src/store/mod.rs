//! Read interface the settlement core consumes from the backing store.

use crate::domain::{CounterReading, Machine, MachineId, SettingField, SettingHistoryRecord};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::fmt;
use thiserror::Error;

pub mod memory;

pub use memory::MemoryStore;

/// Point lookups against machines, setting history and counter readings.
///
/// Every method reads a consistent snapshot at call time and never writes.
#[async_trait]
pub trait LedgerStore: Send + Sync + fmt::Debug {
    /// Fetch a machine row by id, active or not.
    async fn get_machine(&self, id: &MachineId) -> Result<Option<Machine>, StoreError>;

    /// Latest history record for `field` with `effective_date <= as_of`.
    ///
    /// Ties on effective date go to the latest `created_at`, then the highest id.
    async fn latest_setting_at_or_before(
        &self,
        machine_id: &MachineId,
        field: SettingField,
        as_of: NaiveDate,
    ) -> Result<Option<SettingHistoryRecord>, StoreError>;

    /// Reading with the greatest `report_date <= date`.
    async fn latest_reading_at_or_before(
        &self,
        machine_id: &MachineId,
        date: NaiveDate,
    ) -> Result<Option<CounterReading>, StoreError>;

    /// Reading with the greatest `report_date < date`.
    async fn latest_reading_before(
        &self,
        machine_id: &MachineId,
        date: NaiveDate,
    ) -> Result<Option<CounterReading>, StoreError>;
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("corrupt stored value: {0}")]
    Corrupt(String),
}

//! In-memory store for exercising the settlement core without a database.

use super::{LedgerStore, StoreError};
use crate::domain::{CounterReading, Machine, MachineId, SettingField, SettingHistoryRecord};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};

/// Store that serves predefined rows.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    machines: Vec<Machine>,
    settings: Vec<SettingHistoryRecord>,
    readings: Vec<CounterReading>,
    fail_reads: bool,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a machine row.
    pub fn with_machine(mut self, machine: Machine) -> Self {
        self.machines.push(machine);
        self
    }

    /// Append a history record; ids and `created_at` increase with insertion order.
    ///
    /// # Panics
    /// Panics if `raw` is not a valid value for `field`.
    pub fn with_setting(
        mut self,
        machine_id: &MachineId,
        field: SettingField,
        raw: &str,
        effective_date: NaiveDate,
    ) -> Self {
        let id = self.settings.len() as i64 + 1;
        let value = field
            .parse_value(raw)
            .unwrap_or_else(|e| panic!("MemoryStore::with_setting: {}", e));
        self.settings.push(SettingHistoryRecord {
            id,
            machine_id: machine_id.clone(),
            field,
            value,
            effective_date,
            created_at: DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(id),
            created_by: None,
        });
        self
    }

    /// Add or replace the reading for (machine, date).
    pub fn with_reading(
        mut self,
        machine_id: &MachineId,
        report_date: NaiveDate,
        coin_count: i64,
        prize_count: i64,
    ) -> Self {
        self.readings
            .retain(|r| !(r.machine_id == *machine_id && r.report_date == report_date));
        self.readings.push(CounterReading {
            machine_id: machine_id.clone(),
            report_date,
            coin_count,
            prize_count,
        });
        self
    }

    /// Make every history and reading lookup fail with a storage error.
    pub fn with_read_failures(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    fn check_reads(&self) -> Result<(), StoreError> {
        if self.fail_reads {
            Err(StoreError::Db(sqlx::Error::PoolTimedOut))
        } else {
            Ok(())
        }
    }

    fn latest_reading_matching(
        &self,
        machine_id: &MachineId,
        pred: impl Fn(NaiveDate) -> bool,
    ) -> Option<CounterReading> {
        self.readings
            .iter()
            .filter(|r| r.machine_id == *machine_id && pred(r.report_date))
            .max_by_key(|r| r.report_date)
            .cloned()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn get_machine(&self, id: &MachineId) -> Result<Option<Machine>, StoreError> {
        Ok(self.machines.iter().find(|m| m.id == *id).cloned())
    }

    async fn latest_setting_at_or_before(
        &self,
        machine_id: &MachineId,
        field: SettingField,
        as_of: NaiveDate,
    ) -> Result<Option<SettingHistoryRecord>, StoreError> {
        self.check_reads()?;
        Ok(self
            .settings
            .iter()
            .filter(|s| s.machine_id == *machine_id && s.field == field && s.effective_date <= as_of)
            .max_by_key(|s| (s.effective_date, s.created_at, s.id))
            .cloned())
    }

    async fn latest_reading_at_or_before(
        &self,
        machine_id: &MachineId,
        date: NaiveDate,
    ) -> Result<Option<CounterReading>, StoreError> {
        self.check_reads()?;
        Ok(self.latest_reading_matching(machine_id, |d| d <= date))
    }

    async fn latest_reading_before(
        &self,
        machine_id: &MachineId,
        date: NaiveDate,
    ) -> Result<Option<CounterReading>, StoreError> {
        self.check_reads()?;
        Ok(self.latest_reading_matching(machine_id, |d| d < date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[tokio::test]
    async fn test_reading_for_same_date_is_replaced() {
        let id = MachineId::new("m".to_string());
        let store = MemoryStore::new()
            .with_reading(&id, date(5), 10, 1)
            .with_reading(&id, date(5), 20, 2);
        let reading = store
            .latest_reading_at_or_before(&id, date(5))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reading.coin_count, 20);
    }

    #[tokio::test]
    async fn test_reading_boundaries() {
        let id = MachineId::new("m".to_string());
        let store = MemoryStore::new()
            .with_reading(&id, date(1), 10, 1)
            .with_reading(&id, date(10), 50, 5);

        let at = store.latest_reading_at_or_before(&id, date(10)).await.unwrap();
        assert_eq!(at.map(|r| r.report_date), Some(date(10)));

        let before = store.latest_reading_before(&id, date(10)).await.unwrap();
        assert_eq!(before.map(|r| r.report_date), Some(date(1)));

        let none = store.latest_reading_before(&id, date(1)).await.unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_setting_tie_goes_to_latest_insert() {
        let id = MachineId::new("m".to_string());
        let store = MemoryStore::new()
            .with_setting(&id, SettingField::CoinPrice, "2", date(1))
            .with_setting(&id, SettingField::CoinPrice, "3", date(1));
        let record = store
            .latest_setting_at_or_before(&id, SettingField::CoinPrice, date(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.value.to_storage_string(), "3");
    }

    #[tokio::test]
    async fn test_read_failures() {
        let id = MachineId::new("m".to_string());
        let store = MemoryStore::new().with_read_failures();
        assert!(matches!(
            store.latest_reading_before(&id, date(1)).await,
            Err(StoreError::Db(_))
        ));
    }
}

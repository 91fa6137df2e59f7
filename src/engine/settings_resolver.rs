use crate::domain::{Machine, MachineId, SettingField, SettingValue, SettingsSnapshot};
use crate::error::LedgerError;
use crate::store::{LedgerStore, StoreError};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::debug;

/// Resolves the effective value of each machine setting as of a date.
///
/// A field's value is taken from the history record with the latest effective date
/// on or before the as-of date; with no such record, the machine row's current value
/// applies.
#[derive(Debug, Clone)]
pub struct SettingsResolver {
    store: Arc<dyn LedgerStore>,
}

impl SettingsResolver {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Effective value of a single field.
    pub async fn resolve_setting(
        &self,
        machine_id: &MachineId,
        field: SettingField,
        as_of: NaiveDate,
    ) -> Result<SettingValue, LedgerError> {
        let machine = self.load_machine(machine_id).await?;
        self.resolve_field(&machine, field, as_of).await
    }

    /// Effective values of every field.
    pub async fn resolve_all(
        &self,
        machine_id: &MachineId,
        as_of: NaiveDate,
    ) -> Result<SettingsSnapshot, LedgerError> {
        let machine = self.load_machine(machine_id).await?;
        self.resolve_all_for_machine(&machine, as_of).await
    }

    /// Same as [`resolve_all`](Self::resolve_all) for an already loaded machine row.
    pub async fn resolve_all_for_machine(
        &self,
        machine: &Machine,
        as_of: NaiveDate,
    ) -> Result<SettingsSnapshot, LedgerError> {
        let mut snapshot = machine.current_settings();
        for field in SettingField::ALL {
            let value = self.resolve_field(machine, field, as_of).await?;
            snapshot
                .apply(field, value)
                .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        }
        Ok(snapshot)
    }

    async fn resolve_field(
        &self,
        machine: &Machine,
        field: SettingField,
        as_of: NaiveDate,
    ) -> Result<SettingValue, LedgerError> {
        match self
            .store
            .latest_setting_at_or_before(&machine.id, field, as_of)
            .await?
        {
            Some(record) => Ok(record.value),
            None => {
                debug!(
                    machine_id = %machine.id,
                    field = %field,
                    as_of = %as_of,
                    "no setting history on or before date, using current machine value"
                );
                Ok(machine.current.get(field))
            }
        }
    }

    async fn load_machine(&self, machine_id: &MachineId) -> Result<Machine, LedgerError> {
        self.store
            .get_machine(machine_id)
            .await?
            .ok_or_else(|| LedgerError::machine_not_found(machine_id))
    }
}

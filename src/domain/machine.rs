//! Claw machine registration record.

use crate::domain::{BillingDuration, Decimal, MachineId, SettingField, SettingValueError, SettingsSnapshot};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A physical claw machine and its current pricing/configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Machine {
    pub id: MachineId,
    pub name: String,
    pub location: String,
    pub installation_date: Option<NaiveDate>,
    pub is_active: bool,
    /// Values currently stored on the machine row.
    #[serde(flatten)]
    pub current: SettingsSnapshot,
}

impl Machine {
    /// Settings taken straight from the machine row, ignoring history.
    pub fn current_settings(&self) -> SettingsSnapshot {
        self.current.clone()
    }
}

/// Input for registering a machine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMachine {
    pub name: String,
    #[serde(default)]
    pub location: String,
    pub installation_date: Option<NaiveDate>,
    pub coin_price: Decimal,
    pub doll_price: Decimal,
    pub electricity_cost: Decimal,
    pub vat_percentage: Decimal,
    pub maintenance_percentage: Decimal,
    pub owner_profit_share_percentage: Decimal,
    pub clowee_profit_share_percentage: Decimal,
    pub duration: BillingDuration,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MachineValidationError {
    #[error("machine name must not be empty")]
    EmptyName,
    #[error(transparent)]
    Setting(#[from] SettingValueError),
    #[error("owner + clowee profit share cannot exceed 100% (got {0}%)")]
    ShareSumExceeded(String),
}

impl NewMachine {
    /// Input-time validation; these invariants are not re-checked later.
    ///
    /// # Errors
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), MachineValidationError> {
        if self.name.trim().is_empty() {
            return Err(MachineValidationError::EmptyName);
        }
        let settings = self.settings();
        for field in SettingField::ALL {
            if let crate::domain::SettingValue::Number(n) = settings.get(field) {
                field.check_range(n)?;
            }
        }
        let share_sum = self.owner_profit_share_percentage + self.clowee_profit_share_percentage;
        if share_sum > Decimal::hundred() {
            return Err(MachineValidationError::ShareSumExceeded(
                share_sum.to_canonical_string(),
            ));
        }
        Ok(())
    }

    pub fn settings(&self) -> SettingsSnapshot {
        SettingsSnapshot {
            coin_price: self.coin_price,
            doll_price: self.doll_price,
            electricity_cost: self.electricity_cost,
            vat_percentage: self.vat_percentage,
            maintenance_percentage: self.maintenance_percentage,
            owner_profit_share_percentage: self.owner_profit_share_percentage,
            clowee_profit_share_percentage: self.clowee_profit_share_percentage,
            duration: self.duration,
        }
    }

    /// Build the machine record with a freshly generated id.
    pub fn into_machine(self) -> Machine {
        let current = self.settings();
        Machine {
            id: MachineId::generate(),
            name: self.name.trim().to_string(),
            location: self.location.trim().to_string(),
            installation_date: self.installation_date,
            is_active: true,
            current,
        }
    }
}

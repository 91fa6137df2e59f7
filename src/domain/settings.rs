//! Machine pricing/configuration fields and their effective-dated history.
//!
//! Every configurable field is described once in [`FIELD_DESCRIPTORS`]; parsing,
//! validation and display all go through the descriptor's [`ValueKind`].

use crate::domain::{BillingDuration, Decimal, MachineId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A configurable machine field that can be versioned by effective date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingField {
    CoinPrice,
    DollPrice,
    ElectricityCost,
    VatPercentage,
    MaintenancePercentage,
    OwnerProfitSharePercentage,
    CloweeProfitSharePercentage,
    Duration,
}

/// How a field's text value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Non-negative money amount.
    Currency,
    /// Percentage in `[0, 100]`.
    Percentage,
    /// Raw string token (billing duration).
    Token,
}

#[derive(Debug)]
pub struct FieldDescriptor {
    pub field: SettingField,
    /// Field name as stored in history rows; also the machine column name.
    pub name: &'static str,
    pub kind: ValueKind,
    pub label: &'static str,
}

pub const FIELD_DESCRIPTORS: [FieldDescriptor; 8] = [
    FieldDescriptor {
        field: SettingField::CoinPrice,
        name: "coin_price",
        kind: ValueKind::Currency,
        label: "Coin Price",
    },
    FieldDescriptor {
        field: SettingField::DollPrice,
        name: "doll_price",
        kind: ValueKind::Currency,
        label: "Doll Price",
    },
    FieldDescriptor {
        field: SettingField::ElectricityCost,
        name: "electricity_cost",
        kind: ValueKind::Currency,
        label: "Electricity Cost",
    },
    FieldDescriptor {
        field: SettingField::VatPercentage,
        name: "vat_percentage",
        kind: ValueKind::Percentage,
        label: "VAT Percentage",
    },
    FieldDescriptor {
        field: SettingField::MaintenancePercentage,
        name: "maintenance_percentage",
        kind: ValueKind::Percentage,
        label: "Maintenance Percentage",
    },
    FieldDescriptor {
        field: SettingField::OwnerProfitSharePercentage,
        name: "owner_profit_share_percentage",
        kind: ValueKind::Percentage,
        label: "Owner Profit Share",
    },
    FieldDescriptor {
        field: SettingField::CloweeProfitSharePercentage,
        name: "clowee_profit_share_percentage",
        kind: ValueKind::Percentage,
        label: "Clowee Profit Share",
    },
    FieldDescriptor {
        field: SettingField::Duration,
        name: "duration",
        kind: ValueKind::Token,
        label: "Duration",
    },
];

/// Pre-split name for the Clowee share, still accepted on input.
pub const LEGACY_PROFIT_SHARE_NAME: &str = "profit_share_percentage";

impl SettingField {
    pub const ALL: [SettingField; 8] = [
        SettingField::CoinPrice,
        SettingField::DollPrice,
        SettingField::ElectricityCost,
        SettingField::VatPercentage,
        SettingField::MaintenancePercentage,
        SettingField::OwnerProfitSharePercentage,
        SettingField::CloweeProfitSharePercentage,
        SettingField::Duration,
    ];

    pub fn descriptor(&self) -> &'static FieldDescriptor {
        // Table order matches declaration order.
        &FIELD_DESCRIPTORS[*self as usize]
    }

    pub fn name(&self) -> &'static str {
        self.descriptor().name
    }

    pub fn kind(&self) -> ValueKind {
        self.descriptor().kind
    }

    /// Parse a stored value for this field without range checks.
    ///
    /// # Errors
    /// Returns an error if the text does not match the field's kind.
    pub fn parse_value(&self, raw: &str) -> Result<SettingValue, SettingValueError> {
        match self.kind() {
            ValueKind::Currency | ValueKind::Percentage => Decimal::from_str_canonical(raw)
                .map(SettingValue::Number)
                .map_err(|_| SettingValueError::Malformed {
                    field: *self,
                    value: raw.to_string(),
                }),
            ValueKind::Token => BillingDuration::from_str(raw)
                .map(SettingValue::Duration)
                .map_err(|_| SettingValueError::Malformed {
                    field: *self,
                    value: raw.to_string(),
                }),
        }
    }

    /// Parse and range-check a newly submitted value.
    ///
    /// # Errors
    /// Returns an error if the value is malformed or out of range for its kind.
    pub fn validate_new(&self, raw: &str) -> Result<SettingValue, SettingValueError> {
        let value = self.parse_value(raw)?;
        if let SettingValue::Number(n) = value {
            self.check_range(n)?;
        }
        Ok(value)
    }

    /// Range check for numeric fields.
    ///
    /// # Errors
    /// Returns an error if a currency is negative or a percentage is outside `[0, 100]`.
    pub fn check_range(&self, n: Decimal) -> Result<(), SettingValueError> {
        let in_range = match self.kind() {
            ValueKind::Currency => !n.is_negative(),
            ValueKind::Percentage => !n.is_negative() && n <= Decimal::hundred(),
            ValueKind::Token => true,
        };
        if in_range {
            Ok(())
        } else {
            Err(SettingValueError::OutOfRange {
                field: *self,
                value: n.to_canonical_string(),
            })
        }
    }

    /// Human-readable rendering of a value for this field.
    pub fn format_value(&self, value: &SettingValue) -> String {
        match (self.kind(), value) {
            (ValueKind::Currency, SettingValue::Number(n)) => n.to_currency_string(),
            (ValueKind::Percentage, SettingValue::Number(n)) => format!("{}%", n),
            _ => value.to_storage_string(),
        }
    }
}

impl fmt::Display for SettingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown setting field: {0}")]
pub struct UnknownSettingField(pub String);

impl FromStr for SettingField {
    type Err = UnknownSettingField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == LEGACY_PROFIT_SHARE_NAME {
            return Ok(SettingField::CloweeProfitSharePercentage);
        }
        FIELD_DESCRIPTORS
            .iter()
            .find(|d| d.name == s)
            .map(|d| d.field)
            .ok_or_else(|| UnknownSettingField(s.to_string()))
    }
}

/// A typed setting value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Number(Decimal),
    Duration(BillingDuration),
}

impl SettingValue {
    /// Text form written to history rows.
    pub fn to_storage_string(&self) -> String {
        match self {
            SettingValue::Number(n) => n.to_canonical_string(),
            SettingValue::Duration(d) => d.as_token().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingValueError {
    #[error("invalid value for {field}: {value}")]
    Malformed { field: SettingField, value: String },
    #[error("value out of range for {field}: {value}")]
    OutOfRange { field: SettingField, value: String },
    #[error("value kind does not match field {0}")]
    KindMismatch(SettingField),
}

/// An append-only, effective-dated setting change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingHistoryRecord {
    pub id: i64,
    pub machine_id: MachineId,
    pub field: SettingField,
    pub value: SettingValue,
    pub effective_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
}

/// The full set of settings in force for a machine on a given date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsSnapshot {
    pub coin_price: Decimal,
    pub doll_price: Decimal,
    pub electricity_cost: Decimal,
    pub vat_percentage: Decimal,
    pub maintenance_percentage: Decimal,
    pub owner_profit_share_percentage: Decimal,
    pub clowee_profit_share_percentage: Decimal,
    pub duration: BillingDuration,
}

impl SettingsSnapshot {
    pub fn get(&self, field: SettingField) -> SettingValue {
        match field {
            SettingField::CoinPrice => SettingValue::Number(self.coin_price),
            SettingField::DollPrice => SettingValue::Number(self.doll_price),
            SettingField::ElectricityCost => SettingValue::Number(self.electricity_cost),
            SettingField::VatPercentage => SettingValue::Number(self.vat_percentage),
            SettingField::MaintenancePercentage => {
                SettingValue::Number(self.maintenance_percentage)
            }
            SettingField::OwnerProfitSharePercentage => {
                SettingValue::Number(self.owner_profit_share_percentage)
            }
            SettingField::CloweeProfitSharePercentage => {
                SettingValue::Number(self.clowee_profit_share_percentage)
            }
            SettingField::Duration => SettingValue::Duration(self.duration),
        }
    }

    /// Overwrite one field.
    ///
    /// # Errors
    /// Returns `KindMismatch` if `value` is not of the field's kind.
    pub fn apply(&mut self, field: SettingField, value: SettingValue) -> Result<(), SettingValueError> {
        match (field, value) {
            (SettingField::Duration, SettingValue::Duration(d)) => self.duration = d,
            (SettingField::Duration, SettingValue::Number(_))
            | (_, SettingValue::Duration(_)) => return Err(SettingValueError::KindMismatch(field)),
            (SettingField::CoinPrice, SettingValue::Number(n)) => self.coin_price = n,
            (SettingField::DollPrice, SettingValue::Number(n)) => self.doll_price = n,
            (SettingField::ElectricityCost, SettingValue::Number(n)) => self.electricity_cost = n,
            (SettingField::VatPercentage, SettingValue::Number(n)) => self.vat_percentage = n,
            (SettingField::MaintenancePercentage, SettingValue::Number(n)) => {
                self.maintenance_percentage = n
            }
            (SettingField::OwnerProfitSharePercentage, SettingValue::Number(n)) => {
                self.owner_profit_share_percentage = n
            }
            (SettingField::CloweeProfitSharePercentage, SettingValue::Number(n)) => {
                self.clowee_profit_share_percentage = n
            }
        }
        Ok(())
    }
}

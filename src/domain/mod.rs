//! Domain types for the Clowee settlement ledger.
//!
//! This module provides:
//! - Lossless numeric handling via Decimal wrapper
//! - Domain primitives: MachineId, BillingDuration, date helpers
//! - The settings field descriptor table and effective-dated history records
//! - Machines, counter readings, settlement records and invoices

pub mod counter;
pub mod decimal;
pub mod machine;
pub mod primitives;
pub mod settings;
pub mod settlement;

pub use counter::{CounterDelta, CounterReading};
pub use decimal::Decimal;
pub use machine::{Machine, MachineValidationError, NewMachine};
pub use primitives::{
    format_date, parse_date, BillingDuration, BillingDurationParseError, MachineId, DATE_FORMAT,
};
pub use settings::{
    FieldDescriptor, SettingField, SettingHistoryRecord, SettingValue, SettingValueError,
    SettingsSnapshot, UnknownSettingField, ValueKind, FIELD_DESCRIPTORS,
};
pub use settlement::{invoice_number, Invoice, SettlementRecord};

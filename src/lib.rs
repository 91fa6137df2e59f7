pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod store;

pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{
    BillingDuration, CounterDelta, CounterReading, Decimal, Invoice, Machine, MachineId,
    NewMachine, SettingField, SettingValue, SettingsSnapshot, SettlementRecord,
};
pub use engine::{Settlement, SettlementBreakdown, SettlementCalculator};
pub use error::{AppError, LedgerError};
pub use store::{LedgerStore, MemoryStore, StoreError};

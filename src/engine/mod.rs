//! Settlement computation engine.
//!
//! - `settings_resolver` - effective-dated settings lookup
//! - `counter_delta` - coins/prizes sold in a period from cumulative readings
//! - `settlement` - the "Pay to Clowee" arithmetic

pub mod counter_delta;
pub mod settings_resolver;
pub mod settlement;

pub use counter_delta::CounterDeltaResolver;
pub use settings_resolver::SettingsResolver;
pub use settlement::{Settlement, SettlementBreakdown, SettlementCalculator};

use crate::domain::{CounterDelta, Machine, MachineId};
use crate::error::LedgerError;
use crate::store::LedgerStore;
use chrono::NaiveDate;
use std::sync::Arc;

/// Computes coins/prizes sold in a period from cumulative counter readings.
///
/// The period total is the reading at or before `end` minus the latest reading strictly
/// before `start` (the previous period boundary), floored at zero per counter.
#[derive(Debug, Clone)]
pub struct CounterDeltaResolver {
    store: Arc<dyn LedgerStore>,
}

impl CounterDeltaResolver {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Delta for `[start, end]`; an unregistered machine is `NotFound`.
    pub async fn resolve_period_delta(
        &self,
        machine_id: &MachineId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<CounterDelta, LedgerError> {
        check_period(start, end)?;
        let machine = self
            .store
            .get_machine(machine_id)
            .await?
            .ok_or_else(|| LedgerError::machine_not_found(machine_id))?;
        self.resolve_period_delta_for_machine(&machine, start, end)
            .await
    }

    /// Same as [`resolve_period_delta`](Self::resolve_period_delta) for an already loaded
    /// machine row.
    pub async fn resolve_period_delta_for_machine(
        &self,
        machine: &Machine,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<CounterDelta, LedgerError> {
        check_period(start, end)?;
        let machine_id = &machine.id;

        let end_reading = self
            .store
            .latest_reading_at_or_before(machine_id, end)
            .await?
            .ok_or_else(|| LedgerError::NoDataForPeriod {
                machine_id: machine_id.clone(),
                end_date: end,
            })?;

        // No earlier reading means the machine's first period: count from zero.
        let baseline = self.store.latest_reading_before(machine_id, start).await?;

        Ok(CounterDelta::between(&end_reading, baseline.as_ref()))
    }
}

fn check_period(start: NaiveDate, end: NaiveDate) -> Result<(), LedgerError> {
    if start > end {
        return Err(LedgerError::InvalidInput(format!(
            "period start {} is after end {}",
            start, end
        )));
    }
    Ok(())
}

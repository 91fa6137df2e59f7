use crate::domain::{CounterDelta, Decimal, Machine, MachineId, SettingsSnapshot};
use crate::engine::{CounterDeltaResolver, SettingsResolver};
use crate::error::LedgerError;
use crate::store::LedgerStore;
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Itemized result of one "Pay to Clowee" settlement.
///
/// Built once from the period delta and the settings in force at the period end;
/// no field is rounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementBreakdown {
    pub coins: i64,
    pub prizes: i64,
    pub total_income: Decimal,
    pub prize_cost: Decimal,
    /// Full configured electricity cost, for display.
    pub electricity_cost: Decimal,
    /// Half of the electricity cost, the portion billed against the payable amount.
    pub electricity_share: Decimal,
    pub vat_amount: Decimal,
    pub maintenance_cost: Decimal,
    /// Income left after prize, VAT and maintenance deductions.
    pub profit_base: Decimal,
    /// Clowee's share of the profit base.
    pub profit_share_amount: Decimal,
    /// Income after all deductions including full electricity. Reporting only.
    pub total_amount: Decimal,
    pub pay_to_clowee: Decimal,
}

impl SettlementBreakdown {
    /// Apply the settlement arithmetic.
    ///
    /// `pay_to_clowee` may be negative.
    ///
    /// # Errors
    /// Returns `InvalidInput` if any intermediate amount overflows the decimal range.
    pub fn compute(delta: CounterDelta, settings: &SettingsSnapshot) -> Result<Self, LedgerError> {
        Self::checked(delta, settings).ok_or_else(|| {
            LedgerError::InvalidInput(format!(
                "settlement amounts overflow for {} coins and {} prizes",
                delta.coins, delta.prizes
            ))
        })
    }

    fn checked(delta: CounterDelta, settings: &SettingsSnapshot) -> Option<Self> {
        let total_income = Decimal::from(delta.coins).checked_mul(settings.coin_price)?;
        let prize_cost = Decimal::from(delta.prizes).checked_mul(settings.doll_price)?;
        let vat_amount = total_income.percent_of(settings.vat_percentage)?;
        let maintenance_cost = total_income.percent_of(settings.maintenance_percentage)?;

        let deductions = prize_cost
            .checked_add(vat_amount)?
            .checked_add(maintenance_cost)?;
        let profit_base = total_income.checked_sub(deductions)?;
        let profit_share_amount = profit_base.percent_of(settings.clowee_profit_share_percentage)?;

        let electricity_cost = settings.electricity_cost;
        let electricity_share = electricity_cost.half();

        let total_amount =
            total_income.checked_sub(deductions.checked_add(electricity_cost)?)?;
        let pay_to_clowee = profit_share_amount
            .checked_add(prize_cost)?
            .checked_sub(electricity_share)?;

        Some(SettlementBreakdown {
            coins: delta.coins,
            prizes: delta.prizes,
            total_income,
            prize_cost,
            electricity_cost,
            electricity_share,
            vat_amount,
            maintenance_cost,
            profit_base,
            profit_share_amount,
            total_amount,
            pay_to_clowee,
        })
    }
}

/// A computed settlement together with the inputs that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    pub machine_id: MachineId,
    pub machine_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub settings: SettingsSnapshot,
    pub breakdown: SettlementBreakdown,
}

/// Computes settlements; performs no writes.
#[derive(Debug, Clone)]
pub struct SettlementCalculator {
    store: Arc<dyn LedgerStore>,
    settings: SettingsResolver,
    deltas: CounterDeltaResolver,
}

impl SettlementCalculator {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            settings: SettingsResolver::new(store.clone()),
            deltas: CounterDeltaResolver::new(store.clone()),
            store,
        }
    }

    pub fn settings_resolver(&self) -> &SettingsResolver {
        &self.settings
    }

    pub fn delta_resolver(&self) -> &CounterDeltaResolver {
        &self.deltas
    }

    /// Load the machine and compute its settlement for `[start, end]`.
    pub async fn compute(
        &self,
        machine_id: &MachineId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Settlement, LedgerError> {
        let machine = self
            .store
            .get_machine(machine_id)
            .await?
            .ok_or_else(|| LedgerError::machine_not_found(machine_id))?;
        self.compute_for_machine(&machine, start, end).await
    }

    /// Compute the settlement for `[start, end]`.
    ///
    /// Settings in force on `end` apply to the whole period.
    pub async fn compute_for_machine(
        &self,
        machine: &Machine,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Settlement, LedgerError> {
        let (delta, settings) = futures::try_join!(
            self.deltas.resolve_period_delta_for_machine(machine, start, end),
            self.settings.resolve_all_for_machine(machine, end),
        )?;

        let breakdown = SettlementBreakdown::compute(delta, &settings)?;

        info!(
            machine_id = %machine.id,
            start = %start,
            end = %end,
            coins = breakdown.coins,
            prizes = breakdown.prizes,
            pay_to_clowee = %breakdown.pay_to_clowee,
            "Settlement computed"
        );

        Ok(Settlement {
            machine_id: machine.id.clone(),
            machine_name: machine.name.clone(),
            start_date: start,
            end_date: end,
            settings,
            breakdown,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SettingField;
    use crate::engine::test_support::{date, machine};
    use crate::store::MemoryStore;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn settings() -> SettingsSnapshot {
        machine("m1").current_settings()
    }

    #[test]
    fn test_reference_scenario() {
        let b = SettlementBreakdown::compute(CounterDelta { coins: 1000, prizes: 20 }, &settings())
            .unwrap();

        assert_eq!(b.total_income, d("2000"));
        assert_eq!(b.prize_cost, d("100"));
        assert_eq!(b.vat_amount, d("200"));
        assert_eq!(b.maintenance_cost, d("100"));
        assert_eq!(b.profit_base, d("1600"));
        assert_eq!(b.profit_share_amount, d("800"));
        assert_eq!(b.electricity_cost, d("100"));
        assert_eq!(b.electricity_share, d("50"));
        assert_eq!(b.total_amount, d("1500"));
        assert_eq!(b.pay_to_clowee, d("850"));
    }

    #[test]
    fn test_zero_sales_owes_half_electricity() {
        let b = SettlementBreakdown::compute(CounterDelta::default(), &settings())
            .unwrap();

        assert!(b.total_income.is_zero());
        assert!(b.prize_cost.is_zero());
        assert!(b.vat_amount.is_zero());
        assert!(b.maintenance_cost.is_zero());
        assert!(b.profit_share_amount.is_zero());
        assert_eq!(b.pay_to_clowee, d("-50"));
    }

    #[test]
    fn test_prizes_without_coins() {
        let b = SettlementBreakdown::compute(CounterDelta { coins: 0, prizes: 4 }, &settings())
            .unwrap();

        assert_eq!(b.prize_cost, d("20"));
        // Negative profit base yields a negative clowee share.
        assert_eq!(b.profit_base, d("-20"));
        assert_eq!(b.profit_share_amount, d("-10"));
        assert_eq!(b.pay_to_clowee, d("-40"));
    }

    #[test]
    fn test_fractional_values_are_not_rounded() {
        let mut s = settings();
        s.coin_price = d("1.5");
        s.vat_percentage = d("7.5");
        s.electricity_cost = d("75");
        let b = SettlementBreakdown::compute(CounterDelta { coins: 333, prizes: 0 }, &s).unwrap();

        assert_eq!(b.total_income, d("499.5"));
        assert_eq!(b.vat_amount, d("37.4625"));
        assert_eq!(b.electricity_share, d("37.5"));
    }

    #[test]
    fn test_overflowing_amounts_are_rejected() {
        // Largest coin price that still passes input validation.
        let huge = SettingField::CoinPrice
            .validate_new("79228162514264337593543950335")
            .unwrap();
        let mut s = settings();
        s.apply(SettingField::CoinPrice, huge).unwrap();

        let err = SettlementBreakdown::compute(CounterDelta { coins: 1000, prizes: 0 }, &s)
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput(_)));

        let mut s = settings();
        s.doll_price = d("79228162514264337593543950");
        let err = SettlementBreakdown::compute(CounterDelta { coins: 0, prizes: i64::MAX }, &s)
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput(_)));
    }

    fn scenario_store() -> (MemoryStore, MachineId) {
        let m = machine("m1");
        let id = m.id.clone();
        let store = MemoryStore::new()
            .with_machine(m)
            .with_reading(&id, date(2024, 1, 15), 500, 10)
            .with_reading(&id, date(2024, 1, 31), 1500, 30);
        (store, id)
    }

    #[tokio::test]
    async fn test_compute_end_to_end() {
        let (store, id) = scenario_store();
        let calc = SettlementCalculator::new(Arc::new(store));

        let s = calc.compute(&id, date(2024, 1, 16), date(2024, 1, 31)).await.unwrap();
        assert_eq!(s.breakdown.coins, 1000);
        assert_eq!(s.breakdown.prizes, 20);
        assert_eq!(s.breakdown.pay_to_clowee, d("850"));
        assert_eq!(s.machine_name, "Machine m1");
    }

    #[tokio::test]
    async fn test_compute_is_idempotent() {
        let (store, id) = scenario_store();
        let calc = SettlementCalculator::new(Arc::new(store));

        let first = calc.compute(&id, date(2024, 1, 16), date(2024, 1, 31)).await.unwrap();
        let second = calc.compute(&id, date(2024, 1, 16), date(2024, 1, 31)).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_mid_period_change_uses_end_date_value() {
        let (store, id) = scenario_store();
        let store = store
            .with_setting(&id, SettingField::CoinPrice, "3", date(2024, 1, 20))
            .with_setting(&id, SettingField::CoinPrice, "4", date(2024, 2, 1));
        let calc = SettlementCalculator::new(Arc::new(store));

        let s = calc.compute(&id, date(2024, 1, 16), date(2024, 1, 31)).await.unwrap();
        assert_eq!(s.settings.coin_price, d("3"));
        assert_eq!(s.breakdown.total_income, d("3000"));
    }

    #[tokio::test]
    async fn test_no_readings_produces_no_breakdown() {
        let m = machine("m1");
        let id = m.id.clone();
        let calc = SettlementCalculator::new(Arc::new(MemoryStore::new().with_machine(m)));

        let err = calc
            .compute(&id, date(2024, 1, 1), date(2024, 1, 31))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NoDataForPeriod { .. }));
    }

    #[tokio::test]
    async fn test_unknown_machine_is_not_found() {
        let calc = SettlementCalculator::new(Arc::new(MemoryStore::new()));
        let err = calc
            .compute(&MachineId::new("nope".into()), date(2024, 1, 1), date(2024, 1, 31))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }
}

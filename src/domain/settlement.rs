//! Persisted settlement ("Pay to Clowee") records and their invoices.

use crate::domain::{format_date, Decimal, MachineId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// A frozen snapshot of one computed settlement.
///
/// Later setting-history changes never alter a stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementRecord {
    pub id: String,
    pub machine_id: MachineId,
    pub machine_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_coins: i64,
    pub total_prizes: i64,
    pub total_income: Decimal,
    pub prize_cost: Decimal,
    pub electricity_cost: Decimal,
    pub vat_amount: Decimal,
    pub maintenance_cost: Decimal,
    pub profit_share_amount: Decimal,
    pub total_amount: Decimal,
    pub pay_to_clowee: Decimal,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An invoice issued against a settlement record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: String,
    pub settlement_id: String,
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
    pub notes: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Build an invoice number of the form `{prefix}-{YYYYMMDD}-{suffix}`.
///
/// The suffix is the first 10 hex chars of SHA-256(settlement id, invoice date), so the
/// same settlement and date always yield the same number.
pub fn invoice_number(prefix: &str, settlement_id: &str, invoice_date: NaiveDate) -> String {
    use sha2::{Digest, Sha256};

    let date_str = format_date(invoice_date);
    let mut hasher = Sha256::new();
    hasher.update((settlement_id.len() as u32).to_le_bytes());
    hasher.update(settlement_id.as_bytes());
    hasher.update(date_str.as_bytes());
    let hash = hasher.finalize();

    format!(
        "{}-{}-{}",
        prefix,
        invoice_date.format("%Y%m%d"),
        &hex::encode(&hash[..5])
    )
}

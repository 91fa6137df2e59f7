//! Settlement record and invoice operations for the repository.

use crate::domain::{format_date, Invoice, MachineId, SettlementRecord};
use crate::engine::Settlement;
use crate::error::LedgerError;
use crate::store::StoreError;
use chrono::{NaiveDate, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::info;

use super::{date_col, decimal_col, timestamp_col, Repository};

const SETTLEMENT_COLUMNS: &str = r#"
    id, machine_id, machine_name, start_date, end_date, total_coins, total_prizes,
    total_income, prize_cost, electricity_cost, vat_amount, maintenance_cost,
    profit_share_amount, total_amount, pay_to_clowee, created_by, created_at
"#;

const INVOICE_COLUMNS: &str = r#"
    id, pay_to_clowee_id, invoice_number, invoice_date, notes, created_by, created_at
"#;

impl Repository {
    /// Persist a computed settlement as an immutable record.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn insert_settlement(
        &self,
        settlement: &Settlement,
        created_by: Option<&str>,
    ) -> Result<SettlementRecord, LedgerError> {
        let b = &settlement.breakdown;
        let now = Utc::now();
        let record = SettlementRecord {
            id: uuid::Uuid::new_v4().to_string(),
            machine_id: settlement.machine_id.clone(),
            machine_name: settlement.machine_name.clone(),
            start_date: settlement.start_date,
            end_date: settlement.end_date,
            total_coins: b.coins,
            total_prizes: b.prizes,
            total_income: b.total_income,
            prize_cost: b.prize_cost,
            electricity_cost: b.electricity_cost,
            vat_amount: b.vat_amount,
            maintenance_cost: b.maintenance_cost,
            profit_share_amount: b.profit_share_amount,
            total_amount: b.total_amount,
            pay_to_clowee: b.pay_to_clowee,
            created_by: created_by.map(str::to_string),
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO pay_to_clowee (
                id, machine_id, machine_name, start_date, end_date, total_coins, total_prizes,
                total_income, prize_cost, electricity_cost, vat_amount, maintenance_cost,
                profit_share_amount, total_amount, pay_to_clowee, created_by, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(record.machine_id.as_str())
        .bind(&record.machine_name)
        .bind(format_date(record.start_date))
        .bind(format_date(record.end_date))
        .bind(record.total_coins)
        .bind(record.total_prizes)
        .bind(record.total_income.to_canonical_string())
        .bind(record.prize_cost.to_canonical_string())
        .bind(record.electricity_cost.to_canonical_string())
        .bind(record.vat_amount.to_canonical_string())
        .bind(record.maintenance_cost.to_canonical_string())
        .bind(record.profit_share_amount.to_canonical_string())
        .bind(record.total_amount.to_canonical_string())
        .bind(record.pay_to_clowee.to_canonical_string())
        .bind(record.created_by.as_deref())
        .bind(now.timestamp_millis())
        .execute(&self.pool)
        .await?;

        info!(
            settlement_id = %record.id,
            machine_id = %record.machine_id,
            pay_to_clowee = %record.pay_to_clowee,
            "Settlement record saved"
        );
        Ok(record)
    }

    /// Settlement history, newest first, optionally restricted to one creator.
    ///
    /// # Errors
    /// Returns an error if the query fails or a row cannot be decoded.
    pub async fn list_settlements(
        &self,
        created_by: Option<&str>,
    ) -> Result<Vec<SettlementRecord>, StoreError> {
        let rows = match created_by {
            Some(author) => {
                let sql = format!(
                    "SELECT {} FROM pay_to_clowee WHERE created_by = ? ORDER BY created_at DESC, id ASC",
                    SETTLEMENT_COLUMNS
                );
                sqlx::query(&sql).bind(author).fetch_all(&self.pool).await?
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM pay_to_clowee ORDER BY created_at DESC, id ASC",
                    SETTLEMENT_COLUMNS
                );
                sqlx::query(&sql).fetch_all(&self.pool).await?
            }
        };
        rows.iter().map(settlement_from_row).collect()
    }

    /// # Errors
    /// Returns an error if the query fails or the row cannot be decoded.
    pub async fn get_settlement(&self, id: &str) -> Result<Option<SettlementRecord>, StoreError> {
        let sql = format!("SELECT {} FROM pay_to_clowee WHERE id = ?", SETTLEMENT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(settlement_from_row).transpose()
    }

    /// Delete a settlement record and, by cascade, its invoice.
    ///
    /// # Errors
    /// Returns `NotFound` if no record has this id.
    pub async fn delete_settlement(&self, id: &str) -> Result<(), LedgerError> {
        let result = sqlx::query("DELETE FROM pay_to_clowee WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(LedgerError::NotFound(format!("settlement {}", id)));
        }
        info!(settlement_id = %id, "Settlement record deleted");
        Ok(())
    }

    // =========================================================================
    // Invoice operations
    // =========================================================================

    /// Insert an invoice row. One-invoice-per-settlement is checked by the caller.
    ///
    /// # Errors
    /// Returns `Conflict` if the invoice number is already taken, or a storage error if
    /// the insert fails (including an unknown settlement id).
    pub async fn insert_invoice(
        &self,
        settlement_id: &str,
        invoice_number: &str,
        invoice_date: NaiveDate,
        notes: Option<&str>,
        created_by: Option<&str>,
    ) -> Result<Invoice, LedgerError> {
        let now = Utc::now();
        let invoice = Invoice {
            id: uuid::Uuid::new_v4().to_string(),
            settlement_id: settlement_id.to_string(),
            invoice_number: invoice_number.to_string(),
            invoice_date,
            notes: notes.map(str::to_string),
            created_by: created_by.map(str::to_string),
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, pay_to_clowee_id, invoice_number, invoice_date, notes, created_by, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&invoice.id)
        .bind(&invoice.settlement_id)
        .bind(&invoice.invoice_number)
        .bind(format_date(invoice.invoice_date))
        .bind(invoice.notes.as_deref())
        .bind(invoice.created_by.as_deref())
        .bind(now.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => LedgerError::Conflict(
                format!("invoice number {} is already in use", invoice_number),
            ),
            other => LedgerError::from(other),
        })?;

        info!(
            invoice_number = %invoice.invoice_number,
            settlement_id = %invoice.settlement_id,
            "Invoice created"
        );
        Ok(invoice)
    }

    /// # Errors
    /// Returns an error if the query fails or the row cannot be decoded.
    pub async fn invoice_for_settlement(
        &self,
        settlement_id: &str,
    ) -> Result<Option<Invoice>, StoreError> {
        let sql = format!(
            "SELECT {} FROM invoices WHERE pay_to_clowee_id = ? ORDER BY created_at ASC LIMIT 1",
            INVOICE_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(settlement_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(invoice_from_row).transpose()
    }

    /// All invoices, newest first.
    ///
    /// # Errors
    /// Returns an error if the query fails or a row cannot be decoded.
    pub async fn list_invoices(&self) -> Result<Vec<Invoice>, StoreError> {
        let sql = format!(
            "SELECT {} FROM invoices ORDER BY created_at DESC, id ASC",
            INVOICE_COLUMNS
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(invoice_from_row).collect()
    }
}

fn settlement_from_row(row: &SqliteRow) -> Result<SettlementRecord, StoreError> {
    Ok(SettlementRecord {
        id: row.try_get("id")?,
        machine_id: MachineId::new(row.try_get("machine_id")?),
        machine_name: row.try_get("machine_name")?,
        start_date: date_col(row, "start_date")?,
        end_date: date_col(row, "end_date")?,
        total_coins: row.try_get("total_coins")?,
        total_prizes: row.try_get("total_prizes")?,
        total_income: decimal_col(row, "total_income")?,
        prize_cost: decimal_col(row, "prize_cost")?,
        electricity_cost: decimal_col(row, "electricity_cost")?,
        vat_amount: decimal_col(row, "vat_amount")?,
        maintenance_cost: decimal_col(row, "maintenance_cost")?,
        profit_share_amount: decimal_col(row, "profit_share_amount")?,
        total_amount: decimal_col(row, "total_amount")?,
        pay_to_clowee: decimal_col(row, "pay_to_clowee")?,
        created_by: row.try_get("created_by")?,
        created_at: timestamp_col(row, "created_at")?,
    })
}

fn invoice_from_row(row: &SqliteRow) -> Result<Invoice, StoreError> {
    Ok(Invoice {
        id: row.try_get("id")?,
        settlement_id: row.try_get("pay_to_clowee_id")?,
        invoice_number: row.try_get("invoice_number")?,
        invoice_date: date_col(row, "invoice_date")?,
        notes: row.try_get("notes")?,
        created_by: row.try_get("created_by")?,
        created_at: timestamp_col(row, "created_at")?,
    })
}

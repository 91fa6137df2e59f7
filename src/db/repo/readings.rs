//! Counter reading operations for the repository.

use crate::domain::{format_date, CounterReading, MachineId};
use crate::error::LedgerError;
use crate::store::StoreError;
use chrono::{NaiveDate, Utc};
use tracing::info;

use super::{reading_from_row, Repository};

impl Repository {
    /// Record the counters for a report date; a second submission for the same date
    /// replaces the first.
    ///
    /// # Errors
    /// Returns `InvalidInput` for negative counts, `NotFound` for an unknown machine,
    /// or a storage error if the write fails.
    pub async fn upsert_counter_reading(
        &self,
        machine_id: &MachineId,
        report_date: NaiveDate,
        coin_count: i64,
        prize_count: i64,
    ) -> Result<CounterReading, LedgerError> {
        if coin_count < 0 || prize_count < 0 {
            return Err(LedgerError::InvalidInput(
                "counter values must not be negative".to_string(),
            ));
        }
        if !self.machine_exists(machine_id).await? {
            return Err(LedgerError::machine_not_found(machine_id));
        }

        let now_ms = Utc::now().timestamp_millis();
        sqlx::query(
            r#"
            INSERT INTO machine_counter_reports (
                machine_id, report_date, coin_count, prize_count, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(machine_id, report_date) DO UPDATE SET
                coin_count = excluded.coin_count,
                prize_count = excluded.prize_count,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(machine_id.as_str())
        .bind(format_date(report_date))
        .bind(coin_count)
        .bind(prize_count)
        .bind(now_ms)
        .bind(now_ms)
        .execute(&self.pool)
        .await?;

        info!(
            machine_id = %machine_id,
            report_date = %report_date,
            coin_count,
            prize_count,
            "Counter reading recorded"
        );

        Ok(CounterReading {
            machine_id: machine_id.clone(),
            report_date,
            coin_count,
            prize_count,
        })
    }

    /// All readings for a machine, newest first.
    ///
    /// # Errors
    /// Returns an error if the query fails or a row cannot be decoded.
    pub async fn list_counter_readings(
        &self,
        machine_id: &MachineId,
    ) -> Result<Vec<CounterReading>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT machine_id, report_date, coin_count, prize_count
            FROM machine_counter_reports
            WHERE machine_id = ?
            ORDER BY report_date DESC
            "#,
        )
        .bind(machine_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(reading_from_row).collect()
    }
}

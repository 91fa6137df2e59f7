//! Setting history operations for the repository.

use crate::domain::{format_date, MachineId, SettingField, SettingHistoryRecord};
use crate::error::LedgerError;
use crate::store::StoreError;
use chrono::{DateTime, NaiveDate, Utc};
use tracing::info;

use super::{setting_from_row, Repository};

impl Repository {
    /// Append a setting change and patch the machine's current column, atomically.
    ///
    /// # Errors
    /// Returns `InvalidInput` for a malformed or out-of-range value, `NotFound` for an
    /// unknown machine, or a storage error if the transaction fails.
    pub async fn add_setting(
        &self,
        machine_id: &MachineId,
        field: SettingField,
        raw_value: &str,
        effective_date: NaiveDate,
        created_by: Option<&str>,
    ) -> Result<SettingHistoryRecord, LedgerError> {
        let value = field
            .validate_new(raw_value)
            .map_err(|e| LedgerError::InvalidInput(e.to_string()))?;
        let stored_value = value.to_storage_string();
        let now_ms = Utc::now().timestamp_millis();

        let mut tx = self.pool.begin().await?;

        // Column name comes from the static descriptor table, never from input.
        let update_sql = format!("UPDATE machines SET {} = ? WHERE id = ?", field.name());
        let updated = sqlx::query(&update_sql)
            .bind(&stored_value)
            .bind(machine_id.as_str())
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(LedgerError::machine_not_found(machine_id));
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO machine_settings_history (
                machine_id, field_name, field_value, effective_date, created_at, created_by
            ) VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(machine_id.as_str())
        .bind(field.name())
        .bind(&stored_value)
        .bind(format_date(effective_date))
        .bind(now_ms)
        .bind(created_by)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            machine_id = %machine_id,
            field = %field,
            value = %stored_value,
            effective_date = %effective_date,
            "Setting history record added"
        );

        Ok(SettingHistoryRecord {
            id: inserted.last_insert_rowid(),
            machine_id: machine_id.clone(),
            field,
            value,
            effective_date,
            created_at: DateTime::from_timestamp_millis(now_ms).unwrap_or_else(Utc::now),
            created_by: created_by.map(str::to_string),
        })
    }

    /// Setting timeline for a machine, newest effective date first.
    ///
    /// # Errors
    /// Returns an error if the query fails or a row cannot be decoded.
    pub async fn setting_history(
        &self,
        machine_id: &MachineId,
        field: Option<SettingField>,
    ) -> Result<Vec<SettingHistoryRecord>, StoreError> {
        let sql = if field.is_some() {
            r#"
                SELECT id, machine_id, field_name, field_value, effective_date, created_at, created_by
                FROM machine_settings_history
                WHERE machine_id = ? AND field_name = ?
                ORDER BY effective_date DESC, created_at DESC, id DESC
            "#
        } else {
            r#"
                SELECT id, machine_id, field_name, field_value, effective_date, created_at, created_by
                FROM machine_settings_history
                WHERE machine_id = ?
                ORDER BY effective_date DESC, created_at DESC, id DESC
            "#
        };

        let mut query = sqlx::query(sql).bind(machine_id.as_str());
        if let Some(field) = field {
            query = query.bind(field.name());
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(setting_from_row).collect()
    }
}

//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by domain:
//! - `settings.rs` - Setting history append and timeline queries
//! - `readings.rs` - Counter reading upsert and listing
//! - `settlements.rs` - Settlement records and invoices

mod readings;
mod settings;
mod settlements;

use crate::domain::{
    parse_date, CounterReading, Decimal, Machine, MachineId, NewMachine, SettingField,
    SettingHistoryRecord, SettingsSnapshot,
};
use crate::error::LedgerError;
use crate::store::{LedgerStore, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::info;

const MACHINE_COLUMNS: &str = r#"
    id, name, location, installation_date, is_active,
    coin_price, doll_price, electricity_cost, vat_percentage, maintenance_percentage,
    owner_profit_share_percentage, clowee_profit_share_percentage, duration
"#;

/// Repository for database operations.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    /// Round-trip a trivial query through the pool.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // =========================================================================
    // Machine operations
    // =========================================================================

    /// Register a machine after input-time validation.
    ///
    /// # Errors
    /// Returns `InvalidInput` if validation fails, or a storage error if the insert fails.
    pub async fn insert_machine(&self, new_machine: NewMachine) -> Result<Machine, LedgerError> {
        new_machine
            .validate()
            .map_err(|e| LedgerError::InvalidInput(e.to_string()))?;
        let machine = new_machine.into_machine();
        let s = &machine.current;

        sqlx::query(
            r#"
            INSERT INTO machines (
                id, name, location, installation_date, is_active,
                coin_price, doll_price, electricity_cost, vat_percentage, maintenance_percentage,
                owner_profit_share_percentage, clowee_profit_share_percentage, duration, created_at
            ) VALUES (?, ?, ?, ?, 1, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(machine.id.as_str())
        .bind(&machine.name)
        .bind(&machine.location)
        .bind(machine.installation_date.map(crate::domain::format_date))
        .bind(s.coin_price.to_canonical_string())
        .bind(s.doll_price.to_canonical_string())
        .bind(s.electricity_cost.to_canonical_string())
        .bind(s.vat_percentage.to_canonical_string())
        .bind(s.maintenance_percentage.to_canonical_string())
        .bind(s.owner_profit_share_percentage.to_canonical_string())
        .bind(s.clowee_profit_share_percentage.to_canonical_string())
        .bind(s.duration.as_token())
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;

        info!(machine_id = %machine.id, name = %machine.name, "Machine registered");
        Ok(machine)
    }

    /// Active machines ordered by name.
    ///
    /// # Errors
    /// Returns an error if the query fails or a row holds an unparseable value.
    pub async fn list_active_machines(&self) -> Result<Vec<Machine>, StoreError> {
        let sql = format!(
            "SELECT {} FROM machines WHERE is_active = 1 ORDER BY name ASC, id ASC",
            MACHINE_COLUMNS
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(machine_from_row).collect()
    }

    /// Soft-remove a machine; its history and settlements are kept.
    ///
    /// # Errors
    /// Returns `NotFound` if no machine has this id.
    pub async fn deactivate_machine(&self, id: &MachineId) -> Result<(), LedgerError> {
        let result = sqlx::query("UPDATE machines SET is_active = 0 WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(LedgerError::machine_not_found(id));
        }
        info!(machine_id = %id, "Machine deactivated");
        Ok(())
    }

    async fn machine_exists(&self, id: &MachineId) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM machines WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }
}

#[async_trait]
impl LedgerStore for Repository {
    async fn get_machine(&self, id: &MachineId) -> Result<Option<Machine>, StoreError> {
        let sql = format!("SELECT {} FROM machines WHERE id = ?", MACHINE_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(machine_from_row).transpose()
    }

    async fn latest_setting_at_or_before(
        &self,
        machine_id: &MachineId,
        field: SettingField,
        as_of: NaiveDate,
    ) -> Result<Option<SettingHistoryRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, machine_id, field_name, field_value, effective_date, created_at, created_by
            FROM machine_settings_history
            WHERE machine_id = ? AND field_name = ? AND effective_date <= ?
            ORDER BY effective_date DESC, created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(machine_id.as_str())
        .bind(field.name())
        .bind(crate::domain::format_date(as_of))
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(setting_from_row).transpose()
    }

    async fn latest_reading_at_or_before(
        &self,
        machine_id: &MachineId,
        date: NaiveDate,
    ) -> Result<Option<CounterReading>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT machine_id, report_date, coin_count, prize_count
            FROM machine_counter_reports
            WHERE machine_id = ? AND report_date <= ?
            ORDER BY report_date DESC
            LIMIT 1
            "#,
        )
        .bind(machine_id.as_str())
        .bind(crate::domain::format_date(date))
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(reading_from_row).transpose()
    }

    async fn latest_reading_before(
        &self,
        machine_id: &MachineId,
        date: NaiveDate,
    ) -> Result<Option<CounterReading>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT machine_id, report_date, coin_count, prize_count
            FROM machine_counter_reports
            WHERE machine_id = ? AND report_date < ?
            ORDER BY report_date DESC
            LIMIT 1
            "#,
        )
        .bind(machine_id.as_str())
        .bind(crate::domain::format_date(date))
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(reading_from_row).transpose()
    }
}

// =============================================================================
// Row decoding
// =============================================================================

fn corrupt(column: &str, value: &str) -> StoreError {
    StoreError::Corrupt(format!("{}={}", column, value))
}

fn decimal_col(row: &SqliteRow, column: &str) -> Result<Decimal, StoreError> {
    let raw: String = row.try_get(column)?;
    Decimal::from_str(&raw).map_err(|_| corrupt(column, &raw))
}

fn date_col(row: &SqliteRow, column: &str) -> Result<NaiveDate, StoreError> {
    let raw: String = row.try_get(column)?;
    parse_date(&raw).map_err(|_| corrupt(column, &raw))
}

fn timestamp_col(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>, StoreError> {
    let ms: i64 = row.try_get(column)?;
    DateTime::from_timestamp_millis(ms).ok_or_else(|| corrupt(column, &ms.to_string()))
}

fn machine_from_row(row: &SqliteRow) -> Result<Machine, StoreError> {
    let duration_raw: String = row.try_get("duration")?;
    let duration = duration_raw
        .parse()
        .map_err(|_| corrupt("duration", &duration_raw))?;
    let installation_date = row
        .try_get::<Option<String>, _>("installation_date")?
        .map(|raw| parse_date(&raw).map_err(|_| corrupt("installation_date", &raw)))
        .transpose()?;

    Ok(Machine {
        id: MachineId::new(row.try_get("id")?),
        name: row.try_get("name")?,
        location: row.try_get("location")?,
        installation_date,
        is_active: row.try_get::<i64, _>("is_active")? != 0,
        current: SettingsSnapshot {
            coin_price: decimal_col(row, "coin_price")?,
            doll_price: decimal_col(row, "doll_price")?,
            electricity_cost: decimal_col(row, "electricity_cost")?,
            vat_percentage: decimal_col(row, "vat_percentage")?,
            maintenance_percentage: decimal_col(row, "maintenance_percentage")?,
            owner_profit_share_percentage: decimal_col(row, "owner_profit_share_percentage")?,
            clowee_profit_share_percentage: decimal_col(row, "clowee_profit_share_percentage")?,
            duration,
        },
    })
}

fn setting_from_row(row: &SqliteRow) -> Result<SettingHistoryRecord, StoreError> {
    let field_name: String = row.try_get("field_name")?;
    let field = SettingField::from_str(&field_name).map_err(|_| corrupt("field_name", &field_name))?;
    let raw_value: String = row.try_get("field_value")?;
    let value = field
        .parse_value(&raw_value)
        .map_err(|e| StoreError::Corrupt(e.to_string()))?;

    Ok(SettingHistoryRecord {
        id: row.try_get("id")?,
        machine_id: MachineId::new(row.try_get("machine_id")?),
        field,
        value,
        effective_date: date_col(row, "effective_date")?,
        created_at: timestamp_col(row, "created_at")?,
        created_by: row.try_get("created_by")?,
    })
}

fn reading_from_row(row: &SqliteRow) -> Result<CounterReading, StoreError> {
    Ok(CounterReading {
        machine_id: MachineId::new(row.try_get("machine_id")?),
        report_date: date_col(row, "report_date")?,
        coin_count: row.try_get("coin_count")?,
        prize_count: row.try_get("prize_count")?,
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Repository;
    use crate::db::migrations::init_db;
    use crate::domain::{BillingDuration, Decimal, Machine, NewMachine};
    use tempfile::TempDir;

    pub async fn setup_repo() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        (Repository::new(pool), temp_dir)
    }

    pub fn new_machine(name: &str) -> NewMachine {
        let d = |s: &str| Decimal::from_str_canonical(s).unwrap();
        NewMachine {
            name: name.to_string(),
            location: "Banani".to_string(),
            installation_date: None,
            coin_price: d("2"),
            doll_price: d("5"),
            electricity_cost: d("100"),
            vat_percentage: d("10"),
            maintenance_percentage: d("5"),
            owner_profit_share_percentage: d("50"),
            clowee_profit_share_percentage: d("50"),
            duration: BillingDuration::HalfMonth,
        }
    }

    pub async fn insert_machine(repo: &Repository, name: &str) -> Machine {
        repo.insert_machine(new_machine(name)).await.unwrap()
    }
}

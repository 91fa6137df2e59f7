pub mod health;
pub mod invoices;
pub mod machines;
pub mod readings;
pub mod settings;
pub mod settlements;

use crate::config::Config;
use crate::db::Repository;
use crate::domain::{parse_date, MachineId};
use crate::engine::SettlementCalculator;
use crate::error::AppError;
use crate::store::LedgerStore;
use axum::{
    routing::{get, post},
    Router,
};
use chrono::NaiveDate;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub calculator: Arc<SettlementCalculator>,
    pub config: Config,
}

impl AppState {
    /// Wire the calculator to the same repository that serves the write paths.
    pub fn new(repo: Arc<Repository>, config: Config) -> Self {
        let store: Arc<dyn LedgerStore> = repo.clone();
        Self {
            repo,
            calculator: Arc::new(SettlementCalculator::new(store)),
            config,
        }
    }

    /// 404 unless the machine is registered.
    async fn require_machine(&self, id: &MachineId) -> Result<(), AppError> {
        match self.repo.get_machine(id).await? {
            Some(_) => Ok(()),
            None => Err(AppError::NotFound(format!("machine {}", id))),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route(
            "/v1/machines",
            post(machines::create_machine).get(machines::list_machines),
        )
        .route(
            "/v1/machines/:id",
            get(machines::get_machine).delete(machines::deactivate_machine),
        )
        .route(
            "/v1/machines/:id/settings",
            post(settings::add_setting).get(settings::get_effective_settings),
        )
        .route(
            "/v1/machines/:id/settings/history",
            get(settings::get_setting_history),
        )
        .route(
            "/v1/machines/:id/readings",
            get(readings::list_readings).put(readings::upsert_reading),
        )
        .route("/v1/machines/:id/delta", get(readings::get_delta))
        .route(
            "/v1/settlements/preview",
            post(settlements::preview_settlement),
        )
        .route(
            "/v1/settlements",
            post(settlements::create_settlement).get(settlements::list_settlements),
        )
        .route(
            "/v1/settlements/export.csv",
            get(settlements::export_settlements_csv),
        )
        .route(
            "/v1/settlements/:id",
            get(settlements::get_settlement).delete(settlements::delete_settlement),
        )
        .route(
            "/v1/settlements/:id/invoice",
            post(invoices::create_invoice),
        )
        .route("/v1/invoices", get(invoices::list_invoices))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn parse_date_param(name: &str, raw: &str) -> Result<NaiveDate, AppError> {
    parse_date(raw).map_err(|_| AppError::BadRequest(format!("{} must be YYYY-MM-DD", name)))
}

/// Parse a `[startDate, endDate]` pair, rejecting inverted ranges.
fn parse_period(start: &str, end: &str) -> Result<(NaiveDate, NaiveDate), AppError> {
    let start = parse_date_param("startDate", start)?;
    let end = parse_date_param("endDate", end)?;
    if start > end {
        return Err(AppError::BadRequest("startDate must be <= endDate".into()));
    }
    Ok((start, end))
}

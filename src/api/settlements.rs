use crate::api::{parse_period, AppState};
use crate::domain::{format_date, MachineId, SettlementRecord};
use crate::engine::Settlement;
use crate::error::AppError;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::SecondsFormat;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementRequest {
    pub machine_id: String,
    pub start_date: String,
    pub end_date: String,
    pub created_by: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementListQuery {
    pub created_by: Option<String>,
}

async fn compute(state: &AppState, req: &SettlementRequest) -> Result<Settlement, AppError> {
    let (start, end) = parse_period(&req.start_date, &req.end_date)?;
    let machine_id = MachineId::new(req.machine_id.clone());
    Ok(state.calculator.compute(&machine_id, start, end).await?)
}

/// Compute without persisting anything.
pub async fn preview_settlement(
    State(state): State<AppState>,
    Json(req): Json<SettlementRequest>,
) -> Result<Json<Settlement>, AppError> {
    Ok(Json(compute(&state, &req).await?))
}

pub async fn create_settlement(
    State(state): State<AppState>,
    Json(req): Json<SettlementRequest>,
) -> Result<(StatusCode, Json<SettlementRecord>), AppError> {
    let settlement = compute(&state, &req).await?;
    let record = state
        .repo
        .insert_settlement(&settlement, req.created_by.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn list_settlements(
    Query(params): Query<SettlementListQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<SettlementRecord>>, AppError> {
    Ok(Json(
        state
            .repo
            .list_settlements(params.created_by.as_deref())
            .await?,
    ))
}

pub async fn get_settlement(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<SettlementRecord>, AppError> {
    state
        .repo
        .get_settlement(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("settlement {}", id)))
}

pub async fn delete_settlement(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    state.repo.delete_settlement(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn export_settlements_csv(
    Query(params): Query<SettlementListQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let records = state
        .repo
        .list_settlements(params.created_by.as_deref())
        .await?;
    let body = settlements_to_csv(&records)
        .map_err(|e| AppError::Internal(format!("CSV export failed: {}", e)))?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"settlements.csv\"",
            ),
        ],
        body,
    ))
}

const CSV_HEADER: [&str; 17] = [
    "id",
    "machine_id",
    "machine_name",
    "start_date",
    "end_date",
    "total_coins",
    "total_prizes",
    "total_income",
    "prize_cost",
    "electricity_cost",
    "vat_amount",
    "maintenance_cost",
    "profit_share_amount",
    "total_amount",
    "pay_to_clowee",
    "created_by",
    "created_at",
];

/// Render records as CSV; currency columns are rounded to 2 decimal places here only.
fn settlements_to_csv(records: &[SettlementRecord]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;

    for r in records {
        writer.write_record([
            r.id.clone(),
            r.machine_id.to_string(),
            r.machine_name.clone(),
            format_date(r.start_date),
            format_date(r.end_date),
            r.total_coins.to_string(),
            r.total_prizes.to_string(),
            r.total_income.to_currency_string(),
            r.prize_cost.to_currency_string(),
            r.electricity_cost.to_currency_string(),
            r.vat_amount.to_currency_string(),
            r.maintenance_cost.to_currency_string(),
            r.profit_share_amount.to_currency_string(),
            r.total_amount.to_currency_string(),
            r.pay_to_clowee.to_currency_string(),
            r.created_by.clone().unwrap_or_default(),
            r.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        ])?;
    }

    writer.flush()?;
    writer.into_inner().map_err(|e| e.into_error().into())
}

use crate::api::{parse_date_param, parse_period, AppState};
use crate::domain::{CounterReading, MachineId};
use crate::error::AppError;
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertReadingRequest {
    pub report_date: String,
    pub coin_count: i64,
    pub prize_count: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodQuery {
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeltaResponse {
    pub machine_id: MachineId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub coins: i64,
    pub prizes: i64,
}

pub async fn upsert_reading(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(req): Json<UpsertReadingRequest>,
) -> Result<Json<CounterReading>, AppError> {
    let report_date = parse_date_param("reportDate", &req.report_date)?;
    let reading = state
        .repo
        .upsert_counter_reading(
            &MachineId::new(id),
            report_date,
            req.coin_count,
            req.prize_count,
        )
        .await?;
    Ok(Json(reading))
}

pub async fn list_readings(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<CounterReading>>, AppError> {
    let machine_id = MachineId::new(id);
    state.require_machine(&machine_id).await?;
    Ok(Json(state.repo.list_counter_readings(&machine_id).await?))
}

/// Coins and prizes sold over the period.
pub async fn get_delta(
    Path(id): Path<String>,
    Query(params): Query<PeriodQuery>,
    State(state): State<AppState>,
) -> Result<Json<DeltaResponse>, AppError> {
    let (start_date, end_date) = parse_period(&params.start_date, &params.end_date)?;
    let machine_id = MachineId::new(id);

    let delta = state
        .calculator
        .delta_resolver()
        .resolve_period_delta(&machine_id, start_date, end_date)
        .await?;

    Ok(Json(DeltaResponse {
        machine_id,
        start_date,
        end_date,
        coins: delta.coins,
        prizes: delta.prizes,
    }))
}

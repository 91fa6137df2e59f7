use crate::api::{parse_date_param, AppState};
use crate::domain::{MachineId, SettingField, SettingHistoryRecord, SettingsSnapshot};
use crate::error::AppError;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddSettingRequest {
    pub field: String,
    /// Numbers and duration tokens are both accepted; numbers may arrive as JSON numbers.
    pub value: serde_json::Value,
    pub effective_date: String,
    pub created_by: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EffectiveSettingsQuery {
    pub date: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveSettingsResponse {
    pub machine_id: MachineId,
    pub as_of: NaiveDate,
    pub settings: SettingsSnapshot,
    /// Labelled, formatted values in descriptor order.
    pub display: Vec<DisplayedSetting>,
}

#[derive(Debug, Serialize)]
pub struct DisplayedSetting {
    pub field: SettingField,
    pub label: &'static str,
    pub value: String,
}

fn displayed(settings: &SettingsSnapshot) -> Vec<DisplayedSetting> {
    SettingField::ALL
        .iter()
        .map(|field| DisplayedSetting {
            field: *field,
            label: field.descriptor().label,
            value: field.format_value(&settings.get(*field)),
        })
        .collect()
}

#[derive(Debug, Deserialize)]
pub struct SettingHistoryQuery {
    pub field: Option<String>,
}

fn parse_field(raw: &str) -> Result<SettingField, AppError> {
    SettingField::from_str(raw).map_err(|e| AppError::BadRequest(e.to_string()))
}

fn raw_value(value: &serde_json::Value) -> Result<String, AppError> {
    match value {
        serde_json::Value::String(s) => Ok(s.clone()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        _ => Err(AppError::BadRequest(
            "value must be a string or a number".into(),
        )),
    }
}

pub async fn add_setting(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(req): Json<AddSettingRequest>,
) -> Result<(StatusCode, Json<SettingHistoryRecord>), AppError> {
    let field = parse_field(&req.field)?;
    let value = raw_value(&req.value)?;
    let effective_date = parse_date_param("effectiveDate", &req.effective_date)?;

    let record = state
        .repo
        .add_setting(
            &MachineId::new(id),
            field,
            &value,
            effective_date,
            req.created_by.as_deref(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Every field as it was in force on `date` (today when omitted).
pub async fn get_effective_settings(
    Path(id): Path<String>,
    Query(params): Query<EffectiveSettingsQuery>,
    State(state): State<AppState>,
) -> Result<Json<EffectiveSettingsResponse>, AppError> {
    let as_of = match params.date.as_deref() {
        Some(raw) => parse_date_param("date", raw)?,
        None => Utc::now().date_naive(),
    };
    let machine_id = MachineId::new(id);

    let settings = state
        .calculator
        .settings_resolver()
        .resolve_all(&machine_id, as_of)
        .await?;

    Ok(Json(EffectiveSettingsResponse {
        machine_id,
        as_of,
        display: displayed(&settings),
        settings,
    }))
}

pub async fn get_setting_history(
    Path(id): Path<String>,
    Query(params): Query<SettingHistoryQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<SettingHistoryRecord>>, AppError> {
    let field = params.field.as_deref().map(parse_field).transpose()?;
    let machine_id = MachineId::new(id);
    state.require_machine(&machine_id).await?;

    Ok(Json(state.repo.setting_history(&machine_id, field).await?))
}

use crate::api::AppState;
use crate::domain::{Machine, MachineId, NewMachine};
use crate::error::AppError;
use crate::store::LedgerStore;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

pub async fn create_machine(
    State(state): State<AppState>,
    Json(new_machine): Json<NewMachine>,
) -> Result<(StatusCode, Json<Machine>), AppError> {
    let machine = state.repo.insert_machine(new_machine).await?;
    Ok((StatusCode::CREATED, Json(machine)))
}

pub async fn list_machines(State(state): State<AppState>) -> Result<Json<Vec<Machine>>, AppError> {
    Ok(Json(state.repo.list_active_machines().await?))
}

pub async fn get_machine(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Machine>, AppError> {
    let id = MachineId::new(id);
    state
        .repo
        .get_machine(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("machine {}", id)))
}

/// Soft delete: the machine drops out of listings but its history stays.
pub async fn deactivate_machine(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    state.repo.deactivate_machine(&MachineId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

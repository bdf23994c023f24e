use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use forkbench_registry::{NetworkFields, NetworkPreset};
use serde_json::{Value, json};

use crate::api::ApiContext;
use crate::utils::ApiError;

pub async fn list(State(context): State<ApiContext>) -> Result<Json<Vec<NetworkPreset>>, ApiError> {
    Ok(Json(context.networks.list()?))
}

pub async fn get(
    State(context): State<ApiContext>,
    id: Result<Path<u64>, PathRejection>,
) -> Result<Json<NetworkPreset>, ApiError> {
    let Path(id) = id?;
    Ok(Json(context.networks.get(id)?))
}

pub async fn create(
    State(context): State<ApiContext>,
    body: Result<Json<NetworkFields>, JsonRejection>,
) -> Result<(StatusCode, Json<NetworkPreset>), ApiError> {
    let Json(fields) = body?;
    let preset = context.networks.create(fields)?;
    Ok((StatusCode::CREATED, Json(preset)))
}

pub async fn update(
    State(context): State<ApiContext>,
    id: Result<Path<u64>, PathRejection>,
    body: Result<Json<NetworkFields>, JsonRejection>,
) -> Result<Json<NetworkPreset>, ApiError> {
    let Path(id) = id?;
    let Json(fields) = body?;
    Ok(Json(context.networks.update(id, fields)?))
}

pub async fn delete(
    State(context): State<ApiContext>,
    id: Result<Path<u64>, PathRejection>,
) -> Result<Json<Value>, ApiError> {
    let Path(id) = id?;
    context.networks.delete(id)?;
    Ok(Json(json!({ "deleted": id })))
}

/// Marks a preset as the default, clearing the flag everywhere else.
pub async fn activate(
    State(context): State<ApiContext>,
    id: Result<Path<u64>, PathRejection>,
) -> Result<Json<NetworkPreset>, ApiError> {
    let Path(id) = id?;
    Ok(Json(context.networks.activate(id)?))
}

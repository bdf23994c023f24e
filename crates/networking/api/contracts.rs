use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use forkbench_registry::{ContractRecord, ContractSummary};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::api::ApiContext;
use crate::utils::ApiError;

#[derive(Debug, Deserialize)]
pub struct CreateContract {
    pub name: String,
    pub address: String,
    /// Either the ABI JSON text or the ABI array itself.
    pub abi: Value,
}

pub async fn list(
    State(context): State<ApiContext>,
) -> Result<Json<Vec<ContractSummary>>, ApiError> {
    Ok(Json(context.contracts.list()?))
}

pub async fn get(
    State(context): State<ApiContext>,
    id: Result<Path<u64>, PathRejection>,
) -> Result<Json<ContractRecord>, ApiError> {
    let Path(id) = id?;
    Ok(Json(context.contracts.get(id)?))
}

pub async fn create(
    State(context): State<ApiContext>,
    body: Result<Json<CreateContract>, JsonRejection>,
) -> Result<(StatusCode, Json<ContractSummary>), ApiError> {
    let Json(body) = body?;
    let abi_text = match body.abi {
        Value::String(text) => text,
        inline => inline.to_string(),
    };
    let record = context
        .contracts
        .create(&body.name, &body.address, &abi_text)?;
    Ok((StatusCode::CREATED, Json(ContractSummary::from(&record))))
}

pub async fn delete(
    State(context): State<ApiContext>,
    id: Result<Path<u64>, PathRejection>,
) -> Result<Json<Value>, ApiError> {
    let Path(id) = id?;
    context.contracts.delete(id)?;
    Ok(Json(json!({ "deleted": id })))
}

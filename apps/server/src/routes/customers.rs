use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use vyapar_core::{Customer, NewCustomer, TenantContext};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

pub async fn create_customer(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(new): Json<NewCustomer>,
) -> ApiResult<(StatusCode, Json<Customer>)> {
    let customer = state.db.customers().create(&tenant, new).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

pub async fn get_customer(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<String>,
) -> ApiResult<Json<Customer>> {
    state
        .db
        .customers()
        .get(&tenant, &id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Customer {id} not found")))
}

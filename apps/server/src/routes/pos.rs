//! Till endpoints: the checkout engine and stored sales.

use axum::extract::{Path, State};
use axum::Json;
use vyapar_core::{BatchDeduction, CheckoutRequest, TenantContext, Transaction};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// POST /pos/checkout
pub async fn checkout(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(request): Json<CheckoutRequest>,
) -> ApiResult<Json<Transaction>> {
    let transaction = state.db.checkout().checkout(&tenant, &request).await?;
    Ok(Json(transaction))
}

/// GET /pos/transactions/{id}
pub async fn get_transaction(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<String>,
) -> ApiResult<Json<Transaction>> {
    state
        .db
        .checkout()
        .get_transaction(&tenant, &id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Transaction {id} not found")))
}

/// GET /pos/transactions/{id}/batches
///
/// Which batches each line drew from, in consumption order.
pub async fn consumed_batches(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<BatchDeduction>>> {
    let checkout = state.db.checkout();
    if checkout.get_transaction(&tenant, &id).await?.is_none() {
        return Err(ApiError::not_found(format!("Transaction {id} not found")));
    }
    Ok(Json(checkout.consumed_batches(&tenant, &id).await?))
}

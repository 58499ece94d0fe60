//! Inventory ledger endpoints: products, stock adjustments and batches.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use vyapar_core::{ExpiringBatch, NewBatch, NewProduct, Product, ProductBatch, TenantContext};

use crate::auth::require_manager;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct StockAdjustment {
    /// Positive to add, negative to remove.
    pub delta: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExpiringQuery {
    pub days: Option<i64>,
}

pub async fn create_product(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(new): Json<NewProduct>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    require_manager(&tenant)?;
    let product = state.db.inventory().create_product(&tenant, new).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn list_products(
    State(state): State<AppState>,
    tenant: TenantContext,
) -> ApiResult<Json<Vec<Product>>> {
    Ok(Json(state.db.inventory().list_products(&tenant).await?))
}

pub async fn get_product(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<String>,
) -> ApiResult<Json<Product>> {
    state
        .db
        .inventory()
        .get_product(&tenant, &id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Product {id} not found")))
}

/// Refused with 409 while past sales reference the product.
pub async fn delete_product(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    require_manager(&tenant)?;
    state.db.inventory().delete_product(&tenant, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /inventory/products/{id}/stock
pub async fn adjust_stock(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<String>,
    Json(adjustment): Json<StockAdjustment>,
) -> ApiResult<Json<Product>> {
    let inventory = state.db.inventory();
    if !inventory.adjust_stock(&tenant, &id, adjustment.delta).await? {
        return Err(ApiError::not_found(format!("Product {id} not found")));
    }
    inventory
        .get_product(&tenant, &id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Product {id} not found")))
}

pub async fn add_batch(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<String>,
    Json(new): Json<NewBatch>,
) -> ApiResult<(StatusCode, Json<ProductBatch>)> {
    let batch = state.db.inventory().add_batch(&tenant, &id, new).await?;
    Ok((StatusCode::CREATED, Json(batch)))
}

/// Batches of one product, earliest expiry first.
pub async fn list_batches(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<ProductBatch>>> {
    Ok(Json(state.db.inventory().list_batches(&tenant, &id).await?))
}

/// GET /inventory/batches/expiring?days=N
pub async fn expiring_batches(
    State(state): State<AppState>,
    tenant: TenantContext,
    Query(query): Query<ExpiringQuery>,
) -> ApiResult<Json<Vec<ExpiringBatch>>> {
    let days = query
        .days
        .unwrap_or(state.config.inventory.expiry_window_days);
    let today = Utc::now().date_naive();

    let batches = state
        .db
        .inventory()
        .expiring_batches_list(&tenant, today, days)
        .await?;
    Ok(Json(batches))
}

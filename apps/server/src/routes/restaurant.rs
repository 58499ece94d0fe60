//! # Restaurant Endpoints
//!
//! Floor plan management and the table order lifecycle.
//!
//! ```text
//! POST /restaurant/tables/{id}/occupy          → order opened (version 0)
//! POST /restaurant/tables/{id}/items           → pending line added or merged
//! POST /restaurant/tables/{id}/dispatch        → KOT: pending → ordered
//! PUT  /restaurant/tables/{id}/items/{idx}/status
//! POST /restaurant/tables/{id}/checkout        → sale recorded, table free
//! ```
//!
//! Order mutations accept an optional `expected_version` (body field, or
//! `?expected_version=` on bodiless calls). A mismatch answers 409
//! `STALE_VERSION`. A mutation with nothing to do answers 200 with
//! `"changed": false`.

use std::collections::BTreeSet;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use vyapar_core::{
    CancelOutcome, CoreError, FloorTable, ItemEdit, ItemStatus, KitchenSection, NewOrderItem,
    NewTable, OrderItem, RestaurantTable, TableCheckout, TableOrder, TableStatus, TenantContext,
    Transaction,
};

use crate::auth::require_manager;
use crate::error::ApiResult;
use crate::AppState;

// =============================================================================
// Request Types
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct VersionQuery {
    pub expected_version: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PositionRequest {
    pub pos_x: i64,
    pub pos_y: i64,
}

#[derive(Debug, Deserialize)]
pub struct CapacityRequest {
    pub capacity: i64,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: TableStatus,
}

#[derive(Debug, Deserialize)]
pub struct WaiterRequest {
    #[serde(default)]
    pub waiter_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MergeRequest {
    pub child_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    #[serde(flatten)]
    pub item: NewOrderItem,
    #[serde(default)]
    pub expected_version: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ItemStatusRequest {
    pub status: ItemStatus,
    #[serde(default)]
    pub expected_version: Option<i64>,
}

// =============================================================================
// Response Types
// =============================================================================

#[derive(Debug, Serialize)]
pub struct OrderUpdate {
    pub changed: bool,
    pub order: TableOrder,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct ItemAdded {
    pub order: TableOrder,
    pub index: usize,
    /// True when the quantity went onto an existing pending line.
    pub merged: bool,
}

#[derive(Debug, Serialize)]
pub struct DispatchResult {
    pub changed: bool,
    pub order: TableOrder,
    /// Lines sent on this KOT.
    pub items: Vec<OrderItem>,
    pub sections: BTreeSet<KitchenSection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelAction {
    Removed,
    Cancelled,
    Unchanged,
}

#[derive(Debug, Serialize)]
pub struct CancelResult {
    pub changed: bool,
    pub action: CancelAction,
    pub order: TableOrder,
}

#[derive(Debug, Serialize)]
pub struct ItemRemoved {
    pub order: TableOrder,
    pub removed: OrderItem,
}

#[derive(Debug, Serialize)]
pub struct TableFreed {
    pub changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TableCheckedOut {
    pub transaction: Transaction,
    pub order: TableOrder,
}

#[derive(Debug, Serialize)]
pub struct Unmerged {
    pub changed: bool,
    pub tables: u64,
}

// =============================================================================
// Tables
// =============================================================================

/// GET /restaurant/tables: the floor plan, each table with its open order.
pub async fn floor_status(
    State(state): State<AppState>,
    tenant: TenantContext,
) -> ApiResult<Json<Vec<FloorTable>>> {
    Ok(Json(state.db.floor().floor_status(&tenant).await?))
}

pub async fn add_table(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(new): Json<NewTable>,
) -> ApiResult<(StatusCode, Json<RestaurantTable>)> {
    require_manager(&tenant)?;
    let table = state.db.floor().add_table(&tenant, new).await?;
    Ok((StatusCode::CREATED, Json(table)))
}

pub async fn delete_table(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(table_id): Path<String>,
) -> ApiResult<StatusCode> {
    require_manager(&tenant)?;
    state.db.floor().delete_table(&tenant, &table_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_position(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(table_id): Path<String>,
    Json(request): Json<PositionRequest>,
) -> ApiResult<StatusCode> {
    require_manager(&tenant)?;
    state
        .db
        .floor()
        .update_position(&tenant, &table_id, request.pos_x, request.pos_y)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_capacity(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(table_id): Path<String>,
    Json(request): Json<CapacityRequest>,
) -> ApiResult<StatusCode> {
    require_manager(&tenant)?;
    state
        .db
        .floor()
        .update_capacity(&tenant, &table_id, request.capacity)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_table_status(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(table_id): Path<String>,
    Json(request): Json<StatusRequest>,
) -> ApiResult<Json<RestaurantTable>> {
    let table = state
        .db
        .floor()
        .set_table_status(&tenant, &table_id, request.status)
        .await?;
    Ok(Json(table))
}

/// Transfers the table to another waiter, or clears the assignment.
pub async fn assign_waiter(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(table_id): Path<String>,
    Json(request): Json<WaiterRequest>,
) -> ApiResult<StatusCode> {
    state
        .db
        .floor()
        .assign_waiter(&tenant, &table_id, request.waiter_id.as_deref())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn merge(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(table_id): Path<String>,
    Json(request): Json<MergeRequest>,
) -> ApiResult<StatusCode> {
    state
        .db
        .floor()
        .merge(&tenant, &table_id, &request.child_ids)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn unmerge(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(table_id): Path<String>,
) -> ApiResult<Json<Unmerged>> {
    let tables = state.db.floor().unmerge(&tenant, &table_id).await?;
    Ok(Json(Unmerged {
        changed: tables > 0,
        tables,
    }))
}

// =============================================================================
// Orders
// =============================================================================

pub async fn occupy(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(table_id): Path<String>,
) -> ApiResult<(StatusCode, Json<TableOrder>)> {
    let order = state.db.floor().occupy(&tenant, &table_id).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn free(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(table_id): Path<String>,
) -> ApiResult<Json<TableFreed>> {
    let order_id = state.floor().free(&tenant, &table_id).await?;
    Ok(Json(TableFreed {
        changed: order_id.is_some(),
        order_id,
    }))
}

/// GET /restaurant/tables/{id}/order
pub async fn get_order(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(table_id): Path<String>,
) -> ApiResult<Json<TableOrder>> {
    let floor = state.db.floor();
    if let Some(order) = floor.get_order(&tenant, &table_id).await? {
        return Ok(Json(order));
    }
    if floor.get_table(&tenant, &table_id).await?.is_none() {
        return Err(CoreError::TableNotFound(table_id).into());
    }
    Err(CoreError::NoActiveOrder(table_id).into())
}

pub async fn add_item(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(table_id): Path<String>,
    Json(request): Json<AddItemRequest>,
) -> ApiResult<Json<ItemAdded>> {
    let change = state
        .db
        .floor()
        .add_item(&tenant, &table_id, request.item, request.expected_version)
        .await?;

    Ok(Json(ItemAdded {
        index: change.outcome.index(),
        merged: matches!(change.outcome, ItemEdit::Merged { .. }),
        order: change.order,
    }))
}

/// POST /restaurant/tables/{id}/dispatch: sends the KOT.
pub async fn dispatch(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(table_id): Path<String>,
    Query(version): Query<VersionQuery>,
) -> ApiResult<Json<DispatchResult>> {
    let change = state
        .floor()
        .dispatch_pending(&tenant, &table_id, version.expected_version)
        .await?;

    let changed = change.outcome.changed();
    let items = change
        .outcome
        .indices
        .iter()
        .filter_map(|&i| change.order.items.get(i).cloned())
        .collect();

    Ok(Json(DispatchResult {
        changed,
        items,
        sections: change.outcome.sections,
        order: change.order,
        message: (!changed).then_some("No new items"),
    }))
}

/// DELETE /restaurant/tables/{id}/items/{idx}: cancels a line.
pub async fn cancel_item(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path((table_id, index)): Path<(String, usize)>,
    Query(version): Query<VersionQuery>,
) -> ApiResult<Json<CancelResult>> {
    let change = state
        .floor()
        .cancel_item(&tenant, &table_id, index, version.expected_version)
        .await?;

    let action = match change.outcome {
        CancelOutcome::Removed(_) => CancelAction::Removed,
        CancelOutcome::Cancelled { .. } => CancelAction::Cancelled,
        CancelOutcome::Unchanged { .. } => CancelAction::Unchanged,
    };
    Ok(Json(CancelResult {
        changed: !matches!(action, CancelAction::Unchanged),
        action,
        order: change.order,
    }))
}

/// DELETE /restaurant/tables/{id}/items/{idx}/remove: drops a pending line.
pub async fn remove_item(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path((table_id, index)): Path<(String, usize)>,
    Query(version): Query<VersionQuery>,
) -> ApiResult<Json<ItemRemoved>> {
    let change = state
        .db
        .floor()
        .remove_item(&tenant, &table_id, index, version.expected_version)
        .await?;

    Ok(Json(ItemRemoved {
        order: change.order,
        removed: change.outcome,
    }))
}

pub async fn set_item_status(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path((table_id, index)): Path<(String, usize)>,
    Json(request): Json<ItemStatusRequest>,
) -> ApiResult<Json<OrderUpdate>> {
    let change = state
        .floor()
        .set_item_status(
            &tenant,
            &table_id,
            index,
            request.status,
            request.expected_version,
        )
        .await?;

    Ok(Json(OrderUpdate {
        changed: change.outcome,
        order: change.order,
        message: (!change.outcome).then_some("Item already has that status"),
    }))
}

pub async fn kot_history(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(table_id): Path<String>,
) -> ApiResult<Json<Vec<OrderItem>>> {
    Ok(Json(state.db.floor().kot_history(&tenant, &table_id).await?))
}

/// POST /restaurant/tables/{id}/checkout: bills the order as one sale.
pub async fn checkout(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(table_id): Path<String>,
    Json(payment): Json<TableCheckout>,
) -> ApiResult<Json<TableCheckedOut>> {
    let change = state
        .floor()
        .checkout_table(&tenant, &table_id, &payment)
        .await?;

    Ok(Json(TableCheckedOut {
        transaction: change.outcome,
        order: change.order,
    }))
}

/// GET /restaurant/orders/active: open orders the kitchen has lines for.
pub async fn active_orders(
    State(state): State<AppState>,
    tenant: TenantContext,
) -> ApiResult<Json<Vec<TableOrder>>> {
    Ok(Json(state.db.floor().active_orders(&tenant).await?))
}

//! API routes for vyapar-server

pub mod customers;
pub mod health;
pub mod inventory;
pub mod pos;
pub mod restaurant;
pub mod ws;

use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::AppState;

/// Create the combined router
pub fn router(state: AppState) -> Router {
    let pos = Router::new()
        .route("/pos/checkout", post(pos::checkout))
        .route("/pos/transactions/{id}", get(pos::get_transaction))
        .route("/pos/transactions/{id}/batches", get(pos::consumed_batches));

    let inventory = Router::new()
        .route(
            "/inventory/products",
            post(inventory::create_product).get(inventory::list_products),
        )
        .route(
            "/inventory/products/{id}",
            get(inventory::get_product).delete(inventory::delete_product),
        )
        .route("/inventory/products/{id}/stock", post(inventory::adjust_stock))
        .route(
            "/inventory/products/{id}/batches",
            post(inventory::add_batch).get(inventory::list_batches),
        )
        .route("/inventory/batches/expiring", get(inventory::expiring_batches));

    let customers = Router::new()
        .route("/customers", post(customers::create_customer))
        .route("/customers/{id}", get(customers::get_customer));

    let restaurant = Router::new()
        .route(
            "/restaurant/tables",
            get(restaurant::floor_status).post(restaurant::add_table),
        )
        .route("/restaurant/tables/{id}", delete(restaurant::delete_table))
        .route("/restaurant/tables/{id}/position", put(restaurant::update_position))
        .route("/restaurant/tables/{id}/capacity", put(restaurant::update_capacity))
        .route("/restaurant/tables/{id}/status", put(restaurant::set_table_status))
        .route("/restaurant/tables/{id}/waiter", put(restaurant::assign_waiter))
        .route("/restaurant/tables/{id}/occupy", post(restaurant::occupy))
        .route("/restaurant/tables/{id}/free", post(restaurant::free))
        .route("/restaurant/tables/{id}/merge", post(restaurant::merge))
        .route("/restaurant/tables/{id}/unmerge", post(restaurant::unmerge))
        .route("/restaurant/tables/{id}/order", get(restaurant::get_order))
        .route("/restaurant/tables/{id}/items", post(restaurant::add_item))
        .route("/restaurant/tables/{id}/dispatch", post(restaurant::dispatch))
        .route(
            "/restaurant/tables/{id}/items/{idx}",
            delete(restaurant::cancel_item),
        )
        .route(
            "/restaurant/tables/{id}/items/{idx}/remove",
            delete(restaurant::remove_item),
        )
        .route(
            "/restaurant/tables/{id}/items/{idx}/status",
            put(restaurant::set_item_status),
        )
        .route("/restaurant/tables/{id}/kot-history", get(restaurant::kot_history))
        .route("/restaurant/tables/{id}/checkout", post(restaurant::checkout))
        .route("/restaurant/orders/active", get(restaurant::active_orders));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/ws/kds", get(ws::kitchen_display))
        .merge(pos)
        .merge(inventory)
        .merge(customers)
        .merge(restaurant)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

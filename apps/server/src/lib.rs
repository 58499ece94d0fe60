//! # Vyapar Server
//!
//! HTTP and kitchen display WebSocket surface for the Vyapar POS backend.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           Vyapar Server                                 │
//! │                                                                         │
//! │  Till / Waiter app ──► HTTP (axum) ──► TenantContext (JWT extractor)    │
//! │                              │                                          │
//! │                              ▼                                          │
//! │            routes ──► Database (repositories) ──► SQLite                │
//! │               │                                                         │
//! │               └────► FloorService ──► KitchenHub ──► KDS sessions       │
//! │                              ▲                            │             │
//! │                              │                            │             │
//! │                 command processor ◄── SET_ITEM_STATUS ────┘             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! See [`config::ServerConfig`]. Every key can be set in `vyapar.toml` or
//! as `VYAPAR__SECTION__KEY` in the environment.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod services;

use std::sync::Arc;

use tokio::sync::mpsc;
use vyapar_db::Database;
use vyapar_realtime::{InboundCommand, KitchenHub};

pub use auth::{Claims, JwtManager};
pub use config::ServerConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use routes::router;
pub use services::FloorService;

/// Queue depth between the WebSocket sessions and the command processor.
const COMMAND_BUFFER: usize = 256;

/// Shared application state. Cheap to clone.
#[derive(Debug, Clone)]
pub struct AppState {
    pub db: Database,
    pub hub: KitchenHub,
    pub jwt: Arc<JwtManager>,
    pub config: Arc<ServerConfig>,
    pub commands: mpsc::Sender<InboundCommand>,
}

impl AppState {
    /// Wires the hub and the JWT manager, applies the configured loyalty
    /// policy to `db` and spawns the kitchen display command processor.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(db: Database, config: ServerConfig) -> Self {
        let db = db.with_loyalty_policy(config.loyalty_policy());
        let hub = KitchenHub::new(config.realtime.channel_capacity);
        let jwt = JwtManager::new(config.auth.jwt_secret.clone(), config.auth.token_ttl_secs);

        let (commands, rx) = mpsc::channel(COMMAND_BUFFER);
        tokio::spawn(services::run_command_processor(
            FloorService::new(db.clone(), hub.clone()),
            rx,
        ));

        AppState {
            db,
            hub,
            jwt: Arc::new(jwt),
            config: Arc::new(config),
            commands,
        }
    }

    pub fn floor(&self) -> FloorService {
        FloorService::new(self.db.clone(), self.hub.clone())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use vyapar_core::{NewOrderItem, NewProduct, NewTable, Role, TenantContext, TenantStatus};
    use vyapar_db::{Database, DbConfig};

    use crate::{AppState, ServerConfig};

    /// An active tenant with one table and two menu products.
    pub struct FloorFixture {
        pub db: Database,
        pub tenant: TenantContext,
        pub table_id: String,
        pub paneer_id: String,
        pub lassi_id: String,
    }

    impl FloorFixture {
        /// Adds Paneer Tikka (kitchen, ₹250) to the table's order.
        pub async fn order_paneer(&self, quantity: i64) {
            self.order(&self.paneer_id, "Paneer Tikka", 25_000, quantity).await;
        }

        /// Adds Sweet Lassi (bar, ₹80) to the table's order.
        pub async fn order_lassi(&self, quantity: i64) {
            self.order(&self.lassi_id, "Sweet Lassi", 8_000, quantity).await;
        }

        async fn order(&self, product_id: &str, name: &str, price: i64, quantity: i64) {
            self.db
                .floor()
                .add_item(
                    &self.tenant,
                    &self.table_id,
                    NewOrderItem {
                        product_id: product_id.to_string(),
                        name: name.to_string(),
                        category: None,
                        quantity,
                        unit_price_paise: price,
                    },
                    None,
                )
                .await
                .unwrap();
        }
    }

    pub async fn seed_floor() -> FloorFixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        seed_tenant(&db, "acct-main").await;
        let tenant = TenantContext::new("acct-main", Role::Admin);

        let inventory = db.inventory();
        let paneer = inventory
            .create_product(&tenant, menu_item("Paneer Tikka", "Starters", 25_000))
            .await
            .unwrap();
        let lassi = inventory
            .create_product(&tenant, menu_item("Sweet Lassi", "Beverages", 8_000))
            .await
            .unwrap();

        let table = db
            .floor()
            .add_table(
                &tenant,
                NewTable {
                    label: "T1".into(),
                    capacity: 4,
                    zone: None,
                    pos_x: 0,
                    pos_y: 0,
                },
            )
            .await
            .unwrap();
        db.floor().occupy(&tenant, &table.id).await.unwrap();

        FloorFixture {
            db,
            tenant,
            table_id: table.id,
            paneer_id: paneer.id,
            lassi_id: lassi.id,
        }
    }

    pub async fn seed_tenant(db: &Database, id: &str) {
        db.tenants()
            .create(id, &format!("Store {id}"), TenantStatus::Active)
            .await
            .unwrap();
    }

    fn menu_item(name: &str, category: &str, price_paise: i64) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            category: Some(category.to_string()),
            price_paise,
            cost_paise: price_paise / 2,
            stock_quantity: 50,
            tax_rate_bps: 0,
        }
    }

    pub fn test_config() -> ServerConfig {
        let mut config = ServerConfig::default();
        config.auth.jwt_secret = "test-secret".to_string();
        config.database.path = ":memory:".to_string();
        config
    }

    /// App state over the seeded floor, with an admin token for its tenant.
    pub async fn test_app() -> (AppState, FloorFixture, String) {
        let fixture = seed_floor().await;
        let state = AppState::new(fixture.db.clone(), test_config());
        let token = state
            .jwt
            .issue("user-1", fixture.tenant.tenant_id(), Role::Admin)
            .unwrap();
        (state, fixture, token)
    }
}

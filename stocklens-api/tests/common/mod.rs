/// Common test utilities for integration tests
///
/// Builds a full router over in-memory collaborators so the HTTP surface
/// can be exercised without a running database or vision endpoint. The
/// pool inside the state is lazy and never connected; tests stay away from
/// the endpoints that would touch it (health, auth).

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request};
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use stocklens_api::app::{build_router, AppState};
use stocklens_api::config::{ApiConfig, Config, DatabaseConfig, JwtConfig, RecognitionConfig};
use stocklens_api::recognition::{CountedItem, MockGateway};
use stocklens_api::storage::DisabledStore;
use stocklens_api::store::{InventoryStore, StoreError};
use stocklens_api::workflow::Workflow;
use stocklens_shared::auth::jwt::{create_token, Claims, TokenType};
use stocklens_shared::ledger::{Ledger, LedgerError};
use stocklens_shared::models::record::{InventoryRecord, NewInventoryRecord};
use uuid::Uuid;

pub const TEST_SECRET: &str = "integration-test-secret-at-least-32-bytes";
pub const TEST_EMAIL: &str = "tester@example.com";

/// In-memory ledger with conditional-debit semantics
pub struct MemoryLedger {
    balances: Mutex<HashMap<String, i64>>,
    starting: i64,
}

impl MemoryLedger {
    pub fn new(starting: i64) -> Self {
        MemoryLedger {
            balances: Mutex::new(HashMap::new()),
            starting,
        }
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn balance(&self, user_email: &str) -> Result<i64, LedgerError> {
        let mut balances = self.balances.lock().unwrap();
        Ok(*balances
            .entry(user_email.to_string())
            .or_insert(self.starting))
    }

    async fn try_debit(&self, user_email: &str, amount: i64) -> Result<bool, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        let mut balances = self.balances.lock().unwrap();
        let balance = balances
            .entry(user_email.to_string())
            .or_insert(self.starting);
        if *balance >= amount {
            *balance -= amount;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

/// In-memory inventory store, newest first
pub struct MemoryStore {
    records: Mutex<Vec<InventoryRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            records: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn list_recent(
        &self,
        user_email: &str,
        limit: i64,
    ) -> Result<Vec<InventoryRecord>, StoreError> {
        let records = self.records.lock().unwrap();
        let mut matching: Vec<InventoryRecord> = records
            .iter()
            .filter(|r| r.user_email == user_email)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching.truncate(limit as usize);
        Ok(matching)
    }

    async fn insert_many(
        &self,
        new_records: &[NewInventoryRecord],
    ) -> Result<Vec<InventoryRecord>, StoreError> {
        let mut records = self.records.lock().unwrap();
        let base = Utc::now();
        let inserted: Vec<InventoryRecord> = new_records
            .iter()
            .enumerate()
            .map(|(i, r)| InventoryRecord {
                id: Uuid::new_v4(),
                user_email: r.user_email.clone(),
                label: r.label.clone(),
                count: r.count,
                photo_url: r.photo_url.clone(),
                created_at: base + chrono::Duration::milliseconds(i as i64),
            })
            .collect();
        records.extend(inserted.clone());
        Ok(inserted)
    }
}

fn base_config() -> Config {
    Config {
        api: ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: vec!["*".to_string()],
        },
        database: DatabaseConfig {
            url: "postgresql://localhost/unused".to_string(),
            max_connections: 1,
        },
        jwt: JwtConfig {
            secret: TEST_SECRET.to_string(),
        },
        recognition: RecognitionConfig {
            api_key: "unused".to_string(),
            model: "mock".to_string(),
            base_url: "http://localhost".to_string(),
        },
        storage: None,
    }
}

/// Router over a real database pool, for suites that exercise the auth
/// routes end-to-end
pub fn router_with_db(db: sqlx::PgPool) -> axum::Router {
    let workflow = Arc::new(Workflow::new(
        Arc::new(MemoryLedger::new(1500)),
        Arc::new(MockGateway::with_items(Vec::new())),
        Arc::new(DisabledStore),
        Arc::new(MemoryStore::new()),
    ));

    let state = AppState {
        db,
        config: Arc::new(base_config()),
        workflow,
    };

    build_router(state)
}

/// Test context: router plus an access token for the test user
pub struct TestContext {
    pub app: axum::Router,
    pub gateway: Arc<MockGateway>,
    pub token: String,
}

impl TestContext {
    /// Context with the default starting balance and the given mock items
    pub fn new(items: Vec<CountedItem>) -> Self {
        Self::with_starting_balance(1500, MockGateway::with_items(items))
    }

    /// Context with a custom starting balance and gateway
    pub fn with_starting_balance(starting: i64, gateway: MockGateway) -> Self {
        let config = base_config();

        // Lazy pool: valid handle, never connected.
        let db = PgPoolOptions::new()
            .connect_lazy(&config.database.url)
            .expect("lazy pool");

        let gateway = Arc::new(gateway);
        let workflow = Arc::new(Workflow::new(
            Arc::new(MemoryLedger::new(starting)),
            gateway.clone(),
            Arc::new(DisabledStore),
            Arc::new(MemoryStore::new()),
        ));

        let state = AppState {
            db,
            config: Arc::new(config),
            workflow,
        };

        let claims = Claims::new(Uuid::new_v4(), TEST_EMAIL, TokenType::Access);
        let token = create_token(&claims, TEST_SECRET).expect("token");

        TestContext {
            app: build_router(state),
            gateway,
            token,
        }
    }

    /// Authorization header value for the test user
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

/// Builds an authenticated request with an optional JSON body
pub fn authed_request(ctx: &TestContext, method: &str, uri: &str, body: Option<serde_json::Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, ctx.auth_header());

    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Reads a JSON response body
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

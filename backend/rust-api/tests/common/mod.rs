use axum::Router;
use std::sync::Arc;

use tablebot_api::services::memory_store::MemoryStore;
use tablebot_api::services::transport::RecordingOutbound;
use tablebot_api::{config::Config, create_router, services::AppState};

pub const ADMIN_ID: i64 = 99;

pub struct TestApp {
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
    pub outbound: Arc<RecordingOutbound>,
}

pub fn test_config() -> Config {
    Config {
        mongo_uri: "mongodb://unused".to_string(),
        mongo_database: "tablebot_test".to_string(),
        admin_id: ADMIN_ID,
        gateway_url: "http://unused".to_string(),
        payment_contact: "@tablebot_admin".to_string(),
        reminder_hours: vec![9, 14, 19],
    }
}

/// App state over the in-memory store and a recording transport; no
/// external services involved.
pub fn build_state() -> TestApp {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let store = Arc::new(MemoryStore::new());
    let outbound = Arc::new(RecordingOutbound::new());
    let state = Arc::new(AppState::with_parts(
        test_config(),
        store.clone(),
        outbound.clone(),
    ));

    TestApp {
        state,
        store,
        outbound,
    }
}

pub fn create_test_app() -> (Router, TestApp) {
    let app = build_state();
    (create_router(app.state.clone()), app)
}

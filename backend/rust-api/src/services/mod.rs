use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use mongodb::Client as MongoClient;

use crate::config::Config;

pub mod advisor;
pub mod broadcast_service;
pub mod dispatcher;
pub mod evaluator;
pub mod generator;
pub mod memory_store;
pub mod mongo_store;
pub mod reminder_worker;
pub mod render;
pub mod session_service;
pub mod store;
pub mod transport;

use reminder_worker::SnoozeRegistry;
use session_service::{SessionRegistry, SessionService};
use store::Store;
use transport::{HttpOutbound, Outbound};

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub outbound: Arc<dyn Outbound>,
    pub sessions: SessionRegistry,
    pub snoozes: SnoozeRegistry,
}

impl AppState {
    pub async fn new(config: Config, mongo_client: MongoClient) -> anyhow::Result<Self> {
        let mongo = mongo_client.database(&config.mongo_database);
        let store = Arc::new(mongo_store::MongoStore::new(mongo));

        tracing::info!("Verifying MongoDB connectivity...");
        store.ping().await?;
        tracing::info!("MongoDB connection established successfully");

        let outbound = Arc::new(HttpOutbound::new(config.gateway_url.clone()));

        Ok(Self::with_parts(config, store, outbound))
    }

    /// Assemble state from explicit parts; tests plug in the in-memory store
    /// and a recording transport here.
    pub fn with_parts(
        config: Config,
        store: Arc<dyn Store>,
        outbound: Arc<dyn Outbound>,
    ) -> Self {
        Self {
            config,
            store,
            outbound,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            snoozes: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn session_service(&self) -> SessionService {
        SessionService::new(
            self.store.clone(),
            self.outbound.clone(),
            self.sessions.clone(),
            self.config.admin_id,
        )
    }
}

use std::sync::Arc;

use crate::models::config::GameConfig;
use crate::services::{delivery::BroadcastDelivery, registry::GameRegistry};

#[derive(Clone)]
pub struct AppState {
    pub registry: GameRegistry,
    pub delivery: Arc<BroadcastDelivery>,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_config(GameConfig::from_env())
    }

    pub fn with_config(config: GameConfig) -> Self {
        let delivery = Arc::new(BroadcastDelivery::new());
        AppState {
            registry: GameRegistry::new(config, delivery.clone()),
            delivery,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

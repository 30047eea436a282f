use std::sync::Arc;
use tokio::sync::RwLock;

use crate::ml::{ModelManager, ModelStore};

/// Shared state of the prediction service
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<RwLock<ModelManager>>,
    pub store: Arc<dyn ModelStore>,
}

impl AppState {
    pub fn new(manager: ModelManager, store: Arc<dyn ModelStore>) -> Self {
        Self {
            manager: Arc::new(RwLock::new(manager)),
            store,
        }
    }
}

use std::sync::Arc;

use crate::application::SessionRegistry;
use crate::infrastructure::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionRegistry>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(sessions: SessionRegistry, config: AppConfig) -> Self {
        Self {
            sessions: Arc::new(sessions),
            config: Arc::new(config),
        }
    }
}

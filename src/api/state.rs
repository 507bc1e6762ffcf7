use crate::application::game_service::GameService;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<GameService>,
}

impl AppState {
    pub fn new(service: Arc<GameService>) -> Self {
        Self { service }
    }
}

// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{config::Config, session::SessionRegistry, store::ExamStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ExamStore>,
    pub config: Config,
    pub sessions: SessionRegistry,
}

impl AppState {
    /// Builds the state around a store; live sessions share the same store.
    pub fn new(store: Arc<dyn ExamStore>, config: Config) -> Self {
        let sessions = SessionRegistry::new(Arc::clone(&store));
        Self {
            store,
            config,
            sessions,
        }
    }
}

impl FromRef<AppState> for Arc<dyn ExamStore> {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for SessionRegistry {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}

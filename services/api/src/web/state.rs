//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use std::sync::Arc;

use vital_core::ports::{AuthService, StoreService};

use crate::config::Config;
use crate::music::MoodCatalog;

/// The shared application state, created once at startup and passed to all
/// handlers. Everything in here is immutable after startup.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn StoreService>,
    pub auth: Arc<dyn AuthService>,
    pub config: Arc<Config>,
    pub catalog: MoodCatalog,
}

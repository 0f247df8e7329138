pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod services;
pub mod store;
pub mod workers;

use services::{CascadeDeleteExecutor, InteractionService};

/// App state shared across request handlers.
pub struct AppState {
    pub interactions: InteractionService,
    pub cascade: CascadeDeleteExecutor,
}

// Tabular Chat - conversational analysis over uploaded CSV and spreadsheet files

pub mod config;
pub mod models;
pub mod types;
pub mod table;
pub mod normalizer;
pub mod data_registry;
pub mod profile;
pub mod llm;
pub mod agents;
pub mod session;
pub mod views;
pub mod routes;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use models::AppState;

pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router(state)
}

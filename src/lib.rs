pub mod app;
pub mod audit;
pub mod auth;
pub mod db;
pub mod errors;
pub mod models;
pub mod routes;

// Re-export commonly used items for tests
pub use app::{build_router, create_app, AppState};

//! docbase-server: axum HTTP surface over the docbase services.

pub mod identity;
pub mod routes;
pub mod state;

pub use state::AppState;

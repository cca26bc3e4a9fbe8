//! HTTP/WS front (spec §4.G, §6): axum router, bearer auth, WebSocket fan-out.

pub mod auth;
pub mod error;
pub mod routes;
pub mod state;
pub mod validators;
pub mod ws;

pub use error::ApiError;
pub use routes::build_router;
pub use state::AppState;

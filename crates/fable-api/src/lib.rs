//! Axum HTTP API server.
//!
//! Exposes the batch generation, music import and credit endpoints over
//! bearer-token auth, with per-IP rate limiting and security headers.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;

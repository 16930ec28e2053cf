//! REST API of the estimation service.
//!
//! ## Endpoints
//!
//! ### Estimator
//! - `POST /estimator/estimate-position` - Estimate a device's position from a scan
//!
//! ### Users
//! - `GET /users/user-positions` - Last known position of every device
//! - `GET|POST /users/clear-user-positions` - Forget every device
//!
//! ### Date time
//! - `GET /datetime/current-date` - Server clock in the configured timezone
//!
//! ### Service
//! - `GET /` - Liveness message
//! - `GET /health` - Liveness and loaded models

pub mod dto;
pub mod error;
pub mod handlers;
pub mod state;

use axum::{
    routing::{get, post},
    Router,
};

pub use dto::*;
pub use error::{ApiError, ApiResult};
pub use state::AppState;

/// Create the API router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        // Estimator
        .route("/estimator/estimate-position", post(handlers::estimate_position))
        // Users
        .route("/users/user-positions", get(handlers::user_positions))
        .route(
            "/users/clear-user-positions",
            get(handlers::clear_user_positions).post(handlers::clear_user_positions),
        )
        // Date time
        .route("/datetime/current-date", get(handlers::current_date))
        .with_state(state)
}

//! HTTP routes owned by the security layer itself. The registry's business
//! endpoints are supplied by the caller and nested alongside these.

pub mod auth;
pub mod health;
pub mod user;

use axum::{Router, routing::get};

use crate::AppState;

/// The login flow and profile routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::login))
        .route("/login/callback", get(auth::callback))
        .route("/logout", get(auth::logout).post(auth::logout))
        .route("/user", get(user::profile))
}

//! Documentation bypass.
//!
//! Static API documentation paths are excluded from the security pipeline
//! entirely. This middleware runs before the CSRF filter and the gate and
//! marks matching requests with an extension; the later stages forward
//! marked requests untouched.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::AppState;

/// Marker extension: this request hit a documentation path and skips the
/// CSRF filter and the authentication gate.
#[derive(Debug, Clone, Copy)]
pub struct DocBypass;

pub async fn doc_bypass_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    if state.policy.doc_bypass.contains(req.uri().path()) {
        tracing::trace!(path = %req.uri().path(), "Documentation path, bypassing security pipeline");
        req.extensions_mut().insert(DocBypass);
    }
    next.run(req).await
}

//! The authentication gate.
//!
//! Evaluates every request path against the active policy table and either
//! forwards the request (with the principal attached when a valid session
//! cookie is present) or rejects it. Unmatched paths are denied the same way
//! authenticated paths without a principal are.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    AppState,
    auth::{AuthError, Principal},
    middleware::doc_bypass::DocBypass,
    policy::AccessDecision,
};

pub async fn auth_gate_middleware(
    State(state): State<AppState>,
    cookies: Cookies,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    if req.extensions().get::<DocBypass>().is_some() {
        return Ok(next.run(req).await);
    }

    let decision = state.policy.table.evaluate(req.uri().path());

    // Resolve the session up front: permitted endpoints still want the
    // principal when one is available (e.g. the profile endpoint).
    let principal = resolve_principal(&state, &cookies).await;

    match decision {
        AccessDecision::PermitAll => {
            if let Some(principal) = principal {
                req.extensions_mut().insert(principal);
            }
            Ok(next.run(req).await)
        }
        AccessDecision::Authenticated | AccessDecision::Deny => match principal {
            Some(principal) => {
                req.extensions_mut().insert(principal);
                Ok(next.run(req).await)
            }
            None => {
                tracing::debug!(
                    path = %req.uri().path(),
                    decision = ?decision,
                    "Rejecting unauthenticated request"
                );
                if is_xhr_request(req.headers()) {
                    Err(AuthError::AuthenticationRequired)
                } else {
                    Err(AuthError::LoginRequired {
                        redirect_url: "/login".to_string(),
                    })
                }
            }
        },
    }
}

/// Look up the session named by the cookie, if any. Any failure (no
/// authenticator configured, malformed cookie, unknown or expired session)
/// just means "no principal".
async fn resolve_principal(state: &AppState, cookies: &Cookies) -> Option<Principal> {
    let oidc = state.oidc.as_ref()?;
    let cookie = cookies.get(oidc.cookie_name())?;
    let session_id = Uuid::parse_str(cookie.value()).ok()?;
    oidc.get_session(session_id)
        .await
        .ok()
        .map(|session| session.principal)
}

/// Check if the request is an XHR/API request (as opposed to a browser navigation).
/// XHR requests should receive 401 responses, not redirects, to avoid CORS issues.
fn is_xhr_request(headers: &HeaderMap) -> bool {
    // X-Requested-With is set by many JS frameworks
    if headers
        .get("x-requested-with")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("xmlhttprequest"))
    {
        return true;
    }

    // An Accept header that asks for JSON without text/html is an API client
    if let Some(accept) = headers
        .get(axum::http::header::ACCEPT)
        .and_then(|v| v.to_str().ok())
    {
        if accept.contains("application/json") && !accept.contains("text/html") {
            return true;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn xhr_detection_via_requested_with() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-requested-with",
            HeaderValue::from_static("XMLHttpRequest"),
        );
        assert!(is_xhr_request(&headers));
    }

    #[test]
    fn xhr_detection_via_accept() {
        let mut headers = HeaderMap::new();
        headers.insert("accept", HeaderValue::from_static("application/json"));
        assert!(is_xhr_request(&headers));
    }

    #[test]
    fn browser_navigation_is_not_xhr() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "accept",
            HeaderValue::from_static("text/html,application/xhtml+xml,application/json;q=0.9"),
        );
        assert!(!is_xhr_request(&headers));

        assert!(!is_xhr_request(&HeaderMap::new()));
    }
}

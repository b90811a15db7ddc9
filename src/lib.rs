//! Authentication and access-control layer for an open extension registry.
//!
//! The crate wraps a caller-supplied router of registry endpoints in a fixed
//! security pipeline:
//!
//! 1. Request ID correlation
//! 2. Documentation bypass (static API-docs paths skip everything below)
//! 3. CSRF double-submit filter (with bearer-token exemptions)
//! 4. Authentication gate, driven by an ordered path policy table
//!
//! The policy table comes in two flavors, selected once at startup from
//! whether the configured web UI redirect is an absolute URL (separate
//! frontend origin) or not (same origin). Browser logins run the OIDC
//! authorization code flow with PKCE.

pub mod auth;
pub mod config;
pub mod middleware;
pub mod observability;
pub mod policy;
pub mod routes;

use std::{sync::Arc, time::Duration};

use axum::{Router, routing::get};
use tower_cookies::CookieManagerLayer;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::{
    auth::{AuthError, MemorySessionStore, OidcAuthenticator, SharedSessionStore},
    config::RegistryConfig,
    policy::SecurityPolicy,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RegistryConfig>,
    pub policy: SecurityPolicy,
    pub oidc: Option<Arc<OidcAuthenticator>>,
}

impl AppState {
    /// Build the state from configuration. The policy mode is fixed here and
    /// never changes for the lifetime of the process.
    pub fn new(config: RegistryConfig) -> Result<Self, AuthError> {
        let policy = SecurityPolicy::from_redirect(config.webui.redirect_target());

        let oidc = match &config.auth.oidc {
            Some(oidc_config) => {
                let session_store: SharedSessionStore = Arc::new(MemorySessionStore::new());
                Some(Arc::new(OidcAuthenticator::new(
                    oidc_config.clone(),
                    config.auth.session.clone(),
                    session_store,
                    Duration::from_secs(config.server.idp_timeout_secs),
                )?))
            }
            None => {
                tracing::info!("No OIDC provider configured; interactive login is disabled");
                None
            }
        };

        Ok(Self {
            config: Arc::new(config),
            policy,
            oidc,
        })
    }
}

/// Assemble the application router.
///
/// `registry_routes` carries the registry's business endpoints (extension
/// APIs, admin surface, ...); they are nested inside the security pipeline
/// alongside the login routes. `/health` is mounted outside the pipeline.
pub fn build_app(
    config: &RegistryConfig,
    state: AppState,
    registry_routes: Router<AppState>,
) -> Router {
    let mut app = routes::router()
        .merge(registry_routes)
        // Innermost to outermost: gate, CSRF filter, documentation bypass
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_gate_middleware,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::csrf_middleware,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::doc_bypass_middleware,
        ))
        .layer(RequestBodyLimitLayer::new(config.server.body_limit_bytes))
        .layer(TraceLayer::new_for_http());

    if let Some(cors) = config.server.cors.clone().into_layer() {
        app = app.layer(cors);
    }

    app.layer(CookieManagerLayer::new())
        .layer(axum::middleware::from_fn(
            middleware::request_id_middleware,
        ))
        // Liveness probes must not depend on the security pipeline
        .route("/health", get(routes::health::health))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::{Router, body::Body, http::Request, routing::get, routing::post};
    use http::StatusCode;
    use tower::util::ServiceExt;

    use super::*;
    use crate::auth::{Principal, Session, SessionStore};

    // Stand-ins for the registry's business endpoints
    fn registry_routes() -> Router<AppState> {
        Router::new()
            .route("/user/tokens", get(|| async { "tokens" }))
            .route("/api/ns/ext", get(|| async { "extension" }))
            .route("/api/user/settings", post(|| async { "saved" }))
            .route("/api/-/publish", post(|| async { "published" }))
            .route("/v2/api-docs", get(|| async { "docs" }))
            .route("/swagger-resources/meta", post(|| async { "meta" }))
    }

    fn app_with(webui_url: &str) -> Router {
        let config_str = format!("[webui]\nurl = \"{}\"\n", webui_url);
        let config = RegistryConfig::from_str(&config_str).expect("test config");
        let state = AppState::new(config.clone()).expect("app state");
        build_app(&config, state, registry_routes())
    }

    /// App with an OIDC section so sessions can be minted directly through
    /// the authenticator's store. The issuer is never contacted.
    fn app_with_sessions() -> (Router, AppState) {
        let config_str = r#"
[server]
idp_timeout_secs = 1

[auth.oidc]
issuer = "https://id.example"
client_id = "registry"
client_secret = "secret"
redirect_uri = "https://registry.example/login/callback"

[auth.session]
cookie_name = "test_session"
secure = false
"#;
        let config = RegistryConfig::from_str(config_str).expect("test config");
        let state = AppState::new(config.clone()).expect("app state");
        let app = build_app(&config, state.clone(), registry_routes());
        (app, state)
    }

    async fn mint_session(state: &AppState) -> Session {
        let principal = Principal {
            id: "user-123".to_string(),
            issuer: "https://id.example".to_string(),
            email: None,
            name: Some("Test User".to_string()),
        };
        let session = Session::new(principal, Duration::from_secs(3600));
        state
            .oidc
            .as_ref()
            .expect("oidc configured")
            .session_store()
            .create_session(session.clone())
            .await
            .expect("session stored");
        session
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    fn xhr_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("x-requested-with", "XMLHttpRequest")
            .header("accept", "application/json")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn health_is_reachable_without_auth() {
        let response = app_with("").oneshot(get_request("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn permitted_paths_pass_the_gate() {
        let response = app_with("")
            .oneshot(get_request("/api/ns/ext"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn protected_path_rejects_xhr_with_401() {
        let response = app_with("")
            .oneshot(xhr_request("GET", "/user/tokens"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            json["error"]["code"].as_str(),
            Some("authentication_required")
        );
        // Correlation ID injected by the request-id middleware
        assert!(json["error"]["request_id"].is_string());
    }

    #[tokio::test]
    async fn protected_path_redirects_browser_to_login() {
        let response = app_with("")
            .oneshot(get_request("/user/tokens"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response
                .headers()
                .get("location")
                .and_then(|v| v.to_str().ok()),
            Some("/login")
        );
    }

    #[tokio::test]
    async fn permissive_mode_opens_user_paths_at_the_gate() {
        // Absolute web UI URL switches the policy table
        let response = app_with("https://ui.example/")
            .oneshot(get_request("/user/tokens"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unmatched_paths_are_denied() {
        let response = app_with("")
            .oneshot(xhr_request("GET", "/internal/debug"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app_with("https://ui.example/")
            .oneshot(xhr_request("GET", "/internal/debug"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn doc_paths_bypass_the_gate() {
        // No session, but the documentation path skips the pipeline entirely
        let response = app_with("")
            .oneshot(get_request("/v2/api-docs"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // An unregistered documentation path falls through to 404, not 401
        let response = app_with("")
            .oneshot(get_request("/swagger-ui/index.html"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn doc_paths_bypass_the_csrf_filter() {
        // Mutating request, no token, still reaches the handler
        let request = Request::builder()
            .method("POST")
            .uri("/swagger-resources/meta")
            .body(Body::empty())
            .unwrap();
        let response = app_with("").oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn authenticated_request_passes_the_gate() {
        let (app, state) = app_with_sessions();
        let session = mint_session(&state).await;

        let request = Request::builder()
            .method("GET")
            .uri("/user/tokens")
            .header("cookie", format!("test_session={}", session.id))
            .header("accept", "application/json")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn logout_destroys_the_session() {
        let (app, state) = app_with_sessions();
        let session = mint_session(&state).await;
        let oidc = state.oidc.as_ref().expect("oidc configured");

        let request = Request::builder()
            .method("GET")
            .uri("/logout")
            .header("cookie", format!("test_session={}", session.id))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert!(response.status().is_redirection());

        let gone = oidc
            .session_store()
            .get_session(session.id)
            .await
            .expect("store reachable");
        assert!(gone.is_none(), "Session must be destroyed on logout");
    }

    #[tokio::test]
    async fn post_without_csrf_token_is_rejected() {
        let response = app_with("")
            .oneshot(xhr_request("POST", "/api/user/settings"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"].as_str(), Some("csrf_rejected"));
    }

    #[tokio::test]
    async fn post_with_matching_csrf_token_passes() {
        let token = "double-submit-token";
        let request = Request::builder()
            .method("POST")
            .uri("/api/-/publish")
            .header("cookie", format!("exthub_csrf={}", token))
            .header("x-csrf-token", token)
            .body(Body::empty())
            .unwrap();
        let response = app_with("").oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn csrf_exempt_paths_accept_tokenless_posts() {
        // Publishing authenticates with a bearer token, not a session cookie
        let request = Request::builder()
            .method("POST")
            .uri("/api/-/publish")
            .body(Body::empty())
            .unwrap();
        let response = app_with("").oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn safe_requests_seed_the_csrf_cookie() {
        let response = app_with("")
            .oneshot(get_request("/api/ns/ext"))
            .await
            .unwrap();
        let set_cookie = response
            .headers()
            .get("set-cookie")
            .expect("CSRF cookie should be seeded")
            .to_str()
            .unwrap();
        assert!(set_cookie.starts_with("exthub_csrf="));
    }
}

//! Login, callback, and logout endpoints.

use axum::{
    body::Body,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tower_cookies::{
    Cookie, Cookies,
    cookie::{SameSite as CookieSameSite, time::Duration as CookieDuration},
};
use uuid::Uuid;

use crate::{
    AppState,
    auth::{AuthError, OidcAuthenticator},
    config::{SameSite, SessionConfig},
};

/// Query parameters for the provider callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Start the login flow: redirect the browser to the provider's
/// authorization endpoint.
#[tracing::instrument(name = "auth.login", skip(state))]
pub async fn login(State(state): State<AppState>) -> Result<Response, AuthError> {
    let authenticator = require_oidc(&state)?;
    let (auth_url, _) = authenticator.authorization_url().await?;
    Ok(found(&auth_url))
}

/// Provider callback: exchange the code, create a session, set the cookie,
/// and land the browser on the configured web UI (or `/`).
#[tracing::instrument(name = "auth.callback", skip(state, cookies, query))]
pub async fn callback(
    State(state): State<AppState>,
    cookies: Cookies,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, AuthError> {
    if let Some(error) = &query.error {
        let description = query
            .error_description
            .as_deref()
            .unwrap_or("no description");
        tracing::warn!(error = %error, description = %description, "Provider returned an error");
        return Err(AuthError::LoginFailed(format!(
            "{}: {}",
            error, description
        )));
    }

    let code = query
        .code
        .as_deref()
        .ok_or_else(|| AuthError::LoginFailed("missing code parameter".to_string()))?;
    let auth_state = query
        .state
        .as_deref()
        .ok_or_else(|| AuthError::LoginFailed("missing state parameter".to_string()))?;

    let authenticator = require_oidc(&state)?;
    let session = authenticator.exchange_code(code, auth_state).await?;

    cookies.add(build_session_cookie(
        authenticator.session_config(),
        session.id,
    ));

    Ok(found(&state.policy.post_auth_redirect()))
}

/// End the session and land the browser on the configured web UI (or `/`).
#[tracing::instrument(name = "auth.logout", skip(state, cookies))]
pub async fn logout(State(state): State<AppState>, cookies: Cookies) -> Response {
    if let Some(authenticator) = &state.oidc {
        if let Some(session_cookie) = cookies.get(authenticator.cookie_name()) {
            if let Ok(session_id) = session_cookie.value().parse::<Uuid>() {
                authenticator.logout(session_id).await;
            }
        }
        cookies.remove(build_removal_cookie(authenticator.session_config()));
    }

    found(&state.policy.post_auth_redirect())
}

/// 302 redirect. `Redirect::to` answers 303, which changes how user agents
/// replay the request on history navigation.
fn found(location: &str) -> Response {
    Response::builder()
        .status(StatusCode::FOUND)
        .header("Location", location)
        .body(Body::empty())
        .unwrap_or_else(|_| StatusCode::FOUND.into_response())
}

fn require_oidc(state: &AppState) -> Result<&OidcAuthenticator, AuthError> {
    state
        .oidc
        .as_deref()
        .ok_or_else(|| AuthError::LoginFailed("interactive login is not configured".to_string()))
}

fn cookie_same_site(same_site: SameSite) -> CookieSameSite {
    match same_site {
        SameSite::Strict => CookieSameSite::Strict,
        SameSite::Lax => CookieSameSite::Lax,
        SameSite::None => CookieSameSite::None,
    }
}

fn build_session_cookie(config: &SessionConfig, session_id: Uuid) -> Cookie<'static> {
    Cookie::build((config.cookie_name.clone(), session_id.to_string()))
        .path("/")
        .http_only(true)
        .secure(config.secure)
        .same_site(cookie_same_site(config.same_site))
        .max_age(CookieDuration::seconds(config.duration_secs as i64))
        .build()
}

fn build_removal_cookie(config: &SessionConfig) -> Cookie<'static> {
    Cookie::build((config.cookie_name.clone(), ""))
        .path("/")
        .http_only(true)
        .secure(config.secure)
        .same_site(cookie_same_site(config.same_site))
        .build()
}

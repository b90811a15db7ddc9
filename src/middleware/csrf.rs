//! CSRF protection via double-submit cookie.
//!
//! Safe methods seed a readable token cookie; state-changing methods must
//! echo the cookie value back in the `X-CSRF-Token` header. A fixed set of
//! paths is exempt: those endpoints authenticate with explicit bearer
//! tokens, which a cross-site form cannot attach.

use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use subtle::ConstantTimeEq;
use tower_cookies::{Cookie, Cookies, cookie::SameSite as CookieSameSite};

use crate::{
    AppState,
    auth::AuthError,
    config::SameSite,
    middleware::doc_bypass::DocBypass,
};

/// Cookie carrying the CSRF token. Readable by frontend scripts so they can
/// echo it back in the header.
pub const CSRF_COOKIE_NAME: &str = "exthub_csrf";

/// Header the client must send on state-changing requests.
pub const CSRF_HEADER_NAME: &str = "x-csrf-token";

pub async fn csrf_middleware(
    State(state): State<AppState>,
    cookies: Cookies,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    if req.extensions().get::<DocBypass>().is_some() {
        return Ok(next.run(req).await);
    }

    if is_safe_method(req.method()) {
        // Seed the token so the frontend has something to echo back
        if cookies.get(CSRF_COOKIE_NAME).is_none() {
            cookies.add(build_csrf_cookie(&state, generate_token()));
        }
        return Ok(next.run(req).await);
    }

    if state.policy.csrf_exemptions.contains(req.uri().path()) {
        return Ok(next.run(req).await);
    }

    let header_token = req
        .headers()
        .get(CSRF_HEADER_NAME)
        .and_then(|v| v.to_str().ok());
    let cookie_token = cookies.get(CSRF_COOKIE_NAME);

    match (header_token, &cookie_token) {
        (Some(header), Some(cookie)) if tokens_match(header, cookie.value()) => {
            Ok(next.run(req).await)
        }
        _ => {
            tracing::debug!(
                path = %req.uri().path(),
                method = %req.method(),
                has_header = header_token.is_some(),
                has_cookie = cookie_token.is_some(),
                "CSRF token missing or mismatched"
            );
            Err(AuthError::CsrfRejected)
        }
    }
}

/// Methods that never change state and therefore pass without a token.
fn is_safe_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
    )
}

/// Constant-time token comparison.
fn tokens_match(header: &str, cookie: &str) -> bool {
    header.as_bytes().ct_eq(cookie.as_bytes()).into()
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    use rand::RngCore;
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn build_csrf_cookie(state: &AppState, token: String) -> Cookie<'static> {
    let session = &state.config.auth.session;
    let mut cookie = Cookie::new(CSRF_COOKIE_NAME, token);
    cookie.set_path("/");
    // Not http-only: the double-submit scheme needs the frontend to read it
    cookie.set_http_only(false);
    cookie.set_secure(session.secure);
    cookie.set_same_site(match session.same_site {
        SameSite::Strict => CookieSameSite::Strict,
        SameSite::Lax => CookieSameSite::Lax,
        SameSite::None => CookieSameSite::None,
    });
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_methods() {
        assert!(is_safe_method(&Method::GET));
        assert!(is_safe_method(&Method::HEAD));
        assert!(is_safe_method(&Method::OPTIONS));
        assert!(!is_safe_method(&Method::POST));
        assert!(!is_safe_method(&Method::PUT));
        assert!(!is_safe_method(&Method::DELETE));
        assert!(!is_safe_method(&Method::PATCH));
    }

    #[test]
    fn token_comparison() {
        assert!(tokens_match("abc123", "abc123"));
        assert!(!tokens_match("abc123", "abc124"));
        assert!(!tokens_match("abc123", "abc1234"));
        assert!(!tokens_match("", "abc123"));
    }

    #[test]
    fn generated_tokens_are_unique_and_url_safe() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert!(URL_SAFE_NO_PAD.decode(&a).is_ok());
    }
}

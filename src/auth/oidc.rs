//! OIDC (OpenID Connect) authentication.
//!
//! Implements the authorization code flow for browser-based logins:
//! - Generating authorization URLs with PKCE
//! - Token exchange after callback
//! - ID token decoding (verifying or trusted-channel, per configuration)
//! - Session creation and logout
//!
//! All outbound calls to the provider carry the configured timeout; a hung
//! provider fails the login attempt rather than the whole request pipeline.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use reqwest::Url;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::{
    decoder::{IdTokenDecoder, JwksVerifyingDecoder, TrustedChannelDecoder},
    error::AuthError,
    principal::Principal,
    session_store::{AuthorizationState, Session, SessionError, SharedSessionStore},
};
use crate::config::{OidcAuthConfig, SessionConfig};

/// OIDC discovery document.
#[derive(Debug, Clone, Deserialize)]
pub struct OidcDiscovery {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub jwks_uri: String,
    #[serde(default)]
    pub scopes_supported: Vec<String>,
}

/// Token response from the provider.
#[derive(Debug, Clone, Deserialize)]
#[allow(dead_code)] // Deserialization type
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// PKCE (Proof Key for Code Exchange) data.
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    pub code_verifier: String,
    pub code_challenge: String,
}

impl PkceChallenge {
    /// Generate a new PKCE challenge.
    pub fn new() -> Self {
        let mut verifier_bytes = [0u8; 32];
        use rand::RngCore;
        rand::thread_rng().fill_bytes(&mut verifier_bytes);
        let code_verifier = URL_SAFE_NO_PAD.encode(verifier_bytes);

        // Challenge is the SHA256 of the verifier
        let mut hasher = Sha256::new();
        hasher.update(code_verifier.as_bytes());
        let code_challenge = URL_SAFE_NO_PAD.encode(hasher.finalize());

        Self {
            code_verifier,
            code_challenge,
        }
    }
}

impl Default for PkceChallenge {
    fn default() -> Self {
        Self::new()
    }
}

/// Cached OIDC discovery document.
struct CachedDiscovery {
    discovery: OidcDiscovery,
    fetched_at: Instant,
}

/// OIDC authenticator that handles the full authorization code flow.
pub struct OidcAuthenticator {
    config: OidcAuthConfig,
    session: SessionConfig,
    http_client: reqwest::Client,
    discovery_cache: RwLock<Option<CachedDiscovery>>,
    decoder: Arc<dyn IdTokenDecoder>,
    session_store: SharedSessionStore,
}

impl OidcAuthenticator {
    /// Create a new authenticator. `idp_timeout` bounds every outbound call
    /// to the provider (discovery, token exchange, JWKS).
    pub fn new(
        config: OidcAuthConfig,
        session: SessionConfig,
        session_store: SharedSessionStore,
        idp_timeout: Duration,
    ) -> Result<Self, AuthError> {
        let http_client = reqwest::Client::builder()
            .timeout(idp_timeout)
            .build()
            .map_err(|e| AuthError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self::with_client(config, session, http_client, session_store))
    }

    /// Create a new authenticator with a custom HTTP client.
    pub fn with_client(
        config: OidcAuthConfig,
        session: SessionConfig,
        http_client: reqwest::Client,
        session_store: SharedSessionStore,
    ) -> Self {
        let decoder: Arc<dyn IdTokenDecoder> = if config.verify_signatures {
            Arc::new(JwksVerifyingDecoder::new(
                config.issuer.clone(),
                config.client_id.clone(),
                http_client.clone(),
            ))
        } else {
            Arc::new(TrustedChannelDecoder::new(
                config.issuer.clone(),
                config.client_id.clone(),
            ))
        };

        Self {
            config,
            session,
            http_client,
            discovery_cache: RwLock::new(None),
            decoder,
            session_store,
        }
    }

    /// Get the session store.
    pub fn session_store(&self) -> &SharedSessionStore {
        &self.session_store
    }

    /// Get the session cookie name.
    pub fn cookie_name(&self) -> &str {
        &self.session.cookie_name
    }

    /// Get session configuration.
    pub fn session_config(&self) -> &SessionConfig {
        &self.session
    }

    /// Get the OIDC discovery document, fetching it if necessary.
    ///
    /// Discovery is only reached while a login is in progress, so provider
    /// failures here fail the login attempt rather than the server.
    pub async fn get_discovery(&self) -> Result<OidcDiscovery, AuthError> {
        {
            let cache = self.discovery_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                // Cache for 1 hour
                if cached.fetched_at.elapsed() < Duration::from_secs(3600) {
                    return Ok(cached.discovery.clone());
                }
            }
        }

        // discovery_url covers split-horizon setups where the backend reaches
        // the provider via a different URL than the browser does
        let discovery_url = format!(
            "{}/.well-known/openid-configuration",
            self.config.discovery_base_url().trim_end_matches('/')
        );

        tracing::debug!(url = %discovery_url, "Fetching OIDC discovery document");

        let response = self
            .http_client
            .get(&discovery_url)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, url = %discovery_url, "Failed to fetch OIDC discovery");
                AuthError::LoginFailed(format!("provider discovery failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::error!(status = %status, "OIDC discovery endpoint returned error");
            return Err(AuthError::LoginFailed(format!(
                "provider discovery returned {}",
                status
            )));
        }

        let discovery: OidcDiscovery = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to parse OIDC discovery");
            AuthError::LoginFailed(format!("invalid discovery document: {}", e))
        })?;

        let mut cache = self.discovery_cache.write().await;
        *cache = Some(CachedDiscovery {
            discovery: discovery.clone(),
            fetched_at: Instant::now(),
        });

        Ok(discovery)
    }

    /// Generate an authorization URL and store the pending state.
    pub async fn authorization_url(&self) -> Result<(String, AuthorizationState), AuthError> {
        let discovery = self.get_discovery().await?;

        let state = Uuid::new_v4().to_string();
        let nonce = Uuid::new_v4().to_string();
        let pkce = PkceChallenge::new();

        let mut url = Url::parse(&discovery.authorization_endpoint).map_err(|e| {
            AuthError::Internal(format!("Invalid authorization endpoint URL: {}", e))
        })?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("response_type", "code");
            query.append_pair("client_id", &self.config.client_id);
            query.append_pair("redirect_uri", &self.config.redirect_uri);
            query.append_pair("scope", &self.config.scopes.join(" "));
            query.append_pair("state", &state);
            query.append_pair("nonce", &nonce);
            query.append_pair("code_challenge", &pkce.code_challenge);
            query.append_pair("code_challenge_method", "S256");
        }

        let auth_state = AuthorizationState {
            state: state.clone(),
            nonce,
            code_verifier: pkce.code_verifier,
            created_at: Utc::now(),
        };

        self.session_store
            .store_auth_state(auth_state.clone())
            .await
            .map_err(|e| AuthError::Internal(format!("Failed to store auth state: {}", e)))?;

        Ok((url.to_string(), auth_state))
    }

    /// Exchange an authorization code for tokens and create a session.
    ///
    /// Any provider-side failure here (refused exchange, timeout, bad ID
    /// token, nonce mismatch) is terminal for the login attempt and surfaces
    /// as `LoginFailed`.
    pub async fn exchange_code(&self, code: &str, state: &str) -> Result<Session, AuthError> {
        let auth_state = self
            .session_store
            .take_auth_state(state)
            .await
            .map_err(|e| AuthError::Internal(format!("Failed to retrieve auth state: {}", e)))?
            .ok_or_else(|| AuthError::LoginFailed("unknown or reused state".to_string()))?;

        if auth_state.is_expired() {
            return Err(AuthError::LoginFailed(
                "authorization state expired".to_string(),
            ));
        }

        let discovery = self.get_discovery().await?;

        let token_response = self
            .http_client
            .post(&discovery.token_endpoint)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", &self.config.redirect_uri),
                ("client_id", &self.config.client_id),
                ("client_secret", &self.config.client_secret),
                ("code_verifier", &auth_state.code_verifier),
            ])
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Token exchange request failed");
                if e.is_timeout() {
                    AuthError::LoginFailed("token endpoint timed out".to_string())
                } else {
                    AuthError::LoginFailed(format!("token exchange failed: {}", e))
                }
            })?;

        if !token_response.status().is_success() {
            let status = token_response.status();
            let body = token_response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Token endpoint returned error");
            return Err(AuthError::LoginFailed(format!(
                "token endpoint returned {}",
                status
            )));
        }

        let tokens: TokenResponse = token_response.json().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to parse token response");
            AuthError::LoginFailed(format!("invalid token response: {}", e))
        })?;

        let id_token = tokens
            .id_token
            .as_ref()
            .ok_or_else(|| AuthError::LoginFailed("no ID token in response".to_string()))?;

        let claims = self
            .decoder
            .decode(id_token, &discovery.jwks_uri)
            .await
            .map_err(|e| AuthError::LoginFailed(format!("ID token rejected: {}", e)))?;

        // Validate nonce to prevent token substitution/replay
        if claims.nonce.as_deref() != Some(auth_state.nonce.as_str()) {
            tracing::warn!("OIDC nonce mismatch: possible token substitution or replay");
            return Err(AuthError::LoginFailed("nonce mismatch".to_string()));
        }

        let principal = Principal::from_claims(&claims, &self.config.identity_claim)?;
        let session = Session::new(principal, Duration::from_secs(self.session.duration_secs));

        self.session_store
            .create_session(session.clone())
            .await
            .map_err(|e| AuthError::Internal(format!("Failed to store session: {}", e)))?;

        tracing::info!(
            session_id = %session.id,
            principal = %session.principal.id,
            "Login completed"
        );

        Ok(session)
    }

    /// Get a session by ID, reporting expiry distinctly.
    pub async fn get_session(&self, session_id: Uuid) -> Result<Session, AuthError> {
        self.session_store
            .get_session(session_id)
            .await
            .map_err(|e| match e {
                SessionError::NotFound => AuthError::SessionNotFound,
                SessionError::Expired => AuthError::SessionExpired,
                SessionError::Backend(msg) => AuthError::Internal(msg),
            })?
            .ok_or(AuthError::SessionNotFound)
    }

    /// Delete a session (logout). Purely local: the provider is not
    /// contacted, and deletion failures are logged and swallowed so logout
    /// always succeeds.
    pub async fn logout(&self, session_id: Uuid) {
        if let Err(e) = self.session_store.delete_session(session_id).await {
            tracing::debug!(error = %e, %session_id, "Session delete during logout failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pkce_challenge_is_sha256_of_verifier() {
        let pkce = PkceChallenge::new();

        assert!(!pkce.code_verifier.is_empty());
        assert_ne!(pkce.code_verifier, pkce.code_challenge);

        let mut hasher = Sha256::new();
        hasher.update(pkce.code_verifier.as_bytes());
        let expected = URL_SAFE_NO_PAD.encode(hasher.finalize());
        assert_eq!(pkce.code_challenge, expected);
    }

    #[test]
    fn pkce_challenges_are_unique() {
        assert_ne!(
            PkceChallenge::new().code_verifier,
            PkceChallenge::new().code_verifier
        );
    }

    // Flow tests (authorization URL, exchange, timeout handling) live with
    // the login routes, where the mock provider is set up.
}

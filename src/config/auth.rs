use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Authentication configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// OIDC client registration for interactive browser logins.
    /// If omitted, `/login` returns an error and only bearer-token
    /// endpoints are usable.
    #[serde(default)]
    pub oidc: Option<OidcAuthConfig>,

    /// Session cookie configuration.
    #[serde(default)]
    pub session: SessionConfig,
}

impl AuthConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(oidc) = &self.oidc {
            oidc.validate()?;
        }
        Ok(())
    }
}

/// OIDC client registration, resolved from configuration at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OidcAuthConfig {
    /// OIDC issuer URL. Used for discovery and ID token validation.
    pub issuer: String,

    /// URL to use for OIDC discovery (fetching .well-known/openid-configuration).
    /// If not set, defaults to `issuer`. Useful in Docker environments where
    /// the backend reaches the IdP via an internal URL while the browser uses
    /// an external one.
    #[serde(default)]
    pub discovery_url: Option<String>,

    /// Client ID.
    pub client_id: String,

    /// Client secret.
    pub client_secret: String,

    /// Redirect URI (must be registered with the IdP).
    pub redirect_uri: String,

    /// Scopes to request.
    #[serde(default = "default_oidc_scopes")]
    pub scopes: Vec<String>,

    /// Claim to use as the principal's identity.
    #[serde(default = "default_identity_claim")]
    pub identity_claim: String,

    /// Whether to verify ID token signatures against the provider's JWKS.
    ///
    /// The token arrives over our own TLS channel to the token endpoint, so
    /// signature verification adds no trust and requires maintaining provider
    /// key material. Off by default; enable when tokens may transit an
    /// untrusted hop. Expiry, issuer, and audience are checked either way.
    #[serde(default)]
    pub verify_signatures: bool,
}

impl OidcAuthConfig {
    /// The base URL for fetching the discovery document.
    pub fn discovery_base_url(&self) -> &str {
        self.discovery_url.as_deref().unwrap_or(&self.issuer)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.issuer.is_empty() {
            return Err(ConfigError::Validation(
                "auth.oidc.issuer must not be empty".to_string(),
            ));
        }
        if self.client_id.is_empty() {
            return Err(ConfigError::Validation(
                "auth.oidc.client_id must not be empty".to_string(),
            ));
        }
        if self.redirect_uri.is_empty() {
            return Err(ConfigError::Validation(
                "auth.oidc.redirect_uri must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_oidc_scopes() -> Vec<String> {
    vec![
        "openid".to_string(),
        "email".to_string(),
        "profile".to_string(),
    ]
}

fn default_identity_claim() -> String {
    "sub".to_string()
}

/// Session cookie configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Cookie name.
    #[serde(default = "default_session_cookie")]
    pub cookie_name: String,

    /// Session duration in seconds.
    #[serde(default = "default_session_duration")]
    pub duration_secs: u64,

    /// Secure cookie (HTTPS only).
    #[serde(default = "default_true")]
    pub secure: bool,

    /// SameSite cookie attribute.
    #[serde(default)]
    pub same_site: SameSite,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_session_cookie(),
            duration_secs: default_session_duration(),
            secure: true,
            same_site: SameSite::default(),
        }
    }
}

fn default_session_cookie() -> String {
    "exthub_session".to_string()
}

fn default_session_duration() -> u64 {
    8 * 60 * 60 // 8 hours
}

fn default_true() -> bool {
    true
}

/// SameSite cookie attribute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    Strict,
    #[default]
    Lax,
    None,
}

use std::net::IpAddr;

use http::{HeaderName, HeaderValue, Method};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request body size limit in bytes.
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,

    /// Timeout in seconds for outbound requests to the identity provider
    /// (discovery and token exchange). A hung provider must fail the login
    /// attempt, not the gate.
    #[serde(default = "default_idp_timeout")]
    pub idp_timeout_secs: u64,

    /// CORS configuration.
    #[serde(default)]
    pub cors: CorsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
            idp_timeout_secs: default_idp_timeout(),
            cors: CorsConfig::default(),
        }
    }
}

fn default_host() -> IpAddr {
    "0.0.0.0".parse().expect("valid address literal")
}

fn default_port() -> u16 {
    8080
}

fn default_body_limit() -> usize {
    10 * 1024 * 1024 // 10 MB
}

fn default_idp_timeout() -> u64 {
    10
}

/// CORS configuration.
///
/// Needed when the web UI is served from a different origin than the API
/// (the same deployments that run the permissive access policy).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins. Empty disables the CORS layer entirely.
    #[serde(default)]
    pub allowed_origins: Vec<String>,

    /// Allowed methods. Empty means the common set.
    #[serde(default)]
    pub allowed_methods: Vec<String>,

    /// Allowed request headers. Empty means any.
    #[serde(default)]
    pub allowed_headers: Vec<String>,

    /// Whether to allow credentials (cookies) on cross-origin requests.
    /// Required for session-based login from a separate UI origin.
    #[serde(default)]
    pub allow_credentials: bool,
}

impl CorsConfig {
    /// Build the tower-http layer, or `None` when no origins are configured.
    pub fn into_layer(self) -> Option<CorsLayer> {
        if self.allowed_origins.is_empty() {
            return None;
        }

        let origins: Vec<HeaderValue> = self
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();

        let methods: AllowMethods = if self.allowed_methods.is_empty() {
            vec![
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ]
            .into()
        } else {
            self.allowed_methods
                .iter()
                .filter_map(|m| m.parse::<Method>().ok())
                .collect::<Vec<_>>()
                .into()
        };

        let headers: AllowHeaders = if self.allowed_headers.is_empty() {
            AllowHeaders::mirror_request()
        } else {
            self.allowed_headers
                .iter()
                .filter_map(|h| h.parse::<HeaderName>().ok())
                .collect::<Vec<_>>()
                .into()
        };

        let mut layer = CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(methods)
            .allow_headers(headers);

        if self.allow_credentials {
            layer = layer.allow_credentials(true);
        }

        Some(layer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.idp_timeout_secs, 10);
    }

    #[test]
    fn empty_cors_config_builds_no_layer() {
        assert!(CorsConfig::default().into_layer().is_none());
    }

    #[test]
    fn cors_config_with_origins_builds_layer() {
        let config = CorsConfig {
            allowed_origins: vec!["https://ui.example".to_string()],
            allow_credentials: true,
            ..CorsConfig::default()
        };
        assert!(config.into_layer().is_some());
    }
}

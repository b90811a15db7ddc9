//! ID token decoding strategies.
//!
//! Tokens come back from the provider's token endpoint over a TLS channel we
//! opened ourselves, so two strategies are offered behind one trait:
//!
//! - `JwksVerifyingDecoder`: full signature verification against the
//!   provider's JWKS, with key caching and rotation support.
//! - `TrustedChannelDecoder`: skips signature verification and trusts the
//!   channel instead. Expiry, issuer, and audience are still checked.
//!
//! The strategy is selected once at startup from configuration.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use jsonwebtoken::{
    Algorithm, DecodingKey, TokenData, Validation, decode, decode_header,
    jwk::{AlgorithmParameters, Jwk, JwkSet},
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::auth::error::AuthError;

/// Algorithms accepted from the provider. `none` is rejected by construction;
/// HMAC keys are only usable when the JWKS itself carries an oct key.
const ALLOWED_ALGORITHMS: &[Algorithm] = &[
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::ES256,
    Algorithm::ES384,
    Algorithm::HS256,
];

/// How long fetched JWKS keys are reused before a refresh.
const JWKS_REFRESH_SECS: u64 = 3600;

/// Claims extracted from a decoded ID token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenClaims {
    /// Subject (identity ID)
    pub sub: String,

    /// Issuer
    pub iss: String,

    /// Audience (can be string or array)
    #[serde(default)]
    pub aud: Audience,

    /// Expiration time (Unix timestamp)
    pub exp: u64,

    /// Issued at (Unix timestamp)
    #[serde(default)]
    pub iat: Option<u64>,

    /// Email claim (common in OIDC)
    #[serde(default)]
    pub email: Option<String>,

    /// Name claim (common in OIDC)
    #[serde(default)]
    pub name: Option<String>,

    /// Nonce, echoed from the authorization request
    #[serde(default)]
    pub nonce: Option<String>,

    /// All other claims (for custom identity extraction)
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Audience can be a single string or an array of strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Audience {
    #[default]
    None,
    Single(String),
    Multiple(Vec<String>),
}

/// Decodes and validates an ID token obtained from the token endpoint.
#[async_trait]
pub trait IdTokenDecoder: Send + Sync {
    /// Decode the token and validate its claims. `jwks_uri` comes from the
    /// provider's discovery document; the trusted-channel strategy ignores it.
    async fn decode(&self, id_token: &str, jwks_uri: &str) -> Result<IdTokenClaims, AuthError>;
}

fn base_validation(alg: Algorithm, issuer: &str, audience: &str) -> Validation {
    let mut validation = Validation::new(alg);
    validation.set_issuer(&[issuer]);
    validation.set_audience(&[audience]);
    validation
}

fn map_decode_error(e: jsonwebtoken::errors::Error) -> AuthError {
    tracing::debug!(error = %e, "ID token validation failed");
    match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
        _ => AuthError::InvalidToken,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Trusted Channel Decoder
// ─────────────────────────────────────────────────────────────────────────────

/// Decoder that does not verify signatures.
///
/// The token was just received directly from the token endpoint over TLS, so
/// the signature carries no additional trust for this deployment shape.
/// Expiry, issuer, and audience are validated as usual.
pub struct TrustedChannelDecoder {
    issuer: String,
    audience: String,
}

impl TrustedChannelDecoder {
    pub fn new(issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            audience: audience.into(),
        }
    }
}

#[async_trait]
impl IdTokenDecoder for TrustedChannelDecoder {
    async fn decode(&self, id_token: &str, _jwks_uri: &str) -> Result<IdTokenClaims, AuthError> {
        let header = decode_header(id_token).map_err(|e| {
            tracing::debug!(error = %e, "Failed to decode ID token header");
            AuthError::InvalidToken
        })?;

        let mut validation = base_validation(header.alg, &self.issuer, &self.audience);
        validation.insecure_disable_signature_validation();

        // The key is unused with signature validation disabled
        let token_data: TokenData<IdTokenClaims> =
            decode(id_token, &DecodingKey::from_secret(&[]), &validation)
                .map_err(map_decode_error)?;

        Ok(token_data.claims)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// JWKS Verifying Decoder
// ─────────────────────────────────────────────────────────────────────────────

/// Cached JWKS with fetch time.
struct CachedJwks {
    keys: HashMap<String, DecodingKey>,
    fetched_at: Instant,
}

/// Decoder that verifies signatures against the provider's JWKS.
///
/// Keys are cached and refreshed on expiry or on an unknown key ID, which
/// handles provider key rotation.
pub struct JwksVerifyingDecoder {
    issuer: String,
    audience: String,
    http_client: reqwest::Client,
    jwks_cache: RwLock<Option<CachedJwks>>,
}

impl JwksVerifyingDecoder {
    pub fn new(
        issuer: impl Into<String>,
        audience: impl Into<String>,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            audience: audience.into(),
            http_client,
            jwks_cache: RwLock::new(None),
        }
    }

    /// Get a decoding key for the given key ID, fetching JWKS if necessary.
    async fn get_decoding_key(&self, kid: &str, jwks_uri: &str) -> Result<DecodingKey, AuthError> {
        {
            let cache = self.jwks_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.fetched_at.elapsed() < Duration::from_secs(JWKS_REFRESH_SECS) {
                    if let Some(key) = cached.keys.get(kid) {
                        return Ok(key.clone());
                    }
                }
            }
        }

        // Cache miss or expired: fetch fresh keys
        self.refresh_jwks(jwks_uri).await?;

        let cache = self.jwks_cache.read().await;
        cache
            .as_ref()
            .and_then(|c| c.keys.get(kid).cloned())
            .ok_or_else(|| {
                tracing::warn!(kid = kid, "Key ID not found in JWKS");
                AuthError::InvalidToken
            })
    }

    /// Fetch and cache the JWKS from the provider.
    async fn refresh_jwks(&self, jwks_uri: &str) -> Result<(), AuthError> {
        tracing::debug!(url = %jwks_uri, "Fetching JWKS");

        let response = self
            .http_client
            .get(jwks_uri)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, url = %jwks_uri, "Failed to fetch JWKS");
                AuthError::Internal(format!("Failed to fetch JWKS: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::error!(status = %status, url = %jwks_uri, "JWKS endpoint returned error");
            return Err(AuthError::Internal(format!(
                "JWKS endpoint returned {}",
                status
            )));
        }

        let jwks: JwkSet = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to parse JWKS response");
            AuthError::Internal(format!("Failed to parse JWKS: {}", e))
        })?;

        let mut keys = HashMap::new();
        for jwk in jwks.keys {
            if let Some(kid) = &jwk.common.key_id {
                match jwk_to_decoding_key(&jwk) {
                    Ok(key) => {
                        keys.insert(kid.clone(), key);
                    }
                    Err(e) => {
                        tracing::warn!(kid = kid, error = %e, "Failed to convert JWK to decoding key");
                    }
                }
            }
        }

        tracing::info!(keys_count = keys.len(), "JWKS refreshed");

        let mut cache = self.jwks_cache.write().await;
        *cache = Some(CachedJwks {
            keys,
            fetched_at: Instant::now(),
        });

        Ok(())
    }
}

#[async_trait]
impl IdTokenDecoder for JwksVerifyingDecoder {
    async fn decode(&self, id_token: &str, jwks_uri: &str) -> Result<IdTokenClaims, AuthError> {
        let header = decode_header(id_token).map_err(|e| {
            tracing::debug!(error = %e, "Failed to decode ID token header");
            AuthError::InvalidToken
        })?;

        if !ALLOWED_ALGORITHMS.contains(&header.alg) {
            tracing::warn!(algorithm = ?header.alg, "ID token algorithm not allowed");
            return Err(AuthError::InvalidToken);
        }

        let kid = header.kid.as_ref().ok_or_else(|| {
            tracing::debug!("ID token missing key ID (kid)");
            AuthError::InvalidToken
        })?;

        let decoding_key = self.get_decoding_key(kid, jwks_uri).await?;
        let validation = base_validation(header.alg, &self.issuer, &self.audience);

        let token_data: TokenData<IdTokenClaims> =
            decode(id_token, &decoding_key, &validation).map_err(map_decode_error)?;

        Ok(token_data.claims)
    }
}

/// Convert a JWK to a DecodingKey.
fn jwk_to_decoding_key(jwk: &Jwk) -> Result<DecodingKey, AuthError> {
    match &jwk.algorithm {
        AlgorithmParameters::RSA(rsa) => DecodingKey::from_rsa_components(&rsa.n, &rsa.e)
            .map_err(|e| AuthError::Internal(format!("Failed to create RSA decoding key: {}", e))),
        AlgorithmParameters::EllipticCurve(ec) => DecodingKey::from_ec_components(&ec.x, &ec.y)
            .map_err(|e| AuthError::Internal(format!("Failed to create EC decoding key: {}", e))),
        AlgorithmParameters::OctetKey(oct) => DecodingKey::from_base64_secret(&oct.value)
            .map_err(|e| AuthError::Internal(format!("Failed to create HMAC decoding key: {}", e))),
        _ => Err(AuthError::Internal(
            "Unsupported JWK algorithm type".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{EncodingKey, Header, encode};

    use super::*;

    const ISSUER: &str = "https://id.example";
    const AUDIENCE: &str = "registry";

    fn make_token(claims: &IdTokenClaims) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(b"provider-secret"),
        )
        .unwrap()
    }

    fn valid_claims() -> IdTokenClaims {
        IdTokenClaims {
            sub: "user-123".to_string(),
            iss: ISSUER.to_string(),
            aud: Audience::Single(AUDIENCE.to_string()),
            exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp() as u64,
            iat: None,
            email: Some("user@example.com".to_string()),
            name: None,
            nonce: Some("nonce-1".to_string()),
            extra: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn trusted_decoder_accepts_without_knowing_the_key() {
        let token = make_token(&valid_claims());
        let decoder = TrustedChannelDecoder::new(ISSUER, AUDIENCE);

        let claims = decoder.decode(&token, "unused").await.unwrap();
        assert_eq!(claims.sub, "user-123");
        assert_eq!(claims.nonce.as_deref(), Some("nonce-1"));
    }

    #[tokio::test]
    async fn trusted_decoder_still_checks_expiry() {
        let mut claims = valid_claims();
        claims.exp = (chrono::Utc::now() - chrono::Duration::hours(1)).timestamp() as u64;
        let token = make_token(&claims);
        let decoder = TrustedChannelDecoder::new(ISSUER, AUDIENCE);

        let err = decoder.decode(&token, "unused").await.unwrap_err();
        assert!(matches!(err, AuthError::ExpiredToken));
    }

    #[tokio::test]
    async fn trusted_decoder_still_checks_issuer() {
        let mut claims = valid_claims();
        claims.iss = "https://evil.example".to_string();
        let token = make_token(&claims);
        let decoder = TrustedChannelDecoder::new(ISSUER, AUDIENCE);

        let err = decoder.decode(&token, "unused").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn trusted_decoder_still_checks_audience() {
        let mut claims = valid_claims();
        claims.aud = Audience::Single("someone-else".to_string());
        let token = make_token(&claims);
        let decoder = TrustedChannelDecoder::new(ISSUER, AUDIENCE);

        let err = decoder.decode(&token, "unused").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn garbage_is_rejected() {
        let decoder = TrustedChannelDecoder::new(ISSUER, AUDIENCE);
        let err = decoder.decode("not-a-jwt", "unused").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn verifying_decoder_requires_a_key_id() {
        let token = make_token(&valid_claims()); // no kid in header
        let decoder = JwksVerifyingDecoder::new(ISSUER, AUDIENCE, reqwest::Client::new());

        let err = decoder
            .decode(&token, "http://127.0.0.1:1/jwks")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }
}

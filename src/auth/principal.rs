use serde::{Deserialize, Serialize};

use crate::auth::decoder::IdTokenClaims;
use crate::auth::error::AuthError;

/// The authenticated identity attached to a request once the gate has
/// resolved a valid session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    /// Stable identifier, taken from the configured identity claim.
    pub id: String,

    /// Issuer of the ID token this principal came from.
    pub issuer: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Principal {
    /// Build a principal from validated ID token claims.
    ///
    /// `identity_claim` names the claim that carries the stable identifier.
    /// "sub" is always present; anything else falls back to the extra claim
    /// map and fails if the provider did not send it.
    pub fn from_claims(claims: &IdTokenClaims, identity_claim: &str) -> Result<Self, AuthError> {
        let id = if identity_claim == "sub" {
            claims.sub.clone()
        } else {
            claims
                .extra
                .get(identity_claim)
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .ok_or_else(|| {
                    AuthError::LoginFailed(format!(
                        "ID token is missing the '{}' claim",
                        identity_claim
                    ))
                })?
        };

        Ok(Self {
            id,
            issuer: claims.iss.clone(),
            email: claims.email.clone(),
            name: claims.name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims() -> IdTokenClaims {
        let mut extra = std::collections::HashMap::new();
        extra.insert(
            "preferred_username".to_string(),
            serde_json::Value::String("octocat".to_string()),
        );
        IdTokenClaims {
            sub: "user-123".to_string(),
            iss: "https://id.example".to_string(),
            aud: crate::auth::decoder::Audience::Single("registry".to_string()),
            exp: 4102444800,
            iat: None,
            email: Some("octocat@example.com".to_string()),
            name: Some("Octo Cat".to_string()),
            nonce: None,
            extra,
        }
    }

    #[test]
    fn sub_is_the_default_identity() {
        let principal = Principal::from_claims(&claims(), "sub").unwrap();
        assert_eq!(principal.id, "user-123");
        assert_eq!(principal.email.as_deref(), Some("octocat@example.com"));
    }

    #[test]
    fn custom_identity_claim_from_extra() {
        let principal = Principal::from_claims(&claims(), "preferred_username").unwrap();
        assert_eq!(principal.id, "octocat");
    }

    #[test]
    fn missing_identity_claim_fails_login() {
        let err = Principal::from_claims(&claims(), "employee_id").unwrap_err();
        assert!(matches!(err, AuthError::LoginFailed(_)));
    }
}

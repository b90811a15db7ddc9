//! Current-user profile endpoint.

use axum::{Extension, Json, response::IntoResponse};
use serde::Serialize;

use crate::auth::Principal;

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ProfileResponse {
    User(Principal),
    Anonymous { error: String },
}

/// `/user` is permitted at the gate in both policy modes; the response just
/// reflects whether a valid session accompanied the request.
#[tracing::instrument(name = "user.profile", skip_all)]
pub async fn profile(principal: Option<Extension<Principal>>) -> impl IntoResponse {
    match principal {
        Some(Extension(principal)) => Json(ProfileResponse::User(principal)),
        None => Json(ProfileResponse::Anonymous {
            error: "Not logged in".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_response_shape() {
        let response = ProfileResponse::Anonymous {
            error: "Not logged in".to_string(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["error"].as_str(), Some("Not logged in"));
    }

    #[test]
    fn user_response_shape() {
        let response = ProfileResponse::User(Principal {
            id: "user-123".to_string(),
            issuer: "https://id.example".to_string(),
            email: None,
            name: Some("Test User".to_string()),
        });
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["id"].as_str(), Some("user-123"));
        assert!(json.get("email").is_none());
    }
}

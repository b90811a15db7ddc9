//! Authentication: OIDC login flow, ID token decoding, sessions.

pub mod decoder;
pub mod error;
pub mod oidc;
pub mod principal;
pub mod session_store;

pub use decoder::{IdTokenClaims, IdTokenDecoder, JwksVerifyingDecoder, TrustedChannelDecoder};
pub use error::{AuthError, ErrorResponse};
pub use oidc::{OidcAuthenticator, OidcDiscovery, PkceChallenge, TokenResponse};
pub use principal::Principal;
pub use session_store::{
    AuthorizationState, MemorySessionStore, Session, SessionError, SessionStore,
    SharedSessionStore,
};

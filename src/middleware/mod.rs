//! Request pipeline middleware: documentation bypass, CSRF filter,
//! authentication gate, request IDs.

pub mod auth_gate;
pub mod csrf;
pub mod doc_bypass;
pub mod request_id;

pub use auth_gate::auth_gate_middleware;
pub use csrf::{CSRF_COOKIE_NAME, CSRF_HEADER_NAME, csrf_middleware};
pub use doc_bypass::{DocBypass, doc_bypass_middleware};
pub use request_id::{REQUEST_ID_HEADER, RequestId, request_id_middleware};

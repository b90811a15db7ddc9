//! Path-based access policy: pattern matching, rule tables, and the
//! startup mode selector.

mod pattern;
mod table;

pub use pattern::PathPattern;
pub use table::{
    AccessDecision, AccessRule, PatternSet, PolicyMode, PolicyTable, Requirement,
    select_policy_mode,
};

use std::sync::Arc;

use crate::config::RedirectTarget;

/// The immutable security policy for this process.
///
/// Constructed once from configuration at startup and shared read-only by
/// every request task. There is deliberately no way to mutate it afterwards.
#[derive(Debug, Clone)]
pub struct SecurityPolicy {
    pub mode: PolicyMode,
    pub table: Arc<PolicyTable>,
    pub csrf_exemptions: Arc<PatternSet>,
    pub doc_bypass: Arc<PatternSet>,
    pub redirect: RedirectTarget,
}

impl SecurityPolicy {
    /// Build the policy from the configured web UI redirect target.
    pub fn from_redirect(redirect: RedirectTarget) -> Self {
        let mode = select_policy_mode(&redirect);

        if !redirect.raw().is_empty() && mode == PolicyMode::Default {
            tracing::warn!(
                url = %redirect.raw(),
                "webui.url is not an absolute URL; falling back to default \
                 access policy and '/'-rooted redirects"
            );
        }

        tracing::info!(mode = ?mode, "Access policy selected");

        Self {
            mode,
            table: Arc::new(PolicyTable::for_mode(mode)),
            csrf_exemptions: Arc::new(PatternSet::csrf_exemptions()),
            doc_bypass: Arc::new(PatternSet::doc_bypass()),
            redirect,
        }
    }

    /// Where successful logins and logouts land: the configured web UI if
    /// valid, otherwise the application root.
    pub fn post_auth_redirect(&self) -> String {
        self.redirect
            .absolute()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "/".to_string())
    }
}

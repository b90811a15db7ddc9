//! Access policy tables and the startup policy selector.
//!
//! The registry runs in one of two access-control modes, fixed for the
//! lifetime of the process:
//!
//! - **Default**: the gate itself enforces which paths need a principal.
//!   Used when the web UI is served from the same origin as the API.
//! - **Permissive**: every known path is permitted at the gate and the
//!   endpoints perform their own principal checks. Used when the web UI is
//!   served from a separate origin, so that cross-origin preflight requests
//!   are never rejected by the gate.
//!
//! The mode is derived from the configured web UI redirect URL: a separate
//! frontend origin needs an absolute URL, so "valid absolute URL configured"
//! is the signal for Permissive.

use crate::config::RedirectTarget;

use super::pattern::PathPattern;

/// What a matched rule requires of the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// The request must carry an authenticated principal.
    Authenticated,
    /// The request passes the gate unconditionally.
    PermitAll,
}

/// One (pattern, requirement) entry in a policy table.
#[derive(Debug, Clone)]
pub struct AccessRule {
    pub pattern: PathPattern,
    pub requirement: Requirement,
}

/// Outcome of evaluating a path against a policy table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    /// Forward the request unchanged.
    PermitAll,
    /// Forward only with a principal attached.
    Authenticated,
    /// No rule matched. The table is deny-by-default: unknown paths require
    /// authentication, same as an explicit `Authenticated` match.
    Deny,
}

/// Which policy table is active for this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyMode {
    Default,
    Permissive,
}

/// An ordered, first-match-wins access policy table.
///
/// Tables are built once at startup and never mutated, so they are freely
/// shared across request tasks without locking.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    rules: Vec<AccessRule>,
}

impl PolicyTable {
    /// The table for [`PolicyMode::Default`].
    ///
    /// Endpoints that act on the current user's resources require a
    /// principal; the rest of the public surface is permitted and performs
    /// token-based checks internally where needed.
    pub fn default_mode() -> Self {
        Self {
            rules: rules(&[
                ("/user/tokens", Requirement::Authenticated),
                ("/user/token/**", Requirement::Authenticated),
                ("/user/namespaces", Requirement::Authenticated),
                ("/user/namespace/**", Requirement::Authenticated),
                ("/user/search/**", Requirement::Authenticated),
                ("/api/*/*/review/**", Requirement::Authenticated),
                ("/user", Requirement::PermitAll),
                ("/login/**", Requirement::PermitAll),
                ("/logout", Requirement::PermitAll),
                ("/api/**", Requirement::PermitAll),
                ("/admin/**", Requirement::PermitAll),
                ("/vscode/**", Requirement::PermitAll),
            ]),
        }
    }

    /// The table for [`PolicyMode::Permissive`].
    ///
    /// All of `/user/**` is permitted at the gate; the user endpoints check
    /// the principal themselves so that CORS preflights always succeed.
    pub fn permissive_mode() -> Self {
        Self {
            rules: rules(&[
                ("/user/**", Requirement::PermitAll),
                ("/login/**", Requirement::PermitAll),
                ("/logout", Requirement::PermitAll),
                ("/api/**", Requirement::PermitAll),
                ("/admin/**", Requirement::PermitAll),
                ("/vscode/**", Requirement::PermitAll),
            ]),
        }
    }

    /// Build the table for the given mode.
    pub fn for_mode(mode: PolicyMode) -> Self {
        match mode {
            PolicyMode::Default => Self::default_mode(),
            PolicyMode::Permissive => Self::permissive_mode(),
        }
    }

    /// Evaluate a request path. Pure function: first matching rule wins,
    /// no match is a deny.
    pub fn evaluate(&self, path: &str) -> AccessDecision {
        for rule in &self.rules {
            if rule.pattern.matches(path) {
                return match rule.requirement {
                    Requirement::Authenticated => AccessDecision::Authenticated,
                    Requirement::PermitAll => AccessDecision::PermitAll,
                };
            }
        }
        AccessDecision::Deny
    }
}

fn rules(entries: &[(&str, Requirement)]) -> Vec<AccessRule> {
    entries
        .iter()
        .map(|(pattern, requirement)| AccessRule {
            pattern: PathPattern::new(pattern),
            requirement: *requirement,
        })
        .collect()
}

/// Pick the policy mode from the configured web UI redirect target.
///
/// Permissive iff the target is a valid absolute URL. Evaluated exactly once
/// at startup; a present-but-malformed value degrades to Default rather than
/// failing startup.
pub fn select_policy_mode(redirect: &RedirectTarget) -> PolicyMode {
    if redirect.is_absolute() {
        PolicyMode::Permissive
    } else {
        PolicyMode::Default
    }
}

/// A static set of path patterns, used for the CSRF exemption list and the
/// documentation bypass list.
#[derive(Debug, Clone)]
pub struct PatternSet {
    patterns: Vec<PathPattern>,
}

impl PatternSet {
    pub fn new(patterns: &[&str]) -> Self {
        Self {
            patterns: patterns.iter().map(|p| PathPattern::new(p)).collect(),
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(path))
    }

    /// Endpoints that authenticate via explicit bearer access tokens
    /// (publishing CLI, extension hosts) rather than a session cookie.
    /// CSRF protection does not apply to them and would break those clients.
    pub fn csrf_exemptions() -> Self {
        Self::new(&[
            "/api/-/publish",
            "/api/-/namespace/create",
            "/admin/**",
            "/vscode/**",
        ])
    }

    /// Static documentation paths excluded from the entire security
    /// pipeline. Evaluated before anything else.
    pub fn doc_bypass() -> Self {
        Self::new(&[
            "/v2/api-docs",
            "/swagger-resources/**",
            "/swagger-ui/**",
            "/webjars/**",
        ])
    }
}

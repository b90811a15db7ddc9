use serde::{Deserialize, Serialize};
use url::Url;

/// Web UI configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebUiConfig {
    /// URL of the web UI frontend. When this is a valid absolute URL the
    /// gateway assumes the UI is served from a separate origin: the
    /// permissive access policy is selected and successful logins/logouts
    /// redirect here. Empty or relative values leave the default policy in
    /// place and redirect to `/`.
    #[serde(default)]
    pub url: String,
}

impl WebUiConfig {
    pub fn redirect_target(&self) -> RedirectTarget {
        RedirectTarget::new(self.url.clone())
    }
}

/// The configured post-login/post-logout destination.
///
/// Wraps the raw configured string; validity is "non-empty and parses as an
/// absolute URL with scheme and host". Invalid values are not an error, they
/// just mean "no external UI" (see the policy selector).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedirectTarget {
    raw: String,
}

impl RedirectTarget {
    pub fn new(raw: String) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The parsed URL, if the raw value is a valid absolute URL.
    pub fn absolute(&self) -> Option<Url> {
        if self.raw.is_empty() {
            return None;
        }
        Url::parse(&self.raw).ok().filter(|u| u.has_host())
    }

    pub fn is_absolute(&self) -> bool {
        self.absolute().is_some()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("", false)]
    #[case("/relative", false)]
    #[case("relative/path", false)]
    #[case("mailto:admin@example.com", false)] // no authority
    #[case("https://example.com/ui", true)]
    #[case("http://localhost:3000/", true)]
    fn absolute_detection(#[case] raw: &str, #[case] expected: bool) {
        assert_eq!(RedirectTarget::new(raw.to_string()).is_absolute(), expected);
    }

    #[test]
    fn absolute_preserves_path() {
        let target = RedirectTarget::new("https://example.com/ui".to_string());
        assert_eq!(
            target.absolute().expect("absolute").as_str(),
            "https://example.com/ui"
        );
    }
}

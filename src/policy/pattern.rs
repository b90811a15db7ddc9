//! Ant-style path pattern matching.
//!
//! Access rules, CSRF exemptions, and the documentation bypass list are all
//! expressed as glob patterns over `/`-separated path segments:
//!
//! - `*` matches any run of characters within a single segment
//! - `**` matches zero or more whole segments
//! - everything else matches literally
//!
//! So `/user/token/**` matches `/user/token` and `/user/token/delete/abc`,
//! and `/api/*/*/review/**` matches `/api/ns/ext/review` but not
//! `/api/ns/review`.

/// A compiled path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// Literal segment, matched byte-for-byte.
    Literal(String),
    /// Segment containing `*` wildcards (e.g. `ext-*`).
    Glob(String),
    /// `**`: zero or more segments.
    AnySuffix,
}

impl PathPattern {
    /// Compile a pattern string.
    pub fn new(pattern: &str) -> Self {
        let segments = pattern
            .trim_start_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| {
                if s == "**" {
                    Segment::AnySuffix
                } else if s.contains('*') {
                    Segment::Glob(s.to_string())
                } else {
                    Segment::Literal(s.to_string())
                }
            })
            .collect();

        Self { segments }
    }

    /// Check whether a request path matches this pattern.
    ///
    /// Query strings must be stripped by the caller; only the path component
    /// is matched. Trailing slashes are ignored.
    pub fn matches(&self, path: &str) -> bool {
        let path_segments: Vec<&str> = path
            .trim_start_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();

        match_segments(&self.segments, &path_segments)
    }
}

impl std::fmt::Display for PathPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for segment in &self.segments {
            match segment {
                Segment::Literal(s) | Segment::Glob(s) => write!(f, "/{}", s)?,
                Segment::AnySuffix => write!(f, "/**")?,
            }
        }
        Ok(())
    }
}

fn match_segments(pattern: &[Segment], path: &[&str]) -> bool {
    match pattern.first() {
        None => path.is_empty(),
        Some(Segment::AnySuffix) => {
            // `**` matches zero or more segments: try consuming nothing,
            // then one segment at a time.
            if match_segments(&pattern[1..], path) {
                return true;
            }
            (1..=path.len()).any(|n| match_segments(&pattern[1..], &path[n..]))
        }
        Some(first) => match path.first() {
            None => false,
            Some(seg) => match_one(first, seg) && match_segments(&pattern[1..], &path[1..]),
        },
    }
}

fn match_one(pattern: &Segment, segment: &str) -> bool {
    match pattern {
        Segment::Literal(lit) => lit == segment,
        Segment::Glob(glob) => match_glob(glob.as_bytes(), segment.as_bytes()),
        Segment::AnySuffix => unreachable!("handled in match_segments"),
    }
}

/// Match a single segment against a glob containing `*` wildcards.
fn match_glob(pattern: &[u8], text: &[u8]) -> bool {
    match pattern.split_first() {
        None => text.is_empty(),
        Some((b'*', rest)) => (0..=text.len()).any(|n| match_glob(rest, &text[n..])),
        Some((c, rest)) => match text.split_first() {
            Some((t, text_rest)) => c == t && match_glob(rest, text_rest),
            None => false,
        },
    }
}

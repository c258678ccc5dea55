//! Path pattern matching.
//!
//! # Responsibilities
//! - Classify pattern segments (literal, `*` wildcard, `:name` parameter)
//! - Test a request path against a pattern with prefix semantics
//! - Strip the segments consumed by a matched pattern
//! - Extract named parameters
//!
//! # Design Decisions
//! - Literal segments compare case-insensitively
//! - A pattern matches any path with at least as many segments
//! - Patterns are parsed once at registration; the free functions below
//!   parse on the fly and exist for ad-hoc use
//! - No regex: one pass over the segments

use std::collections::HashMap;
use std::fmt;

/// A single classified pattern segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Literal text, stored lowercased.
    Literal(String),
    /// `*`: exactly one segment, any value.
    Wildcard,
    /// `:name`: exactly one non-empty segment, bound under `name`.
    Param(String),
}

impl Segment {
    /// Classify a raw pattern segment.
    pub fn classify(raw: &str) -> Self {
        if raw == "*" {
            return Segment::Wildcard;
        }
        match raw.strip_prefix(':') {
            Some(name) if !name.is_empty() => Segment::Param(name.to_string()),
            _ => Segment::Literal(raw.to_lowercase()),
        }
    }

    /// Returns true if this segment accepts the given request segment.
    pub fn matches(&self, path_segment: &str) -> bool {
        match self {
            Segment::Wildcard => true,
            Segment::Param(_) => !path_segment.is_empty(),
            Segment::Literal(text) => *text == path_segment.to_lowercase(),
        }
    }
}

/// A parsed `/`-delimited path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Parse a pattern such as `/api/users/:id/*`.
    pub fn parse(raw: &str) -> Self {
        let segments = split_segments(raw).map(Segment::classify).collect();
        Self {
            raw: normalize_path(raw).into_owned(),
            segments,
        }
    }

    /// The normalized pattern text.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of request segments this pattern consumes.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns true if every pattern segment accepts the request segment at
    /// the same index. Extra trailing request segments are accepted.
    pub fn matches(&self, path: &str) -> bool {
        let mut path_segments = split_segments(path);
        self.segments.iter().all(|segment| {
            path_segments
                .next()
                .map(|part| segment.matches(part))
                .unwrap_or(false)
        })
    }

    /// Remove as many leading segments from `path` as this pattern has.
    pub fn strip(&self, path: &str) -> String {
        let remainder: Vec<&str> = split_segments(path).skip(self.segments.len()).collect();
        if remainder.is_empty() {
            "/".to_string()
        } else {
            format!("/{}", remainder.join("/"))
        }
    }

    /// Bind every `:name` segment to the request segment at its index.
    pub fn params(&self, path: &str) -> HashMap<String, String> {
        self.segments
            .iter()
            .zip(split_segments(path))
            .filter_map(|(segment, part)| match segment {
                Segment::Param(name) => Some((name.clone(), part.to_string())),
                _ => None,
            })
            .collect()
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Strip a single trailing slash, keeping `/` as is. A missing leading
/// slash is added.
pub fn normalize_path(path: &str) -> std::borrow::Cow<'_, str> {
    let trimmed = match path.strip_suffix('/') {
        Some(rest) if !rest.is_empty() => rest,
        _ => path,
    };
    if trimmed.starts_with('/') {
        std::borrow::Cow::Borrowed(trimmed)
    } else {
        std::borrow::Cow::Owned(format!("/{}", trimmed))
    }
}

/// Split a path into segments, dropping the empty segment before the
/// leading slash. `/` yields a single empty segment.
fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    let path = match path.strip_suffix('/') {
        Some(rest) if !rest.is_empty() => rest,
        _ => path,
    };
    let path = path.strip_prefix('/').unwrap_or(path);
    path.split('/')
}

/// Returns true if `pattern_segment` accepts `path_segment`.
pub fn segment_matches(pattern_segment: &str, path_segment: &str) -> bool {
    Segment::classify(pattern_segment).matches(path_segment)
}

/// Returns true if `request_path` satisfies `pattern_path` (prefix semantics).
pub fn path_matches(request_path: &str, pattern_path: &str) -> bool {
    PathPattern::parse(pattern_path).matches(request_path)
}

/// Remove the segments consumed by `consumed_pattern` from `request_path`.
pub fn strip_prefix(consumed_pattern: &str, request_path: &str) -> String {
    PathPattern::parse(consumed_pattern).strip(request_path)
}

/// Extract `:name` parameters of `pattern_path` from `request_path`.
pub fn extract_params(request_path: &str, pattern_path: &str) -> HashMap<String, String> {
    PathPattern::parse(pattern_path).params(request_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_classification() {
        assert_eq!(Segment::classify("*"), Segment::Wildcard);
        assert_eq!(Segment::classify(":id"), Segment::Param("id".into()));
        assert_eq!(Segment::classify(":pic_id2"), Segment::Param("pic_id2".into()));
        assert_eq!(Segment::classify("Users"), Segment::Literal("users".into()));
        assert_eq!(Segment::classify(":user-id"), Segment::Param("user-id".into()));
        // A lone colon is not a parameter
        assert_eq!(Segment::classify(":"), Segment::Literal(":".into()));
    }

    #[test]
    fn test_hyphenated_param_binds() {
        let pattern = PathPattern::parse("/users/:user-id");
        assert!(pattern.matches("/users/42"));
        assert_eq!(pattern.params("/users/42").get("user-id").map(String::as_str), Some("42"));
    }

    #[test]
    fn test_segment_matches() {
        assert!(segment_matches("*", "anything"));
        assert!(segment_matches(":name", "john"));
        assert!(!segment_matches(":name", ""));
        assert!(segment_matches("users", "USERS"));
        assert!(!segment_matches("users", "posts"));
    }

    #[test]
    fn test_prefix_semantics() {
        assert!(path_matches("/api/users", "/api"));
        assert!(path_matches("/API/Users/42", "/api/users/:id"));
        assert!(path_matches("/a/b/c", "/*/b"));
        assert!(!path_matches("/api", "/api/users"));
        assert!(!path_matches("/users", "/api"));
    }

    #[test]
    fn test_root_pattern_only_matches_root() {
        assert!(path_matches("/", "/"));
        assert!(!path_matches("/api", "/"));
        assert!(path_matches("/", "*"));
        assert!(!path_matches("/", "/:id"));
    }

    #[test]
    fn test_trailing_slash_normalized() {
        assert!(path_matches("/api/users/", "/api/users"));
        assert!(path_matches("/api/users", "/api/users/"));
        assert_eq!(normalize_path("/a/b/"), "/a/b");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("a/b"), "/a/b");
    }

    #[test]
    fn test_extract_params() {
        let params = extract_params(
            "/api/users/john/pictures/1234",
            "/api/users/:username/pictures/:picId",
        );
        assert_eq!(params.len(), 2);
        assert_eq!(params["username"], "john");
        assert_eq!(params["picId"], "1234");
    }

    #[test]
    fn test_strip_prefix() {
        assert_eq!(strip_prefix("/app", "/app/users/42"), "/users/42");
        assert_eq!(strip_prefix("/home", "/home"), "/");
        assert_eq!(strip_prefix("/", "/"), "/");
        assert_eq!(strip_prefix("/a/:b", "/a/b/c/"), "/c");
    }

    #[test]
    fn test_pattern_display() {
        let pattern = PathPattern::parse("/api/time/:id/");
        assert_eq!(pattern.to_string(), "/api/time/:id");
        assert_eq!(pattern.len(), 3);
    }
}

//! Route pattern parsing.
//!
//! Syntax: `/static/{param}/{*rest}`.
//! - `{name}` matches exactly one non-empty segment
//! - `{*name}` matches the remainder of the path and must come last
//! - a trailing slash is significant (`/a/` ≠ `/a`)

use std::collections::HashSet;
use std::fmt;

use crate::error::RouteError;

/// One segment of a compiled pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Static(String),
    Param(String),
    CatchAll(String),
}

impl Segment {
    /// Whether two segments occupy the same trie slot (names ignored).
    pub fn same_shape(&self, other: &Segment) -> bool {
        match (self, other) {
            (Segment::Static(a), Segment::Static(b)) => a == b,
            (Segment::Param(_), Segment::Param(_)) => true,
            (Segment::CatchAll(_), Segment::CatchAll(_)) => true,
            _ => false,
        }
    }
}

/// A parsed, validated route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    raw: String,
    segments: Vec<Segment>,
}

impl Pattern {
    pub fn parse(raw: &str) -> Result<Self, RouteError> {
        let rest = raw
            .strip_prefix('/')
            .ok_or_else(|| RouteError::invalid(raw, "must start with `/`"))?;

        let mut segments = Vec::new();
        let mut seen = HashSet::new();

        if !rest.is_empty() {
            let parts: Vec<&str> = rest.split('/').collect();
            let last = parts.len() - 1;

            for (i, part) in parts.iter().enumerate() {
                // A trailing empty segment encodes the trailing slash.
                if part.is_empty() && i != last {
                    return Err(RouteError::invalid(raw, "empty path segment"));
                }

                let segment = parse_segment(raw, part)?;
                if let Segment::Param(name) | Segment::CatchAll(name) = &segment {
                    if !seen.insert(name.clone()) {
                        return Err(RouteError::invalid(
                            raw,
                            format!("duplicate parameter `{name}`"),
                        ));
                    }
                }
                if matches!(segment, Segment::CatchAll(_)) && i != last {
                    return Err(RouteError::invalid(raw, "catch-all must be the last segment"));
                }
                segments.push(segment);
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// Prefix `path` with a scope prefix (`/api` + `/users` → `/api/users`).
    pub fn join(prefix: &str, path: &str) -> String {
        let prefix = prefix.trim_end_matches('/');
        match path {
            "" | "/" if !prefix.is_empty() => prefix.to_string(),
            _ if path.starts_with('/') => format!("{prefix}{path}"),
            _ => format!("{prefix}/{path}"),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Parameter names in positional order (catch-all included).
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(n) | Segment::CatchAll(n) => Some(n.as_str()),
            Segment::Static(_) => None,
        })
    }

    pub fn has_catch_all(&self) -> bool {
        matches!(self.segments.last(), Some(Segment::CatchAll(_)))
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn parse_segment(raw: &str, part: &str) -> Result<Segment, RouteError> {
    let Some(inner) = part.strip_prefix('{') else {
        if part.contains('{') || part.contains('}') {
            return Err(RouteError::invalid(raw, format!("unbalanced braces in `{part}`")));
        }
        return Ok(Segment::Static(part.to_string()));
    };

    let inner = inner
        .strip_suffix('}')
        .ok_or_else(|| RouteError::invalid(raw, format!("unbalanced braces in `{part}`")))?;

    let (catch_all, name) = match inner.strip_prefix('*') {
        Some(name) => (true, name),
        None => (false, inner),
    };

    if name.is_empty() {
        return Err(RouteError::invalid(raw, "empty parameter name"));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(RouteError::invalid(
            raw,
            format!("invalid parameter name `{name}`"),
        ));
    }

    Ok(if catch_all {
        Segment::CatchAll(name.to_string())
    } else {
        Segment::Param(name.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_root() {
        let p = Pattern::parse("/").unwrap();
        assert!(p.segments().is_empty());
    }

    #[test]
    fn parses_mixed_segments() {
        let p = Pattern::parse("/users/{id}/files/{*path}").unwrap();
        assert_eq!(
            p.segments(),
            &[
                Segment::Static("users".into()),
                Segment::Param("id".into()),
                Segment::Static("files".into()),
                Segment::CatchAll("path".into()),
            ]
        );
        assert_eq!(p.param_names().collect::<Vec<_>>(), vec!["id", "path"]);
        assert!(p.has_catch_all());
    }

    #[test]
    fn trailing_slash_is_significant() {
        let p = Pattern::parse("/docs/").unwrap();
        assert_eq!(
            p.segments(),
            &[Segment::Static("docs".into()), Segment::Static(String::new())]
        );
        assert_ne!(p, Pattern::parse("/docs").unwrap());
    }

    #[test]
    fn rejects_malformed_patterns() {
        for bad in [
            "users",
            "/a//b",
            "/{}",
            "/{*}",
            "/{id",
            "/id}",
            "/x{id}",
            "/{a-b}",
            "/{id}/{id}",
            "/{*rest}/tail",
        ] {
            assert!(
                matches!(Pattern::parse(bad), Err(RouteError::InvalidPattern { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn join_prefixes() {
        assert_eq!(Pattern::join("/api", "/"), "/api");
        assert_eq!(Pattern::join("/api/", "/users"), "/api/users");
        assert_eq!(Pattern::join("/api", "users"), "/api/users");
        assert_eq!(Pattern::join("", "/"), "/");
    }
}

//! Route matching logic.
//!
//! # Responsibilities
//! - Resolve `(method, path)` to the most specific route that accepts the method
//! - Extract and percent-decode path parameters
//! - Report `405` candidates when the path exists under other methods
//!
//! # Design Decisions
//! - Per segment, static beats param beats catch-all
//! - Depth-first walk with backtracking in that order, so the first complete
//!   match is the most specific one
//! - Captured values are decoded; static segments are compared decoded
//! - Query strings never reach the matcher

use std::borrow::Cow;
use std::ops::Range;

use http::Method;
use percent_encoding::percent_decode_str;

use crate::routing::params::Params;
use crate::routing::table::{Node, RouteEntry, RouteTable};

/// Result of a table lookup.
#[derive(Debug)]
pub enum Lookup<'a, T> {
    Found {
        route: &'a RouteEntry<T>,
        endpoint: &'a T,
        params: Params,
        /// A `HEAD` request is being served by the `GET` endpoint.
        head_via_get: bool,
    },
    MethodNotAllowed {
        allowed: Vec<Method>,
    },
    NotFound,
    /// A captured parameter is not valid UTF-8 once decoded.
    InvalidParam {
        name: String,
    },
}

impl<T> RouteTable<T> {
    /// Find the best route for `method` on `path`.
    pub fn find(&self, method: &Method, path: &str) -> Lookup<'_, T> {
        let Some(segments) = split(path) else {
            return Lookup::NotFound;
        };

        let mut found: Option<(usize, Vec<Range<usize>>, bool)> = None;
        let mut allowed: Vec<Method> = Vec::new();

        self.walk(&self.root, path, &segments, 0, &mut Vec::new(), &mut |idx, captures| {
            let entry = &self.routes[idx];
            if entry.get(method).is_some() {
                found = Some((idx, captures.to_vec(), false));
                return true;
            }
            if *method == Method::HEAD && entry.get(&Method::GET).is_some() {
                found = Some((idx, captures.to_vec(), true));
                return true;
            }
            for m in entry.methods() {
                if !allowed.contains(m) {
                    allowed.push(m.clone());
                }
            }
            false
        });

        match found {
            Some((idx, captures, head_via_get)) => {
                let route = &self.routes[idx];
                let endpoint = if head_via_get {
                    route.get(&Method::GET)
                } else {
                    route.get(method)
                };
                let Some(endpoint) = endpoint else {
                    return Lookup::NotFound;
                };
                match decode_params(route, path, &captures) {
                    Ok(params) => Lookup::Found {
                        route,
                        endpoint,
                        params,
                        head_via_get,
                    },
                    Err(name) => Lookup::InvalidParam { name },
                }
            }
            None if allowed.is_empty() => Lookup::NotFound,
            None => {
                if allowed.contains(&Method::GET) && !allowed.contains(&Method::HEAD) {
                    allowed.push(Method::HEAD);
                }
                allowed.sort_by_key(method_rank);
                Lookup::MethodNotAllowed { allowed }
            }
        }
    }

    /// Whether any route matches `path`, regardless of method.
    pub fn matches_path(&self, path: &str) -> bool {
        let Some(segments) = split(path) else {
            return false;
        };
        let mut hit = false;
        self.walk(&self.root, path, &segments, 0, &mut Vec::new(), &mut |_, _| {
            hit = true;
            true
        });
        hit
    }

    /// Visit complete matches in priority order until `visit` returns `true`.
    fn walk(
        &self,
        node: &Node,
        path: &str,
        segments: &[(usize, &str)],
        depth: usize,
        captures: &mut Vec<Range<usize>>,
        visit: &mut dyn FnMut(usize, &[Range<usize>]) -> bool,
    ) -> bool {
        let Some(&(start, segment)) = segments.get(depth) else {
            return node.route.is_some_and(|idx| visit(idx, captures));
        };

        if let Some(child) = node.statics.get(&*decode_static(segment)) {
            if self.walk(child, path, segments, depth + 1, captures, visit) {
                return true;
            }
        }

        if !segment.is_empty() {
            if let Some(child) = &node.param {
                captures.push(start..start + segment.len());
                let stop = self.walk(child, path, segments, depth + 1, captures, visit);
                captures.pop();
                if stop {
                    return true;
                }
            }
        }

        if let Some(idx) = node.catch_all {
            if start < path.len() {
                captures.push(start..path.len());
                let stop = visit(idx, captures);
                captures.pop();
                if stop {
                    return true;
                }
            }
        }

        false
    }
}

/// Static segments are compared decoded, so `/users/%6De` reaches `/users/me`.
/// Undecodable input is compared as-is.
fn decode_static(segment: &str) -> Cow<'_, str> {
    if !segment.contains('%') {
        return Cow::Borrowed(segment);
    }
    percent_decode_str(segment)
        .decode_utf8()
        .unwrap_or(Cow::Borrowed(segment))
}

/// Split a path into `(offset, segment)` pairs. `/` yields no segments.
fn split(path: &str) -> Option<Vec<(usize, &str)>> {
    let rest = path.strip_prefix('/')?;
    if rest.is_empty() {
        return Some(Vec::new());
    }
    let mut offset = 1;
    let mut out = Vec::new();
    for segment in rest.split('/') {
        out.push((offset, segment));
        offset += segment.len() + 1;
    }
    Some(out)
}

fn decode_params<T>(
    route: &RouteEntry<T>,
    path: &str,
    captures: &[Range<usize>],
) -> Result<Params, String> {
    let mut params = Params::new();
    for (name, range) in route.pattern().param_names().zip(captures) {
        let raw = &path[range.clone()];
        let value: Cow<'_, str> = percent_decode_str(raw)
            .decode_utf8()
            .map_err(|_| name.to_string())?;
        params.push(name, value.into_owned());
    }
    Ok(params)
}

/// Canonical ordering for `allow` headers.
pub(crate) fn method_rank(method: &Method) -> (u8, String) {
    let rank = match method.as_str() {
        "GET" => 0,
        "HEAD" => 1,
        "POST" => 2,
        "PUT" => 3,
        "PATCH" => 4,
        "DELETE" => 5,
        "OPTIONS" => 6,
        _ => 7,
    };
    (rank, method.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::pattern::Pattern;

    fn table(routes: &[(Method, &'static str)]) -> RouteTable<&'static str> {
        let mut t = RouteTable::new();
        for (m, p) in routes {
            t.insert(m.clone(), Pattern::parse(p).unwrap(), *p).unwrap();
        }
        t
    }

    fn found<'a>(t: &'a RouteTable<&'static str>, method: Method, path: &str) -> (&'a str, Params) {
        match t.find(&method, path) {
            Lookup::Found { endpoint, params, .. } => (*endpoint, params),
            other => panic!("expected match for {method} {path}, got {other:?}"),
        }
    }

    #[test]
    fn static_routes() {
        let t = table(&[(Method::GET, "/"), (Method::GET, "/hello/world")]);
        assert_eq!(found(&t, Method::GET, "/").0, "/");
        assert_eq!(found(&t, Method::GET, "/hello/world").0, "/hello/world");
        assert!(matches!(t.find(&Method::GET, "/hello"), Lookup::NotFound));
        assert!(matches!(t.find(&Method::GET, "/hello/world/"), Lookup::NotFound));
    }

    #[test]
    fn extracts_params() {
        let t = table(&[
            (Method::GET, "/users/{id}"),
            (Method::POST, "/users/{id}/posts/{post_id}"),
        ]);

        let (_, params) = found(&t, Method::GET, "/users/123");
        assert_eq!(params.get("id"), Some("123"));

        let (_, params) = found(&t, Method::POST, "/users/123/posts/abc");
        assert_eq!(params.get("id"), Some("123"));
        assert_eq!(params.get("post_id"), Some("abc"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn static_beats_param_beats_catch_all() {
        let t = table(&[
            (Method::GET, "/users/new"),
            (Method::GET, "/users/{id}"),
            (Method::GET, "/users/{*rest}"),
        ]);
        assert_eq!(found(&t, Method::GET, "/users/new").0, "/users/new");
        assert_eq!(found(&t, Method::GET, "/users/7").0, "/users/{id}");
        assert_eq!(found(&t, Method::GET, "/users/7/avatar").0, "/users/{*rest}");
    }

    #[test]
    fn backtracks_out_of_dead_static_branch() {
        let t = table(&[
            (Method::GET, "/users/new/form"),
            (Method::GET, "/users/{id}/edit"),
        ]);
        let (endpoint, params) = found(&t, Method::GET, "/users/new/edit");
        assert_eq!(endpoint, "/users/{id}/edit");
        assert_eq!(params.get("id"), Some("new"));
    }

    #[test]
    fn catch_all_captures_remainder() {
        let t = table(&[(Method::GET, "/assets/{*path}")]);
        let (_, params) = found(&t, Method::GET, "/assets/js/app.js");
        assert_eq!(params.get("path"), Some("js/app.js"));

        let (_, params) = found(&t, Method::GET, "/assets/css/");
        assert_eq!(params.get("path"), Some("css/"));

        assert!(matches!(t.find(&Method::GET, "/assets/"), Lookup::NotFound));
        assert!(matches!(t.find(&Method::GET, "/assets"), Lookup::NotFound));
    }

    #[test]
    fn empty_segment_never_binds_param() {
        let t = table(&[(Method::GET, "/users/{id}")]);
        assert!(matches!(t.find(&Method::GET, "/users/"), Lookup::NotFound));
    }

    #[test]
    fn params_are_percent_decoded() {
        let t = table(&[(Method::GET, "/tags/{tag}")]);
        let (_, params) = found(&t, Method::GET, "/tags/rust%20lang");
        assert_eq!(params.get("tag"), Some("rust lang"));

        assert!(matches!(
            t.find(&Method::GET, "/tags/%FF"),
            Lookup::InvalidParam { ref name } if name == "tag"
        ));
    }

    #[test]
    fn method_aware_fallthrough() {
        let t = table(&[
            (Method::GET, "/users/new"),
            (Method::POST, "/users/{id}"),
        ]);
        // The static route lacks POST, so the param route answers.
        let (endpoint, params) = found(&t, Method::POST, "/users/new");
        assert_eq!(endpoint, "/users/{id}");
        assert_eq!(params.get("id"), Some("new"));
    }

    #[test]
    fn method_not_allowed_lists_union() {
        let t = table(&[
            (Method::DELETE, "/users/{id}"),
            (Method::GET, "/users/{*rest}"),
        ]);
        match t.find(&Method::PUT, "/users/9") {
            Lookup::MethodNotAllowed { allowed } => {
                assert_eq!(allowed, vec![Method::GET, Method::HEAD, Method::DELETE]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn head_falls_back_to_get() {
        let t = table(&[(Method::GET, "/page")]);
        match t.find(&Method::HEAD, "/page") {
            Lookup::Found { head_via_get, endpoint, .. } => {
                assert!(head_via_get);
                assert_eq!(*endpoint, "/page");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn explicit_head_wins() {
        let t = table(&[(Method::GET, "/page"), (Method::HEAD, "/page")]);
        assert!(matches!(
            t.find(&Method::HEAD, "/page"),
            Lookup::Found { head_via_get: false, .. }
        ));
    }

    #[test]
    fn non_origin_form_is_not_found() {
        let t = table(&[(Method::OPTIONS, "/")]);
        assert!(matches!(t.find(&Method::OPTIONS, "*"), Lookup::NotFound));
        assert!(!t.matches_path("*"));
        assert!(t.matches_path("/"));
    }

    #[test]
    fn encoded_static_segment_matches_static_route() {
        let t = table(&[(Method::GET, "/users/me"), (Method::GET, "/users/{id}")]);
        assert_eq!(found(&t, Method::GET, "/users/%6De").0, "/users/me");

        let (route, params) = found(&t, Method::GET, "/users/%6Dx");
        assert_eq!(route, "/users/{id}");
        assert_eq!(params.get("id"), Some("mx"));

        // Undecodable segments still fall through to the param route.
        assert!(matches!(
            t.find(&Method::GET, "/users/%FF"),
            Lookup::InvalidParam { .. }
        ));
    }
}

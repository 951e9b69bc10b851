//! Route table: a segment trie of compiled patterns.
//!
//! # Responsibilities
//! - Store compiled routes, one entry per distinct pattern
//! - Map each pattern to one endpoint per HTTP method
//! - Reject ambiguous and duplicate registrations up front
//!
//! # Design Decisions
//! - Immutable after construction (shared via `Arc`, no locks)
//! - Trie nodes hold static children, at most one param child and at most
//!   one catch-all; param names live on the pattern, not the node
//! - Patterns of the same shape must agree on param names, otherwise the
//!   registration is a conflict

use std::collections::HashMap;

use http::Method;

use crate::error::RouteError;
use crate::routing::pattern::{Pattern, Segment};

/// All endpoints registered under one pattern.
#[derive(Debug)]
pub struct RouteEntry<T> {
    pattern: Pattern,
    endpoints: Vec<(Method, T)>,
}

impl<T> RouteEntry<T> {
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn get(&self, method: &Method) -> Option<&T> {
        self.endpoints
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, t)| t)
    }

    pub fn methods(&self) -> impl Iterator<Item = &Method> {
        self.endpoints.iter().map(|(m, _)| m)
    }
}

#[derive(Debug, Default)]
pub(crate) struct Node {
    pub(crate) statics: HashMap<String, Node>,
    pub(crate) param: Option<Box<Node>>,
    pub(crate) catch_all: Option<usize>,
    pub(crate) route: Option<usize>,
}

/// Compiled route table.
#[derive(Debug)]
pub struct RouteTable<T> {
    pub(crate) root: Node,
    pub(crate) routes: Vec<RouteEntry<T>>,
}

impl<T> Default for RouteTable<T> {
    fn default() -> Self {
        Self {
            root: Node::default(),
            routes: Vec::new(),
        }
    }
}

impl<T> RouteTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `value` for `method` on `pattern`.
    pub fn insert(&mut self, method: Method, pattern: Pattern, value: T) -> Result<(), RouteError> {
        let mut node = &mut self.root;
        for segment in pattern.segments() {
            match segment {
                Segment::Static(text) => {
                    node = node.statics.entry(text.clone()).or_default();
                }
                Segment::Param(_) => {
                    node = &mut **node.param.get_or_insert_with(Box::default);
                }
                // Always last; handled by the slot selection below.
                Segment::CatchAll(_) => {}
            }
        }

        let slot = if pattern.has_catch_all() {
            &mut node.catch_all
        } else {
            &mut node.route
        };

        match *slot {
            Some(idx) => {
                let entry = &mut self.routes[idx];
                if entry.pattern != pattern {
                    return Err(RouteError::Conflict {
                        pattern: pattern.as_str().to_string(),
                        existing: entry.pattern.as_str().to_string(),
                    });
                }
                if entry.get(&method).is_some() {
                    return Err(RouteError::Duplicate {
                        method: method.to_string(),
                        pattern: pattern.as_str().to_string(),
                    });
                }
                entry.endpoints.push((method, value));
            }
            None => {
                *slot = Some(self.routes.len());
                self.routes.push(RouteEntry {
                    pattern,
                    endpoints: vec![(method, value)],
                });
            }
        }
        Ok(())
    }

    /// Registered `(method, pattern)` pairs.
    pub fn routes(&self) -> impl Iterator<Item = (&Method, &Pattern)> {
        self.routes
            .iter()
            .flat_map(|e| e.endpoints.iter().map(move |(m, _)| (m, &e.pattern)))
    }

    pub fn len(&self) -> usize {
        self.routes.iter().map(|e| e.endpoints.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

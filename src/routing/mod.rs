//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Registration (at startup):
//!     (method, "/users/{id}")
//!     → pattern.rs (parse & validate)
//!     → table.rs (insert into segment trie, reject conflicts)
//!     → Freeze as immutable RouteTable
//!
//! Incoming Request (method, path):
//!     → matcher.rs (walk trie: static → param → catch-all)
//!     → Return: Found { endpoint, params } | MethodNotAllowed | NotFound
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in the hot path
//! - Deterministic: same input always matches same route
//! - Most specific route that accepts the method wins

pub mod matcher;
pub mod params;
pub mod pattern;
pub mod table;

pub use matcher::Lookup;
pub use params::Params;
pub use pattern::{Pattern, Segment};
pub use table::{RouteEntry, RouteTable};

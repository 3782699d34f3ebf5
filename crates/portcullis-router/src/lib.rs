//! Route pattern compiler and prefix-tree router for Portcullis.
//!
//! This crate turns route patterns such as `/{username}/{reponame}/commit/{sha:[a-f0-9]{7,40}}`
//! into a deterministic prefix tree and resolves request paths against it.
//! The tree is generic over its entries; the web layer stores handler chains,
//! tests and benchmarks store plain strings.
//!
//! # Features
//!
//! - **Literal, parameter, regex and wildcard segments**
//! - **Deterministic priority**: a matching literal commits; otherwise parameters in registration order, then wildcard
//! - **Regex fall-through**: a constrained parameter that rejects a segment yields to its siblings
//! - **Per-method tables** with any-method entries and `HEAD`-from-`GET` fallback
//! - **Percent-decoded** parameter values
//!
//! # Example
//!
//! ```rust
//! use portcullis_router::{Lookup, RoutePattern, RouteTree};
//! use http::Method;
//!
//! let mut tree = RouteTree::new();
//! for (pattern, entry) in [
//!     ("/explore/repos", "explore"),
//!     ("/{username}", "profile"),
//!     ("/{username}/{reponame}", "repo"),
//!     ("/{username}/{reponame}/raw/*", "raw"),
//! ] {
//!     tree.insert(&RoutePattern::parse(pattern).unwrap(), Method::GET.into(), entry).unwrap();
//! }
//!
//! let Lookup::Found(found) = tree.lookup(&Method::GET, "/alice/proj/raw/docs/a.md", true) else {
//!     panic!("no match");
//! };
//! assert_eq!(*found.entry, "raw");
//! assert_eq!(found.params.get("username"), Some("alice"));
//! assert_eq!(found.params.get("*"), Some("docs/a.md"));
//! ```
//!
//! # Architecture
//!
//! ```text
//!                    (root)
//!                      │
//!              ┌───────┴─────────┐
//!              │                 │
//!          "explore"        {username}  [GET]
//!              │                 │
//!          "repos"          {reponame}  [GET]
//!           [GET]                │
//!                              "raw"
//!                                │
//!                                *      [GET]
//! ```

mod error;
mod method_router;
mod node;
mod params;
mod pattern;
mod router;

pub use error::CompileError;
pub use method_router::{MethodFilter, MethodTable, Resolution};
pub use params::Params;
pub use pattern::{join_paths, RoutePattern, Segment, WILDCARD_NAME};
pub use router::{Lookup, RouteTree};

/// A resolved route: the winning entry and the parameters bound on the way.
#[derive(Debug)]
pub struct RouteMatch<'a, T> {
    /// The entry registered for the route and method
    pub entry: &'a T,
    /// Extracted path parameters, in pattern order
    pub params: Params,
    /// The pattern the entry was registered under
    pub pattern: &'a RoutePattern,
    /// How the method table chose the entry
    pub resolution: Resolution,
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    #[test]
    fn test_basic_routing() {
        let mut tree = RouteTree::new();
        tree.insert(&RoutePattern::parse("/user/login").unwrap(), Method::GET.into(), "login")
            .unwrap();
        tree.insert(&RoutePattern::parse("/user/login").unwrap(), Method::POST.into(), "login_post")
            .unwrap();

        let found = tree.match_route(&Method::POST, "/user/login").unwrap();
        assert_eq!(*found.entry, "login_post");
        assert_eq!(found.pattern.as_str(), "/user/login");
        assert_eq!(found.resolution, Resolution::Exact);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_trailing_slash_is_ignored() {
        let mut tree = RouteTree::new();
        tree.insert(&RoutePattern::parse("/explore/repos/").unwrap(), Method::GET.into(), "explore")
            .unwrap();
        assert!(tree.match_route(&Method::GET, "/explore/repos").is_some());
        assert!(tree.match_route(&Method::GET, "/explore/repos/").is_some());
    }

    #[test]
    fn test_empty_tree() {
        let tree: RouteTree<()> = RouteTree::default();
        assert!(tree.is_empty());
        assert!(matches!(tree.lookup(&Method::GET, "/", true), Lookup::NotFound));
    }
}

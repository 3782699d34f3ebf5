//! High-level route tree API.
//!
//! [`RouteTree`] is the structure the registry builds during startup and the
//! dispatcher reads on every request. It is mutated only through `&mut self`
//! methods, so once it is moved behind an `Arc` it is read-only.

use http::Method;

use crate::error::CompileError;
use crate::method_router::{MethodFilter, Resolution};
use crate::node::{Node, Search};
use crate::params::Params;
use crate::pattern::RoutePattern;
use crate::RouteMatch;

/// A prefix tree of compiled route patterns.
///
/// # Example
///
/// ```rust
/// use portcullis_router::{Lookup, RoutePattern, RouteTree};
/// use http::Method;
///
/// let mut tree = RouteTree::new();
/// tree.insert(&RoutePattern::parse("/explore/repos").unwrap(), Method::GET.into(), "explore").unwrap();
/// tree.insert(&RoutePattern::parse("/{username}").unwrap(), Method::GET.into(), "profile").unwrap();
///
/// match tree.lookup(&Method::GET, "/explore/repos", true) {
///     Lookup::Found(found) => assert_eq!(*found.entry, "explore"),
///     other => panic!("unexpected {other:?}"),
/// }
/// ```
///
/// # Route Priority
///
/// At every depth the tree tries, in order:
///
/// 1. **Literal segments** (e.g., `/explore`). A match commits the descent.
/// 2. **Parameter segments**, in registration order (e.g., `/{type:issues|pulls}` then `/{username}`)
/// 3. **Wildcard segments** (e.g., `/raw/*`)
///
/// Only parameter siblings are retried when a branch fails deeper down. The
/// method is resolved against the node the path lands on and never steers
/// the descent.
#[derive(Debug, Clone)]
pub struct RouteTree<T> {
    root: Node<T>,
    route_count: usize,
}

/// Result of resolving a request against a [`RouteTree`].
#[derive(Debug)]
pub enum Lookup<'a, T> {
    /// A route serves this method and path.
    Found(RouteMatch<'a, T>),
    /// The path matched but no entry serves the method.
    MethodNotAllowed {
        /// Methods registered on the matching path
        allowed: Vec<Method>,
    },
    /// Nothing matched the path.
    NotFound,
}

impl<T> Default for RouteTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RouteTree<T> {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: Node::root(),
            route_count: 0,
        }
    }

    /// Registers `entry` for `pattern` and `filter`.
    ///
    /// Re-registering the same pattern and method replaces the earlier entry,
    /// which is returned.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::WildcardConflict`] when a differently named
    /// wildcard already exists at the pattern's position.
    pub fn insert(
        &mut self,
        pattern: &RoutePattern,
        filter: MethodFilter,
        entry: T,
    ) -> Result<Option<T>, CompileError> {
        let replaced = self.root.insert(pattern, filter, entry)?;
        if replaced.is_none() {
            self.route_count += 1;
        }
        Ok(replaced)
    }

    /// Resolves a request.
    ///
    /// `head_from_get` lets a `HEAD` request fall back to the `GET` entry.
    #[must_use]
    pub fn lookup(&self, method: &Method, path: &str, head_from_get: bool) -> Lookup<'_, T> {
        let segments = split_path(path);
        let mut search = Search {
            path,
            params: Params::new(),
        };

        let Some(hit) = self.root.find(&segments, &mut search) else {
            return Lookup::NotFound;
        };
        match hit.methods.resolve(method, head_from_get) {
            Some((entry, resolution)) => Lookup::Found(RouteMatch {
                entry,
                params: search.params,
                pattern: hit.pattern,
                resolution,
            }),
            None => Lookup::MethodNotAllowed {
                allowed: hit.methods.allowed_methods(),
            },
        }
    }

    /// Resolves a request, returning only a successful match.
    #[must_use]
    pub fn match_route(&self, method: &Method, path: &str) -> Option<RouteMatch<'_, T>> {
        match self.lookup(method, path, false) {
            Lookup::Found(found) => Some(found),
            _ => None,
        }
    }

    /// Returns the number of (pattern, method) registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.route_count
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.route_count == 0
    }

    /// Lists every registration as (pattern, method filter).
    #[must_use]
    pub fn routes(&self) -> Vec<(&RoutePattern, MethodFilter)> {
        let mut out = Vec::with_capacity(self.route_count);
        self.root.visit(&mut out);
        out
    }

    /// Consumes the tree, yielding its registrations.
    ///
    /// Re-inserting them in the returned order rebuilds an equivalent tree,
    /// which is how sub-routers are mounted under a prefix.
    #[must_use]
    pub fn into_routes(self) -> Vec<(RoutePattern, MethodFilter, T)> {
        let mut out = Vec::with_capacity(self.route_count);
        self.root.drain_into(&mut out);
        out
    }
}

impl<'a, T> RouteMatch<'a, T> {
    /// Returns true if the response body must be dropped (`HEAD` served by `GET`).
    #[must_use]
    pub fn suppress_body(&self) -> bool {
        self.resolution == Resolution::HeadFromGet
    }
}

/// Splits a request path into non-empty segments paired with byte offsets.
pub(crate) fn split_path(path: &str) -> Vec<(usize, &str)> {
    let mut segments = Vec::new();
    let mut start = 0;
    for (i, b) in path.bytes().enumerate() {
        if b == b'/' {
            if i > start {
                segments.push((start, &path[start..i]));
            }
            start = i + 1;
        }
    }
    if start < path.len() {
        segments.push((start, &path[start..]));
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(routes: &[(&str, Method, &'static str)]) -> RouteTree<&'static str> {
        let mut tree = RouteTree::new();
        for (pattern, method, entry) in routes {
            tree.insert(&RoutePattern::parse(pattern).unwrap(), method.clone().into(), *entry)
                .unwrap();
        }
        tree
    }

    fn found<'a>(tree: &'a RouteTree<&'static str>, method: &Method, path: &str) -> RouteMatch<'a, &'static str> {
        match tree.lookup(method, path, true) {
            Lookup::Found(found) => found,
            other => panic!("expected match for {method} {path}, got {other:?}"),
        }
    }

    #[test]
    fn test_split_path() {
        assert_eq!(split_path("/a//b/"), vec![(1, "a"), (4, "b")]);
        assert!(split_path("/").is_empty());
        assert_eq!(split_path("x"), vec![(0, "x")]);
    }

    #[test]
    fn test_root_path() {
        let t = tree(&[("/", Method::GET, "home")]);
        let m = found(&t, &Method::GET, "/");
        assert_eq!(*m.entry, "home");
        assert!(m.params.is_empty());
    }

    #[test]
    fn test_literal_beats_param_in_either_order() {
        for routes in [
            [("/explore/repos", Method::GET, "explore"), ("/{username}", Method::GET, "user")],
            [("/{username}", Method::GET, "user"), ("/explore/repos", Method::GET, "explore")],
        ] {
            let t = tree(&routes);
            let m = found(&t, &Method::GET, "/explore/repos");
            assert_eq!(*m.entry, "explore");
            assert!(m.params.is_empty());
            assert_eq!(*found(&t, &Method::GET, "/alice").entry, "user");
        }
    }

    #[test]
    fn test_regex_constraint_and_fallthrough() {
        let t = tree(&[
            ("/{username}/{reponame}/commit/{sha:[a-f0-9]{7,40}}", Method::GET, "commit"),
            ("/{username}/{reponame}/{type:issues|pulls}", Method::GET, "list"),
            ("/{username}/{reponame}/{page}", Method::GET, "page"),
        ]);

        assert!(matches!(
            t.lookup(&Method::GET, "/alice/proj/commit/abc", true),
            Lookup::NotFound
        ));
        let m = found(&t, &Method::GET, "/alice/proj/commit/abcdef0");
        assert_eq!(*m.entry, "commit");
        assert_eq!(m.params.get("sha"), Some("abcdef0"));

        assert_eq!(*found(&t, &Method::GET, "/alice/proj/pulls").entry, "list");
        let m = found(&t, &Method::GET, "/alice/proj/wiki");
        assert_eq!(*m.entry, "page");
        assert_eq!(m.params.get("page"), Some("wiki"));
    }

    #[test]
    fn test_first_registered_regex_sibling_wins() {
        let t = tree(&[
            ("/blob/{oid:[0-9]+}", Method::GET, "numeric"),
            ("/blob/{hex:[0-9a-f]+}", Method::GET, "hex"),
        ]);
        let m = found(&t, &Method::GET, "/blob/1234");
        assert_eq!(*m.entry, "numeric");
        assert_eq!(m.params.get("oid"), Some("1234"));
        assert_eq!(*found(&t, &Method::GET, "/blob/beef").entry, "hex");

        let reversed = tree(&[
            ("/blob/{hex:[0-9a-f]+}", Method::GET, "hex"),
            ("/blob/{oid:[0-9]+}", Method::GET, "numeric"),
        ]);
        assert_eq!(*found(&reversed, &Method::GET, "/blob/1234").entry, "hex");
    }

    #[test]
    fn test_wildcard_binds_remainder() {
        let t = tree(&[
            ("/{username}/{reponame}/releases/download/*", Method::GET, "download"),
            ("/{username}/{reponame}/src/*path", Method::GET, "src"),
        ]);
        let m = found(&t, &Method::GET, "/alice/proj/src/docs/guide/intro.md");
        assert_eq!(m.params.get("path"), Some("docs/guide/intro.md"));

        let m = found(&t, &Method::GET, "/alice/proj/releases/download/v1.0/app.tar.gz");
        assert_eq!(m.params.get("*"), Some("v1.0/app.tar.gz"));

        let m = found(&t, &Method::GET, "/alice/proj/releases/download");
        assert_eq!(m.params.get("*"), Some(""));
    }

    #[test]
    fn test_literal_subtree_failure_does_not_reach_param() {
        for routes in [
            [("/explore/repos", Method::GET, "explore"), ("/{username}/{reponame}", Method::GET, "repo")],
            [("/{username}/{reponame}", Method::GET, "repo"), ("/explore/repos", Method::GET, "explore")],
        ] {
            let t = tree(&routes);
            assert!(matches!(t.lookup(&Method::GET, "/explore/other", true), Lookup::NotFound));
            assert_eq!(*found(&t, &Method::GET, "/alice/other").entry, "repo");
        }
    }

    #[test]
    fn test_method_miss_on_literal_does_not_reach_param() {
        let t = tree(&[
            ("/explore/repos", Method::POST, "explore"),
            ("/{username}/{reponame}", Method::GET, "repo"),
        ]);
        match t.lookup(&Method::GET, "/explore/repos", true) {
            Lookup::MethodNotAllowed { allowed } => assert_eq!(allowed, vec![Method::POST]),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(*found(&t, &Method::POST, "/explore/repos").entry, "explore");
    }

    #[test]
    fn test_param_siblings_are_retried() {
        let t = tree(&[
            ("/{username}/{reponame}/wiki", Method::GET, "wiki"),
            ("/{org}/teams/{team}", Method::GET, "team"),
        ]);
        let m = found(&t, &Method::GET, "/acme/teams/core");
        assert_eq!(*m.entry, "team");
        assert_eq!(m.params.get("reponame"), None);
        assert_eq!(*found(&t, &Method::GET, "/alice/proj/wiki").entry, "wiki");
    }

    #[test]
    fn test_method_resolution() {
        let t = tree(&[
            ("/{username}/{reponame}", Method::GET, "view"),
            ("/{username}/{reponame}/action/{action}", Method::POST, "action"),
        ]);

        let head = found(&t, &Method::HEAD, "/alice/proj");
        assert_eq!(*head.entry, "view");
        assert!(head.suppress_body());
        assert!(!found(&t, &Method::GET, "/alice/proj").suppress_body());

        assert!(matches!(t.lookup(&Method::HEAD, "/alice/proj", false), Lookup::MethodNotAllowed { .. }));

        match t.lookup(&Method::GET, "/alice/proj/action/star", true) {
            Lookup::MethodNotAllowed { allowed } => assert_eq!(allowed, vec![Method::POST]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_registration_replaces() {
        let mut t = tree(&[("/user/login", Method::GET, "old")]);
        let replaced = t
            .insert(&RoutePattern::parse("/user/login").unwrap(), Method::GET.into(), "new")
            .unwrap();
        assert_eq!(replaced, Some("old"));
        assert_eq!(t.len(), 1);
        assert_eq!(*found(&t, &Method::GET, "/user/login").entry, "new");
    }

    #[test]
    fn test_any_method() {
        let mut t = tree(&[("/api/internal/hook", Method::POST, "hook")]);
        t.insert(&RoutePattern::parse("/api/*").unwrap(), MethodFilter::Any, "api")
            .unwrap();
        assert_eq!(*found(&t, &Method::DELETE, "/api/v1/repos").entry, "api");
        assert_eq!(*found(&t, &Method::POST, "/api/internal/hook").entry, "hook");
        // The literal path exists but only for POST; the wildcard is not consulted.
        match t.lookup(&Method::GET, "/api/internal/hook", true) {
            Lookup::MethodNotAllowed { allowed } => assert_eq!(allowed, vec![Method::POST]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_into_routes_round_trip() {
        let t = tree(&[
            ("/", Method::GET, "home"),
            ("/{username}", Method::GET, "user"),
            ("/explore/repos", Method::GET, "explore"),
        ]);
        assert_eq!(t.routes().len(), 3);

        let mut rebuilt = RouteTree::new();
        for (pattern, filter, entry) in t.into_routes() {
            rebuilt.insert(&pattern, filter, entry).unwrap();
        }
        assert_eq!(rebuilt.len(), 3);
        assert_eq!(*found(&rebuilt, &Method::GET, "/explore/repos").entry, "explore");
    }
}

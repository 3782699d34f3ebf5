//! Prefix tree node implementation.
//!
//! Every node owns three kinds of children:
//!
//! - literal children, sorted by text for binary search;
//! - parameter and regex-parameter children, kept in registration order,
//!   which is the tie-break when several of them accept a segment;
//! - at most one wildcard child, which always terminates the descent.

use std::borrow::Cow;

use crate::error::CompileError;
use crate::method_router::{MethodFilter, MethodTable};
use crate::params::Params;
use crate::pattern::{RoutePattern, Segment};

/// A node in the route tree.
#[derive(Debug, Clone)]
pub(crate) struct Node<T> {
    segment: Segment,
    /// Pattern of the most recent registration ending at this node.
    pattern: Option<RoutePattern>,
    methods: MethodTable<T>,
    literal_children: Vec<Node<T>>,
    param_children: Vec<Node<T>>,
    wildcard_child: Option<Box<Node<T>>>,
}

/// A node that terminates a registered pattern.
#[derive(Debug)]
pub(crate) struct Hit<'a, T> {
    pub(crate) pattern: &'a RoutePattern,
    pub(crate) methods: &'a MethodTable<T>,
}

/// Matching state threaded through the descent.
pub(crate) struct Search<'p> {
    pub(crate) path: &'p str,
    pub(crate) params: Params,
}

impl<T> Node<T> {
    pub(crate) fn root() -> Self {
        Self::new(Segment::Literal(String::new()))
    }

    fn new(segment: Segment) -> Self {
        Self {
            segment,
            pattern: None,
            methods: MethodTable::new(),
            literal_children: Vec::new(),
            param_children: Vec::new(),
            wildcard_child: None,
        }
    }

    fn literal_text(&self) -> &str {
        match &self.segment {
            Segment::Literal(text) => text,
            _ => "",
        }
    }

    /// Inserts an entry for `pattern`, returning the entry it replaced.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::WildcardConflict`] if a differently named
    /// wildcard already occupies the same position.
    pub(crate) fn insert(
        &mut self,
        pattern: &RoutePattern,
        filter: MethodFilter,
        entry: T,
    ) -> Result<Option<T>, CompileError> {
        let mut node = self;
        for segment in pattern.segments() {
            node = node.child_for(pattern, segment)?;
        }
        node.pattern = Some(pattern.clone());
        Ok(node.methods.insert(filter, entry))
    }

    /// Finds or creates the child occupying `segment`'s slot.
    fn child_for(
        &mut self,
        pattern: &RoutePattern,
        segment: &Segment,
    ) -> Result<&mut Self, CompileError> {
        match segment {
            Segment::Literal(text) => {
                let index = match self
                    .literal_children
                    .binary_search_by(|c| c.literal_text().cmp(text))
                {
                    Ok(index) => index,
                    Err(index) => {
                        self.literal_children
                            .insert(index, Self::new(segment.clone()));
                        index
                    }
                };
                Ok(&mut self.literal_children[index])
            }
            Segment::Param(_) | Segment::RegexParam { .. } => {
                let index = match self
                    .param_children
                    .iter()
                    .position(|c| c.segment.same_slot(segment))
                {
                    Some(index) => index,
                    None => {
                        self.param_children.push(Self::new(segment.clone()));
                        self.param_children.len() - 1
                    }
                };
                Ok(&mut self.param_children[index])
            }
            Segment::Wildcard(name) => {
                if let Some(existing) = &self.wildcard_child {
                    if !existing.segment.same_slot(segment) {
                        return Err(CompileError::WildcardConflict {
                            pattern: pattern.to_string(),
                            name: name.clone(),
                            existing: existing.segment.param_name().unwrap_or_default().to_string(),
                        });
                    }
                }
                Ok(self
                    .wildcard_child
                    .get_or_insert_with(|| Box::new(Self::new(segment.clone()))))
            }
        }
    }

    /// Descends the tree for the remaining `segments`.
    ///
    /// Each segment is paired with its byte offset in the request path so the
    /// wildcard can capture the raw remainder. A literal child that matches
    /// the segment commits the descent. Otherwise the parameter children are
    /// tried in registration order, and the next one is tried when a child
    /// rejects the segment or its subtree holds no route. The wildcard child
    /// comes last. Methods are not considered here.
    pub(crate) fn find<'a>(
        &'a self,
        segments: &[(usize, &str)],
        search: &mut Search<'_>,
    ) -> Option<Hit<'a, T>> {
        let Some(&(offset, segment)) = segments.first() else {
            if let Some(hit) = self.hit() {
                return Some(hit);
            }
            // An empty remainder still satisfies a trailing wildcard.
            let child = self.wildcard_child.as_deref()?;
            return child.bind_wildcard(String::new(), search);
        };
        let rest = &segments[1..];

        if let Ok(index) = self
            .literal_children
            .binary_search_by(|c| c.literal_text().cmp(segment))
        {
            return self.literal_children[index].find(rest, search);
        }

        if !self.param_children.is_empty() {
            if let Some(value) = decode(segment) {
                for child in &self.param_children {
                    if let Some(hit) = child.bind_param(&value, rest, search) {
                        return Some(hit);
                    }
                }
            }
        }

        let child = self.wildcard_child.as_deref()?;
        child.bind_wildcard(search.path[offset..].to_string(), search)
    }

    fn bind_param<'a>(
        &'a self,
        value: &str,
        rest: &[(usize, &str)],
        search: &mut Search<'_>,
    ) -> Option<Hit<'a, T>> {
        let name = match &self.segment {
            Segment::Param(name) => name,
            Segment::RegexParam { name, regex, .. } => {
                if !regex.is_match(value) {
                    return None;
                }
                name
            }
            _ => return None,
        };

        let mark = search.params.len();
        search.params.push(name.as_str(), value);
        let hit = self.find(rest, search);
        if hit.is_none() {
            search.params.truncate(mark);
        }
        hit
    }

    fn bind_wildcard<'a>(&'a self, remainder: String, search: &mut Search<'_>) -> Option<Hit<'a, T>> {
        let hit = self.hit()?;
        if let Some(name) = self.segment.param_name() {
            search.params.push(name, remainder);
        }
        Some(hit)
    }

    fn hit(&self) -> Option<Hit<'_, T>> {
        Some(Hit {
            pattern: self.pattern.as_ref()?,
            methods: &self.methods,
        })
    }

    /// Consumes the subtree, yielding every registration in an order that
    /// preserves parameter-sibling precedence when re-inserted.
    pub(crate) fn drain_into(self, out: &mut Vec<(RoutePattern, MethodFilter, T)>) {
        if let Some(pattern) = self.pattern {
            for (filter, entry) in self.methods.into_entries() {
                out.push((pattern.clone(), filter, entry));
            }
        }
        for child in self.literal_children {
            child.drain_into(out);
        }
        for child in self.param_children {
            child.drain_into(out);
        }
        if let Some(child) = self.wildcard_child {
            child.drain_into(out);
        }
    }

    /// Visits every registration without consuming the tree.
    pub(crate) fn visit<'a>(&'a self, out: &mut Vec<(&'a RoutePattern, MethodFilter)>) {
        if let Some(pattern) = &self.pattern {
            out.extend(self.methods.iter().map(|(filter, _)| (pattern, filter)));
        }
        self.literal_children.iter().for_each(|c| c.visit(out));
        self.param_children.iter().for_each(|c| c.visit(out));
        if let Some(child) = &self.wildcard_child {
            child.visit(out);
        }
    }
}

/// Percent-decodes a segment; `None` if it is not valid UTF-8 or would
/// smuggle a `/` into a single-segment binding.
fn decode(segment: &str) -> Option<Cow<'_, str>> {
    let value = urlencoding::decode(segment).ok()?;
    if value.contains('/') {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    fn pattern(s: &str) -> RoutePattern {
        RoutePattern::parse(s).unwrap()
    }

    fn lookup(root: &Node<&'static str>, path: &str) -> Option<(&'static str, Params)> {
        let segments = crate::router::split_path(path);
        let mut search = Search {
            path,
            params: Params::new(),
        };
        let hit = root.find(&segments, &mut search)?;
        let (entry, _) = hit.methods.resolve(&Method::GET, true)?;
        Some((*entry, search.params))
    }

    #[test]
    fn test_literal_children_stay_sorted() {
        let mut root = Node::root();
        for p in ["/issues", "/explore", "/api", "/user"] {
            root.insert(&pattern(p), Method::GET.into(), "h").unwrap();
        }
        let texts: Vec<_> = root.literal_children.iter().map(Node::literal_text).collect();
        assert_eq!(texts, vec!["api", "explore", "issues", "user"]);
    }

    #[test]
    fn test_shared_prefix_shares_nodes() {
        let mut root = Node::root();
        root.insert(&pattern("/user/login"), Method::GET.into(), "login").unwrap();
        root.insert(&pattern("/user/logout"), Method::POST.into(), "logout").unwrap();
        assert_eq!(root.literal_children.len(), 1);
        assert_eq!(root.literal_children[0].literal_text(), "user");
        assert_eq!(root.literal_children[0].literal_children.len(), 2);
    }

    #[test]
    fn test_param_children_keep_registration_order() {
        let mut root = Node::root();
        root.insert(&pattern("/{type:issues|pulls}"), Method::GET.into(), "a").unwrap();
        root.insert(&pattern("/{username}"), Method::GET.into(), "b").unwrap();
        root.insert(&pattern("/{type:issues|pulls}/new"), Method::GET.into(), "c").unwrap();
        assert_eq!(root.param_children.len(), 2);
        assert_eq!(root.param_children[0].segment.to_string(), "{type:issues|pulls}");
    }

    #[test]
    fn test_failed_subtree_unwinds_params() {
        let mut root = Node::root();
        root.insert(&pattern("/{username}/{reponame}/wiki"), Method::GET.into(), "wiki").unwrap();
        root.insert(&pattern("/{org}/teams/{team}"), Method::GET.into(), "team").unwrap();

        let (entry, params) = lookup(&root, "/acme/teams/core").unwrap();
        assert_eq!(entry, "team");
        assert_eq!(params.get("org"), Some("acme"));
        assert_eq!(params.get("username"), None);
        assert_eq!(params.get("reponame"), None);
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_intermediate_node_is_not_a_match() {
        let mut root = Node::root();
        root.insert(&pattern("/explore/repos"), Method::GET.into(), "repos").unwrap();
        root.insert(&pattern("/{username}"), Method::GET.into(), "profile").unwrap();

        // The literal `explore` commits the descent; its node holds no route.
        assert!(lookup(&root, "/explore").is_none());
        assert_eq!(lookup(&root, "/alice").unwrap().0, "profile");
    }

    #[test]
    fn test_literal_commits_over_wildcard() {
        let mut root = Node::root();
        root.insert(&pattern("/api/internal/hook"), Method::POST.into(), "hook").unwrap();
        root.insert(&pattern("/api/*"), Method::GET.into(), "api").unwrap();

        let segments = crate::router::split_path("/api/internal/other");
        let mut search = Search {
            path: "/api/internal/other",
            params: Params::new(),
        };
        assert!(root.find(&segments, &mut search).is_none());
        assert!(search.params.is_empty());
        assert_eq!(lookup(&root, "/api/v1/repos").unwrap().0, "api");
    }

    #[test]
    fn test_wildcard_conflict() {
        let mut root: Node<&str> = Node::root();
        root.insert(&pattern("/raw/*"), Method::GET.into(), "a").unwrap();
        let err = root.insert(&pattern("/raw/*path"), Method::GET.into(), "b").unwrap_err();
        assert!(matches!(err, CompileError::WildcardConflict { .. }));
    }

    #[test]
    fn test_wildcard_keeps_raw_remainder() {
        let mut root = Node::root();
        root.insert(&pattern("/src/branch/*"), Method::GET.into(), "src").unwrap();
        let (_, params) = lookup(&root, "/src/branch/feature/x%20y/README.md").unwrap();
        assert_eq!(params.get("*"), Some("feature/x%20y/README.md"));
    }

    #[test]
    fn test_encoded_slash_does_not_match_param() {
        let mut root = Node::root();
        root.insert(&pattern("/{username}"), Method::GET.into(), "profile").unwrap();
        assert!(lookup(&root, "/a%2Fb").is_none());
        let (_, params) = lookup(&root, "/al%20ice").unwrap();
        assert_eq!(params.get("username"), Some("al ice"));
    }

    #[test]
    fn test_drain_preserves_param_order() {
        let mut root = Node::root();
        root.insert(&pattern("/{a:[0-9]+}"), Method::GET.into(), "first").unwrap();
        root.insert(&pattern("/{b:[0-9a-f]+}"), Method::GET.into(), "second").unwrap();
        let mut out = Vec::new();
        root.drain_into(&mut out);
        let entries: Vec<_> = out.iter().map(|(_, _, e)| *e).collect();
        assert_eq!(entries, vec!["first", "second"]);
    }
}

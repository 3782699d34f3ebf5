//! Property tests for path matching.

use http::Method;
use portcullis_router::{Lookup, RoutePattern, RouteTree};
use proptest::prelude::*;

fn tree(patterns: &[(&str, &'static str)]) -> RouteTree<&'static str> {
    let mut tree = RouteTree::new();
    for (pattern, entry) in patterns {
        tree.insert(&RoutePattern::parse(pattern).unwrap(), Method::GET.into(), *entry)
            .unwrap();
    }
    tree
}

fn segment() -> impl Strategy<Value = String> {
    "[A-Za-z0-9._~-]{1,24}"
}

proptest! {
    #[test]
    fn param_binds_any_single_segment(name in segment()) {
        let t = tree(&[("/users/{name}", "user")]);
        let path = format!("/users/{name}");
        let found = t.match_route(&Method::GET, &path).unwrap();
        prop_assert_eq!(found.params.get("name"), Some(name.as_str()));
    }

    #[test]
    fn param_never_spans_two_segments(a in segment(), b in segment()) {
        let t = tree(&[("/users/{name}", "user")]);
        let path = format!("/users/{a}/{b}");
        prop_assert!(matches!(t.lookup(&Method::GET, &path, true), Lookup::NotFound));
    }

    #[test]
    fn param_values_are_decoded(raw in "[a-z ]{1,16}") {
        let t = tree(&[("/{username}", "user")]);
        let path = format!("/{}", urlencoding::encode(&raw));
        let found = t.match_route(&Method::GET, &path).unwrap();
        prop_assert_eq!(found.params.get("username"), Some(raw.as_str()));
    }

    #[test]
    fn wildcard_captures_remainder(parts in prop::collection::vec(segment(), 0..6)) {
        let t = tree(&[("/raw/*", "raw")]);
        let rest = parts.join("/");
        let path = format!("/raw/{rest}");
        let found = t.match_route(&Method::GET, &path).unwrap();
        prop_assert_eq!(found.params.get("*"), Some(rest.as_str()));
    }

    #[test]
    fn literal_always_beats_param(name in segment(), literal_first in any::<bool>()) {
        prop_assume!(name != "explore");
        let routes = if literal_first {
            [("/explore/repos", "explore"), ("/{username}", "user")]
        } else {
            [("/{username}", "user"), ("/explore/repos", "explore")]
        };
        let t = tree(&routes);
        prop_assert_eq!(*t.match_route(&Method::GET, "/explore/repos").unwrap().entry, "explore");
        let path = format!("/{name}");
        prop_assert_eq!(*t.match_route(&Method::GET, &path).unwrap().entry, "user");
    }

    #[test]
    fn regex_matches_iff_full_segment_matches(sha in "[a-f0-9]{1,45}") {
        let t = tree(&[("/commit/{sha:[a-f0-9]{7,40}}", "commit")]);
        let path = format!("/commit/{sha}");
        let matched = t.match_route(&Method::GET, &path).is_some();
        prop_assert_eq!(matched, (7..=40).contains(&sha.len()));
    }
}

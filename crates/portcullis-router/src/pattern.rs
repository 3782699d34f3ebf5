//! Route pattern compilation.
//!
//! A pattern is split on `/` (outside of `{...}`) into segments:
//!
//! | Token          | Segment                  | Matches                                  |
//! |----------------|--------------------------|------------------------------------------|
//! | `explore`      | [`Segment::Literal`]     | exactly `explore`                        |
//! | `{username}`   | [`Segment::Param`]       | any one non-empty segment                |
//! | `{sha:[a-f0-9]{7,40}}` | [`Segment::RegexParam`] | one segment fully matching the regex |
//! | `*` / `*path`  | [`Segment::Wildcard`]    | the rest of the path, possibly empty     |
//!
//! Empty segments are ignored, so `/a//b/` and `/a/b` compile identically.

use std::collections::HashSet;
use std::fmt;

use regex::Regex;

use crate::error::CompileError;

/// Name a bare `*` wildcard is bound under.
pub const WILDCARD_NAME: &str = "*";

/// One compiled path segment.
#[derive(Debug, Clone)]
pub enum Segment {
    /// Literal text that must match the path segment exactly.
    Literal(String),
    /// A named parameter binding one whole segment.
    Param(String),
    /// A named parameter constrained by an anchored regex.
    RegexParam {
        /// Parameter name
        name: String,
        /// The constraint as written in the pattern
        source: String,
        /// The constraint compiled as `^(?:source)$`
        regex: Regex,
    },
    /// Binds the remainder of the path. Only valid as the last segment.
    Wildcard(String),
}

impl Segment {
    /// Returns the bound parameter name, if this segment binds one.
    #[must_use]
    pub fn param_name(&self) -> Option<&str> {
        match self {
            Self::Literal(_) => None,
            Self::Param(name) | Self::RegexParam { name, .. } | Self::Wildcard(name) => Some(name),
        }
    }

    /// Returns true if both segments occupy the same tree slot.
    ///
    /// Two regex params share a slot only if their name and constraint agree.
    #[must_use]
    pub fn same_slot(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Literal(a), Self::Literal(b))
            | (Self::Param(a), Self::Param(b))
            | (Self::Wildcard(a), Self::Wildcard(b)) => a == b,
            (
                Self::RegexParam { name: a, source: sa, .. },
                Self::RegexParam { name: b, source: sb, .. },
            ) => a == b && sa == sb,
            _ => false,
        }
    }
}

impl PartialEq for Segment {
    fn eq(&self, other: &Self) -> bool {
        self.same_slot(other)
    }
}

impl Eq for Segment {}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(text) => f.write_str(text),
            Self::Param(name) => write!(f, "{{{name}}}"),
            Self::RegexParam { name, source, .. } => write!(f, "{{{name}:{source}}}"),
            Self::Wildcard(name) if name == WILDCARD_NAME => f.write_str("*"),
            Self::Wildcard(name) => write!(f, "*{name}"),
        }
    }
}

/// A compiled route pattern.
///
/// # Example
///
/// ```rust
/// use portcullis_router::{RoutePattern, Segment};
///
/// let pattern = RoutePattern::parse("/{username}/{reponame}/commit/{sha:[a-f0-9]{7,40}}").unwrap();
/// assert_eq!(pattern.segments().len(), 4);
/// assert!(matches!(pattern.segments()[3], Segment::RegexParam { .. }));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    /// Compiles a pattern string.
    ///
    /// # Errors
    ///
    /// Returns a [`CompileError`] if a wildcard is not last, a parameter name
    /// repeats, a regex fails to compile, a brace is left open, or a
    /// parameter shares its segment with literal text.
    pub fn parse(pattern: &str) -> Result<Self, CompileError> {
        let tokens = split_segments(pattern)?;
        let mut segments = Vec::with_capacity(tokens.len());
        let mut seen = HashSet::new();

        for (index, token) in tokens.iter().enumerate() {
            let segment = classify(pattern, token)?;

            if matches!(segment, Segment::Wildcard(_)) && index + 1 != tokens.len() {
                return Err(CompileError::WildcardNotLast {
                    pattern: pattern.to_string(),
                });
            }

            if let Some(name) = segment.param_name() {
                if !seen.insert(name.to_string()) {
                    return Err(CompileError::DuplicateParam {
                        pattern: pattern.to_string(),
                        name: name.to_string(),
                    });
                }
            }

            segments.push(segment);
        }

        Ok(Self {
            raw: pattern.to_string(),
            segments,
        })
    }

    /// Returns the pattern as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns the compiled segments.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns the parameter names bound by this pattern, in order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(Segment::param_name)
    }

    /// Returns true if the pattern ends in a wildcard.
    #[must_use]
    pub fn has_wildcard(&self) -> bool {
        matches!(self.segments.last(), Some(Segment::Wildcard(_)))
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Joins a group prefix and a relative pattern.
///
/// An empty `pattern` registers at the prefix itself.
///
/// ```rust
/// use portcullis_router::join_paths;
///
/// assert_eq!(join_paths("/user/settings", "/keys"), "/user/settings/keys");
/// assert_eq!(join_paths("/user/settings/", ""), "/user/settings");
/// assert_eq!(join_paths("", "explore"), "/explore");
/// assert_eq!(join_paths("", ""), "/");
/// ```
#[must_use]
pub fn join_paths(prefix: &str, pattern: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let mut joined = String::with_capacity(prefix.len() + pattern.len() + 1);
    if !prefix.is_empty() && !prefix.starts_with('/') {
        joined.push('/');
    }
    joined.push_str(prefix);
    if !pattern.is_empty() {
        if !pattern.starts_with('/') {
            joined.push('/');
        }
        joined.push_str(pattern);
    }
    if joined.is_empty() {
        joined.push('/');
    }
    joined
}

/// Splits on `/` at brace depth zero, dropping empty segments.
fn split_segments(pattern: &str) -> Result<Vec<&str>, CompileError> {
    let mut tokens = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in pattern.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            '/' if depth == 0 => {
                if i > start {
                    tokens.push(&pattern[start..i]);
                }
                start = i + 1;
            }
            _ => {}
        }
    }

    if depth != 0 {
        return Err(CompileError::UnterminatedParam {
            pattern: pattern.to_string(),
        });
    }
    if start < pattern.len() {
        tokens.push(&pattern[start..]);
    }
    Ok(tokens)
}

fn classify(pattern: &str, token: &str) -> Result<Segment, CompileError> {
    if let Some(rest) = token.strip_prefix('{') {
        let close = matching_brace(rest).ok_or_else(|| CompileError::UnterminatedParam {
            pattern: pattern.to_string(),
        })?;
        if close + 1 != rest.len() {
            return Err(mixed(pattern, token));
        }
        let inner = &rest[..close];
        let (name, constraint) = match inner.split_once(':') {
            Some((name, constraint)) => (name, Some(constraint)),
            None => (inner, None),
        };
        check_name(pattern, name)?;

        return match constraint {
            None => Ok(Segment::Param(name.to_string())),
            Some(source) => {
                let regex = Regex::new(&format!("^(?:{source})$")).map_err(|source| {
                    CompileError::InvalidRegex {
                        pattern: pattern.to_string(),
                        name: name.to_string(),
                        source,
                    }
                })?;
                Ok(Segment::RegexParam {
                    name: name.to_string(),
                    source: source.to_string(),
                    regex,
                })
            }
        };
    }

    if token.contains('{') {
        return Err(mixed(pattern, token));
    }

    if let Some(name) = token.strip_prefix('*') {
        if name.is_empty() {
            return Ok(Segment::Wildcard(WILDCARD_NAME.to_string()));
        }
        check_name(pattern, name)?;
        return Ok(Segment::Wildcard(name.to_string()));
    }

    Ok(Segment::Literal(token.to_string()))
}

/// Byte offset of the `}` closing an already-opened brace.
fn matching_brace(s: &str) -> Option<usize> {
    let mut depth = 1usize;
    for (i, c) in s.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn check_name(pattern: &str, name: &str) -> Result<(), CompileError> {
    let valid = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(CompileError::InvalidParamName {
            pattern: pattern.to_string(),
            name: name.to_string(),
        })
    }
}

fn mixed(pattern: &str, segment: &str) -> CompileError {
    CompileError::MixedSegment {
        pattern: pattern.to_string(),
        segment: segment.to_string(),
    }
}

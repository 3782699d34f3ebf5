//! Per-node HTTP method tables.
//!
//! A [`MethodTable`] holds the entries registered at one node of the route
//! tree, keyed by method, plus an optional any-method entry.

use http::Method;

/// Which methods a registration applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodFilter {
    /// A single method.
    Exact(Method),
    /// Every method without a more specific entry.
    Any,
}

impl From<Method> for MethodFilter {
    fn from(method: Method) -> Self {
        Self::Exact(method)
    }
}

impl std::fmt::Display for MethodFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact(method) => f.write_str(method.as_str()),
            Self::Any => f.write_str("ANY"),
        }
    }
}

/// How an entry was selected for a request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The entry was registered for exactly this method.
    Exact,
    /// The any-method entry was used.
    AnyMethod,
    /// A `HEAD` request was served by the `GET` entry; the body must be dropped.
    HeadFromGet,
}

/// Maps HTTP methods to entries for a single route.
///
/// Registering a method twice keeps the last entry.
///
/// # Example
///
/// ```rust
/// use portcullis_router::{MethodFilter, MethodTable, Resolution};
/// use http::Method;
///
/// let mut table = MethodTable::new();
/// table.insert(Method::GET.into(), "view");
/// table.insert(MethodFilter::Any, "fallback");
///
/// assert_eq!(table.resolve(&Method::GET, false), Some((&"view", Resolution::Exact)));
/// assert_eq!(table.resolve(&Method::DELETE, false), Some((&"fallback", Resolution::AnyMethod)));
/// ```
#[derive(Debug, Clone)]
pub struct MethodTable<T> {
    entries: Vec<(Method, T)>,
    any: Option<T>,
}

impl<T> Default for MethodTable<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            any: None,
        }
    }
}

impl<T> MethodTable<T> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an entry, returning the one it replaced.
    pub fn insert(&mut self, filter: MethodFilter, entry: T) -> Option<T> {
        match filter {
            MethodFilter::Any => self.any.replace(entry),
            MethodFilter::Exact(method) => {
                match self.entries.iter_mut().find(|(m, _)| *m == method) {
                    Some(slot) => Some(std::mem::replace(&mut slot.1, entry)),
                    None => {
                        self.entries.push((method, entry));
                        None
                    }
                }
            }
        }
    }

    /// Returns the entry registered for exactly this method.
    #[must_use]
    pub fn get(&self, method: &Method) -> Option<&T> {
        self.entries
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, entry)| entry)
    }

    /// Returns the any-method entry.
    #[must_use]
    pub fn any(&self) -> Option<&T> {
        self.any.as_ref()
    }

    /// Picks the entry that serves `method`.
    ///
    /// Order: exact entry, any-method entry, then (for `HEAD` with
    /// `head_from_get`) the `GET` entry.
    #[must_use]
    pub fn resolve(&self, method: &Method, head_from_get: bool) -> Option<(&T, Resolution)> {
        if let Some(entry) = self.get(method) {
            return Some((entry, Resolution::Exact));
        }
        if let Some(entry) = &self.any {
            return Some((entry, Resolution::AnyMethod));
        }
        if head_from_get && *method == Method::HEAD {
            return self
                .get(&Method::GET)
                .map(|entry| (entry, Resolution::HeadFromGet));
        }
        None
    }

    /// Returns true if no entry is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.any.is_none()
    }

    /// Returns the number of registered entries, counting the any-method entry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len() + usize::from(self.any.is_some())
    }

    /// Returns the methods with an exact entry, in registration order.
    #[must_use]
    pub fn allowed_methods(&self) -> Vec<Method> {
        self.entries.iter().map(|(m, _)| m.clone()).collect()
    }

    /// Iterates over all entries with the filter they were registered under.
    pub fn iter(&self) -> impl Iterator<Item = (MethodFilter, &T)> {
        self.entries
            .iter()
            .map(|(m, entry)| (MethodFilter::Exact(m.clone()), entry))
            .chain(self.any.iter().map(|entry| (MethodFilter::Any, entry)))
    }

    /// Consumes the table, yielding every entry with its filter.
    pub fn into_entries(self) -> impl Iterator<Item = (MethodFilter, T)> {
        self.entries
            .into_iter()
            .map(|(m, entry)| (MethodFilter::Exact(m), entry))
            .chain(self.any.map(|entry| (MethodFilter::Any, entry)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_registration_wins() {
        let mut table = MethodTable::new();
        assert!(table.insert(Method::POST.into(), "first").is_none());
        assert_eq!(table.insert(Method::POST.into(), "second"), Some("first"));
        assert_eq!(table.get(&Method::POST), Some(&"second"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_methods_are_independent() {
        let mut table = MethodTable::new();
        table.insert(Method::GET.into(), "get");
        table.insert(Method::POST.into(), "post");
        assert_eq!(table.get(&Method::GET), Some(&"get"));
        assert_eq!(table.get(&Method::POST), Some(&"post"));
        assert_eq!(table.allowed_methods(), vec![Method::GET, Method::POST]);
    }

    #[test]
    fn test_head_from_get_only_when_enabled() {
        let mut table = MethodTable::new();
        table.insert(Method::GET.into(), "get");

        assert_eq!(
            table.resolve(&Method::HEAD, true),
            Some((&"get", Resolution::HeadFromGet))
        );
        assert_eq!(table.resolve(&Method::HEAD, false), None);
    }

    #[test]
    fn test_explicit_head_beats_get() {
        let mut table = MethodTable::new();
        table.insert(Method::GET.into(), "get");
        table.insert(Method::HEAD.into(), "head");
        assert_eq!(
            table.resolve(&Method::HEAD, true),
            Some((&"head", Resolution::Exact))
        );
    }

    #[test]
    fn test_any_serves_unregistered_methods() {
        let mut table = MethodTable::new();
        table.insert(Method::GET.into(), "get");
        table.insert(MethodFilter::Any, "any");
        assert_eq!(table.resolve(&Method::GET, true).map(|r| r.1), Some(Resolution::Exact));
        assert_eq!(
            table.resolve(&Method::PATCH, true),
            Some((&"any", Resolution::AnyMethod))
        );
        assert_eq!(table.len(), 2);
    }
}

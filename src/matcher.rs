//! Request matchers
//!
//! A matcher is a pure predicate over a stored and an incoming request. A
//! [`MatcherSet`] accepts a pair only when every matcher in it does.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::request::{normalized_headers, Request};

/// Predicate deciding whether two requests correspond
pub type Matcher = Arc<dyn Fn(&Request, &Request) -> bool + Send + Sync>;

/// Built-in matchers, selectable by name from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatcherKind {
    /// Method, case-insensitive
    Method,
    /// Full URL, exact
    Url,
    /// URL host
    Host,
    /// URL path
    Path,
    /// Decoded query parameters, order-insensitive
    QueryString,
    /// Headers: case-insensitive names, trimmed values, order-insensitive
    Headers,
    /// Body bytes, exact
    Body,
    /// POST fields, order-insensitive
    PostFields,
}

impl MatcherKind {
    /// Every built-in matcher
    pub const ALL: [Self; 8] = [
        Self::Method,
        Self::Url,
        Self::Host,
        Self::Path,
        Self::QueryString,
        Self::Headers,
        Self::Body,
        Self::PostFields,
    ];

    /// Name used in configuration files
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Method => "method",
            Self::Url => "url",
            Self::Host => "host",
            Self::Path => "path",
            Self::QueryString => "query_string",
            Self::Headers => "headers",
            Self::Body => "body",
            Self::PostFields => "post_fields",
        }
    }

    /// Predicate implementing this matcher
    #[must_use]
    pub fn predicate(self) -> fn(&Request, &Request) -> bool {
        match self {
            Self::Method => match_method,
            Self::Url => match_url,
            Self::Host => match_host,
            Self::Path => match_path,
            Self::QueryString => match_query_string,
            Self::Headers => match_headers,
            Self::Body => match_body,
            Self::PostFields => match_post_fields,
        }
    }
}

impl fmt::Display for MatcherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn match_method(a: &Request, b: &Request) -> bool {
    a.method.eq_ignore_ascii_case(&b.method)
}

fn match_url(a: &Request, b: &Request) -> bool {
    a.url == b.url
}

fn match_host(a: &Request, b: &Request) -> bool {
    a.host().eq_ignore_ascii_case(b.host())
}

fn match_path(a: &Request, b: &Request) -> bool {
    a.path() == b.path()
}

fn match_query_string(a: &Request, b: &Request) -> bool {
    decoded_query(a.query()) == decoded_query(b.query())
}

fn match_headers(a: &Request, b: &Request) -> bool {
    normalized_headers(&a.headers) == normalized_headers(&b.headers)
}

fn match_body(a: &Request, b: &Request) -> bool {
    a.body == b.body
}

fn match_post_fields(a: &Request, b: &Request) -> bool {
    let sorted = |fields: &Option<Vec<(String, String)>>| {
        let mut fields = fields.clone().unwrap_or_default();
        fields.sort();
        fields
    };
    sorted(&a.post_fields) == sorted(&b.post_fields)
}

/// Query parameters, percent-decoded and sorted
fn decoded_query(query: Option<&str>) -> Vec<(String, String)> {
    let decode = |s: &str| {
        let s = s.replace('+', " ");
        let decoded = match urlencoding::decode(&s) {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => s.clone(),
        };
        decoded
    };

    let mut params: Vec<(String, String)> = query
        .unwrap_or_default()
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (decode(k), decode(v)),
            None => (decode(pair), String::new()),
        })
        .collect();
    params.sort();
    params
}

/// Ordered list of named matchers, evaluated as a logical AND
#[derive(Clone)]
pub struct MatcherSet {
    matchers: Vec<(String, Matcher)>,
}

impl MatcherSet {
    /// A set with no matchers, which accepts every pair
    #[must_use]
    pub fn empty() -> Self {
        Self {
            matchers: Vec::new(),
        }
    }

    /// A set built from built-in matcher kinds, in the given order
    #[must_use]
    pub fn from_kinds(kinds: &[MatcherKind]) -> Self {
        kinds.iter().fold(Self::empty(), |set, kind| {
            set.with(kind.as_str(), kind.predicate())
        })
    }

    /// Append a matcher
    #[must_use]
    pub fn with<F>(mut self, name: impl Into<String>, matcher: F) -> Self
    where
        F: Fn(&Request, &Request) -> bool + Send + Sync + 'static,
    {
        self.matchers.push((name.into(), Arc::new(matcher)));
        self
    }

    /// Whether every matcher accepts `(stored, incoming)`
    #[must_use]
    pub fn matches(&self, stored: &Request, incoming: &Request) -> bool {
        self.matchers
            .iter()
            .all(|(_, matcher)| matcher(stored, incoming))
    }

    /// Name of the first matcher rejecting the pair, if any
    #[must_use]
    pub fn first_mismatch(&self, stored: &Request, incoming: &Request) -> Option<&str> {
        self.matchers
            .iter()
            .find(|(_, matcher)| !matcher(stored, incoming))
            .map(|(name, _)| name.as_str())
    }

    /// Matcher names in evaluation order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.matchers.iter().map(|(name, _)| name.as_str())
    }

    /// Number of matchers
    #[must_use]
    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    /// Whether the set has no matchers
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}

impl Default for MatcherSet {
    fn default() -> Self {
        Self::from_kinds(&MatcherKind::ALL)
    }
}

impl fmt::Debug for MatcherSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn base() -> Request {
        Request::new("GET", "https://api.example.com/v1/users?page=2&sort=name")
            .with_header("Accept", "application/json")
    }

    #[test]
    fn test_method_case_insensitive() {
        let other = Request {
            method: "get".to_string(),
            ..base()
        };
        assert!(match_method(&base(), &other));
        assert!(!match_method(&base(), &Request::new("POST", "x")));
    }

    #[test]
    fn test_host_and_path() {
        let other = Request::new("GET", "http://API.example.com:8080/v1/users");
        assert!(match_host(&base(), &other));
        assert!(match_path(&base(), &other));
        assert!(!match_url(&base(), &other));
    }

    #[test]
    fn test_query_string_order_and_encoding() {
        let other = Request::new("GET", "https://api.example.com/v1/users?sort=n%61me&page=2");
        assert!(match_query_string(&base(), &other));

        let different = Request::new("GET", "https://api.example.com/v1/users?page=3&sort=name");
        assert!(!match_query_string(&base(), &different));
    }

    #[test]
    fn test_headers_normalized() {
        let other = base().with_header("X-Trace", "1");
        assert!(!match_headers(&base(), &other));

        let reordered = Request::new("GET", "x")
            .with_header("B", "2")
            .with_header("a", " 1");
        let original = Request::new("GET", "y")
            .with_header("A", "1")
            .with_header("b", "2");
        assert!(match_headers(&original, &reordered));
    }

    #[test]
    fn test_post_fields_absent_equals_empty() {
        let with_empty = Request {
            post_fields: Some(vec![]),
            ..base()
        };
        assert!(match_post_fields(&base(), &with_empty));
        assert!(!match_post_fields(&base(), &base().with_post_field("a", "1")));
    }

    #[test]
    fn test_empty_set_matches_everything() {
        let set = MatcherSet::empty();
        assert!(set.is_empty());
        assert!(set.matches(&base(), &Request::new("DELETE", "other")));
    }

    #[test]
    fn test_all_must_agree() {
        let set = MatcherSet::from_kinds(&[MatcherKind::Method, MatcherKind::Body]);
        let other = base().with_body(&b"payload"[..]);

        assert!(!set.matches(&base(), &other));
        assert_eq!(set.first_mismatch(&base(), &other), Some("body"));
        assert_eq!(set.names().collect::<Vec<_>>(), vec!["method", "body"]);
    }

    #[test]
    fn test_custom_matcher() {
        let set = MatcherSet::empty().with("same_length", |a: &Request, b: &Request| {
            a.url.len() == b.url.len()
        });
        assert!(set.matches(&Request::new("GET", "abc"), &Request::new("PUT", "xyz")));
        assert!(!set.matches(&Request::new("GET", "abc"), &Request::new("GET", "ab")));
    }

    #[test]
    fn test_asymmetric_matcher_allowed() {
        let prefix = MatcherSet::empty().with("url_prefix", |stored: &Request, incoming: &Request| {
            incoming.url.starts_with(&stored.url)
        });
        let short = Request::new("GET", "http://h/a");
        let long = Request::new("GET", "http://h/a/b");

        assert!(prefix.matches(&short, &long));
        assert!(!prefix.matches(&long, &short));
    }

    #[test]
    fn test_kind_names_roundtrip_through_serde() {
        for kind in MatcherKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{kind}\""));
        }
    }

    proptest! {
        #[test]
        fn prop_default_set_is_deterministic(
            url_a in "http://h/[a-z]{0,8}",
            url_b in "http://h/[a-z]{0,8}",
            body in proptest::collection::vec(any::<u8>(), 0..32),
        ) {
            let set = MatcherSet::default();
            let a = Request::new("GET", url_a).with_body(body.clone());
            let b = Request::new("GET", url_b).with_body(body);

            let first = set.matches(&a, &b);
            for _ in 0..3 {
                prop_assert_eq!(set.matches(&a, &b), first);
            }
            prop_assert!(set.matches(&a, &a));
        }
    }
}

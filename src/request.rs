//! Outbound request snapshot

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::matcher::MatcherSet;
use crate::{Result, TapedeckError};

/// Recorded or live outbound request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// HTTP method (e.g., "GET", "POST")
    pub method: String,
    /// Target URL
    pub url: String,
    /// Headers in the order they were sent
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    /// Request body
    #[serde(default, with = "body_base64")]
    pub body: Vec<u8>,
    /// Form fields of a POST request, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_fields: Option<Vec<(String, String)>>,
}

impl Request {
    /// Create a request with no headers and an empty body
    #[must_use]
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Vec::new(),
            body: Vec::new(),
            post_fields: None,
        }
    }

    /// Append a header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replace the body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Append a POST field
    #[must_use]
    pub fn with_post_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.post_fields
            .get_or_insert_with(Vec::new)
            .push((name.into(), value.into()));
        self
    }

    /// All values of header `name`, compared case-insensitively
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Host part of the URL, without port
    #[must_use]
    pub fn host(&self) -> &str {
        let authority = split_url(&self.url).0;
        let host = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
        if host.starts_with('[') {
            // IPv6 literal
            return host.split_once(']').map_or(host, |(h, _)| &h[1..]);
        }
        host.split_once(':').map_or(host, |(h, _)| h)
    }

    /// Path part of the URL, always with a leading slash
    #[must_use]
    pub fn path(&self) -> String {
        normalize_path(split_url(&self.url).1)
    }

    /// Raw query string of the URL, without the leading `?`
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        split_url(&self.url).2
    }

    /// Whether all `matchers` accept `other` as equivalent to this request.
    ///
    /// An empty matcher set accepts everything; it is up to configuration to
    /// always supply at least one matcher.
    #[must_use]
    pub fn matches(&self, other: &Request, matchers: &MatcherSet) -> bool {
        matchers.matches(self, other)
    }

    /// Plain record suitable for persistence
    #[must_use]
    pub fn to_record(&self) -> Value {
        let mut record = json!({
            "method": self.method,
            "url": self.url,
            "headers": self.headers,
            "body": body_base64::encode(&self.body),
        });
        if let Some(fields) = &self.post_fields {
            record["post_fields"] = json!(fields);
        }
        record
    }

    /// Rebuild a request from a record produced by [`Request::to_record`]
    ///
    /// # Errors
    ///
    /// Returns `MalformedRecord` if a required field is absent or has the
    /// wrong shape
    pub fn from_record(record: &Value) -> Result<Self> {
        Self::deserialize(record)
            .map_err(|e| TapedeckError::MalformedRecord(format!("request: {e}")))
    }

    /// SHA-256 over the normalized request
    ///
    /// The fingerprint covers:
    /// 1. Method (uppercase normalized)
    /// 2. URL (trimmed)
    /// 3. Headers (sorted, normalized)
    /// 4. Body
    #[must_use]
    pub fn fingerprint(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();

        let method = self.method.to_uppercase();
        hasher.update((method.len() as u32).to_le_bytes());
        hasher.update(method.as_bytes());

        let url = self.url.trim();
        hasher.update((url.len() as u32).to_le_bytes());
        hasher.update(url.as_bytes());

        for (name, value) in normalized_headers(&self.headers) {
            hasher.update((name.len() as u32).to_le_bytes());
            hasher.update(name.as_bytes());
            hasher.update((value.len() as u32).to_le_bytes());
            hasher.update(value.as_bytes());
        }

        hasher.update((self.body.len() as u32).to_le_bytes());
        hasher.update(&self.body);

        hasher.finalize().into()
    }

    /// Short hex form of the fingerprint, for logs
    #[must_use]
    pub fn short_id(&self) -> String {
        hex::encode(&self.fingerprint()[..8])
    }
}

/// Headers with lowercase names and trimmed values, sorted by name then value
pub(crate) fn normalized_headers(headers: &[(String, String)]) -> Vec<(String, String)> {
    let mut normalized: Vec<(String, String)> = headers
        .iter()
        .map(|(n, v)| (n.to_lowercase(), v.trim().to_string()))
        .collect();
    normalized.sort();
    normalized
}

/// Split a URL into (authority, path, query)
fn split_url(url: &str) -> (&str, &str, Option<&str>) {
    let url = url.trim();
    let url = url.split_once('#').map_or(url, |(u, _)| u);
    let (rest, query) = match url.split_once('?') {
        Some((r, q)) => (r, Some(q)),
        None => (url, None),
    };
    match rest.split_once("://") {
        Some((_, after_scheme)) => match after_scheme.find('/') {
            Some(i) => (&after_scheme[..i], &after_scheme[i..], query),
            None => (after_scheme, "", query),
        },
        None => ("", rest, query),
    }
}

/// Normalize a URL path
fn normalize_path(path: &str) -> String {
    let trimmed = path.trim();

    if trimmed.is_empty() || !trimmed.starts_with('/') {
        format!("/{trimmed}")
    } else {
        trimmed.to_string()
    }
}

/// Serde adapter storing opaque bodies as standard base64 strings
pub(crate) mod body_base64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn encode(body: &[u8]) -> String {
        STANDARD.encode(body)
    }

    pub fn serialize<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| serde::de::Error::custom(format!("invalid base64 body: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::MatcherKind;
    use proptest::prelude::*;

    fn test_request() -> Request {
        Request::new("POST", "https://api.example.com:8443/v1/items?b=2&a=1#frag")
            .with_header("Content-Type", "application/json")
            .with_header("Accept", "application/json")
            .with_header("Accept", "text/plain")
            .with_body(&b"{\"x\":1}"[..])
    }

    #[test]
    fn test_record_roundtrip() {
        let request = test_request().with_post_field("name", "value");
        let record = request.to_record();
        let restored = Request::from_record(&record).unwrap();

        assert_eq!(restored, request);
        assert!(restored.matches(&request, &MatcherSet::default()));
    }

    #[test]
    fn test_record_omits_absent_post_fields() {
        let record = test_request().to_record();
        assert!(record.get("post_fields").is_none());
        assert_eq!(record["body"], "eyJ4IjoxfQ==");
    }

    #[test]
    fn test_from_record_missing_method() {
        let record = json!({ "url": "http://example.com/" });
        let err = Request::from_record(&record).unwrap_err();
        assert!(matches!(err, TapedeckError::MalformedRecord(_)));
    }

    #[test]
    fn test_from_record_bad_body() {
        let record = json!({
            "method": "GET",
            "url": "http://example.com/",
            "body": "not base64!!",
        });
        assert!(matches!(
            Request::from_record(&record),
            Err(TapedeckError::MalformedRecord(_))
        ));
    }

    #[test]
    fn test_from_record_headers_wrong_shape() {
        let record = json!({
            "method": "GET",
            "url": "http://example.com/",
            "headers": {"Accept": "text/plain"},
        });
        assert!(Request::from_record(&record).is_err());
    }

    #[test]
    fn test_url_parts() {
        let request = test_request();
        assert_eq!(request.host(), "api.example.com");
        assert_eq!(request.path(), "/v1/items");
        assert_eq!(request.query(), Some("b=2&a=1"));

        let bare = Request::new("GET", "http://user@[::1]:80");
        assert_eq!(bare.host(), "::1");
        assert_eq!(bare.path(), "/");
        assert_eq!(bare.query(), None);
    }

    #[test]
    fn test_header_values() {
        let request = test_request();
        let values: Vec<_> = request.header_values("accept").collect();
        assert_eq!(values, vec!["application/json", "text/plain"]);
    }

    #[test]
    fn test_fingerprint_header_order_independence() {
        let a = Request::new("get", "http://h/x")
            .with_header("A", "1")
            .with_header("B", "2");
        let b = Request::new("GET", "http://h/x")
            .with_header("b", " 2 ")
            .with_header("a", "1");

        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.short_id().len(), 16);
    }

    #[test]
    fn test_fingerprint_body_sensitive() {
        let a = Request::new("GET", "http://h/x").with_body(&b"1"[..]);
        let b = Request::new("GET", "http://h/x").with_body(&b"2"[..]);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_path_normalization() {
        assert_eq!(normalize_path("/api/test"), "/api/test");
        assert_eq!(normalize_path("api/test"), "/api/test");
        assert_eq!(normalize_path("  /api/test  "), "/api/test");
        assert_eq!(normalize_path(""), "/");
    }

    proptest! {
        #[test]
        fn prop_record_roundtrip_preserves_bytes(
            method in "[A-Z]{3,7}",
            path in "[a-z/]{0,20}",
            headers in proptest::collection::vec(("[A-Za-z-]{1,12}", "[ -~]{0,20}"), 0..6),
            body in proptest::collection::vec(any::<u8>(), 0..256),
        ) {
            let mut request = Request::new(method, format!("https://example.com/{path}"));
            request.headers = headers;
            request.body = body;

            let restored = Request::from_record(&request.to_record()).unwrap();
            let identity = MatcherSet::from_kinds(&[
                MatcherKind::Method,
                MatcherKind::Url,
                MatcherKind::Headers,
                MatcherKind::Body,
            ]);

            prop_assert_eq!(&restored.headers, &request.headers);
            prop_assert_eq!(&restored.body, &request.body);
            prop_assert!(restored.matches(&request, &identity));
        }
    }
}

//! HTTP message types
//!
//! Domain representations of the request and response halves of a proxied
//! flow. Messages are immutable once constructed; the pipeline replaces them
//! wholesale and never mutates one in place.

use std::fmt;

/// An ordered multi-map of HTTP headers
///
/// Header names are case-insensitive for lookup but keep the spelling they
/// were inserted with. Repeated names are preserved in insertion order, which
/// is what the wire form round-trips.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Create an empty header map
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(name, value)` pairs, keeping order
    pub fn from_pairs<N, V, I>(pairs: I) -> Self
    where
        N: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (N, V)>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(n, v)| (n.into(), v.into()))
                .collect(),
        }
    }

    /// Append one `(name, value)` pair at the end
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// First value under `name`, if any (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value under `name`, in insertion order
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Replace every pair under `name` with the given values
    ///
    /// Existing pairs under that name are removed and the new values are
    /// appended at the end, all spelled as `name`.
    pub fn set_all<V: Into<String>>(
        &mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) {
        let name = name.into();
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        for value in values {
            self.entries.push((name.clone(), value.into()));
        }
    }

    /// Distinct header names in first-seen order
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for (n, _) in &self.entries {
            if !names.iter().any(|seen| seen.eq_ignore_ascii_case(n)) {
                names.push(n.as_str());
            }
        }
        names
    }

    /// Iterate over all `(name, value)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Total number of `(name, value)` pairs
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map holds no pairs
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// An HTTP request captured from a flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Request method (`GET`, `POST`, ...)
    pub method: String,
    /// Absolute request URL
    pub url: String,
    /// Request headers
    pub headers: Headers,
    /// Raw body bytes, possibly empty
    pub body: Vec<u8>,
}

impl Request {
    pub fn new(
        method: impl Into<String>,
        url: impl Into<String>,
        headers: Headers,
        body: Vec<u8>,
    ) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers,
            body,
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// An HTTP response captured from a flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Status code
    pub status_code: u16,
    /// Reason phrase. Defaults to the canonical phrase for the status code
    /// when constructed via [`Response::new`].
    pub reason: String,
    /// Response headers
    pub headers: Headers,
    /// Raw body bytes, possibly empty
    pub body: Vec<u8>,
}

impl Response {
    /// Create a response with the canonical reason phrase for `status_code`
    pub fn new(status_code: u16, headers: Headers, body: Vec<u8>) -> Self {
        Self {
            status_code,
            reason: canonical_reason(status_code).unwrap_or_default().to_string(),
            headers,
            body,
        }
    }

    /// Override the reason phrase
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status_code, self.reason)
    }
}

/// Canonical reason phrase for an HTTP status code, if one is defined
pub fn canonical_reason(status_code: u16) -> Option<&'static str> {
    let reason = match status_code {
        100 => "Continue",
        101 => "Switching Protocols",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        203 => "Non-Authoritative Information",
        204 => "No Content",
        205 => "Reset Content",
        206 => "Partial Content",
        300 => "Multiple Choices",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        402 => "Payment Required",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        407 => "Proxy Authentication Required",
        408 => "Request Timeout",
        409 => "Conflict",
        410 => "Gone",
        411 => "Length Required",
        412 => "Precondition Failed",
        413 => "Payload Too Large",
        414 => "URI Too Long",
        415 => "Unsupported Media Type",
        416 => "Range Not Satisfiable",
        417 => "Expectation Failed",
        421 => "Misdirected Request",
        426 => "Upgrade Required",
        428 => "Precondition Required",
        429 => "Too Many Requests",
        431 => "Request Header Fields Too Large",
        451 => "Unavailable For Legal Reasons",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        505 => "HTTP Version Not Supported",
        _ => return None,
    };
    Some(reason)
}

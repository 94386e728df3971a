use std::collections::HashMap;

/// HTTP request methods.
///
/// The responder serves the request target regardless of method, so the
/// method is only carried for logging. Tokens outside the common set are
/// kept verbatim in `Extension`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    /// GET - Retrieve a resource
    GET,
    /// POST - Create or submit data
    POST,
    /// PUT - Replace a resource
    PUT,
    /// DELETE - Delete a resource
    DELETE,
    /// HEAD - Like GET but without the response body
    HEAD,
    /// OPTIONS - Describe communication options
    OPTIONS,
    /// PATCH - Partial modification of a resource
    PATCH,
    /// Any other method token, as sent
    Extension(String),
}

impl Method {
    /// Maps a method token to a `Method`.
    ///
    /// Matching is case-sensitive, as methods are on the wire.
    ///
    /// ```
    /// # use wharf::http::request::Method;
    /// assert_eq!(Method::parse("GET"), Method::GET);
    /// assert_eq!(Method::parse("get"), Method::Extension("get".into()));
    /// ```
    pub fn parse(s: &str) -> Self {
        match s {
            "GET" => Method::GET,
            "POST" => Method::POST,
            "PUT" => Method::PUT,
            "DELETE" => Method::DELETE,
            "HEAD" => Method::HEAD,
            "OPTIONS" => Method::OPTIONS,
            "PATCH" => Method::PATCH,
            other => Method::Extension(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::HEAD => "HEAD",
            Method::OPTIONS => "OPTIONS",
            Method::PATCH => "PATCH",
            Method::Extension(s) => s,
        }
    }
}

/// A request decoded from a connection's buffer.
///
/// Header names compare ignoring ASCII case. When a name repeats in any
/// spelling, the last occurrence wins and its spelling is the one kept;
/// values are never comma-joined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// The HTTP method (GET, POST, etc.)
    pub method: Method,
    /// The request target as sent (e.g. "/index.html?v=2")
    pub target: String,
    /// Protocol version token (e.g. "HTTP/1.1")
    pub version: String,
    /// Request headers as key-value pairs
    pub headers: HashMap<String, String>,
    /// Exactly `Content-Length` bytes of body, empty when absent
    pub body: Vec<u8>,
}

/// Builder for constructing Request objects.
pub struct RequestBuilder {
    method: Method,
    target: Option<String>,
    version: Option<String>,
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self {
            method: Method::GET,
            target: None,
            version: None,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        insert_header(&mut self.headers, key.into(), value.into());
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn build(self) -> Request {
        Request {
            method: self.method,
            target: self.target.unwrap_or_else(|| "/".to_string()),
            version: self.version.unwrap_or_else(|| "HTTP/1.1".to_string()),
            headers: self.headers,
            body: self.body,
        }
    }
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Request {
    /// Retrieves a header value by name, ignoring ASCII case.
    pub fn header(&self, key: &str) -> Option<&str> {
        find_header(&self.headers, key)
    }

    /// The declared body length. Missing or unparsable values count as 0.
    pub fn content_length(&self) -> usize {
        content_length_of(self.header("Content-Length"))
    }

    /// Whether the connection stays open after this request's response.
    ///
    /// `HTTP/1.0` closes unless `Connection` is exactly `keep-alive`; any
    /// other version stays open unless `Connection` is exactly `close`.
    pub fn keep_alive(&self) -> bool {
        let connection = self.header("Connection");
        if self.version == "HTTP/1.0" {
            connection == Some("keep-alive")
        } else {
            connection != Some("close")
        }
    }

    /// The target's path component, without query string or fragment.
    pub fn path(&self) -> &str {
        strip_query(&self.target)
    }
}

/// Stores `key: value`, replacing any earlier header of the same name in
/// any case, so each name appears at most once.
pub(crate) fn insert_header(headers: &mut HashMap<String, String>, key: String, value: String) {
    headers.retain(|k, _| !k.eq_ignore_ascii_case(&key));
    headers.insert(key, value);
}

pub(crate) fn find_header<'a>(headers: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.as_str())
}

pub(crate) fn content_length_of(value: Option<&str>) -> usize {
    value.and_then(|v| v.parse().ok()).unwrap_or(0)
}

/// Cuts a request target at the first `?` or `#`.
pub fn strip_query(target: &str) -> &str {
    match target.find(['?', '#']) {
        Some(i) => &target[..i],
        None => target,
    }
}

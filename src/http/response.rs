/// HTTP status codes the server emits.
///
/// - `Ok` (200): file served
/// - `Forbidden` (403): outside the document root, directory without index, or no permission
/// - `NotFound` (404): nothing at that path
/// - `InternalServerError` (500): any other I/O failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 403 Forbidden
    Forbidden,
    /// 404 Not Found
    NotFound,
    /// 500 Internal Server Error
    InternalServerError,
}

impl StatusCode {
    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use wharf::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::Forbidden.as_u16(), 403);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::Forbidden => 403,
            StatusCode::NotFound => 404,
            StatusCode::InternalServerError => 500,
        }
    }

    /// Returns the standard HTTP reason phrase for this status code.
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::Forbidden => "Forbidden",
            StatusCode::NotFound => "Not Found",
            StatusCode::InternalServerError => "Internal Server Error",
        }
    }
}

/// Content type of the generated error pages.
pub const ERROR_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// The status line and headers of a response.
///
/// The body is never held here; it is streamed after the head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub content_length: u64,
}

impl ResponseHead {
    pub fn new(status: StatusCode, content_type: &'static str, content_length: u64) -> Self {
        Self {
            status,
            content_type,
            content_length,
        }
    }
}

/// Minimal HTML body for a non-200 status, e.g. `<h1>404 Not Found</h1>`.
pub fn error_body(status: StatusCode) -> String {
    format!("<h1>{} {}</h1>", status.as_u16(), status.reason_phrase())
}

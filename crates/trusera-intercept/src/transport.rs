// transport.rs — The send capabilities the interceptor can wrap.
//
// Three shapes of outbound HTTP:
//   SyncTransport  : blocking, one call per request
//   AsyncTransport : async, one call per request; must not block the executor
//   ConnectionPool : a pool bound to one scheme/host/port; `urlopen` takes a
//                    path (or a full URL)
//
// Application code sends through these traits. The interceptor wraps an
// implementation in another implementation of the same trait, so callers
// cannot tell whether they are instrumented.

use async_trait::async_trait;

use crate::error::SendError;

/// An outbound request, independent of the client library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Upper-case method.
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    pub fn new(method: impl AsRef<str>, url: impl Into<String>) -> Self {
        Self {
            method: method.as_ref().to_ascii_uppercase(),
            url: url.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new("POST", url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub trait SyncTransport: Send + Sync {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, SendError>;
}

#[async_trait]
pub trait AsyncTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, SendError>;
}

pub trait ConnectionPool: Send + Sync {
    fn scheme(&self) -> &str;
    fn host(&self) -> &str;
    fn port(&self) -> Option<u16>;

    /// Open a request on this pool. `request.url` is usually a path
    /// relative to the pool's origin.
    fn urlopen(&self, request: HttpRequest) -> Result<HttpResponse, SendError>;
}

/// Absolute URL for a pool request. Full `http(s)` URLs pass through;
/// anything else is treated as a path on the pool's origin. Ports 80 and
/// 443 are omitted.
pub fn pool_url(pool: &(impl ConnectionPool + ?Sized), url: &str) -> String {
    if url.starts_with("http") {
        return url.to_string();
    }
    let scheme = if pool.scheme().eq_ignore_ascii_case("https") {
        "https"
    } else {
        "http"
    };
    let port = match pool.port() {
        Some(port) if port != 80 && port != 443 => format!(":{}", port),
        _ => String::new(),
    };
    format!("{}://{}{}{}", scheme, pool.host(), port, url)
}

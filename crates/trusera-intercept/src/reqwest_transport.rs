// reqwest_transport.rs — Bundled transports backed by reqwest.
//
// One adapter per capability shape: a blocking client, an async client,
// and a blocking "pool" bound to a single origin.

use async_trait::async_trait;
use reqwest::Method;

use crate::error::SendError;
use crate::transport::{
    pool_url, AsyncTransport, ConnectionPool, HttpRequest, HttpResponse, SyncTransport,
};

fn method(request: &HttpRequest) -> Result<Method, SendError> {
    Method::from_bytes(request.method.as_bytes()).map_err(SendError::transport)
}

fn response_headers(headers: &reqwest::header::HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

/// Blocking reqwest client.
#[derive(Debug, Clone, Default)]
pub struct BlockingClientTransport {
    client: reqwest::blocking::Client,
}

impl BlockingClientTransport {
    pub fn new(client: reqwest::blocking::Client) -> Self {
        Self { client }
    }
}

impl SyncTransport for BlockingClientTransport {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, SendError> {
        let mut builder = self.client.request(method(&request)?, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let response = builder
            .body(request.body)
            .send()
            .map_err(SendError::transport)?;

        let status = response.status().as_u16();
        let headers = response_headers(response.headers());
        let body = response.bytes().map_err(SendError::transport)?.to_vec();
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// Async reqwest client.
#[derive(Debug, Clone, Default)]
pub struct AsyncClientTransport {
    client: reqwest::Client,
}

impl AsyncClientTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AsyncTransport for AsyncClientTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, SendError> {
        let mut builder = self.client.request(method(&request)?, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let response = builder
            .body(request.body)
            .send()
            .await
            .map_err(SendError::transport)?;

        let status = response.status().as_u16();
        let headers = response_headers(response.headers());
        let body = response
            .bytes()
            .await
            .map_err(SendError::transport)?
            .to_vec();
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// A blocking client pinned to one origin; `urlopen` takes paths.
#[derive(Debug, Clone)]
pub struct ReqwestPool {
    client: reqwest::blocking::Client,
    scheme: String,
    host: String,
    port: Option<u16>,
}

impl ReqwestPool {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            scheme: scheme.into(),
            host: host.into(),
            port,
        }
    }

    pub fn with_client(mut self, client: reqwest::blocking::Client) -> Self {
        self.client = client;
        self
    }
}

impl ConnectionPool for ReqwestPool {
    fn scheme(&self) -> &str {
        &self.scheme
    }

    fn host(&self) -> &str {
        &self.host
    }

    fn port(&self) -> Option<u16> {
        self.port
    }

    fn urlopen(&self, mut request: HttpRequest) -> Result<HttpResponse, SendError> {
        request.url = pool_url(self, &request.url);
        BlockingClientTransport::new(self.client.clone()).send(request)
    }
}

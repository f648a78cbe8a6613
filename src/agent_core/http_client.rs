//! Back-channel HTTP abstraction: the agent defines the contract, the
//! embedding application plugs a transport in.

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;

/// HTTP method for back-channel calls. The agent only ever issues GETs
/// (JWKS) and POSTs (PAR, token).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// HTTP request for executing a back-channel call. Redirects are never
/// followed.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Target URL.
    pub url: String,
    /// Request headers.
    pub headers: Vec<(String, String)>,
    /// Optional request body.
    pub body: Option<Vec<u8>>,
    /// Optional timeout duration.
    pub timeout: Option<Duration>,
}

/// HTTP response from executing a call.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: Vec<(String, String)>,
    /// Response body.
    pub body: Vec<u8>,
}

/// Error type for HTTP client operations.
pub type HttpClientError = Box<dyn Error + Send + Sync>;

/// Generic HTTP client interface for the agent's back-channel calls.
#[async_trait]
pub trait BackchannelHttpClient: Send + Sync + Clone + 'static {
    /// Execute an HTTP request asynchronously.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpClientError>;
}

/// In-memory HTTP client stub for testing.
#[derive(Clone)]
pub struct InMemoryHttpClient {
    responses: Arc<DashMap<String, HttpResponse>>,
    default_response: Option<HttpResponse>,
}

impl InMemoryHttpClient {
    /// Creates a new in-memory HTTP client with no default response.
    pub fn new() -> Self {
        Self { responses: Arc::new(DashMap::new()), default_response: None }
    }

    /// Creates a new in-memory HTTP client with a default response on miss.
    pub fn with_default(response: HttpResponse) -> Self {
        Self { responses: Arc::new(DashMap::new()), default_response: Some(response) }
    }

    /// Register a mock response for a specific URL.
    pub fn insert_response(&self, url: impl Into<String>, response: HttpResponse) {
        self.responses.insert(url.into(), response);
    }
}

impl Default for InMemoryHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackchannelHttpClient for InMemoryHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpClientError> {
        if let Some(entry) = self.responses.get(&request.url) {
            Ok(entry.value().clone())
        } else if let Some(response) = self.default_response.clone() {
            Ok(response)
        } else {
            Err("no mock response for url".into())
        }
    }
}

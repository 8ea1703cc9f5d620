//! Single-request transport.
//!
//! The `Transport` trait abstracts over the HTTP client so every network
//! component can be driven by a scripted mock in tests. Implementations make
//! exactly one attempt per call; retrying is `RetryableFetcher`'s job.

use crate::error::DataError;
use std::time::Duration;

/// One GET request: URL plus query parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub url: String,
    pub query: Vec<(String, String)>,
}

impl Request {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            query: Vec::new(),
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

pub trait Transport: Send + Sync {
    /// Perform one request and return the response body.
    fn get(&self, request: &Request) -> Result<Vec<u8>, DataError>;
}

/// Blocking reqwest client with a request timeout.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tickvault/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(client_setup_error)?;
        Ok(Self { client })
    }
}

/// A client that cannot be built is a local setup problem, never transient.
fn client_setup_error(e: reqwest::Error) -> DataError {
    DataError::Io(std::io::Error::other(format!(
        "failed to build HTTP client: {e}"
    )))
}

impl Transport for HttpTransport {
    fn get(&self, request: &Request) -> Result<Vec<u8>, DataError> {
        let resp = self
            .client
            .get(&request.url)
            .query(&request.query)
            .send()
            .map_err(|e| DataError::Network(format!("{}: {e}", request.url)))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(DataError::NotFound(request.url.clone()));
        }
        if !status.is_success() {
            return Err(DataError::Network(format!("HTTP {status} for {}", request.url)));
        }

        resp.bytes()
            .map(|b| b.to_vec())
            .map_err(|e| DataError::Network(format!("reading body of {}: {e}", request.url)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder_collects_params() {
        let req = Request::get("https://example.com/list")
            .param("prefix", "data/spot/")
            .param("marker", "abc");
        assert_eq!(req.query_value("prefix"), Some("data/spot/"));
        assert_eq!(req.query_value("marker"), Some("abc"));
        assert_eq!(req.query_value("delimiter"), None);
    }

    #[test]
    fn http_transport_builds() {
        assert!(HttpTransport::new(Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn client_setup_failure_is_not_retried() {
        // An unparseable proxy URL fails at client build time.
        let build = reqwest::Proxy::http("http://[::1")
            .map(|proxy| reqwest::blocking::Client::builder().proxy(proxy).build());
        let err = match build {
            Err(e) | Ok(Err(e)) => client_setup_error(e),
            Ok(Ok(_)) => panic!("client with a malformed proxy should not build"),
        };
        assert!(matches!(err, DataError::Io(_)));
        assert!(!err.is_transient());
        assert!(err.to_string().contains("failed to build HTTP client"));
    }
}

//! HTTP client utilities
//!
//! Builds the single reqwest::Client used to talk to the search engine.
//! System proxy variables (HTTP_PROXY, HTTPS_PROXY, NO_PROXY) are honored
//! by reqwest itself.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;
use std::time::Duration;

use crate::error::AppError;

/// Options for the engine HTTP client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Hard limit for a whole request/response exchange
    pub timeout: Duration,
    /// Time allowed to establish the TCP/TLS connection
    pub connect_timeout: Duration,
    /// Accept self-signed or otherwise invalid certificates
    pub insecure: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            insecure: false,
        }
    }
}

/// Build a reqwest Client with the given options
pub fn build_client(options: &ClientOptions) -> Result<Client, AppError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    // The connect phase can never outlive the whole request
    let connect_timeout = options.connect_timeout.min(options.timeout);

    Client::builder()
        .timeout(options.timeout)
        .connect_timeout(connect_timeout)
        .danger_accept_invalid_certs(options.insecure)
        .default_headers(headers)
        .user_agent(concat!("vigil/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))
}

//! Search Engine Client
//!
//! Sends built queries to Elasticsearch and decodes the hit list. One
//! outbound request per search, bounded by a hard timeout, never retried.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::time::timeout;
use tracing::{debug, info};
use url::Url;

use super::normalizer::NormalizedQuery;
use super::query::{search_path, QueryBuilder};
use crate::config::EngineConfig;
use crate::error::AppError;
use crate::http::build_client;

/// Upper bound for a health ping, independent of the search timeout
pub const PING_TIMEOUT: Duration = Duration::from_secs(2);

/// One hit as returned by the engine
#[derive(Debug, Clone, Deserialize)]
pub struct RawHit {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_score", default)]
    pub score: Option<f64>,
    #[serde(rename = "_index", default)]
    pub index: String,
    #[serde(rename = "_source", default)]
    pub source: Map<String, Value>,
    #[serde(default)]
    pub highlight: Option<HashMap<String, Vec<String>>>,
}

/// `hits.total` is a bare number on old engines and an object on newer ones
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TotalHits {
    Count(u64),
    Detailed {
        value: u64,
        #[allow(dead_code)]
        #[serde(default)]
        relation: String,
    },
}

impl TotalHits {
    pub fn value(&self) -> u64 {
        match self {
            TotalHits::Count(n) => *n,
            TotalHits::Detailed { value, .. } => *value,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HitsEnvelope {
    #[serde(default)]
    pub total: Option<TotalHits>,
    #[serde(default)]
    pub hits: Vec<RawHit>,
}

/// Decoded `_search` response
#[derive(Debug, Clone, Deserialize)]
pub struct EngineResponse {
    #[serde(default)]
    pub took: Option<u64>,
    pub hits: HitsEnvelope,
}

impl EngineResponse {
    /// Total matching documents reported by the engine
    pub fn total(&self) -> u64 {
        self.hits
            .total
            .as_ref()
            .map(TotalHits::value)
            .unwrap_or(self.hits.hits.len() as u64)
    }
}

/// Client for a fixed engine endpoint and index set
pub struct EngineClient {
    client: Client,
    search_url: Url,
    ping_url: Url,
    username: Option<String>,
    password: Option<String>,
    timeout: Duration,
    builder: QueryBuilder,
}

impl EngineClient {
    /// Create the client once at startup; it is shared by every request
    pub fn new(config: &EngineConfig) -> Result<Self, AppError> {
        let client = build_client(&config.client)?;

        let search_url = config
            .base_url
            .join(search_path(&config.indices).trim_start_matches('/'))
            .map_err(|e| AppError::Config(format!("Invalid search URL: {}", e)))?;

        info!(
            "Search engine at {} (indices: {})",
            config.base_url,
            config.indices.join(",")
        );

        Ok(Self {
            client,
            search_url,
            ping_url: config.base_url.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            timeout: config.client.timeout,
            builder: QueryBuilder::new(config.profile.clone()),
        })
    }

    pub fn builder(&self) -> &QueryBuilder {
        &self.builder
    }

    pub fn search_url(&self) -> &Url {
        &self.search_url
    }

    /// Run a query against the configured indices
    pub async fn search(&self, query: &NormalizedQuery) -> Result<EngineResponse, AppError> {
        let body = self.builder.build(query);
        debug!("POST {} phone_like={}", self.search_url, query.phone_like);

        let exchange = async {
            let mut request = self.client.post(self.search_url.clone()).json(&body);
            if let Some(username) = &self.username {
                request = request.basic_auth(username, self.password.as_ref());
            }

            let response = request.send().await?;

            if !response.status().is_success() {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                return Err(AppError::SearchFailed(format!(
                    "engine returned {}: {}",
                    status,
                    truncate_body(&text)
                )));
            }

            Ok::<_, AppError>(response.json::<EngineResponse>().await?)
        };

        let response = timeout(self.timeout, exchange).await.map_err(|_| {
            AppError::SearchFailed(format!(
                "engine did not answer within {}s",
                self.timeout.as_secs_f64()
            ))
        })??;

        debug!(
            "Engine answered with {} hits (total {}, took {:?}ms)",
            response.hits.hits.len(),
            response.total(),
            response.took
        );

        Ok(response)
    }

    /// Whether the engine root endpoint answers with a success status
    pub async fn ping(&self) -> bool {
        let limit = self.timeout.min(PING_TIMEOUT);
        let mut request = self.client.get(self.ping_url.clone()).timeout(limit);
        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_ref());
        }

        match timeout(limit, request.send()).await {
            Ok(Ok(response)) => response.status().is_success(),
            Ok(Err(e)) => {
                debug!("Engine ping failed: {}", e);
                false
            }
            Err(_) => {
                debug!("Engine ping timed out");
                false
            }
        }
    }
}

/// Keep upstream error bodies short in logs
fn truncate_body(text: &str) -> String {
    const MAX: usize = 500;
    if text.chars().count() <= MAX {
        text.to_string()
    } else {
        format!("{}...", text.chars().take(MAX).collect::<String>())
    }
}

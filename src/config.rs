//! Runtime configuration
//!
//! Everything is resolved once at startup from command-line flags and their
//! environment fallbacks, validated here, and then shared read-only.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tracing::{info, warn};
use url::Url;

use crate::cli::{EngineArgs, ServeArgs};
use crate::error::AppError;
use crate::http::ClientOptions;
use crate::search::QueryProfile;

/// Largest result list a caller may ask for
pub const MAX_RESULT_LIMIT: usize = 100;
/// Result list length when the caller does not ask
pub const DEFAULT_RESULT_LIMIT: usize = 20;

/// Connection settings for the search engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub base_url: Url,
    pub indices: Vec<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client: ClientOptions,
    pub profile: QueryProfile,
}

impl EngineConfig {
    pub fn from_args(args: &EngineArgs) -> Result<Self, AppError> {
        let base_url = parse_base_url(&args.engine_url)?;
        let indices = parse_indices(&args.indices)?;

        if args.password.is_some() && args.username.is_none() {
            warn!("ELASTICSEARCH_PASSWORD set without ELASTICSEARCH_USERNAME, ignoring it");
        }

        if args.timeout_secs == 0 {
            return Err(AppError::Config("Timeout must be at least 1 second".to_string()));
        }

        let profile = match &args.profile {
            Some(path) => {
                info!("Loading query profile from {}", path.display());
                QueryProfile::load(path).map_err(|e| AppError::Config(format!("{:#}", e)))?
            }
            None => QueryProfile::default(),
        };

        Ok(Self {
            base_url,
            indices,
            username: args.username.clone(),
            password: args.username.as_ref().and(args.password.clone()),
            client: ClientOptions {
                timeout: Duration::from_secs(args.timeout_secs),
                insecure: args.insecure,
                ..ClientOptions::default()
            },
            profile,
        })
    }
}

/// HTTP server settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub address: SocketAddr,
    pub result_limit: usize,
    pub rate_limit: u32,
    pub rate_window: Duration,
    pub allowed_origins: Vec<String>,
    /// Key clients by `X-Forwarded-For`; only safe behind a proxy that sets it
    pub trust_forwarded: bool,
}

impl ServerConfig {
    pub fn from_args(args: &ServeArgs) -> Result<Self, AppError> {
        let ip: IpAddr = args
            .bind
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid bind address {}: {}", args.bind, e)))?;

        Ok(Self {
            address: SocketAddr::new(ip, args.port),
            result_limit: clamp_limit(args.limit),
            rate_limit: args.rate_limit,
            rate_window: Duration::from_secs(args.rate_window_secs.max(1)),
            allowed_origins: args.allowed_origins.clone(),
            trust_forwarded: args.trust_forwarded,
        })
    }
}

/// Clamp a requested result count into 1..=MAX_RESULT_LIMIT
pub fn clamp_limit(limit: Option<usize>) -> usize {
    limit
        .unwrap_or(DEFAULT_RESULT_LIMIT)
        .clamp(1, MAX_RESULT_LIMIT)
}

fn parse_base_url(raw: &str) -> Result<Url, AppError> {
    let mut url = Url::parse(raw.trim())
        .map_err(|e| AppError::Config(format!("Invalid engine URL {}: {}", raw, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::Config(format!(
            "Engine URL must be http or https, got {}",
            url.scheme()
        )));
    }

    // Index paths are joined onto the base, which needs a trailing slash
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}

fn parse_indices(raw: &[String]) -> Result<Vec<String>, AppError> {
    let indices: Vec<String> = raw
        .iter()
        .flat_map(|entry| entry.split(','))
        .map(|index| index.trim().to_string())
        .filter(|index| !index.is_empty())
        .collect();

    if indices.is_empty() {
        return Err(AppError::Config("At least one index is required".to_string()));
    }

    if let Some(bad) = indices
        .iter()
        .find(|index| index.contains(['/', ' ', '?', '#']))
    {
        return Err(AppError::Config(format!("Invalid index name: {}", bad)));
    }

    Ok(indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_args() -> EngineArgs {
        EngineArgs {
            engine_url: "http://localhost:9200".to_string(),
            indices: vec!["leaks".to_string()],
            username: None,
            password: None,
            timeout_secs: 30,
            insecure: false,
            profile: None,
        }
    }

    #[test]
    fn test_engine_config_defaults() {
        let config = EngineConfig::from_args(&engine_args()).unwrap();
        assert_eq!(config.base_url.as_str(), "http://localhost:9200/");
        assert_eq!(config.indices, vec!["leaks"]);
        assert_eq!(config.client.timeout, Duration::from_secs(30));
        assert_eq!(config.profile, QueryProfile::default());
    }

    #[test]
    fn test_indices_split_and_trimmed() {
        let indices = parse_indices(&["leaks, pastes".to_string(), "dumps".to_string()]).unwrap();
        assert_eq!(indices, vec!["leaks", "pastes", "dumps"]);
    }

    #[test]
    fn test_invalid_indices() {
        assert!(parse_indices(&[]).is_err());
        assert!(parse_indices(&[" , ".to_string()]).is_err());
        assert!(parse_indices(&["a/b".to_string()]).is_err());
    }

    #[test]
    fn test_invalid_engine_url() {
        assert!(parse_base_url("not a url").is_err());
        assert!(parse_base_url("ftp://example.com").is_err());
        assert!(parse_base_url("https://es.internal:9200").is_ok());
    }

    #[test]
    fn test_base_url_keeps_path_prefix() {
        let url = parse_base_url("https://gateway.internal/elastic").unwrap();
        assert_eq!(url.as_str(), "https://gateway.internal/elastic/");
    }

    #[test]
    fn test_password_requires_username() {
        let mut args = engine_args();
        args.password = Some("secret".to_string());
        let config = EngineConfig::from_args(&args).unwrap();
        assert!(config.password.is_none());

        args.username = Some("elastic".to_string());
        let config = EngineConfig::from_args(&args).unwrap();
        assert_eq!(config.password.as_deref(), Some("secret"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut args = engine_args();
        args.timeout_secs = 0;
        assert!(matches!(
            EngineConfig::from_args(&args),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None), 20);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(500)), 100);
        assert_eq!(clamp_limit(Some(7)), 7);
    }
}

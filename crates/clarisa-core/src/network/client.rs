//! Authenticated HTTP client for the Clarisa API.
//!
//! Wraps reqwest with:
//! - Endpoint resolution against `{host}/api/`
//! - Basic authentication on every request
//! - Strict decoding of JSON array responses

use crate::config::{ClarisaCredentials, NetworkConfig, ReplicationConfig, SyncConfig};
use crate::models::{ClarisaInstitution, Watermark};
use crate::{ClarisaError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Source of remote institution snapshots.
///
/// The replicator depends on this seam rather than on [`ClarisaClient`]
/// directly so cycles can run against in-memory fixtures.
#[async_trait]
pub trait ClarisaSource: Send + Sync {
    /// Fetch institutions changed since `watermark`, or all of them.
    async fn fetch_institutions(
        &self,
        watermark: Option<Watermark>,
    ) -> Result<Vec<ClarisaInstitution>>;
}

/// HTTP client bound to one Clarisa host.
pub struct ClarisaClient {
    client: Client,
    api_base: Url,
    credentials: ClarisaCredentials,
}

impl ClarisaClient {
    /// Create a client with the default request timeout.
    pub fn new(host: &str, credentials: ClarisaCredentials) -> Result<Self> {
        Self::with_timeout(host, credentials, NetworkConfig::CLARISA_REQUEST_TIMEOUT)
    }

    /// Create a client from replication settings.
    pub fn from_config(config: &ReplicationConfig) -> Result<Self> {
        Self::new(&config.host, config.credentials.clone())
    }

    /// Create a client with a custom request timeout.
    pub fn with_timeout(
        host: &str,
        credentials: ClarisaCredentials,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            api_base: api_base_url(host)?,
            credentials,
        })
    }

    /// Base URL all paths are resolved against.
    pub fn api_base(&self) -> &Url {
        &self.api_base
    }

    /// Resolve a path such as `institutions?show=all` to a full URL.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        self.api_base.join(path).map_err(|e| ClarisaError::Config {
            message: format!("Invalid Clarisa path '{}': {}", path, e),
        })
    }

    /// GET a path and decode the body as a JSON array of `T`.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let url = self.endpoint(path)?;

        debug!("GET {}", url);

        let response = self
            .client
            .get(url.clone())
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClarisaError::RemoteUnavailable {
                message: format!("GET {} returned {}", url, status),
                status: Some(status.as_u16()),
            });
        }

        let body = response.bytes().await?;
        let items: Vec<T> = serde_json::from_slice(&body)?;

        debug!("GET {} returned {} records", url, items.len());
        Ok(items)
    }
}

#[async_trait]
impl ClarisaSource for ClarisaClient {
    async fn fetch_institutions(
        &self,
        watermark: Option<Watermark>,
    ) -> Result<Vec<ClarisaInstitution>> {
        self.get(&institutions_path(watermark)).await
    }
}

/// Query path for institutions, incremental when a watermark is known.
pub fn institutions_path(watermark: Option<Watermark>) -> String {
    match watermark {
        Some(mark) => format!(
            "{}&from={}",
            SyncConfig::INSTITUTIONS_PATH,
            mark.as_unix_millis()
        ),
        None => SyncConfig::INSTITUTIONS_PATH.to_string(),
    }
}

/// `{host}/api/`, tolerating hosts with or without a trailing slash.
fn api_base_url(host: &str) -> Result<Url> {
    let mut host = host.trim().to_string();
    if !host.ends_with('/') {
        host.push('/');
    }

    let base = Url::parse(&host).map_err(|e| ClarisaError::Config {
        message: format!("Invalid Clarisa host '{}': {}", host, e),
    })?;

    base.join(NetworkConfig::CLARISA_API_PREFIX)
        .map_err(|e| ClarisaError::Config {
            message: format!("Invalid Clarisa host '{}': {}", host, e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn creds() -> ClarisaCredentials {
        ClarisaCredentials {
            username: "user".into(),
            password: "secret".into(),
        }
    }

    #[test]
    fn test_institutions_path_without_watermark() {
        assert_eq!(institutions_path(None), "institutions?show=all");
    }

    #[test]
    fn test_institutions_path_with_watermark() {
        let mark = Watermark(Utc.with_ymd_and_hms(2024, 3, 18, 16, 2, 55).unwrap());
        assert_eq!(
            institutions_path(Some(mark)),
            "institutions?show=all&from=1710777775000"
        );
    }

    #[test]
    fn test_api_base_with_and_without_slash() {
        let a = ClarisaClient::new("https://clarisa.example.org", creds()).unwrap();
        let b = ClarisaClient::new("https://clarisa.example.org/", creds()).unwrap();
        assert_eq!(a.api_base().as_str(), "https://clarisa.example.org/api/");
        assert_eq!(a.api_base(), b.api_base());
    }

    #[test]
    fn test_api_base_keeps_host_path() {
        let client = ClarisaClient::new("https://example.org/clarisa", creds()).unwrap();
        assert_eq!(
            client.endpoint("institutions?show=all").unwrap().as_str(),
            "https://example.org/clarisa/api/institutions?show=all"
        );
    }

    #[test]
    fn test_invalid_host_is_config_error() {
        let err = ClarisaClient::new("not a url", creds()).err().unwrap();
        assert!(matches!(err, ClarisaError::Config { .. }));
    }
}

//! Metadata repository client.
//!
//! Implements [`MetadataSource`] over two JSON endpoints: one returning the
//! default attribute list, one returning the per-study override map.

use async_trait::async_trait;
use cdd_cache::{MetadataSource, StudyOverrideLists};
use cdd_core::{AttributeRecord, ConfigError, SourceError};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;

use crate::config::SourceConfig;

/// Longest error body kept in a [`SourceError::Status`] message.
const MAX_ERROR_BODY_LEN: usize = 512;

/// [`MetadataSource`] backed by the metadata repository's REST API.
#[derive(Debug, Clone)]
pub struct HttpMetadataSource {
    client: Client,
    defaults_url: Url,
    overrides_url: Url,
}

impl HttpMetadataSource {
    pub fn new(config: &SourceConfig) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                field: "CDD_SOURCE_TIMEOUT_SECS".to_string(),
                value: format!("{:?}", config.timeout),
                reason: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            defaults_url: parse_url("CDD_SOURCE_DEFAULTS_PATH", &config.defaults_url())?,
            overrides_url: parse_url("CDD_SOURCE_OVERRIDES_PATH", &config.overrides_url())?,
        })
    }

    pub fn defaults_url(&self) -> &Url {
        &self.defaults_url
    }

    pub fn overrides_url(&self) -> &Url {
        &self.overrides_url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        url: &Url,
    ) -> Result<T, SourceError> {
        tracing::debug!(operation, url = %url, "Requesting metadata repository");

        let response = self
            .client
            .get(url.clone())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| SourceError::Transport {
                operation: operation.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let mut message = response.text().await.unwrap_or_default();
            if message.len() > MAX_ERROR_BODY_LEN {
                let mut end = MAX_ERROR_BODY_LEN;
                while !message.is_char_boundary(end) {
                    end -= 1;
                }
                message.truncate(end);
            }
            return Err(SourceError::Status {
                operation: operation.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        let body = response.bytes().await.map_err(|e| SourceError::Transport {
            operation: operation.to_string(),
            reason: e.to_string(),
        })?;

        serde_json::from_slice(&body).map_err(|e| SourceError::Parse {
            operation: operation.to_string(),
            reason: e.to_string(),
        })
    }
}

fn parse_url(field: &str, url: &str) -> Result<Url, ConfigError> {
    Url::parse(url).map_err(|e| ConfigError::InvalidValue {
        field: field.to_string(),
        value: url.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl MetadataSource for HttpMetadataSource {
    async fn fetch_defaults(&self) -> Result<Vec<AttributeRecord>, SourceError> {
        self.get_json("fetch_defaults", &self.defaults_url).await
    }

    async fn fetch_overrides(&self) -> Result<StudyOverrideLists, SourceError> {
        self.get_json("fetch_overrides", &self.overrides_url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_are_built_from_config() -> Result<(), ConfigError> {
        let source = HttpMetadataSource::new(&SourceConfig::new("http://repo.local:8080/cdd"))?;
        assert_eq!(
            source.defaults_url().as_str(),
            "http://repo.local:8080/cdd/clinical-attributes"
        );
        assert_eq!(
            source.overrides_url().as_str(),
            "http://repo.local:8080/cdd/clinical-attributes/overrides"
        );
        Ok(())
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let err = HttpMetadataSource::new(&SourceConfig::new("not a url")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}

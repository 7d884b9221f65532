//! Content-API access: the error taxonomy, the fetcher contract, and the
//! production HTTP implementation.
//!
//! Everything downstream of the pipeline only ever sees [`IngestError`];
//! transport details stay in here. Error display strings deliberately carry
//! the keywords the classifier keys on.

use anyhow::Context;
use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ApiConfig;
use crate::payload::RawPayload;
use crate::record::{EntityId, EntityKind};

#[derive(Error, Debug, Clone)]
pub enum IngestError {
    #[error("network error: {0}")]
    Network(String),

    #[error("entity '{entity}' not found (HTTP 404)")]
    NotFound { entity: String },

    #[error("payload parse error: {0}")]
    DataStructure(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("system failure: {0}")]
    System(String),

    #[error("unclassified failure: {0}")]
    Unknown(String),
}

/// The one contract the pipeline has with the outside world. Implemented by
/// [`HttpContentFetcher`] in production and by scripted mocks in tests.
pub trait ContentFetcher {
    async fn fetch(
        &self,
        id: &EntityId,
        kind: EntityKind,
        locale: &str,
    ) -> Result<RawPayload, IngestError>;
}

/// Fetches `{base_url}/{locale}/{kind}/{id}.json` from the content API.
pub struct HttpContentFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpContentFetcher {
    pub fn new(config: &ApiConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .context("failed to build HTTP client")?;

        Ok(HttpContentFetcher {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn entity_url(&self, id: &EntityId, kind: EntityKind, locale: &str) -> String {
        format!(
            "{}/{}/{}/{}.json",
            self.base_url,
            locale,
            kind.api_path(),
            id
        )
    }
}

impl ContentFetcher for HttpContentFetcher {
    async fn fetch(
        &self,
        id: &EntityId,
        kind: EntityKind,
        locale: &str,
    ) -> Result<RawPayload, IngestError> {
        let url = self.entity_url(id, kind, locale);
        debug!("fetching {}", url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                IngestError::Network(format!("request timed out: {}", e))
            } else {
                IngestError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(IngestError::NotFound {
                entity: id.to_string(),
            });
        }
        if !status.is_success() {
            warn!("{} returned HTTP {}", url, status);
            return Err(IngestError::Network(format!("HTTP {} from {}", status, url)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| IngestError::Network(format!("failed reading body: {}", e)))?;

        let payload = RawPayload::parse(&body)
            .map_err(|e| IngestError::DataStructure(e.to_string()))?;
        if !payload.is_object() {
            return Err(IngestError::DataStructure(
                "payload root is not a JSON object".to_string(),
            ));
        }

        Ok(payload)
    }
}

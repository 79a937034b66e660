//! HTTP client for the external runtime.
//!
//! ## Endpoints
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | GET  | `/modforge/api/v1/entities?namespace={ns}` | `listEntities` |
//! | GET  | `/modforge/api/v1/entities/{entity}/fields` | `listFields` |
//! | GET  | `/modforge/api/v1/entities/{entity}/states` | `listWorkflowStates` |
//! | POST | `/modforge/api/v1/modules/install` | `installPackage` |
//!
//! Paths are appended to the configured base URL's own path, so a runtime
//! mounted under `/erp` is reached at `/erp/modforge/api/v1/...` whether or
//! not the base URL ends in a slash. Entity names travel as single
//! percent-encoded path segments.

use async_trait::async_trait;
use modforge_spec::{EntityDescriptor, FieldDescriptor, StateDescriptor};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::config::{ConfigError, RetryPolicy, RuntimeConnectionConfig};
use crate::error::InventoryError;
use crate::inventory::InventoryProvider;
use crate::retry::{retry_send, Idempotency};

const API_PATH: [&str; 3] = ["modforge", "api", "v1"];

/// Header carrying the module slug on install requests.
pub const MODULE_HEADER: &str = "x-modforge-module";

/// A connection to one runtime instance.
#[derive(Debug, Clone)]
pub struct HttpRuntime {
    pub(crate) http: reqwest::Client,
    pub(crate) base_url: url::Url,
    pub(crate) retry: RetryPolicy,
}

impl HttpRuntime {
    pub fn new(config: &RuntimeConnectionConfig) -> Result<Self, ConfigError> {
        if config.base_url.cannot_be_a_base() {
            return Err(ConfigError::InvalidUrl(
                "base_url".to_string(),
                format!("`{}` cannot carry a path", config.base_url),
            ));
        }
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_str(&format!("Bearer {}", config.api_token.as_str()))
                .map_err(|_| ConfigError::InvalidToken)?,
        );
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            retry: config.retry,
        })
    }

    /// The API URL for `segments`, each encoded as one path segment.
    pub(crate) fn url(&self, segments: &[&str]) -> url::Url {
        let mut url = self.base_url.clone();
        // `new` rejected cannot-be-a-base URLs.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(API_PATH).extend(segments);
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        url: url::Url,
        query: &[(&str, &str)],
    ) -> Result<Option<T>, InventoryError> {
        let resp = retry_send(&self.retry, Idempotency::Idempotent, endpoint, || {
            self.http.get(url.clone()).query(query).send()
        })
        .await
        .map_err(|e| InventoryError::SourceUnavailable {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if crate::retry::is_transient_status(status) {
            return Err(InventoryError::SourceUnavailable {
                endpoint: endpoint.to_string(),
                reason: format!("HTTP {}", status.as_u16()),
            });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(InventoryError::Api {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        resp.json().await.map(Some).map_err(|e| InventoryError::Decode {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl InventoryProvider for HttpRuntime {
    async fn list_entities(&self, namespace: &str) -> Result<Vec<EntityDescriptor>, InventoryError> {
        let url = self.url(&["entities"]);
        let entities = self
            .get_json("GET /entities", url, &[("namespace", namespace)])
            .await?
            .unwrap_or_default();
        Ok(entities)
    }

    async fn list_fields(&self, entity: &str) -> Result<Vec<FieldDescriptor>, InventoryError> {
        let endpoint = format!("GET /entities/{entity}/fields");
        let url = self.url(&["entities", entity, "fields"]);
        self.get_json(&endpoint, url, &[])
            .await?
            .ok_or_else(|| InventoryError::UnknownEntity {
                entity: entity.to_string(),
            })
    }

    async fn list_workflow_states(&self, entity: &str) -> Result<Vec<StateDescriptor>, InventoryError> {
        let endpoint = format!("GET /entities/{entity}/states");
        let url = self.url(&["entities", entity, "states"]);
        Ok(self.get_json(&endpoint, url, &[]).await?.unwrap_or_default())
    }
}

//! # Installer
//!
//! Pushes a package archive to the runtime's `installPackage` endpoint.
//!
//! ## Outcome policy
//!
//! | Runtime behaviour | Result |
//! |-------------------|--------|
//! | `success: true` | `Ok`, outcome `Success`, created ids listed |
//! | `success: false`, some ids created | `Ok`, outcome `Failure`, ids and reason listed, nothing cleaned up |
//! | `success: false`, nothing created | `Err(Rejected)` with the runtime's reason |
//! | 4xx / 500 | `Err(Rejected)`, no retry |
//! | connect failure, 502/503/504 | retried with backoff, then `Err(Rejected)` |
//! | timeout after sending | `Err(OutcomeUnknown)`, never resent |

use modforge_core::Timestamp;
use serde::{Deserialize, Serialize};

use crate::config::RuntimeConnectionConfig;
use crate::error::InstallError;
use crate::http::{HttpRuntime, MODULE_HEADER};
use crate::retry::{is_transient_status, retry_send, Idempotency};

/// Whether the runtime applied the package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallOutcome {
    Success,
    Failure,
}

/// What the runtime reported for one install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallResult {
    pub module: String,
    pub outcome: InstallOutcome,
    /// Runtime-assigned identifiers of entities the install created.
    pub created_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub installed_at: Timestamp,
}

impl InstallResult {
    pub fn is_success(&self) -> bool {
        self.outcome == InstallOutcome::Success
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RuntimeId {
    Number(i64),
    Text(String),
}

impl From<RuntimeId> for String {
    fn from(id: RuntimeId) -> Self {
        match id {
            RuntimeId::Number(n) => n.to_string(),
            RuntimeId::Text(s) => s,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstallResponse {
    success: bool,
    #[serde(default)]
    created_ids: Vec<RuntimeId>,
    #[serde(default)]
    error: Option<String>,
}

/// Installs package archives into one runtime.
#[derive(Debug, Clone)]
pub struct Installer {
    runtime: HttpRuntime,
}

impl Installer {
    pub fn new(config: &RuntimeConnectionConfig) -> Result<Self, InstallError> {
        Ok(Self {
            runtime: HttpRuntime::new(config)?,
        })
    }

    pub fn from_runtime(runtime: HttpRuntime) -> Self {
        Self { runtime }
    }

    /// Install `archive` as `module`. See the module docs for the outcome policy.
    pub async fn install_package(&self, module: &str, archive: &[u8]) -> Result<InstallResult, InstallError> {
        let endpoint = "POST /modules/install";
        let url = self.runtime.url(&["modules", "install"]);
        let policy = self.runtime.retry;
        tracing::info!(module, bytes = archive.len(), "installing package");

        let resp = retry_send(&policy, Idempotency::NonIdempotent, endpoint, || {
            self.runtime
                .http
                .post(url.clone())
                .header(MODULE_HEADER, module)
                .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                .body(archive.to_vec())
                .send()
        })
        .await
        .map_err(|e| {
            if e.is_timeout() {
                InstallError::OutcomeUnknown {
                    reason: format!("no response from runtime before timeout: {e}"),
                }
            } else {
                InstallError::Rejected {
                    reason: format!(
                        "runtime unreachable after {} attempt(s): {e}",
                        policy.max_retries + 1
                    ),
                }
            }
        })?;

        let status = resp.status();
        if is_transient_status(status) {
            return Err(InstallError::Rejected {
                reason: format!(
                    "runtime still unavailable after {} attempt(s): HTTP {}",
                    policy.max_retries + 1,
                    status.as_u16()
                ),
            });
        }
        let body = resp.text().await.unwrap_or_default();
        let parsed: Option<InstallResponse> = serde_json::from_str(&body).ok();

        if !status.is_success() {
            let reason = parsed
                .and_then(|p| p.error)
                .unwrap_or_else(|| format!("HTTP {}: {body}", status.as_u16()));
            return Err(InstallError::Rejected { reason });
        }
        let Some(response) = parsed else {
            return Err(InstallError::OutcomeUnknown {
                reason: format!("unreadable install response: {body}"),
            });
        };

        let created_ids: Vec<String> = response.created_ids.into_iter().map(String::from).collect();
        let installed_at = Timestamp::now();
        if response.success {
            tracing::info!(module, created = created_ids.len(), "package installed");
            return Ok(InstallResult {
                module: module.to_string(),
                outcome: InstallOutcome::Success,
                created_ids,
                reason: None,
                installed_at,
            });
        }

        let reason = response
            .error
            .unwrap_or_else(|| "runtime reported failure without a reason".to_string());
        if created_ids.is_empty() {
            return Err(InstallError::Rejected { reason });
        }
        tracing::warn!(
            module,
            created = created_ids.len(),
            "install partially applied; created entities were left in place: {reason}"
        );
        Ok(InstallResult {
            module: module.to_string(),
            outcome: InstallOutcome::Failure,
            created_ids,
            reason: Some(reason),
            installed_at,
        })
    }
}

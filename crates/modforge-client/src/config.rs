//! Runtime connection configuration.
//!
//! One base URL serves both the inventory and install endpoints. The API
//! token is held in a zeroizing buffer and never appears in `Debug` output.

use std::time::Duration;

use url::Url;
use zeroize::Zeroizing;

/// Default request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Bounded exponential backoff for transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub backoff_factor: u32,
}

impl RetryPolicy {
    /// No retries at all.
    pub const NONE: RetryPolicy = RetryPolicy {
        max_retries: 0,
        base_delay: Duration::ZERO,
        backoff_factor: 1,
    };

    /// Delay before retry number `attempt` (zero-based): 200ms, 400ms, 800ms
    /// with the defaults.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(self.backoff_factor.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(200),
            backoff_factor: 2,
        }
    }
}

/// How to reach the external runtime.
#[derive(Clone)]
pub struct RuntimeConnectionConfig {
    pub base_url: Url,
    pub api_token: Zeroizing<String>,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl std::fmt::Debug for RuntimeConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeConnectionConfig")
            .field("base_url", &self.base_url)
            .field("api_token", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

impl RuntimeConnectionConfig {
    /// Build a configuration for `base_url` with default timeout and retry.
    pub fn new(base_url: Url, api_token: impl Into<String>) -> Self {
        Self {
            base_url,
            api_token: Zeroizing::new(api_token.into()),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// - `MODFORGE_RUNTIME_URL` (required)
    /// - `MODFORGE_API_TOKEN` (required)
    /// - `MODFORGE_TIMEOUT_SECS` (default: 30)
    /// - `MODFORGE_MAX_RETRIES` (default: 3)
    /// - `MODFORGE_BASE_DELAY_MS` (default: 200)
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw = std::env::var("MODFORGE_RUNTIME_URL").map_err(|_| ConfigError::MissingUrl)?;
        Self::from_env_with_url(&raw)
    }

    /// Like [`Self::from_env`], with the URL supplied by the caller (for
    /// example from a `--target` flag).
    pub fn from_env_with_url(raw_url: &str) -> Result<Self, ConfigError> {
        let base_url = parse_url("MODFORGE_RUNTIME_URL", raw_url)?;
        let api_token = std::env::var("MODFORGE_API_TOKEN").map_err(|_| ConfigError::MissingToken)?;
        let defaults = RetryPolicy::default();
        Ok(Self {
            base_url,
            api_token: Zeroizing::new(api_token),
            timeout: Duration::from_secs(env_number("MODFORGE_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)),
            retry: RetryPolicy {
                max_retries: env_number("MODFORGE_MAX_RETRIES", defaults.max_retries),
                base_delay: Duration::from_millis(env_number(
                    "MODFORGE_BASE_DELAY_MS",
                    defaults.base_delay.as_millis() as u64,
                )),
                backoff_factor: defaults.backoff_factor,
            },
        })
    }

    /// A configuration pointing at a loopback server (for testing).
    pub fn local(port: u16, token: &str) -> Result<Self, ConfigError> {
        let mut config = Self::new(parse_url("localhost", &format!("http://127.0.0.1:{port}"))?, token);
        config.timeout = Duration::from_secs(5);
        config.retry = RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
            backoff_factor: 2,
        };
        Ok(config)
    }
}

fn parse_url(name: &str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::InvalidUrl(name.to_string(), e.to_string()))
}

fn env_number<T: std::str::FromStr>(var: &str, default: T) -> T {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("MODFORGE_RUNTIME_URL environment variable is required")]
    MissingUrl,
    #[error("MODFORGE_API_TOKEN environment variable is required")]
    MissingToken,
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("API token contains characters not allowed in an HTTP header")]
    InvalidToken,
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

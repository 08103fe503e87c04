use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Region used when none is configured.
pub const DEFAULT_REGION: &str = "ap-south-1";

/// How aggressively Rekognition filters low-quality faces before matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualityFilter {
    None,
    Auto,
    Low,
    Medium,
    High,
}

/// Connection settings for the comparison service.
#[derive(Debug, Clone, PartialEq)]
pub struct RekognitionConfig {
    pub region: String,
    /// Full endpoint URL; derived from `region` when unset.
    pub endpoint: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retries after the first attempt for transient failures.
    pub max_retries: u32,
    /// Backoff before the first retry; doubles each attempt.
    pub retry_base_delay: Duration,
    pub quality_filter: Option<QualityFilter>,
}

impl Default for RekognitionConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            endpoint: None,
            timeout: Duration::from_secs(30),
            max_retries: 2,
            retry_base_delay: Duration::from_millis(200),
            quality_filter: None,
        }
    }
}

impl RekognitionConfig {
    pub fn endpoint_url(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("https://rekognition.{}.amazonaws.com/", self.region))
    }
}

/// Static AWS credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }
}

// Never print secrets
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

use anyhow::{bail, Context, Result};
use facecheck_core::limit::{MAX_DIMENSION, MAX_IMAGE_BYTES};
use facecheck_core::orchestrator::{DEFAULT_FACES_DIR, DEFAULT_SIMILARITY_THRESHOLD};
use facecheck_core::{MatchConfig, ResizePolicy, SizeLimits};
use facecheck_rekognition::{Credentials, QualityFilter, RekognitionConfig, DEFAULT_REGION};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "facecheck.toml";

/// CLI configuration: defaults, then a TOML file, then `FACECHECK_*`
/// environment variables. Credentials are only ever read from the
/// environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory of known face images.
    pub faces_dir: PathBuf,
    /// Where the uploaded image is staged.
    pub work_dir: PathBuf,
    /// Similarity (0–100) a face must exceed to count as a match.
    pub similarity_threshold: f32,
    /// Threshold forwarded to the comparison service. Never above
    /// `similarity_threshold` once forwarded.
    pub service_threshold: f32,
    pub max_dimension: u32,
    /// Encoded size ceiling in bytes; 0 disables the check.
    pub max_image_bytes: u64,
    pub resize_policy: ResizePolicy,
    pub region: String,
    pub endpoint: Option<String>,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub quality_filter: Option<QualityFilter>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            faces_dir: PathBuf::from(DEFAULT_FACES_DIR),
            work_dir: PathBuf::from("."),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            service_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            max_dimension: MAX_DIMENSION,
            max_image_bytes: MAX_IMAGE_BYTES,
            resize_policy: ResizePolicy::Fit,
            region: DEFAULT_REGION.to_string(),
            endpoint: None,
            request_timeout_secs: 30,
            max_retries: 2,
            retry_base_delay_ms: 200,
            quality_filter: None,
        }
    }
}

impl Config {
    /// Load from `path` (or `facecheck.toml` if present), then apply the
    /// process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self =
            toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Override fields from `FACECHECK_*` variables via `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("FACECHECK_FACES_DIR") {
            self.faces_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("FACECHECK_WORK_DIR") {
            self.work_dir = PathBuf::from(v);
        }
        env_parse(&lookup, "FACECHECK_SIMILARITY_THRESHOLD", &mut self.similarity_threshold);
        env_parse(&lookup, "FACECHECK_SERVICE_THRESHOLD", &mut self.service_threshold);
        env_parse(&lookup, "FACECHECK_MAX_DIMENSION", &mut self.max_dimension);
        env_parse(&lookup, "FACECHECK_MAX_IMAGE_BYTES", &mut self.max_image_bytes);
        env_parse(&lookup, "FACECHECK_REQUEST_TIMEOUT_SECS", &mut self.request_timeout_secs);
        env_parse(&lookup, "FACECHECK_MAX_RETRIES", &mut self.max_retries);
        env_parse(&lookup, "FACECHECK_RETRY_BASE_DELAY_MS", &mut self.retry_base_delay_ms);

        if let Some(v) = lookup("FACECHECK_RESIZE_POLICY") {
            match v.to_ascii_lowercase().as_str() {
                "fit" => self.resize_policy = ResizePolicy::Fit,
                "square" => self.resize_policy = ResizePolicy::Square,
                other => tracing::warn!(value = other, "ignoring unknown FACECHECK_RESIZE_POLICY"),
            }
        }
        if let Some(v) = lookup("FACECHECK_QUALITY_FILTER") {
            match serde_json::from_value(serde_json::Value::String(v.to_ascii_uppercase())) {
                Ok(filter) => self.quality_filter = Some(filter),
                Err(_) => tracing::warn!(value = %v, "ignoring unknown FACECHECK_QUALITY_FILTER"),
            }
        }

        let region = ["FACECHECK_REGION", "AWS_REGION", "AWS_DEFAULT_REGION"]
            .into_iter()
            .find_map(|key| lookup(key).filter(|v| !v.is_empty()));
        if let Some(region) = region {
            self.region = region;
        }
        if let Some(v) = lookup("FACECHECK_ENDPOINT").filter(|v| !v.is_empty()) {
            self.endpoint = Some(v);
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("similarity_threshold", self.similarity_threshold),
            ("service_threshold", self.service_threshold),
        ] {
            if !(0.0..=100.0).contains(&value) {
                bail!("{name} must be between 0 and 100, got {value}");
            }
        }
        if self.max_dimension == 0 {
            bail!("max_dimension must be positive");
        }
        if self.region.is_empty() {
            bail!("region must not be empty");
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be positive");
        }
        Ok(())
    }

    pub fn size_limits(&self) -> SizeLimits {
        SizeLimits {
            max_dimension: self.max_dimension,
            max_bytes: (self.max_image_bytes > 0).then_some(self.max_image_bytes),
            policy: self.resize_policy,
        }
    }

    pub fn match_config(&self) -> MatchConfig {
        MatchConfig {
            faces_dir: self.faces_dir.clone(),
            similarity_threshold: self.similarity_threshold,
            // The service drops faces below its threshold, so it must not
            // filter out scores the acceptance threshold would take.
            service_threshold: self.service_threshold.min(self.similarity_threshold),
            limits: self.size_limits(),
        }
    }

    pub fn rekognition_config(&self) -> RekognitionConfig {
        RekognitionConfig {
            region: self.region.clone(),
            endpoint: self.endpoint.clone(),
            timeout: Duration::from_secs(self.request_timeout_secs),
            max_retries: self.max_retries,
            retry_base_delay: Duration::from_millis(self.retry_base_delay_ms),
            quality_filter: self.quality_filter,
        }
    }
}

/// Read AWS credentials from `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY`
/// and the optional `AWS_SESSION_TOKEN`.
pub fn credentials_from(lookup: impl Fn(&str) -> Option<String>) -> Result<Credentials> {
    let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());
    let (Some(access_key), Some(secret_key)) = (
        non_empty("AWS_ACCESS_KEY_ID"),
        non_empty("AWS_SECRET_ACCESS_KEY"),
    ) else {
        bail!("AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY must be set");
    };

    let credentials = Credentials::new(access_key, secret_key);
    Ok(match non_empty("AWS_SESSION_TOKEN") {
        Some(token) => credentials.with_session_token(token),
        None => credentials,
    })
}

fn env_parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut T) {
    if let Some(raw) = lookup(key) {
        match raw.trim().parse() {
            Ok(value) => *slot = value,
            Err(_) => tracing::warn!(key, value = %raw, "ignoring unparseable environment value"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.faces_dir, PathBuf::from("faces"));
        assert_eq!(config.similarity_threshold, 70.0);
        assert_eq!(config.service_threshold, 70.0);
        assert_eq!(config.max_dimension, 4096);
        assert_eq!(config.region, "ap-south-1");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            faces_dir = "known"
            similarity_threshold = 85.5
            resize_policy = "square"
            quality_filter = "HIGH"
            "#,
        )
        .unwrap();
        assert_eq!(config.faces_dir, PathBuf::from("known"));
        assert_eq!(config.similarity_threshold, 85.5);
        assert_eq!(config.resize_policy, ResizePolicy::Square);
        assert_eq!(config.quality_filter, Some(QualityFilter::High));
        assert_eq!(config.max_retries, 2);
    }

    #[test]
    fn test_unknown_toml_key_rejected() {
        assert!(toml::from_str::<Config>("aws_secret = \"x\"").is_err());
    }

    #[test]
    fn test_from_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("facecheck.toml");
        std::fs::write(&path, "max_dimension = 2048\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.max_dimension, 2048);
        assert!(Config::from_file(&tmp.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = Config {
            faces_dir: PathBuf::from("from-file"),
            ..Default::default()
        };
        config.apply_env(env(&[
            ("FACECHECK_FACES_DIR", "/srv/faces"),
            ("FACECHECK_SIMILARITY_THRESHOLD", "90"),
            ("FACECHECK_MAX_RETRIES", "5"),
            ("FACECHECK_RESIZE_POLICY", "Square"),
            ("FACECHECK_QUALITY_FILTER", "low"),
            ("FACECHECK_ENDPOINT", "http://localhost:4566/"),
        ]));

        assert_eq!(config.faces_dir, PathBuf::from("/srv/faces"));
        assert_eq!(config.similarity_threshold, 90.0);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.resize_policy, ResizePolicy::Square);
        assert_eq!(config.quality_filter, Some(QualityFilter::Low));
        assert_eq!(config.endpoint.as_deref(), Some("http://localhost:4566/"));
    }

    #[test]
    fn test_bad_env_value_ignored() {
        let mut config = Config::default();
        config.apply_env(env(&[("FACECHECK_MAX_DIMENSION", "huge")]));
        assert_eq!(config.max_dimension, 4096);
    }

    #[test]
    fn test_region_precedence() {
        let mut config = Config::default();
        config.apply_env(env(&[("AWS_DEFAULT_REGION", "us-west-2")]));
        assert_eq!(config.region, "us-west-2");

        config.apply_env(env(&[
            ("AWS_REGION", "eu-central-1"),
            ("FACECHECK_REGION", "ap-northeast-1"),
        ]));
        assert_eq!(config.region, "ap-northeast-1");
    }

    #[test]
    fn test_validate_threshold_range() {
        let config = Config {
            similarity_threshold: 120.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = Config {
            request_timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_lowered_threshold_reaches_service() {
        let config = Config {
            similarity_threshold: 60.0,
            ..Default::default()
        };
        config.validate().unwrap();
        let mc = config.match_config();
        assert_eq!(mc.similarity_threshold, 60.0);
        assert_eq!(mc.service_threshold, 60.0);

        let config = Config {
            similarity_threshold: 90.0,
            service_threshold: 80.0,
            ..Default::default()
        };
        assert_eq!(config.match_config().service_threshold, 80.0);
    }

    #[test]
    fn test_zero_byte_limit_disables_check() {
        let config = Config {
            max_image_bytes: 0,
            ..Default::default()
        };
        assert_eq!(config.size_limits().max_bytes, None);
        assert_eq!(Config::default().size_limits().max_bytes, Some(MAX_IMAGE_BYTES));
    }

    #[test]
    fn test_derived_configs() {
        let config = Config {
            request_timeout_secs: 5,
            retry_base_delay_ms: 50,
            ..Default::default()
        };
        let rk = config.rekognition_config();
        assert_eq!(rk.timeout, Duration::from_secs(5));
        assert_eq!(rk.retry_base_delay, Duration::from_millis(50));
        assert_eq!(config.match_config().faces_dir, PathBuf::from("faces"));
    }

    #[test]
    fn test_credentials() {
        assert!(credentials_from(env(&[])).is_err());
        assert!(credentials_from(env(&[("AWS_ACCESS_KEY_ID", "AKID")])).is_err());

        let creds = credentials_from(env(&[
            ("AWS_ACCESS_KEY_ID", "AKID"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
            ("AWS_SESSION_TOKEN", "token"),
        ]))
        .unwrap();
        assert_eq!(creds.access_key_id, "AKID");
        assert_eq!(creds.session_token.as_deref(), Some("token"));
    }
}

//! Signed HTTPS client for Rekognition `CompareFaces`.

use crate::config::{Credentials, RekognitionConfig};
use crate::sigv4::{self, SigningRequest};
use crate::wire::{self, CompareFacesRequest, CompareFacesResponse, ErrorBody, ImagePayload};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use facecheck_core::{CompareError, ComparisonRequest, ComparisonResult, FaceComparer, ImageAsset};
use rand::Rng;
use reqwest::{Client, Url};
use std::time::Duration;

const SERVICE: &str = "rekognition";

pub struct RekognitionClient {
    http: Client,
    config: RekognitionConfig,
    credentials: Credentials,
    url: Url,
    host: String,
}

impl RekognitionClient {
    pub fn new(config: RekognitionConfig, credentials: Credentials) -> Result<Self, CompareError> {
        let url = Url::parse(&config.endpoint_url())
            .map_err(|e| CompareError::Network(format!("invalid endpoint: {e}")))?;
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(CompareError::Network(format!("endpoint has no host: {url}")));
            }
        };

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CompareError::Network(e.to_string()))?;

        tracing::info!(
            endpoint = %url,
            region = %config.region,
            timeout_ms = config.timeout.as_millis() as u64,
            max_retries = config.max_retries,
            "comparison client ready"
        );

        Ok(Self {
            http,
            config,
            credentials,
            url,
            host,
        })
    }

    pub fn config(&self) -> &RekognitionConfig {
        &self.config
    }

    /// Serialize the `CompareFaces` body for a prepared pair.
    async fn build_body(&self, request: &ComparisonRequest<'_>) -> Result<Vec<u8>, CompareError> {
        let body = CompareFacesRequest {
            source_image: payload(request.source).await?,
            target_image: payload(request.target).await?,
            similarity_threshold: request.similarity_threshold,
            quality_filter: self.config.quality_filter,
        };
        serde_json::to_vec(&body).map_err(|e| CompareError::MalformedResponse(e.to_string()))
    }

    async fn send_once(&self, body: &[u8]) -> Result<ComparisonResult, CompareError> {
        let headers = [
            ("content-type", wire::CONTENT_TYPE),
            ("x-amz-target", wire::TARGET),
        ];
        let signature = sigv4::sign(
            &SigningRequest {
                method: "POST",
                host: &self.host,
                path: self.url.path(),
                query: self.url.query().unwrap_or(""),
                headers: &headers,
                payload: body,
            },
            &self.credentials,
            &self.config.region,
            SERVICE,
            chrono::Utc::now(),
        );

        let mut builder = self
            .http
            .post(self.url.clone())
            .header("content-type", wire::CONTENT_TYPE)
            .header("x-amz-target", wire::TARGET)
            .header("x-amz-date", &signature.amz_date)
            .header("authorization", &signature.authorization)
            .body(body.to_vec());
        if let Some(token) = &signature.security_token {
            builder = builder.header("x-amz-security-token", token);
        }

        let response = builder.send().await.map_err(map_transport_error)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(map_transport_error)?;

        if !status.is_success() {
            return Err(service_error(status.as_u16(), &bytes));
        }

        let parsed: CompareFacesResponse = serde_json::from_slice(&bytes)
            .map_err(|e| CompareError::MalformedResponse(e.to_string()))?;
        Ok(parsed.into())
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.config.retry_base_delay.as_millis() as u64;
        let exp = base.saturating_mul(1u64 << attempt.min(16));
        let jitter = rand::thread_rng().gen_range(0..=base / 2);
        Duration::from_millis(exp + jitter)
    }
}

impl FaceComparer for RekognitionClient {
    async fn compare(
        &self,
        request: &ComparisonRequest<'_>,
    ) -> Result<ComparisonResult, CompareError> {
        let body = self.build_body(request).await?;

        let mut attempt = 0;
        loop {
            match self.send_once(&body).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    let delay = self.backoff(attempt);
                    attempt += 1;
                    tracing::warn!(
                        error = %e,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "transient comparison failure; retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

async fn payload(asset: &ImageAsset) -> Result<ImagePayload, CompareError> {
    let bytes = tokio::fs::read(&asset.path)
        .await
        .map_err(|source| CompareError::ImageRead {
            path: asset.path.clone(),
            source,
        })?;
    Ok(ImagePayload {
        bytes: BASE64.encode(bytes),
    })
}

fn map_transport_error(e: reqwest::Error) -> CompareError {
    if e.is_timeout() {
        CompareError::Timeout
    } else {
        CompareError::Network(e.to_string())
    }
}

fn service_error(status: u16, body: &[u8]) -> CompareError {
    match serde_json::from_slice::<ErrorBody>(body) {
        Ok(parsed) => CompareError::Service {
            status,
            code: parsed.code().unwrap_or("Unknown").to_string(),
            message: parsed.message.unwrap_or_default(),
        },
        Err(_) => CompareError::Service {
            status,
            code: "Unknown".to_string(),
            message: String::from_utf8_lossy(body).into_owned(),
        },
    }
}

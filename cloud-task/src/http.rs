use crate::types::{CloudTaskError, Result};
use backoff::{backoff::Backoff, exponential::ExponentialBackoff};
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Transport-level settings shared by every cloud integration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: "cloud-task/0.1".to_string(),
            timeout_seconds: 180,
            max_retries: 2,
            retry_delay_seconds: 2,
        }
    }
}

/// HTTP client wrapper that retries transient failures (transport errors,
/// 429 and 5xx) with exponential backoff before surfacing an error.
/// Other non-2xx statuses fail immediately.
pub struct RetryingClient {
    client: Client,
    config: HttpConfig,
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

impl RetryingClient {
    pub fn new(config: HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// POST a JSON body and parse the JSON response.
    pub async fn post_json(&self, url: &str, bearer: Option<&str>, body: &Value) -> Result<Value> {
        let response = self
            .send_with_retry(url, || {
                let mut request = self.client.post(url).json(body);
                if let Some(token) = bearer {
                    request = request.bearer_auth(token);
                }
                Ok(request)
            })
            .await?;
        Ok(response.json::<Value>().await?)
    }

    /// GET a JSON document.
    pub async fn get_json(&self, url: &str, bearer: Option<&str>) -> Result<Value> {
        let response = self
            .send_with_retry(url, || {
                let mut request = self.client.get(url);
                if let Some(token) = bearer {
                    request = request.bearer_auth(token);
                }
                Ok(request)
            })
            .await?;
        Ok(response.json::<Value>().await?)
    }

    /// GET a binary body (artifact downloads; these URLs are presigned, no auth).
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.send_with_retry(url, || Ok(self.client.get(url))).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// POST one file as a multipart form field and parse the JSON response.
    /// The form is rebuilt from the owned bytes on every retry attempt.
    pub async fn post_multipart_file(
        &self,
        url: &str,
        bearer: Option<&str>,
        field: &str,
        file_name: &str,
        mime: &str,
        bytes: Vec<u8>,
    ) -> Result<Value> {
        let response = self
            .send_with_retry(url, || {
                let part = reqwest::multipart::Part::bytes(bytes.clone())
                    .file_name(file_name.to_string())
                    .mime_str(mime)
                    .map_err(CloudTaskError::Http)?;
                let form = reqwest::multipart::Form::new().part(field.to_string(), part);
                let mut request = self.client.post(url).multipart(form);
                if let Some(token) = bearer {
                    request = request.bearer_auth(token);
                }
                Ok(request)
            })
            .await?;
        Ok(response.json::<Value>().await?)
    }

    async fn send_with_retry<F>(&self, url: &str, make_request: F) -> Result<Response>
    where
        F: Fn() -> Result<reqwest::RequestBuilder>,
    {
        let mut backoff: ExponentialBackoff<backoff::SystemClock> = ExponentialBackoff {
            current_interval: Duration::from_secs(self.config.retry_delay_seconds),
            initial_interval: Duration::from_secs(self.config.retry_delay_seconds),
            max_interval: Duration::from_secs(self.config.retry_delay_seconds * 32),
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        };

        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match make_request()?.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        debug!("{} -> {}", url, status);
                        return Ok(response);
                    }
                    if !is_retryable(status) {
                        return Err(CloudTaskError::Status {
                            status: status.as_u16(),
                            url: url.to_string(),
                        });
                    }
                    last_error = Some(CloudTaskError::Status {
                        status: status.as_u16(),
                        url: url.to_string(),
                    });
                }
                Err(e) => {
                    last_error = Some(CloudTaskError::Http(e));
                }
            }

            if attempt < self.config.max_retries {
                if let Some(delay) = backoff.next_backoff() {
                    warn!(
                        "Attempt {} failed for {}, retrying in {:?}",
                        attempt + 1,
                        url,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }

        Err(last_error.unwrap_or(CloudTaskError::Status {
            status: 0,
            url: url.to_string(),
        }))
    }
}

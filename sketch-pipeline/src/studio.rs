use crate::types::{PipelineError, Result};
use cloud_task::poll::{drive, submit_task_id, PollConfig, TaskProbe};
use cloud_task::{HttpConfig, RetryingClient, TaskOutcome};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone)]
pub struct StudioConfig {
    pub base_url: String,
    pub api_key: String,
    /// Model version for the multiview-to-model build.
    pub model_version: String,
    /// Model version for the single-view render tasks.
    pub view_model_version: String,
    pub texture_quality: String,
    pub face_limit: u32,
    pub poll: PollConfig,
    pub views_dir: PathBuf,
    pub models_dir: PathBuf,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            model_version: "v2.5-20250123".to_string(),
            view_model_version: "flux.1_kontext_pro".to_string(),
            texture_quality: "detailed".to_string(),
            face_limit: 10_000,
            poll: PollConfig::default(),
            views_dir: PathBuf::from("rendered_views"),
            models_dir: PathBuf::from("generated_models"),
        }
    }
}

/// Client for the 3D service's three submit/poll flows (view render,
/// multiview build, format conversion). All tasks go through the same
/// submit endpoint and status URL scheme.
pub struct StudioClient {
    http: RetryingClient,
    config: StudioConfig,
}

impl StudioClient {
    pub fn new(config: StudioConfig, http_config: HttpConfig) -> Result<Self> {
        Ok(Self {
            http: RetryingClient::new(http_config).map_err(PipelineError::Cloud)?,
            config,
        })
    }

    pub fn config(&self) -> &StudioConfig {
        &self.config
    }

    pub(crate) fn http(&self) -> &RetryingClient {
        &self.http
    }

    /// Uploads a reference image and returns its token for task payloads.
    pub async fn upload_image(&self, path: &Path) -> Result<String> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("image.jpg")
            .to_string();

        info!("Uploading {} ({} bytes)", file_name, bytes.len());
        let url = format!("{}/upload", self.config.base_url);
        let response = self
            .http
            .post_multipart_file(
                &url,
                Some(&self.config.api_key),
                "file",
                &file_name,
                mime_for(path),
                bytes,
            )
            .await
            .map_err(PipelineError::Cloud)?;

        let code = response.get("code").and_then(Value::as_i64).unwrap_or(-1);
        let token = response
            .pointer("/data/image_token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty());
        match (code, token) {
            (0, Some(token)) => {
                let preview: String = token.chars().take(10).collect();
                info!("Upload accepted, token {}...", preview);
                Ok(token.to_string())
            }
            _ => Err(PipelineError::stage(
                "image upload",
                format!("unexpected response: {}", response),
            )),
        }
    }

    pub async fn submit_task(&self, payload: &Value) -> Result<String> {
        let url = format!("{}/task", self.config.base_url);
        let response = self
            .http
            .post_json(&url, Some(&self.config.api_key), payload)
            .await
            .map_err(PipelineError::Cloud)?;
        let task_id = submit_task_id(&response).map_err(PipelineError::Cloud)?;
        info!("Task submitted: {}", task_id);
        Ok(task_id)
    }

    /// Polls the task to a terminal outcome. Timeouts and failures come back
    /// as values; the caller decides what aborting the stage means.
    pub async fn poll_task(&self, task_id: &str) -> TaskOutcome {
        let status_url = format!("{}/task/{}", self.config.base_url, task_id);
        drive(&self.config.poll, |attempt| {
            let url = status_url.clone();
            let key = self.config.api_key.clone();
            let http = &self.http;
            let budget = self.config.poll.max_attempts;
            async move {
                info!("Waiting on task ({} of {} polls)", attempt, budget);
                let payload = http.get_json(&url, Some(&key)).await?;
                TaskProbe::from_status_payload(&payload)
            }
        })
        .await
    }
}

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use cloud_task::poll::{drive, submit_task_id, PollConfig, TaskProbe};
use cloud_task::{extract, HttpConfig, RetryingClient, TaskOutcome};
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

/// Turns captured audio into text. Implementations never fail loudly: an
/// empty string is the "no result" signal and the caller owns the fallback.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &[u8]) -> String;
}

#[derive(Debug, Clone)]
pub struct SpeechConfig {
    pub base_url: String,
    pub api_key: String,
    pub engine_model: String,
    pub channels: u32,
    pub poll: PollConfig,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            engine_model: "16k_zh".to_string(),
            channels: 1,
            poll: PollConfig::new(Duration::from_millis(1500), 30),
        }
    }
}

/// Submit-then-poll client for the speech-recognition service. Audio goes up
/// base64-encoded with the engine selection; the transcript comes back under
/// `result.text` or `output.text` depending on the service's mood.
pub struct SpeechRecognizer {
    http: RetryingClient,
    config: SpeechConfig,
}

impl SpeechRecognizer {
    pub fn new(config: SpeechConfig, http_config: HttpConfig) -> cloud_task::Result<Self> {
        Ok(Self {
            http: RetryingClient::new(http_config)?,
            config,
        })
    }

    async fn submit(&self, audio: &[u8]) -> cloud_task::Result<String> {
        let payload = json!({
            "type": "speech_to_text",
            "engine_model": self.config.engine_model,
            "channels": self.config.channels,
            "text_format": "plain",
            "audio": BASE64.encode(audio),
        });

        let url = format!("{}/task", self.config.base_url);
        let response = self
            .http
            .post_json(&url, Some(&self.config.api_key), &payload)
            .await?;

        submit_task_id(&response)
    }

    async fn run(&self, audio: &[u8]) -> String {
        let task_id = match self.submit(audio).await {
            Ok(id) => id,
            Err(e) => {
                warn!("Recognition submit failed: {}", e);
                return String::new();
            }
        };
        info!("Recognition task created: {}", task_id);

        let status_url = format!("{}/task/{}", self.config.base_url, task_id);
        let outcome = drive(&self.config.poll, |_| {
            let url = status_url.clone();
            let key = self.config.api_key.clone();
            let http = &self.http;
            async move {
                let payload = http.get_json(&url, Some(&key)).await?;
                TaskProbe::from_status_payload(&payload)
            }
        })
        .await;

        match outcome {
            TaskOutcome::Succeeded(data) => {
                match extract::probe_string(&data, &[&["result", "text"], &["output", "text"]]) {
                    Some(text) => {
                        info!("Recognition succeeded: {} chars", text.chars().count());
                        text
                    }
                    None => {
                        warn!("Recognition succeeded but returned no text");
                        String::new()
                    }
                }
            }
            TaskOutcome::Failed(reason) => {
                warn!("Recognition task failed: {}", reason);
                String::new()
            }
            TaskOutcome::TimedOut { attempts } => {
                warn!("Recognition task timed out after {} polls", attempts);
                String::new()
            }
        }
    }
}

#[async_trait]
impl Transcriber for SpeechRecognizer {
    /// Failure causes are logged, not distinguished: the judge treats "no
    /// transcript" the same as "nothing suspicious said".
    async fn transcribe(&self, audio: &[u8]) -> String {
        self.run(audio).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn transcript_prefers_result_over_output() {
        let data = json!({
            "status": "SUCCESS",
            "result": {"text": "hello from result"},
            "output": {"text": "hello from output"},
        });
        let text = extract::probe_string(&data, &[&["result", "text"], &["output", "text"]]);
        assert_eq!(text.as_deref(), Some("hello from result"));
    }

    #[test]
    fn default_config_matches_the_service_cadence() {
        let config = SpeechConfig::default();
        assert_eq!(config.poll.interval, Duration::from_millis(1500));
        assert_eq!(config.poll.max_attempts, 30);
        assert_eq!(config.channels, 1);
    }
}

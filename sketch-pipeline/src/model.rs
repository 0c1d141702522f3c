use crate::studio::StudioClient;
use crate::types::{clamp_prompt, ModelArtifact, ModelFormat, PipelineError, Result, Viewpoint};
use cloud_task::{extract, fetch_to_file, stamped_filename, TaskOutcome};
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::info;

const TASK_PROMPT_LIMIT: usize = 1024;

/// Uploaded view tokens in the multiview interface's slot order. Front and
/// left are validated at construction, before any network call is made.
#[derive(Debug, Clone)]
pub struct ViewTokens {
    front: String,
    left: String,
    back: Option<String>,
    right: Option<String>,
}

impl ViewTokens {
    pub fn from_parts(
        front: Option<String>,
        left: Option<String>,
        back: Option<String>,
        right: Option<String>,
    ) -> Result<Self> {
        let front = front
            .filter(|t| !t.is_empty())
            .ok_or(PipelineError::MissingView(Viewpoint::Front))?;
        let left = left
            .filter(|t| !t.is_empty())
            .ok_or(PipelineError::MissingView(Viewpoint::Left))?;
        Ok(Self {
            front,
            left,
            back: back.filter(|t| !t.is_empty()),
            right: right.filter(|t| !t.is_empty()),
        })
    }

    /// The four-slot file list, front -> left -> back -> right, with empty
    /// placeholders for omitted optional views.
    pub fn to_files(&self) -> Vec<Value> {
        let slot = |token: Option<&String>| match token {
            Some(token) => json!({"type": "jpg", "file_token": token}),
            None => json!({}),
        };
        vec![
            slot(Some(&self.front)),
            slot(Some(&self.left)),
            slot(self.back.as_ref()),
            slot(self.right.as_ref()),
        ]
    }
}

/// Builds the textured model from the four views and converts it to the
/// delivery format. The build hands back only an intermediate exchange
/// format, so the conversion is part of this stage: generate-succeeded with
/// convert-failed has no usable artifact and fails the stage.
pub struct ModelGenerator<'a> {
    studio: &'a StudioClient,
}

impl<'a> ModelGenerator<'a> {
    pub fn new(studio: &'a StudioClient) -> Self {
        Self { studio }
    }

    pub async fn generate(&self, views: &ViewTokens, style: &str) -> Result<ModelArtifact> {
        let config = self.studio.config();
        let payload = json!({
            "type": "multiview_to_model",
            "model_version": config.model_version,
            "files": views.to_files(),
            "prompt": clamp_prompt(
                &format!("3D model of furniture based on multiviews, {}", style),
                TASK_PROMPT_LIMIT,
            ),
            "texture": true,
            "pbr": true,
            "texture_quality": config.texture_quality,
            "face_limit": config.face_limit,
            "auto_size": false,
        });

        let task_id = self.studio.submit_task(&payload).await?;
        let data = match self.studio.poll_task(&task_id).await {
            TaskOutcome::Succeeded(data) => data,
            TaskOutcome::Failed(reason) => {
                return Err(PipelineError::stage("model generation", reason));
            }
            TaskOutcome::TimedOut { attempts } => {
                return Err(PipelineError::stage(
                    "model generation",
                    format!("timed out after {} polls", attempts),
                ));
            }
        };

        if extract_intermediate_url(&data).is_none() {
            return Err(PipelineError::stage(
                "model generation",
                "success payload carries no intermediate model URL",
            ));
        }

        info!("Intermediate exchange-format model ready, converting to STL");
        let stl_url = self.convert(&task_id).await?;
        Ok(ModelArtifact {
            format: ModelFormat::Stl,
            url: stl_url,
        })
    }

    async fn convert(&self, original_task_id: &str) -> Result<String> {
        let payload = json!({
            "type": "convert_model",
            "format": "STL",
            "original_model_task_id": original_task_id,
            "quad": false,
            "bake": true,
            "face_limit": self.studio.config().face_limit,
        });

        let task_id = self.studio.submit_task(&payload).await?;
        match self.studio.poll_task(&task_id).await {
            TaskOutcome::Succeeded(data) => extract_converted_url(&data).ok_or_else(|| {
                PipelineError::stage("format conversion", "success payload carries no STL URL")
            }),
            TaskOutcome::Failed(reason) => Err(PipelineError::stage("format conversion", reason)),
            TaskOutcome::TimedOut { attempts } => Err(PipelineError::stage(
                "format conversion",
                format!("timed out after {} polls", attempts),
            )),
        }
    }

    pub async fn download(&self, artifact: &ModelArtifact) -> Result<PathBuf> {
        let dest = self
            .studio
            .config()
            .models_dir
            .join(stamped_filename("furniture_model", artifact.format.extension()));
        fetch_to_file(self.studio.http(), &artifact.url, &dest)
            .await
            .map_err(PipelineError::Cloud)?;
        info!("Model saved: {}", dest.display());
        Ok(dest)
    }
}

/// The multiview build reports the textured model as `result.pbr_model.url`
/// or `output.pbr_model`, always in the exchange format.
pub(crate) fn extract_intermediate_url(data: &Value) -> Option<String> {
    extract::probe_url(
        data,
        &[&["result", "pbr_model"], &["output", "pbr_model"]],
        None,
    )
}

/// The conversion task reports the STL as `output.model` or
/// `result.model.url`; the extension check ignores the query string.
pub(crate) fn extract_converted_url(data: &Value) -> Option<String> {
    extract::probe_url(
        data,
        &[&["output", "model"], &["result", "model"]],
        Some(".stl"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn both_mandatory_views_build_a_token_set() {
        let tokens = ViewTokens::from_parts(
            Some("tok-front".to_string()),
            Some("tok-left".to_string()),
            None,
            None,
        )
        .expect("mandatory views present");

        let files = tokens.to_files();
        assert_eq!(files.len(), 4);
        assert_eq!(files[0]["file_token"], "tok-front");
        assert_eq!(files[1]["file_token"], "tok-left");
        assert_eq!(files[2], json!({}));
        assert_eq!(files[3], json!({}));
    }

    #[test]
    fn missing_front_view_fails_before_any_network_call() {
        let result = ViewTokens::from_parts(None, Some("tok-left".to_string()), None, None);
        assert!(matches!(
            result,
            Err(PipelineError::MissingView(Viewpoint::Front))
        ));
    }

    #[test]
    fn missing_left_view_fails_before_any_network_call() {
        let result = ViewTokens::from_parts(Some("tok-front".to_string()), None, None, None);
        assert!(matches!(
            result,
            Err(PipelineError::MissingView(Viewpoint::Left))
        ));
    }

    #[test]
    fn empty_tokens_count_as_missing() {
        let result = ViewTokens::from_parts(
            Some(String::new()),
            Some("tok-left".to_string()),
            None,
            None,
        );
        assert!(matches!(
            result,
            Err(PipelineError::MissingView(Viewpoint::Front))
        ));
    }

    #[test]
    fn optional_views_fill_their_slots() {
        let tokens = ViewTokens::from_parts(
            Some("f".to_string()),
            Some("l".to_string()),
            Some("b".to_string()),
            Some("r".to_string()),
        )
        .expect("all views");
        let files = tokens.to_files();
        assert_eq!(files[2]["file_token"], "b");
        assert_eq!(files[3]["file_token"], "r");
    }

    #[test]
    fn intermediate_url_prefers_result_shape() {
        let data = json!({
            "result": {"pbr_model": {"url": "https://cdn.example.com/a.glb?sig=1"}},
            "output": {"pbr_model": "https://cdn.example.com/b.glb"},
        });
        assert_eq!(
            extract_intermediate_url(&data).as_deref(),
            Some("https://cdn.example.com/a.glb?sig=1")
        );
    }

    #[test]
    fn intermediate_url_falls_back_to_output_shape() {
        let data = json!({"output": {"pbr_model": "https://cdn.example.com/b.glb"}});
        assert_eq!(
            extract_intermediate_url(&data).as_deref(),
            Some("https://cdn.example.com/b.glb")
        );
    }

    #[test]
    fn glb_only_payload_has_no_converted_url() {
        // The multiview success payload offers only the exchange format;
        // the conversion sub-call is the only source of an STL URL.
        let data = json!({
            "output": {"pbr_model": "https://cdn.example.com/model.glb?sig=1"},
        });
        assert!(extract_intermediate_url(&data).is_some());
        assert_eq!(extract_converted_url(&data), None);
    }

    #[test]
    fn converted_url_accepts_signed_stl_links() {
        let data = json!({
            "output": {"model": "https://cdn.example.com/model.stl?Expires=1&Sig=abc"},
        });
        assert_eq!(
            extract_converted_url(&data).as_deref(),
            Some("https://cdn.example.com/model.stl?Expires=1&Sig=abc")
        );
    }

    #[test]
    fn converted_url_rejects_non_stl_results() {
        let data = json!({
            "output": {"model": "https://cdn.example.com/model.glb?sig=1"},
            "result": {"model": {"url": "https://cdn.example.com/model.obj"}},
        });
        assert_eq!(extract_converted_url(&data), None);
    }
}

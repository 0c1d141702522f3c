use crate::studio::StudioClient;
use crate::types::{clamp_prompt, PipelineError, RenderedView, Result, Viewpoint};
use cloud_task::{extract, fetch_to_file, stamped_filename, TaskOutcome};
use serde_json::{json, Value};
use tracing::info;

const TASK_PROMPT_LIMIT: usize = 1024;

/// Renders the four orthographic views from one cleaned reference image.
/// The four tasks are independent but run sequentially to bound concurrent
/// load on the service.
pub struct ViewGenerator<'a> {
    studio: &'a StudioClient,
}

impl<'a> ViewGenerator<'a> {
    pub fn new(studio: &'a StudioClient) -> Self {
        Self { studio }
    }

    pub async fn generate_all(&self, image_token: &str, style: &str) -> Result<Vec<RenderedView>> {
        let mut views = Vec::with_capacity(Viewpoint::ORDERED.len());
        for viewpoint in Viewpoint::ORDERED {
            info!("Generating {} view", viewpoint);
            let url = self.generate_view(image_token, viewpoint, style).await?;

            let dest = self
                .studio
                .config()
                .views_dir
                .join(stamped_filename(&format!("{}_view", viewpoint.label()), "jpg"));
            fetch_to_file(self.studio.http(), &url, &dest)
                .await
                .map_err(PipelineError::Cloud)?;
            info!("{} view saved: {}", viewpoint, dest.display());

            views.push(RenderedView {
                viewpoint,
                path: dest,
            });
        }
        Ok(views)
    }

    async fn generate_view(
        &self,
        image_token: &str,
        viewpoint: Viewpoint,
        style: &str,
    ) -> Result<String> {
        let payload = json!({
            "type": "generate_image",
            "model_version": self.studio.config().view_model_version,
            "prompt": clamp_prompt(&viewpoint.prompt(style), TASK_PROMPT_LIMIT),
            "file": {"file_token": image_token},
            "num_images": 1,
            "response_format": "url",
        });

        let task_id = self.studio.submit_task(&payload).await?;
        match self.studio.poll_task(&task_id).await {
            TaskOutcome::Succeeded(data) => extract_view_url(&data).ok_or_else(|| {
                PipelineError::stage("view generation", "success payload carries no image URL")
            }),
            TaskOutcome::Failed(reason) => Err(PipelineError::stage("view generation", reason)),
            TaskOutcome::TimedOut { attempts } => Err(PipelineError::stage(
                "view generation",
                format!("timed out after {} polls", attempts),
            )),
        }
    }
}

/// The render task reports its image in one of two shapes:
/// `output.generated_image` or `output.images[0].url`.
pub(crate) fn extract_view_url(data: &Value) -> Option<String> {
    if let Some(url) = extract::probe_url(data, &[&["output", "generated_image"]], None) {
        return Some(url);
    }
    data.pointer("/output/images/0/url")
        .and_then(Value::as_str)
        .filter(|url| url.starts_with("https://"))
        .map(str::to_string)
}

use crate::types::{clamp_prompt, PipelineError, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use cloud_task::{fetch_to_file, stamped_filename, HttpConfig, RetryingClient};
use image::codecs::jpeg::JpegEncoder;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::info;

/// Largest edge accepted by the generation endpoint; bigger sketches are
/// scaled down before transport.
const MAX_DIMENSION: u32 = 6000;

const JPEG_QUALITY: u8 = 85;

const PROMPT_LIMIT: usize = 300;

#[derive(Debug, Clone)]
pub struct ImageGenConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub size: String,
    pub output_dir: PathBuf,
}

impl Default for ImageGenConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            api_key: String::new(),
            model: String::new(),
            size: "2K".to_string(),
            output_dir: PathBuf::from("optimized_images"),
        }
    }
}

/// Cleans a hand-edited sketch into a modeling reference: one synchronous
/// generation request (no polling), exactly one result URL expected, the
/// result cached on disk for reuse across runs.
pub struct ImageOptimizer {
    http: RetryingClient,
    config: ImageGenConfig,
}

impl ImageOptimizer {
    pub fn new(config: ImageGenConfig, http_config: HttpConfig) -> Result<Self> {
        Ok(Self {
            http: RetryingClient::new(http_config).map_err(PipelineError::Cloud)?,
            config,
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }

    pub async fn optimize(&self, sketch: &Path) -> Result<PathBuf> {
        let reference = encode_reference_image(sketch)?;
        info!("Requesting sketch cleanup for {}", sketch.display());

        let payload = json!({
            "model": self.config.model,
            "prompt": optimization_prompt(&self.config.size),
            "image": reference,
            "size": self.config.size,
            "watermark": false,
            "num_images": 1,
            "response_format": "url",
        });

        let response = self
            .http
            .post_json(&self.config.api_url, Some(&self.config.api_key), &payload)
            .await
            .map_err(PipelineError::Cloud)?;

        let url = single_result_url(&response)
            .ok_or_else(|| PipelineError::stage("sketch cleanup", "expected exactly one result URL"))?;

        let stem = sketch
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("sketch");
        let dest = self
            .config
            .output_dir
            .join(stamped_filename(&format!("optimized_{}", stem), "jpg"));

        fetch_to_file(&self.http, &url, &dest)
            .await
            .map_err(PipelineError::Cloud)?;
        info!("Cleaned sketch saved: {}", dest.display());
        Ok(dest)
    }
}

/// Decodes the sketch, forces RGB, bounds the resolution and re-encodes as
/// JPEG before base64 transport encoding.
pub fn encode_reference_image(path: &Path) -> Result<String> {
    let mut img = image::open(path)?;
    if img.width() > MAX_DIMENSION || img.height() > MAX_DIMENSION {
        img = img.thumbnail(MAX_DIMENSION, MAX_DIMENSION);
    }
    let rgb = img.to_rgb8();

    let mut encoded = Vec::new();
    JpegEncoder::new_with_quality(&mut encoded, JPEG_QUALITY).encode_image(&rgb)?;
    Ok(format!("data:image/jpeg;base64,{}", BASE64.encode(&encoded)))
}

fn optimization_prompt(size: &str) -> String {
    let prompt = format!(
        "Optimize the user's hand-edited furniture image for 3D modeling reference: \
         keep the positional relationship between the original furniture and hand-drawn parts \
         (such as handles or brackets); refine hand-drawn lines and color blocks into clear, \
         continuous solid outlines with no blur or breaks; unify the tone, remove noise, use a \
         solid white background; resolution {}, no watermark, clear details; do not change the \
         core shape of the furniture, only improve clarity and lines.",
        size
    );
    clamp_prompt(&prompt, PROMPT_LIMIT)
}

/// The endpoint must return exactly one generated image.
fn single_result_url(response: &Value) -> Option<String> {
    let data = response.get("data")?.as_array()?;
    if data.len() != 1 {
        return None;
    }
    data[0]
        .get("url")
        .and_then(Value::as_str)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_result_url_requires_exactly_one_entry() {
        let one = json!({"data": [{"url": "https://cdn.example.com/clean.jpg"}]});
        assert_eq!(
            single_result_url(&one).as_deref(),
            Some("https://cdn.example.com/clean.jpg")
        );

        let none = json!({"data": []});
        assert_eq!(single_result_url(&none), None);

        let two = json!({"data": [{"url": "https://a"}, {"url": "https://b"}]});
        assert_eq!(single_result_url(&two), None);

        let error_shape = json!({"error": {"message": "bad request"}});
        assert_eq!(single_result_url(&error_shape), None);
    }

    #[test]
    fn optimization_prompt_fits_the_limit() {
        let prompt = optimization_prompt("2K");
        assert!(prompt.chars().count() <= PROMPT_LIMIT);
        assert!(prompt.contains("2K"));
    }

    #[test]
    fn reference_encoding_produces_a_jpeg_data_url() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sketch.png");
        let img = image::RgbaImage::from_pixel(32, 16, image::Rgba([200, 100, 50, 255]));
        img.save(&path).expect("save fixture");

        let encoded = encode_reference_image(&path).expect("encode");
        assert!(encoded.starts_with("data:image/jpeg;base64,"));
        // decodable base64 with JPEG magic
        let body = encoded.trim_start_matches("data:image/jpeg;base64,");
        let bytes = BASE64.decode(body).expect("valid base64");
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn unreadable_sketch_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("nope.jpg");
        assert!(encode_reference_image(&missing).is_err());
    }
}

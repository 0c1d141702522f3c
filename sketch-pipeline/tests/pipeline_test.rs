use cloud_task::HttpConfig;
use sketch_pipeline::{
    ImageGenConfig, ImageOptimizer, InputPort, PipelineError, SketchPipeline, StudioClient,
    StudioConfig,
};
use std::collections::VecDeque;
use std::path::Path;

/// Scripted stand-in for the terminal prompts.
struct ScriptedPort {
    choices: VecDeque<usize>,
    lines: VecDeque<String>,
}

impl ScriptedPort {
    fn new(choices: &[usize], lines: &[&str]) -> Self {
        Self {
            choices: choices.iter().copied().collect(),
            lines: lines.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl InputPort for ScriptedPort {
    fn choose(&mut self, _prompt: &str, options: &[String]) -> usize {
        let choice = self.choices.pop_front().expect("unexpected choose call");
        assert!(choice < options.len(), "scripted choice out of range");
        choice
    }

    fn line(&mut self, _prompt: &str) -> String {
        self.lines.pop_front().unwrap_or_default()
    }
}

/// Pipeline wired to dead endpoints: anything that reaches the network fails
/// fast, so tests exercise only the local decision logic.
fn pipeline_under(root: &Path, port: ScriptedPort) -> SketchPipeline<ScriptedPort> {
    let http = HttpConfig {
        timeout_seconds: 1,
        max_retries: 0,
        retry_delay_seconds: 0,
        ..Default::default()
    };
    let image_config = ImageGenConfig {
        api_url: "http://127.0.0.1:9/generate".to_string(),
        api_key: "test".to_string(),
        model: "test-model".to_string(),
        output_dir: root.join("optimized"),
        ..Default::default()
    };
    let studio_config = StudioConfig {
        base_url: "http://127.0.0.1:9".to_string(),
        api_key: "test".to_string(),
        views_dir: root.join("views"),
        models_dir: root.join("models"),
        ..Default::default()
    };

    let optimizer = ImageOptimizer::new(image_config, http.clone()).expect("optimizer");
    let studio = StudioClient::new(studio_config, http).expect("studio");
    SketchPipeline::new(optimizer, studio, port, root.join("sketches"))
}

#[tokio::test]
async fn full_branch_without_sketches_reports_missing_input() {
    let root = tempfile::tempdir().expect("tempdir");
    let port = ScriptedPort::new(&[0], &[""]);
    let mut pipeline = pipeline_under(root.path(), port);

    match pipeline.run().await {
        Err(PipelineError::NoInput(reason)) => assert!(reason.contains("sketch")),
        other => panic!("expected a missing-input error, got {:?}", other.map(|p| p.display().to_string())),
    }
}

#[tokio::test]
async fn reuse_views_branch_without_views_reports_missing_input() {
    let root = tempfile::tempdir().expect("tempdir");
    let port = ScriptedPort::new(&[2], &[""]);
    let mut pipeline = pipeline_under(root.path(), port);

    match pipeline.run().await {
        Err(PipelineError::NoInput(reason)) => assert!(reason.contains("views")),
        other => panic!("expected a missing-input error, got {:?}", other.map(|p| p.display().to_string())),
    }
}

#[tokio::test]
async fn empty_optimized_cache_falls_back_to_the_sketch_flow() {
    let root = tempfile::tempdir().expect("tempdir");
    // Reuse branch chosen, but there is nothing cached and no sketch either:
    // the fallback sketch flow reports the missing sketches.
    let port = ScriptedPort::new(&[1], &[""]);
    let mut pipeline = pipeline_under(root.path(), port);

    match pipeline.run().await {
        Err(PipelineError::NoInput(reason)) => assert!(reason.contains("sketch")),
        other => panic!("expected a missing-input error, got {:?}", other.map(|p| p.display().to_string())),
    }
}

#[tokio::test]
async fn reuse_views_aborts_on_the_first_failing_upload() {
    let root = tempfile::tempdir().expect("tempdir");
    let views_dir = root.path().join("views");
    std::fs::create_dir_all(&views_dir).expect("views dir");
    std::fs::write(views_dir.join("front.jpg"), b"front").expect("front view");
    std::fs::write(views_dir.join("left.jpg"), b"left").expect("left view");

    // Branch: reuse views. Picks: front.jpg, left.jpg, skip back, skip right
    // (the skip option is index 2, after the two files).
    let port = ScriptedPort::new(&[2, 0, 1, 2, 2], &[""]);
    let mut pipeline = pipeline_under(root.path(), port);

    // The mandatory views are present, so the stage proceeds to the upload
    // and fails there against the dead endpoint, never with a MissingView.
    match pipeline.run().await {
        Err(PipelineError::Cloud(_)) => {}
        other => panic!("expected a cloud error, got {:?}", other.map(|p| p.display().to_string())),
    }
}

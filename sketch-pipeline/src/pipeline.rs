use crate::model::{ModelGenerator, ViewTokens};
use crate::optimizer::ImageOptimizer;
use crate::studio::StudioClient;
use crate::types::{PipelineError, Result, Viewpoint};
use crate::views::ViewGenerator;
use cloud_task::list_files_with_extensions;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

pub const DEFAULT_VIEW_STYLE: &str = "realistic texture, soft shadow, high detail";
pub const DEFAULT_MODEL_STYLE: &str = "realistic texture, high detail, suitable for 3D printing";

/// Interactive decision points as a capability the caller supplies, so the
/// pipeline itself never touches a terminal. The binary provides a stdin
/// implementation; tests script one.
pub trait InputPort {
    /// Presents the options and returns the index of the chosen one.
    /// `options` is never empty.
    fn choose(&mut self, prompt: &str, options: &[String]) -> usize;

    /// Free-text line; empty means "use the default".
    fn line(&mut self, prompt: &str) -> String;
}

/// Where a run starts. Later stages always run; earlier ones can be replaced
/// by cached artifacts from a previous run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    Full,
    ReuseOptimized,
    ReuseViews,
}

/// Drives sketch -> cleaned image -> four views -> textured model. Any stage
/// failure aborts the run; artifacts already downloaded stay in their step
/// directories for reuse on the next attempt.
pub struct SketchPipeline<P: InputPort> {
    optimizer: ImageOptimizer,
    studio: StudioClient,
    input: P,
    sketch_dir: PathBuf,
}

impl<P: InputPort> SketchPipeline<P> {
    pub fn new(
        optimizer: ImageOptimizer,
        studio: StudioClient,
        input: P,
        sketch_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            optimizer,
            studio,
            input,
            sketch_dir: sketch_dir.into(),
        }
    }

    /// One full run. Returns the path of the downloaded model file.
    pub async fn run(&mut self) -> Result<PathBuf> {
        let branch = self.choose_branch();
        let raw_style = self
            .input
            .line("Style for rendering and texturing (empty for the defaults)");
        let (view_style, model_style) = resolve_styles(&raw_style);

        match branch {
            Branch::Full => {
                let optimized = self.optimize_new_sketch().await?;
                self.views_and_model(&optimized, &view_style, &model_style)
                    .await
            }
            Branch::ReuseOptimized => {
                let optimized = self.pick_optimized().await?;
                self.views_and_model(&optimized, &view_style, &model_style)
                    .await
            }
            Branch::ReuseViews => {
                let views = self.pick_cached_views()?;
                self.model_from_files(&views, &model_style).await
            }
        }
    }

    fn choose_branch(&mut self) -> Branch {
        let options = vec![
            "Start from a sketch (clean up, render views, build the model)".to_string(),
            "Reuse a cleaned-up image (render views, build the model)".to_string(),
            "Reuse rendered views (build the model only)".to_string(),
        ];
        match self
            .input
            .choose("What should this run start from?", &options)
        {
            1 => Branch::ReuseOptimized,
            2 => Branch::ReuseViews,
            _ => Branch::Full,
        }
    }

    async fn optimize_new_sketch(&mut self) -> Result<PathBuf> {
        let sketches = list_files_with_extensions(&self.sketch_dir, IMAGE_EXTENSIONS)
            .map_err(PipelineError::Cloud)?;
        if sketches.is_empty() {
            return Err(PipelineError::NoInput(format!(
                "no sketch images in {}",
                self.sketch_dir.display()
            )));
        }
        let sketch = pick_file(
            &mut self.input,
            "Which sketch should be cleaned up?",
            &sketches,
        );
        self.optimizer.optimize(&sketch).await
    }

    /// Offers the cached cleaned-up images plus a regenerate option. An empty
    /// cache falls straight through to the sketch flow.
    async fn pick_optimized(&mut self) -> Result<PathBuf> {
        let cached = list_files_with_extensions(self.optimizer.output_dir(), IMAGE_EXTENSIONS)
            .map_err(PipelineError::Cloud)?;
        if cached.is_empty() {
            info!("No cleaned-up images cached yet, starting from a sketch");
            return self.optimize_new_sketch().await;
        }

        let mut options: Vec<String> = cached.iter().map(|p| file_label(p)).collect();
        options.push("Regenerate from a sketch".to_string());
        let choice = self
            .input
            .choose("Which cleaned-up image should be reused?", &options);
        if choice >= cached.len() {
            self.optimize_new_sketch().await
        } else {
            Ok(cached[choice].clone())
        }
    }

    async fn views_and_model(
        &mut self,
        optimized: &Path,
        view_style: &str,
        model_style: &str,
    ) -> Result<PathBuf> {
        let token = self.studio.upload_image(optimized).await?;
        let rendered = ViewGenerator::new(&self.studio)
            .generate_all(&token, view_style)
            .await?;
        let views: Vec<(Viewpoint, PathBuf)> = rendered
            .into_iter()
            .map(|view| (view.viewpoint, view.path))
            .collect();
        self.model_from_files(&views, model_style).await
    }

    fn pick_cached_views(&mut self) -> Result<Vec<(Viewpoint, PathBuf)>> {
        let views_dir = self.studio.config().views_dir.clone();
        let files = list_files_with_extensions(&views_dir, IMAGE_EXTENSIONS)
            .map_err(PipelineError::Cloud)?;
        if files.is_empty() {
            return Err(PipelineError::NoInput(format!(
                "no rendered views in {}",
                views_dir.display()
            )));
        }

        let mut picked = Vec::new();
        for viewpoint in Viewpoint::ORDERED {
            match pick_view_file(&mut self.input, viewpoint, &files) {
                Some(path) => picked.push((viewpoint, path)),
                None => info!("Skipping optional {} view", viewpoint),
            }
        }
        Ok(picked)
    }

    async fn model_from_files(
        &mut self,
        views: &[(Viewpoint, PathBuf)],
        model_style: &str,
    ) -> Result<PathBuf> {
        // Mandatory views are checked before the first upload goes out.
        for required in [Viewpoint::Front, Viewpoint::Left] {
            if !views.iter().any(|(viewpoint, _)| *viewpoint == required) {
                return Err(PipelineError::MissingView(required));
            }
        }

        let mut tokens: HashMap<Viewpoint, String> = HashMap::new();
        for (viewpoint, path) in views {
            let token = self.studio.upload_image(path).await?;
            tokens.insert(*viewpoint, token);
        }
        let tokens = ViewTokens::from_parts(
            tokens.remove(&Viewpoint::Front),
            tokens.remove(&Viewpoint::Left),
            tokens.remove(&Viewpoint::Back),
            tokens.remove(&Viewpoint::Right),
        )?;

        let generator = ModelGenerator::new(&self.studio);
        let artifact = generator.generate(&tokens, model_style).await?;
        generator.download(&artifact).await
    }
}

/// One style line per run; an empty answer picks the stage defaults.
fn resolve_styles(raw: &str) -> (String, String) {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        (
            DEFAULT_VIEW_STYLE.to_string(),
            DEFAULT_MODEL_STYLE.to_string(),
        )
    } else {
        (trimmed.to_string(), trimmed.to_string())
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("?")
        .to_string()
}

fn pick_file(input: &mut dyn InputPort, prompt: &str, files: &[PathBuf]) -> PathBuf {
    let options: Vec<String> = files.iter().map(|p| file_label(p)).collect();
    let choice = input.choose(prompt, &options);
    files.get(choice).cloned().unwrap_or_else(|| files[0].clone())
}

/// Offers the view files, with a skip option for the optional viewpoints.
fn pick_view_file(
    input: &mut dyn InputPort,
    viewpoint: Viewpoint,
    files: &[PathBuf],
) -> Option<PathBuf> {
    let mut options: Vec<String> = files.iter().map(|p| file_label(p)).collect();
    if !viewpoint.is_required() {
        options.push(format!("Skip the {} view", viewpoint));
    }
    let prompt = format!("Which file is the {} view?", viewpoint);
    let choice = input.choose(&prompt, &options);
    files.get(choice).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct ScriptedPort {
        choices: VecDeque<usize>,
    }

    impl InputPort for ScriptedPort {
        fn choose(&mut self, _prompt: &str, options: &[String]) -> usize {
            let choice = self.choices.pop_front().expect("unexpected choose call");
            assert!(choice < options.len(), "scripted choice out of range");
            choice
        }

        fn line(&mut self, _prompt: &str) -> String {
            String::new()
        }
    }

    #[test]
    fn empty_style_falls_back_to_the_stage_defaults() {
        let (view, model) = resolve_styles("   ");
        assert_eq!(view, DEFAULT_VIEW_STYLE);
        assert_eq!(model, DEFAULT_MODEL_STYLE);

        let (view, model) = resolve_styles(" walnut wood, matte finish ");
        assert_eq!(view, "walnut wood, matte finish");
        assert_eq!(model, "walnut wood, matte finish");
    }

    #[test]
    fn required_views_offer_no_skip_option() {
        let files = vec![PathBuf::from("views/front.jpg"), PathBuf::from("views/left.jpg")];

        // A required viewpoint only ever sees the two files.
        let mut port = ScriptedPort {
            choices: VecDeque::from([1]),
        };
        let picked = pick_view_file(&mut port, Viewpoint::Front, &files);
        assert_eq!(picked, Some(PathBuf::from("views/left.jpg")));

        // An optional viewpoint gets a third option that resolves to a skip.
        let mut port = ScriptedPort {
            choices: VecDeque::from([2]),
        };
        let picked = pick_view_file(&mut port, Viewpoint::Back, &files);
        assert_eq!(picked, None);
    }

    #[test]
    fn pick_file_returns_the_chosen_path() {
        let files = vec![
            PathBuf::from("sketches/chair.png"),
            PathBuf::from("sketches/table.jpg"),
        ];
        let mut port = ScriptedPort {
            choices: VecDeque::from([1]),
        };
        let picked = pick_file(&mut port, "Which sketch?", &files);
        assert_eq!(picked, PathBuf::from("sketches/table.jpg"));
    }
}

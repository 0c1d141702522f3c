pub mod model;
pub mod optimizer;
pub mod pipeline;
pub mod studio;
pub mod types;
pub mod views;

pub use model::{ModelGenerator, ViewTokens};
pub use optimizer::{ImageGenConfig, ImageOptimizer};
pub use pipeline::{Branch, InputPort, SketchPipeline, DEFAULT_MODEL_STYLE, DEFAULT_VIEW_STYLE};
pub use studio::{StudioClient, StudioConfig};
pub use types::{ModelArtifact, ModelFormat, PipelineError, RenderedView, Result, Viewpoint};
pub use views::ViewGenerator;

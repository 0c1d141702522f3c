use cloud_task::CloudTaskError;
use std::path::PathBuf;

/// The four camera angles the multiview interface understands, in its
/// required submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Viewpoint {
    Front,
    Left,
    Back,
    Right,
}

impl Viewpoint {
    pub const ORDERED: [Viewpoint; 4] = [
        Viewpoint::Front,
        Viewpoint::Left,
        Viewpoint::Back,
        Viewpoint::Right,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Viewpoint::Front => "front",
            Viewpoint::Left => "left",
            Viewpoint::Back => "back",
            Viewpoint::Right => "right",
        }
    }

    pub fn angle_degrees(self) -> u16 {
        match self {
            Viewpoint::Front => 0,
            Viewpoint::Left => 90,
            Viewpoint::Back => 180,
            Viewpoint::Right => 270,
        }
    }

    /// The multiview build needs at least the front and left projections.
    pub fn is_required(self) -> bool {
        matches!(self, Viewpoint::Front | Viewpoint::Left)
    }

    /// Photorealistic render prompt for this projection, with the user's
    /// style text folded in.
    pub fn prompt(self, style: &str) -> String {
        let detail = match self {
            Viewpoint::Front => "show the full front shape including hand-drawn parts such as handles",
            Viewpoint::Left => "show the side thickness and how hand-drawn parts connect to the body",
            Viewpoint::Back => "show the full back shape; keep symmetry with the front view where applicable",
            Viewpoint::Right => "show the right side structure; keep symmetry with the left view where applicable",
        };
        format!(
            "Generate a photorealistic {label}-view rendering of the furniture \
             (reference: the cleaned-up hand-drawn image). \
             Perspective: direct horizontal {label} projection ({angle} degree angle), {detail}. \
             Style: photorealistic, NOT line art, {style}, soft shadow on white background. \
             Resolution 2K, no watermark, shape consistent with the reference.",
            label = self.label(),
            angle = self.angle_degrees(),
            detail = detail,
            style = style,
        )
    }
}

impl std::fmt::Display for Viewpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One downloaded view rendering.
#[derive(Debug, Clone)]
pub struct RenderedView {
    pub viewpoint: Viewpoint,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    Glb,
    Stl,
}

impl ModelFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ModelFormat::Glb => "glb",
            ModelFormat::Stl => "stl",
        }
    }
}

/// The one model the pipeline delivers. Intermediate formats are discarded
/// as soon as the conversion succeeds.
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    pub format: ModelFormat,
    pub url: String,
}

/// Truncates a prompt to the service's character limit without splitting a
/// code point.
pub fn clamp_prompt(prompt: &str, limit: usize) -> String {
    prompt.chars().take(limit).collect()
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("cloud task error: {0}")]
    Cloud(#[from] CloudTaskError),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{stage} failed: {reason}")]
    Stage { stage: &'static str, reason: String },

    #[error("missing required {0} view")]
    MissingView(Viewpoint),

    #[error("no input available: {0}")]
    NoInput(String),
}

impl PipelineError {
    pub fn stage(stage: &'static str, reason: impl Into<String>) -> Self {
        PipelineError::Stage {
            stage,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_order_starts_with_the_mandatory_views() {
        assert_eq!(
            Viewpoint::ORDERED,
            [
                Viewpoint::Front,
                Viewpoint::Left,
                Viewpoint::Back,
                Viewpoint::Right
            ]
        );
        assert!(Viewpoint::Front.is_required());
        assert!(Viewpoint::Left.is_required());
        assert!(!Viewpoint::Back.is_required());
        assert!(!Viewpoint::Right.is_required());
    }

    #[test]
    fn prompts_carry_angle_and_style() {
        let prompt = Viewpoint::Back.prompt("wood texture");
        assert!(prompt.contains("back"));
        assert!(prompt.contains("180 degree"));
        assert!(prompt.contains("wood texture"));
        assert!(prompt.contains("photorealistic"));
    }

    #[test]
    fn clamp_prompt_respects_char_boundaries() {
        assert_eq!(clamp_prompt("abcdef", 4), "abcd");
        assert_eq!(clamp_prompt("abc", 10), "abc");
        // multi-byte characters count as one
        assert_eq!(clamp_prompt("木质纹理低多边形", 4), "木质纹理");
    }
}

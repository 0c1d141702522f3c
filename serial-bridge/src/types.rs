use crate::frame::FrameError;

/// Binary classification result sent back over the serial link. Nothing but
/// these two tokens ever crosses the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Normal,
    Alert,
}

impl Verdict {
    pub fn as_wire(&self) -> &'static str {
        match self {
            Verdict::Normal => "NORMAL",
            Verdict::Alert => "ALERT",
        }
    }

    /// Parses the first line of a model response as exactly one of the two
    /// permitted tokens. Anything else is unparseable and the caller falls
    /// back to its own default.
    pub fn parse(text: &str) -> Option<Verdict> {
        match text.lines().next().map(str::trim) {
            Some("NORMAL") => Some(Verdict::Normal),
            Some("ALERT") => Some(Verdict::Alert),
            _ => None,
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_wire())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("serial link error: {0}")]
    Link(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;

pub mod bridge;
pub mod frame;
pub mod judge;
pub mod recognizer;
pub mod types;

pub use bridge::AudioBridge;
pub use frame::{FrameError, FrameReader, WAV_MARKER};
pub use judge::{FraudJudge, JudgeConfig, VerdictJudge};
pub use recognizer::{SpeechConfig, SpeechRecognizer, Transcriber};
pub use types::{BridgeError, Result, Verdict};

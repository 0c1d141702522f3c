use crate::frame::{FrameError, FrameReader};
use crate::judge::VerdictJudge;
use crate::recognizer::Transcriber;
use crate::types::{BridgeError, Result, Verdict};
use std::io::{Read, Write};
use tracing::{error, info, warn};

/// Drives one serial peer: framed audio in, verdict token out.
///
/// The peer never sees an error. Recognition and classification failures
/// fail open to `NORMAL`; only the link itself going away ends the loop.
pub struct AudioBridge<T, J> {
    frames: FrameReader,
    transcriber: T,
    judge: J,
}

impl<T: Transcriber, J: VerdictJudge> AudioBridge<T, J> {
    pub fn new(frames: FrameReader, transcriber: T, judge: J) -> Self {
        Self {
            frames,
            transcriber,
            judge,
        }
    }

    /// One full exchange: frame -> transcript -> verdict -> reply.
    pub async fn run_once<L: Read + Write>(&self, link: &mut L) -> Result<Verdict> {
        let audio = self.frames.read_frame(link)?;

        let transcript = self.transcriber.transcribe(&audio).await;
        if transcript.is_empty() {
            info!("No transcript available, verdict will fail open");
        } else {
            info!("Transcript: {}", transcript);
        }

        let verdict = self.judge.judge(&transcript).await;

        link.write_all(verdict.as_wire().as_bytes())
            .map_err(BridgeError::Link)?;
        link.write_all(b"\n").map_err(BridgeError::Link)?;
        link.flush().map_err(BridgeError::Link)?;
        info!("Verdict sent to peer: {}", verdict);

        Ok(verdict)
    }

    /// Serves exchanges until the link goes away. Bad frames are dropped and
    /// the loop waits for the next marker.
    pub async fn run<L: Read + Write>(&self, link: &mut L) -> Result<()> {
        loop {
            match self.run_once(link).await {
                Ok(_) => {}
                Err(BridgeError::Frame(e @ FrameError::Incomplete { .. }))
                | Err(BridgeError::Frame(e @ FrameError::Oversized { .. }))
                | Err(BridgeError::Frame(e @ FrameError::DeadlineExceeded(_))) => {
                    warn!("Dropped frame: {}", e);
                }
                Err(e) => {
                    error!("Serial link lost: {}", e);
                    return Err(e);
                }
            }
        }
    }
}

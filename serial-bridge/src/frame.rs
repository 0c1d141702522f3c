use cloud_task::{ensure_dir, stamped_filename};
use std::io::{ErrorKind, Read};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Marker the microcontroller sends ahead of every audio frame.
pub const WAV_MARKER: &[u8] = b"WAV_START";

/// Pause between reads while the port has no data.
const IDLE_SLEEP: Duration = Duration::from_millis(10);

const PAYLOAD_CHUNK: usize = 1024;

/// Frames larger than this are treated as line noise rather than audio.
const DEFAULT_MAX_PAYLOAD: usize = 64 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("stream closed before a complete frame header")]
    Eof,

    #[error("incomplete frame: expected {expected} payload bytes, received {received}")]
    Incomplete { expected: usize, received: usize },

    #[error("declared payload length {declared} exceeds cap {cap}")]
    Oversized { declared: usize, cap: usize },

    #[error("no complete frame within {0:?}")]
    DeadlineExceeded(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reads marker-delimited, length-prefixed binary frames from a byte stream:
/// `WAV_START || u32 little-endian length || payload`.
///
/// `WouldBlock`/`TimedOut` reads mean "no data yet" and continue the wait,
/// so the reader works unchanged over a serial port with a read timeout.
pub struct FrameReader {
    marker: Vec<u8>,
    audit_dir: Option<PathBuf>,
    deadline: Option<Duration>,
    max_payload: usize,
}

impl FrameReader {
    pub fn new() -> Self {
        Self {
            marker: WAV_MARKER.to_vec(),
            audit_dir: None,
            deadline: None,
            max_payload: DEFAULT_MAX_PAYLOAD,
        }
    }

    pub fn with_marker(mut self, marker: &[u8]) -> Self {
        self.marker = marker.to_vec();
        self
    }

    /// Persist every received payload into this directory before returning it.
    pub fn with_audit_dir(mut self, dir: PathBuf) -> Self {
        self.audit_dir = Some(dir);
        self
    }

    /// Bound the total wait for one frame. Without a deadline the reader
    /// waits for as long as the stream stays open.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_max_payload(mut self, cap: usize) -> Self {
        self.max_payload = cap;
        self
    }

    /// Blocks until a complete frame arrives and returns its payload.
    pub fn read_frame<R: Read>(&self, reader: &mut R) -> Result<Vec<u8>, FrameError> {
        let started = Instant::now();

        self.seek_marker(reader, started)?;
        debug!("Frame marker detected");

        let mut length_bytes = [0u8; 4];
        for slot in length_bytes.iter_mut() {
            *slot = self.next_byte(reader, started)?;
        }
        let declared = u32::from_le_bytes(length_bytes) as usize;
        if declared > self.max_payload {
            return Err(FrameError::Oversized {
                declared,
                cap: self.max_payload,
            });
        }
        debug!("Expecting {} payload bytes", declared);

        let payload = self.read_payload(reader, declared, started)?;
        info!("Frame received: {} bytes", payload.len());

        self.persist_audit_copy(&payload);
        Ok(payload)
    }

    /// Consumes bytes until the marker has been seen, scanning across
    /// arbitrary chunk boundaries.
    fn seek_marker<R: Read>(&self, reader: &mut R, started: Instant) -> Result<(), FrameError> {
        let mut window: Vec<u8> = Vec::with_capacity(self.marker.len());
        loop {
            let byte = self.next_byte(reader, started)?;
            if window.len() == self.marker.len() {
                window.rotate_left(1);
                *window.last_mut().expect("non-empty window") = byte;
            } else {
                window.push(byte);
            }
            if window == self.marker {
                return Ok(());
            }
        }
    }

    fn read_payload<R: Read>(
        &self,
        reader: &mut R,
        declared: usize,
        started: Instant,
    ) -> Result<Vec<u8>, FrameError> {
        let mut payload = Vec::with_capacity(declared.min(PAYLOAD_CHUNK * 64));
        let mut scratch = [0u8; PAYLOAD_CHUNK];
        while payload.len() < declared {
            let wanted = (declared - payload.len()).min(PAYLOAD_CHUNK);
            match reader.read(&mut scratch[..wanted]) {
                Ok(0) => {
                    return Err(FrameError::Incomplete {
                        expected: declared,
                        received: payload.len(),
                    });
                }
                Ok(n) => payload.extend_from_slice(&scratch[..n]),
                Err(e) => self.handle_wait(e, started)?,
            }
        }
        Ok(payload)
    }

    fn next_byte<R: Read>(&self, reader: &mut R, started: Instant) -> Result<u8, FrameError> {
        let mut byte = [0u8; 1];
        loop {
            match reader.read(&mut byte) {
                Ok(0) => return Err(FrameError::Eof),
                Ok(_) => return Ok(byte[0]),
                Err(e) => self.handle_wait(e, started)?,
            }
        }
    }

    /// Timeouts on an open port just mean no data yet; everything else is
    /// fatal. The deadline, when configured, is checked on every idle wait.
    fn handle_wait(&self, error: std::io::Error, started: Instant) -> Result<(), FrameError> {
        match error.kind() {
            ErrorKind::WouldBlock | ErrorKind::TimedOut => {
                if let Some(deadline) = self.deadline {
                    if started.elapsed() >= deadline {
                        return Err(FrameError::DeadlineExceeded(deadline));
                    }
                }
                std::thread::sleep(IDLE_SLEEP);
                Ok(())
            }
            ErrorKind::Interrupted => Ok(()),
            _ => Err(FrameError::Io(error)),
        }
    }

    fn persist_audit_copy(&self, payload: &[u8]) {
        let Some(dir) = &self.audit_dir else {
            return;
        };
        if let Err(e) = ensure_dir(dir) {
            warn!("Audit directory unavailable: {}", e);
            return;
        }
        let path = dir.join(stamped_filename("audio", "wav"));
        match std::fs::write(&path, payload) {
            Ok(()) => info!("Audit copy saved: {}", path.display()),
            Err(e) => warn!("Failed to save audit copy {}: {}", path.display(), e),
        }
    }
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new()
    }
}

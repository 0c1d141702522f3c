use anyhow::Context;
use clap::Parser;
use cloud_task::HttpConfig;
use serial_bridge::{AudioBridge, FraudJudge, FrameReader, JudgeConfig, SpeechConfig, SpeechRecognizer};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Bridges a microcontroller's audio frames to the speech-recognition and
/// fraud-classification services and answers with NORMAL or ALERT.
#[derive(Parser, Debug)]
#[command(name = "serial-bridge")]
struct Args {
    /// Serial device, e.g. /dev/ttyUSB0 or COM6.
    #[arg(long)]
    port: String,

    #[arg(long, default_value_t = 115_200)]
    baud: u32,

    /// Where received audio payloads are persisted for auditing.
    #[arg(long, default_value = "received_audio")]
    audit_dir: PathBuf,

    /// Abort a partially received frame after this many seconds.
    /// Without it the reader waits for as long as the port stays open.
    #[arg(long)]
    frame_deadline_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let speech_config = SpeechConfig {
        base_url: env::var("SPEECH_API_URL").context("SPEECH_API_URL is not set")?,
        api_key: env::var("SPEECH_API_KEY").context("SPEECH_API_KEY is not set")?,
        engine_model: env::var("SPEECH_ENGINE_MODEL").unwrap_or_else(|_| "16k_zh".to_string()),
        ..Default::default()
    };

    let judge_config = JudgeConfig {
        api_url: env::var("JUDGE_API_URL").context("JUDGE_API_URL is not set")?,
        api_key: env::var("JUDGE_API_KEY").context("JUDGE_API_KEY is not set")?,
        model: env::var("JUDGE_MODEL").context("JUDGE_MODEL is not set")?,
    };

    let recognizer = SpeechRecognizer::new(speech_config, HttpConfig::default())?;
    let judge = FraudJudge::new(
        judge_config,
        HttpConfig {
            timeout_seconds: 15,
            ..Default::default()
        },
    )?;

    let mut frames = FrameReader::new().with_audit_dir(args.audit_dir);
    if let Some(secs) = args.frame_deadline_secs {
        frames = frames.with_deadline(Duration::from_secs(secs));
    }

    let mut port = serialport::new(&args.port, args.baud)
        .timeout(Duration::from_secs(1))
        .open()
        .with_context(|| format!("Failed to open serial port {}", args.port))?;

    // Give the microcontroller time to finish its post-open reset.
    tokio::time::sleep(Duration::from_secs(2)).await;
    info!("Serial port open: {} at {} baud", args.port, args.baud);

    let bridge = AudioBridge::new(frames, recognizer, judge);
    bridge.run(&mut port).await?;
    Ok(())
}

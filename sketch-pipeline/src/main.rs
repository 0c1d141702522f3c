use anyhow::Context;
use clap::Parser;
use cloud_task::HttpConfig;
use sketch_pipeline::{
    ImageGenConfig, ImageOptimizer, InputPort, SketchPipeline, StudioClient, StudioConfig,
};
use std::env;
use std::io::Write;
use std::path::PathBuf;

/// Turns a hand-edited furniture sketch into a textured, printable 3D model.
#[derive(Parser, Debug)]
#[command(name = "sketch-pipeline")]
struct Args {
    /// Directory holding the hand-edited sketches.
    #[arg(long, default_value = "sketches")]
    sketch_dir: PathBuf,

    /// Cache of cleaned-up images from earlier runs.
    #[arg(long, default_value = "optimized_images")]
    optimized_dir: PathBuf,

    #[arg(long, default_value = "rendered_views")]
    views_dir: PathBuf,

    #[arg(long, default_value = "generated_models")]
    models_dir: PathBuf,
}

/// Numbered prompts on stdin/stdout.
struct TerminalPort;

impl InputPort for TerminalPort {
    fn choose(&mut self, prompt: &str, options: &[String]) -> usize {
        loop {
            println!("{}", prompt);
            for (index, option) in options.iter().enumerate() {
                println!("  {}. {}", index + 1, option);
            }
            match read_line("> ").trim().parse::<usize>() {
                Ok(n) if (1..=options.len()).contains(&n) => return n - 1,
                _ => println!("Enter a number between 1 and {}", options.len()),
            }
        }
    }

    fn line(&mut self, prompt: &str) -> String {
        read_line(&format!("{}: ", prompt))
    }
}

fn read_line(prompt: &str) -> String {
    print!("{}", prompt);
    let _ = std::io::stdout().flush();
    let mut buf = String::new();
    if std::io::stdin().read_line(&mut buf).is_err() {
        return String::new();
    }
    buf.trim_end_matches(['\r', '\n']).to_string()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let image_config = ImageGenConfig {
        api_url: env::var("IMAGE_API_URL").context("IMAGE_API_URL is not set")?,
        api_key: env::var("IMAGE_API_KEY").context("IMAGE_API_KEY is not set")?,
        model: env::var("IMAGE_MODEL").context("IMAGE_MODEL is not set")?,
        output_dir: args.optimized_dir,
        ..Default::default()
    };

    let studio_config = StudioConfig {
        base_url: env::var("STUDIO_API_URL").context("STUDIO_API_URL is not set")?,
        api_key: env::var("STUDIO_API_KEY").context("STUDIO_API_KEY is not set")?,
        views_dir: args.views_dir,
        models_dir: args.models_dir,
        ..Default::default()
    };

    let optimizer = ImageOptimizer::new(image_config, HttpConfig::default())?;
    let studio = StudioClient::new(studio_config, HttpConfig::default())?;

    let mut pipeline = SketchPipeline::new(optimizer, studio, TerminalPort, args.sketch_dir);
    let model = pipeline.run().await?;
    println!("Model ready: {}", model.display());
    Ok(())
}

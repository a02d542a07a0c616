//! describe_once - one-shot detect-and-describe CLI
//!
//! Grabs a single frame (from a JPEG file or a capture URL), runs detection,
//! sends the frame + labels to the description service, and prints the
//! caption. No voice, no retry loop. Handy for smoke-testing service
//! credentials before deploying describerd.

use anyhow::{Context, Result};
use clap::Parser;
use image::GenericImageView;
use std::path::PathBuf;
use std::time::Duration;

use scene_describer::describe::{Describe, DescribeConfig, DescriptionClient};
use scene_describer::detect::Detector;
use scene_describer::{open_source, Frame, StubDetector};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JPEG file to describe instead of capturing a frame.
    #[arg(long)]
    image: Option<PathBuf>,
    /// Capture URL to grab one frame from (stub:// or http(s)://).
    #[arg(long, default_value = "stub://demo_camera")]
    capture: String,
    /// Description service URL.
    #[arg(long, env = "DESCRIBER_SERVICE_URL")]
    service_url: String,
    /// Service API key, appended as a query parameter when set.
    #[arg(long, env = "DESCRIBER_SERVICE_KEY")]
    service_key: Option<String>,
    /// Request timeout in seconds.
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
    /// Comma-separated labels to send instead of running detection.
    #[arg(long, value_delimiter = ',')]
    labels: Option<Vec<String>>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let frame = match &args.image {
        Some(path) => load_jpeg(path)?,
        None => {
            let mut source = open_source(&args.capture, 10)?;
            source.connect()?;
            source.next_frame()?
        }
    };

    let labels = match args.labels {
        Some(labels) => labels,
        None => {
            let mut detector = StubDetector::new();
            detector.detect(&frame)?.labels
        }
    };
    if labels.is_empty() {
        log::info!("no objects detected; describing without label context");
    } else {
        log::info!("detected objects: {}", labels.join(", "));
    }

    let endpoint = match &args.service_key {
        Some(key) => format!("{}?key={}", args.service_url, key),
        None => args.service_url.clone(),
    };
    let client = DescriptionClient::new(DescribeConfig {
        endpoint,
        timeout: Duration::from_secs(args.timeout_secs),
    });

    let jpeg = frame.encode_jpeg()?;
    let caption = client
        .describe(&jpeg, &labels)
        .map_err(anyhow::Error::from)?;
    println!("{}", caption);
    Ok(())
}

fn load_jpeg(path: &PathBuf) -> Result<Frame> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("read image file {}", path.display()))?;
    let decoded = image::load_from_memory(&bytes).context("decode image")?;
    let (width, height) = decoded.dimensions();
    Ok(Frame::new(decoded.into_rgb8().into_raw(), width, height, 0))
}

//! Frame capture sources.
//!
//! This module provides the sources that feed the display loop:
//! - HTTP MJPEG/JPEG streams (IP and ESP32-class cameras)
//! - Synthetic source (`stub://` URLs, used in tests and demos)
//!
//! All sources produce `Frame` instances on demand. The capture layer is
//! responsible for:
//! - Decoding incoming JPEG data in-memory
//! - Rate limiting / frame decimation to the configured fps
//! - Assigning capture sequence numbers
//!
//! Capture failures are expected at runtime (device not ready, stream hiccup);
//! callers tolerate them and retry on the next tick.

mod http;
mod stub;

pub use http::{HttpSource, HttpSourceConfig};
pub use stub::SyntheticSource;

use anyhow::{anyhow, Context, Result};
use url::Url;

use crate::frame::Frame;

/// A source of captured frames.
///
/// `next_frame` blocks until a frame is available or the source fails for this
/// attempt. A failed attempt does not poison the source; the caller may call
/// `next_frame` again on the next tick.
pub trait FrameSource: Send {
    /// Source identifier for logs.
    fn name(&self) -> &str;

    /// Establish the connection. Must be called before the first frame.
    fn connect(&mut self) -> Result<()>;

    /// Capture the next frame.
    fn next_frame(&mut self) -> Result<Frame>;

    /// Whether the source has produced a frame recently enough to be trusted.
    fn is_healthy(&self) -> bool;
}

/// Open a frame source for a capture URL, keyed on the URL scheme.
///
/// Supported schemes: `stub://` (synthetic), `http://` / `https://` (MJPEG
/// stream or single-JPEG snapshot endpoint).
pub fn open_source(capture_url: &str, target_fps: u32) -> Result<Box<dyn FrameSource>> {
    if let Some(rest) = capture_url.strip_prefix("stub://") {
        return Ok(Box::new(SyntheticSource::new(rest.to_string())));
    }
    let url = Url::parse(capture_url).context("parse capture url")?;
    match url.scheme() {
        "http" | "https" => Ok(Box::new(HttpSource::new(HttpSourceConfig {
            url: capture_url.to_string(),
            target_fps,
        }))),
        other => Err(anyhow!(
            "unsupported capture scheme '{}'; expected stub or http(s)",
            other
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_source_accepts_stub_and_http() {
        assert!(open_source("stub://bench_camera", 10).is_ok());
        assert!(open_source("http://127.0.0.1:81/stream", 10).is_ok());
    }

    #[test]
    fn open_source_rejects_unknown_scheme() {
        let err = open_source("rtsp://camera-1/stream", 10).err().unwrap();
        assert!(err.to_string().contains("unsupported capture scheme"));
    }
}

//! scene-describer
//!
//! Continuous camera capture with object detection, plus on-demand spoken
//! scene descriptions from a remote vision-language service.
//!
//! # Architecture
//!
//! Two independent activities share one piece of state, the most recently
//! captured frame:
//!
//! 1. **Display loop** (`display`): fixed-tick capture → detect → render.
//!    Single writer of the shared `FrameStore`. Never blocks on the network
//!    or on audio.
//! 2. **Describe controller** (`controller`): triggered per user request, runs
//!    detect → describe → speak → confirm on a reusable worker thread, looping
//!    while the user answers "yes" to the voice confirmation prompt.
//!
//! All collaborators (frame source, detector, description client, voice
//! channel, render sink) are injected behind traits, so deployments swap
//! camera stacks, models, and speech plumbing without touching the loops.
//!
//! # Module Structure
//!
//! - `frame`: `Frame` and the single-writer/multi-reader `FrameStore`
//! - `capture`: frame sources (HTTP MJPEG/snapshot, synthetic stub)
//! - `detect`: the `Detector` trait and the stub backend
//! - `describe`: the remote description service client and its error taxonomy
//! - `voice`: spoken output + short-utterance input
//! - `controller`: the describe-and-retry state machine
//! - `display`: the fixed-tick display loop
//! - `api`: loopback control surface (health / status / trigger)
//! - `config`: file + env configuration for the daemon

pub mod api;
pub mod capture;
pub mod config;
pub mod controller;
pub mod describe;
pub mod detect;
pub mod display;
pub mod frame;
pub mod voice;

pub use capture::{open_source, FrameSource};
pub use controller::{Controller, ControllerHandle, CycleOutcome, CyclePhase};
pub use describe::{Describe, DescribeConfig, DescribeError, DescriptionClient};
pub use detect::{share, DetectionResult, Detector, StubDetector};
pub use display::{DisplayLoop, LogRenderer, RenderSink};
pub use frame::{Frame, FrameStore};
pub use voice::{CommandVoice, CommandVoiceConfig, ListenError, ScriptedVoice, VoiceChannel};

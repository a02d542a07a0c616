//! Voice channel: spoken output and short spoken input.
//!
//! Playback and recognition are opaque external capabilities. `speak` blocks
//! until playback completes; `listen` waits for one short utterance under a
//! caller-supplied deadline. Listening failures come back as typed
//! `ListenError` values so the controller can map each kind deliberately
//! instead of a blanket catch; today all of them mean "treat as stop".

mod command;
mod scripted;

pub use command::{CommandVoice, CommandVoiceConfig};
pub use scripted::{ScriptedReply, ScriptedVoice};

use anyhow::Result;
use std::time::Duration;

/// Failure kinds for the listen step.
#[derive(Debug)]
pub enum ListenError {
    /// No utterance arrived before the deadline.
    Timeout,
    /// Audio arrived but produced no usable transcript.
    Unintelligible,
    /// Microphone/recognizer plumbing failed.
    Device(String),
}

impl std::fmt::Display for ListenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenError::Timeout => write!(f, "listen timed out"),
            ListenError::Unintelligible => write!(f, "could not understand audio"),
            ListenError::Device(msg) => write!(f, "audio device error: {}", msg),
        }
    }
}

impl std::error::Error for ListenError {}

/// Spoken output plus push-to-listen input.
pub trait VoiceChannel: Send {
    /// Speak text aloud, blocking until playback completes.
    fn speak(&mut self, text: &str) -> Result<()>;

    /// Listen for one utterance and return its transcript.
    fn listen(&mut self, timeout: Duration) -> Result<String, ListenError>;
}

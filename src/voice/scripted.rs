//! Scripted voice channel for tests and synthetic demos.

use anyhow::Result;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{ListenError, VoiceChannel};

/// One scripted reply to a `listen` call.
#[derive(Debug)]
pub enum ScriptedReply {
    Heard(String),
    Timeout,
    Unintelligible,
    Device(String),
}

/// Voice channel that records everything spoken and replays queued listen
/// replies. Once the script is exhausted, listens time out.
#[derive(Clone, Default)]
pub struct ScriptedVoice {
    spoken: Arc<Mutex<Vec<String>>>,
    replies: Arc<Mutex<VecDeque<ScriptedReply>>>,
}

impl ScriptedVoice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a transcript for the next listen call.
    pub fn push_heard(&self, transcript: &str) {
        self.push_reply(ScriptedReply::Heard(transcript.to_string()));
    }

    pub fn push_reply(&self, reply: ScriptedReply) {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(reply);
    }

    /// Everything spoken so far, in order.
    pub fn spoken(&self) -> Vec<String> {
        self.spoken
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl VoiceChannel for ScriptedVoice {
    fn speak(&mut self, text: &str) -> Result<()> {
        self.spoken
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(text.to_string());
        Ok(())
    }

    fn listen(&mut self, _timeout: Duration) -> Result<String, ListenError> {
        let reply = self
            .replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        match reply {
            Some(ScriptedReply::Heard(transcript)) => Ok(transcript),
            Some(ScriptedReply::Timeout) | None => Err(ListenError::Timeout),
            Some(ScriptedReply::Unintelligible) => Err(ListenError::Unintelligible),
            Some(ScriptedReply::Device(msg)) => Err(ListenError::Device(msg)),
        }
    }
}

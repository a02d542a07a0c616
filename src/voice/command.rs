//! Voice channel backed by external commands.
//!
//! Keeps audio plumbing out of the process: playback shells out to a TTS
//! command (espeak by default) and listening shells out to a recognizer
//! command that is expected to record one utterance and print the transcript
//! as a single stdout line. Any speech stack that can be wrapped in a script
//! slots in via configuration.

use anyhow::{anyhow, Context, Result};
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use super::{ListenError, VoiceChannel};

/// Configuration for `CommandVoice`.
#[derive(Clone, Debug)]
pub struct CommandVoiceConfig {
    /// TTS command; the text to speak is appended as the final argument.
    pub speak_command: Vec<String>,
    /// Recognizer command; must print one transcript line to stdout and exit.
    pub listen_command: Vec<String>,
}

impl Default for CommandVoiceConfig {
    fn default() -> Self {
        Self {
            speak_command: vec!["espeak".to_string()],
            listen_command: vec!["listen-once".to_string()],
        }
    }
}

/// Command-driven voice channel.
pub struct CommandVoice {
    config: CommandVoiceConfig,
}

impl CommandVoice {
    pub fn new(config: CommandVoiceConfig) -> Result<Self> {
        if config.speak_command.is_empty() || config.listen_command.is_empty() {
            return Err(anyhow!("voice commands must not be empty"));
        }
        Ok(Self { config })
    }
}

impl VoiceChannel for CommandVoice {
    fn speak(&mut self, text: &str) -> Result<()> {
        let (program, args) = self.config.speak_command.split_first().expect("non-empty");
        let status = Command::new(program)
            .args(args)
            .arg(text)
            .status()
            .with_context(|| format!("run speak command '{}'", program))?;
        if !status.success() {
            return Err(anyhow!("speak command '{}' exited with {}", program, status));
        }
        Ok(())
    }

    fn listen(&mut self, timeout: Duration) -> Result<String, ListenError> {
        let (program, args) = self.config.listen_command.split_first().expect("non-empty");
        let child = Command::new(program)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ListenError::Device(format!("spawn '{}': {}", program, e)))?;

        let output = wait_with_deadline(child, timeout)?;
        let transcript = output.trim();
        if transcript.is_empty() {
            return Err(ListenError::Unintelligible);
        }
        Ok(transcript.to_string())
    }
}

/// Poll the recognizer child until it exits or the deadline passes. A child
/// still running at the deadline gets killed and reported as `Timeout`.
fn wait_with_deadline(mut child: Child, timeout: Duration) -> Result<String, ListenError> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                let mut output = String::new();
                if let Some(mut stdout) = child.stdout.take() {
                    stdout
                        .read_to_string(&mut output)
                        .map_err(|e| ListenError::Device(format!("read transcript: {}", e)))?;
                }
                if !status.success() {
                    return Err(ListenError::Device(format!(
                        "recognizer exited with {}",
                        status
                    )));
                }
                return Ok(output);
            }
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ListenError::Timeout);
                }
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(e) => {
                return Err(ListenError::Device(format!("wait for recognizer: {}", e)));
            }
        }
    }
}

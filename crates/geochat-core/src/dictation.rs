//! Speech-to-text capture
//!
//! A dictation session produces the full, cumulative list of recognized
//! segments on every update; consumers rebuild their text from the latest
//! list rather than appending deltas.

use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::DictationError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DictationEvent {
    /// Every segment recognized so far in this session
    Transcript(Vec<String>),
    /// The session finished on its own or after `stop`
    Ended,
    /// The capture backend failed; the session is over
    Failed(String),
}

/// An event tagged with the session that produced it, so updates from a
/// stopped session can be told apart from the current one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictationUpdate {
    pub session: u64,
    pub event: DictationEvent,
}

/// A running capture session
pub trait DictationSession: Send {
    fn stop(&mut self);
}

/// Something that can start dictation sessions
pub trait SpeechCapture: Send + Sync {
    fn start(
        &self,
        session: u64,
        events: UnboundedSender<DictationUpdate>,
    ) -> Result<Box<dyn DictationSession>, DictationError>;
}

/// Runs an external speech-to-text program that prints one recognized
/// segment per line on stdout.
#[derive(Debug, Clone)]
pub struct CommandDictation {
    program: String,
    args: Vec<String>,
}

impl CommandDictation {
    pub fn new(argv: &[String]) -> Result<Self, DictationError> {
        let (program, args) = argv.split_first().ok_or(DictationError::NotConfigured)?;
        if program.trim().is_empty() {
            return Err(DictationError::NotConfigured);
        }
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    /// `None` when no command is configured
    pub fn from_config(config: &Config) -> Option<Self> {
        config
            .dictation_command
            .as_deref()
            .and_then(|argv| Self::new(argv).ok())
    }
}

struct CommandSession {
    child: Child,
}

impl DictationSession for CommandSession {
    fn stop(&mut self) {
        if let Err(e) = self.child.start_kill() {
            debug!("dictation process already gone: {}", e);
        }
    }
}

impl SpeechCapture for CommandDictation {
    fn start(
        &self,
        session: u64,
        events: UnboundedSender<DictationUpdate>,
    ) -> Result<Box<dyn DictationSession>, DictationError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DictationError::Spawn(format!("{}: {}", self.program, e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DictationError::Spawn("no stdout from dictation command".to_string()))?;

        info!(program = %self.program, session, "dictation started");

        tokio::spawn(async move {
            let send = |event| events.send(DictationUpdate { session, event });
            let mut lines = BufReader::new(stdout).lines();
            let mut results: Vec<String> = Vec::new();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        results.push(line);
                        if send(DictationEvent::Transcript(results.clone())).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        let _ = send(DictationEvent::Ended);
                        break;
                    }
                    Err(e) => {
                        warn!("dictation read failed: {}", e);
                        let _ = send(DictationEvent::Failed(e.to_string()));
                        break;
                    }
                }
            }
        });

        Ok(Box::new(CommandSession { child }))
    }
}

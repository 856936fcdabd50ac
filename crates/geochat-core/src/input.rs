//! Draft text and dictation state for the message box

use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

use crate::dictation::{DictationEvent, DictationSession, DictationUpdate, SpeechCapture};
use crate::error::DictationError;

/// Why a submission was ignored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Empty,
    Busy,
    NoLocation,
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

#[derive(Default)]
pub struct Composer {
    draft: String,
    cursor: usize, // in chars
    session: Option<Box<dyn DictationSession>>,
    session_id: u64, // id of the latest started session
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_listening(&self) -> bool {
        self.session.is_some()
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
        self.cursor = self.draft.chars().count();
    }

    pub fn insert_char(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.draft, self.cursor);
        self.draft.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.draft, self.cursor);
            self.draft.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.draft.chars().count() {
            let byte_pos = char_to_byte_index(&self.draft, self.cursor);
            self.draft.remove(byte_pos);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.draft.chars().count());
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.draft.chars().count();
    }

    /// Start a dictation session, or stop the running one. Starting clears
    /// the draft so the transcript replaces it.
    pub fn toggle_dictation(
        &mut self,
        capture: &dyn SpeechCapture,
        events: UnboundedSender<DictationUpdate>,
    ) -> Result<(), DictationError> {
        if self.is_listening() {
            self.stop_dictation();
            return Ok(());
        }

        self.set_draft(String::new());
        self.session_id += 1;
        self.session = Some(capture.start(self.session_id, events)?);
        Ok(())
    }

    /// True if the update belongs to the session that is listening now
    pub fn is_current(&self, update: &DictationUpdate) -> bool {
        self.is_listening() && update.session == self.session_id
    }

    pub fn stop_dictation(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.stop();
            info!("dictation stopped");
        }
    }

    /// Apply an update from the capture session. Updates from a stopped or
    /// older session are ignored.
    pub fn apply_dictation(&mut self, update: DictationUpdate) {
        if !self.is_current(&update) {
            return;
        }
        match update.event {
            DictationEvent::Transcript(results) => {
                self.set_draft(results.concat());
            }
            DictationEvent::Ended => {
                self.session = None;
            }
            DictationEvent::Failed(reason) => {
                warn!("Speech recognition error: {}", reason);
                self.session = None;
            }
        }
    }

    /// Hand the draft over for sending. Any dictation is stopped first; the
    /// draft is only cleared when the submission is accepted.
    pub fn submit(&mut self, busy: bool, has_location: bool) -> Result<String, Rejection> {
        self.stop_dictation();

        if self.draft.trim().is_empty() {
            return Err(Rejection::Empty);
        }
        if busy {
            return Err(Rejection::Busy);
        }
        if !has_location {
            return Err(Rejection::NoLocation);
        }

        self.cursor = 0;
        Ok(std::mem::take(&mut self.draft))
    }
}

//! Chat session state and its transitions
//!
//! All shared state (messages, location, loading flag, error banner) is owned
//! by [`ChatSession`] and only changes through the methods below. The request
//! itself is split into [`ChatSession::begin_turn`] and
//! [`ChatSession::finish_turn`] so a front-end can run it on a background
//! task; [`ChatSession::send`] does both in one await.

use tracing::{error, info, warn};

use crate::error::{ChatError, LocationError, LOCATION_REQUIRED, RESPONSE_FAILED};
use crate::gemini::{GroundedChat, GroundedResponse};
use crate::state::{Message, UserLocation};
use crate::store::{Conversation, KeyValueStore};

/// Where the session is, derived from its state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No location yet
    Idle,
    /// Location known, waiting for input
    Ready,
    /// A request is in flight
    Pending,
    /// The last action failed and the banner is showing
    Error,
}

/// Everything needed to run one backend request
#[derive(Debug, Clone, PartialEq)]
pub struct TurnRequest {
    pub prompt: String,
    pub location: UserLocation,
    /// Conversation before the new user message was appended
    pub history: Vec<Message>,
}

impl TurnRequest {
    pub async fn run(&self, backend: &dyn GroundedChat) -> Result<GroundedResponse, ChatError> {
        backend.respond(&self.prompt, self.location, &self.history).await
    }
}

pub struct ChatSession<S: KeyValueStore> {
    conversation: Conversation<S>,
    location: Option<UserLocation>,
    loading: bool,
    error: Option<String>,
    scroll_requested: bool,
}

impl<S: KeyValueStore> ChatSession<S> {
    pub fn new(conversation: Conversation<S>) -> Self {
        Self {
            conversation,
            location: None,
            loading: false,
            error: None,
            scroll_requested: true,
        }
    }

    pub fn messages(&self) -> &[Message] {
        self.conversation.messages()
    }

    pub fn conversation(&self) -> &Conversation<S> {
        &self.conversation
    }

    pub fn location(&self) -> Option<UserLocation> {
        self.location
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn phase(&self) -> Phase {
        if self.loading {
            Phase::Pending
        } else if self.error.is_some() {
            Phase::Error
        } else if self.location.is_some() {
            Phase::Ready
        } else {
            Phase::Idle
        }
    }

    /// True once after any change that should scroll the view to the
    /// latest message
    pub fn take_scroll_request(&mut self) -> bool {
        std::mem::take(&mut self.scroll_requested)
    }

    /// Result of the one-shot position lookup
    pub fn on_location(&mut self, result: Result<UserLocation, LocationError>) {
        match result {
            Ok(location) => {
                if self.location.is_some() {
                    return;
                }
                info!(%location, "location acquired");
                self.location = Some(location);
                self.error = None;
                if self.conversation.is_empty() {
                    self.conversation.push(Message::welcome());
                }
            }
            Err(e) => {
                warn!("location unavailable: {:?}", e);
                self.error = Some(e.to_string());
            }
        }
        self.scroll_requested = true;
    }

    /// Surface the missing-location error without touching the conversation
    pub fn note_missing_location(&mut self) {
        if self.location.is_none() {
            self.error = Some(LOCATION_REQUIRED.to_string());
            self.scroll_requested = true;
        }
    }

    /// Optimistically append the user's message and hand back the request
    /// to run. `None` means the submission was a no-op.
    pub fn begin_turn(&mut self, text: String) -> Option<TurnRequest> {
        if self.loading || text.trim().is_empty() {
            return None;
        }
        let Some(location) = self.location else {
            self.note_missing_location();
            return None;
        };

        let history = self.conversation.messages().to_vec();
        let id = self.conversation.next_id();
        self.conversation.push(Message::user(id, text.clone()));
        self.loading = true;
        self.error = None;
        self.scroll_requested = true;

        Some(TurnRequest {
            prompt: text,
            location,
            history,
        })
    }

    /// Apply the backend's answer, or its failure, to the session
    pub fn finish_turn(&mut self, result: Result<GroundedResponse, ChatError>) {
        self.loading = false;
        match result {
            Ok(response) => {
                let id = self.conversation.next_id();
                self.conversation
                    .push(Message::model(id, response.text, response.grounding_chunks));
            }
            Err(e) => {
                error!("Error calling Gemini API: {}", e);
                self.error = Some(RESPONSE_FAILED.to_string());
            }
        }
        self.scroll_requested = true;
    }

    /// Run a full turn against `backend`. Returns false when the submission
    /// was ignored.
    pub async fn send(&mut self, text: String, backend: &dyn GroundedChat) -> bool {
        let Some(request) = self.begin_turn(text) else {
            return false;
        };
        let result = request.run(backend).await;
        self.finish_turn(result);
        true
    }

    /// Forget the whole conversation, including the stored copy
    pub fn clear_history(&mut self) -> Result<(), crate::error::StoreError> {
        self.conversation.clear()?;
        self.scroll_requested = true;
        Ok(())
    }
}

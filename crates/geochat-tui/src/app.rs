use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;

use geochat_core::{
    ChatError, ChatSession, Composer, DictationEvent, DictationUpdate, GroundedChat, GroundedResponse,
    LocationError, LocationProvider, Rejection, SpeechCapture, SqliteStore, UserLocation,
};

use crate::tui::AppEvent;

pub struct App {
    // Core state
    pub should_quit: bool,
    pub session: ChatSession<SqliteStore>,
    pub composer: Composer,
    pub model: String,

    // Chat view state
    pub chat_scroll: u16,
    pub follow_latest: bool,   // keep the newest message in view
    pub chat_height: u16,      // inner height of chat area, set during render
    pub chat_width: u16,       // inner width of chat area, set during render
    pub total_chat_lines: u16, // wrapped line count of the last render

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // One-line status for things that are not errors (e.g. dictation problems)
    pub notice: Option<String>,

    // Capabilities
    backend: Arc<dyn GroundedChat>,
    dictation: Option<Arc<dyn SpeechCapture>>,

    // Channels back into the event loop
    events: UnboundedSender<AppEvent>,
    dictation_events: UnboundedSender<DictationUpdate>,
}

impl App {
    pub fn new(
        session: ChatSession<SqliteStore>,
        backend: Arc<dyn GroundedChat>,
        dictation: Option<Arc<dyn SpeechCapture>>,
        model: String,
        events: UnboundedSender<AppEvent>,
        dictation_events: UnboundedSender<DictationUpdate>,
    ) -> Self {
        Self {
            should_quit: false,
            session,
            composer: Composer::new(),
            model,

            chat_scroll: 0,
            follow_latest: true,
            chat_height: 0,
            chat_width: 0,
            total_chat_lines: 0,

            animation_frame: 0,
            notice: None,

            backend,
            dictation,
            events,
            dictation_events,
        }
    }

    pub fn has_dictation(&self) -> bool {
        self.dictation.is_some()
    }

    /// Typing and dictation are only possible while idle with a location
    pub fn input_enabled(&self) -> bool {
        !self.session.is_loading() && self.session.location().is_some()
    }

    /// Run the one-shot position lookup in the background
    pub fn request_location(&self, provider: Box<dyn LocationProvider>) {
        let tx = self.events.clone();
        tokio::spawn(async move {
            let result = provider.current_position().await;
            let _ = tx.send(AppEvent::Location(result));
        });
    }

    pub fn on_location(&mut self, result: Result<UserLocation, LocationError>) {
        self.session.on_location(result);
    }

    /// Send the draft if the composer accepts it
    pub fn submit(&mut self) {
        let busy = self.session.is_loading();
        let has_location = self.session.location().is_some();

        match self.composer.submit(busy, has_location) {
            Ok(text) => {
                let Some(request) = self.session.begin_turn(text) else {
                    return;
                };
                let backend = Arc::clone(&self.backend);
                let tx = self.events.clone();
                tokio::spawn(async move {
                    let result = request.run(backend.as_ref()).await;
                    let _ = tx.send(AppEvent::Reply(result));
                });
            }
            Err(Rejection::NoLocation) => self.session.note_missing_location(),
            Err(Rejection::Empty) | Err(Rejection::Busy) => {}
        }
    }

    pub fn on_reply(&mut self, result: Result<GroundedResponse, ChatError>) {
        self.session.finish_turn(result);
    }

    pub fn toggle_dictation(&mut self) {
        let Some(capture) = self.dictation.clone() else {
            return;
        };
        if !self.input_enabled() {
            return;
        }
        self.notice = None;
        if let Err(e) = self
            .composer
            .toggle_dictation(capture.as_ref(), self.dictation_events.clone())
        {
            warn!("could not toggle dictation: {}", e);
            self.notice = Some(e.to_string());
        }
    }

    pub fn on_dictation(&mut self, update: DictationUpdate) {
        if let DictationEvent::Failed(reason) = &update.event {
            if self.composer.is_current(&update) {
                self.notice = Some(format!("Speech recognition error: {}", reason));
            }
        }
        self.composer.apply_dictation(update);
    }

    pub fn tick_animation(&mut self) {
        if self.session.is_loading() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    fn max_scroll(&self) -> u16 {
        self.total_chat_lines.saturating_sub(self.chat_height)
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.follow_latest = false;
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(self.max_scroll());
        // Reaching the bottom re-attaches to new messages
        if self.chat_scroll >= self.max_scroll() {
            self.follow_latest = true;
        }
    }

    pub fn scroll_to_latest(&mut self) {
        self.follow_latest = true;
        self.chat_scroll = self.max_scroll();
    }

    /// Called by the renderer once the wrapped line count is known
    pub fn update_scroll(&mut self, total_lines: u16) {
        self.total_chat_lines = total_lines;
        if self.session.take_scroll_request() {
            self.follow_latest = true;
        }
        if self.follow_latest {
            self.chat_scroll = self.max_scroll();
        } else {
            self.chat_scroll = self.chat_scroll.min(self.max_scroll());
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use geochat_core::{Conversation, Message};
    use tokio::sync::mpsc;

    /// Answers every prompt by repeating it
    struct Echo;

    #[async_trait]
    impl GroundedChat for Echo {
        async fn respond(
            &self,
            prompt: &str,
            _location: UserLocation,
            _history: &[Message],
        ) -> Result<GroundedResponse, ChatError> {
            Ok(GroundedResponse {
                text: format!("echo: {}", prompt),
                grounding_chunks: Vec::new(),
            })
        }
    }

    pub(crate) fn test_app() -> (App, mpsc::UnboundedReceiver<AppEvent>) {
        let store = SqliteStore::open_in_memory().unwrap();
        let session = ChatSession::new(Conversation::load(store));
        let (tx, rx) = mpsc::unbounded_channel();
        let (dtx, _drx) = mpsc::unbounded_channel();
        let app = App::new(session, Arc::new(Echo), None, "gemini-2.5-flash".to_string(), tx, dtx);
        (app, rx)
    }

    #[tokio::test]
    async fn test_submit_round_trip_through_event_channel() {
        let (mut app, mut rx) = test_app();
        app.on_location(Ok(UserLocation { latitude: 37.77, longitude: -122.41 }));
        app.composer.set_draft("best coffee nearby");

        app.submit();
        assert!(app.session.is_loading());
        assert_eq!(app.composer.draft(), "");
        assert!(!app.input_enabled());

        let Some(AppEvent::Reply(result)) = rx.recv().await else {
            panic!("expected a reply event");
        };
        app.on_reply(result);

        let texts: Vec<&str> = app.session.messages().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts.len(), 3);
        assert_eq!(texts[1..].to_vec(), vec!["best coffee nearby", "echo: best coffee nearby"]);
        assert!(!app.session.is_loading());
    }

    #[test]
    fn test_submit_without_location_shows_error_and_keeps_draft() {
        let (mut app, _rx) = test_app();
        app.composer.set_draft("hello");
        app.submit();
        assert_eq!(app.composer.draft(), "hello");
        assert!(app.session.error().is_some());
        assert!(app.session.messages().is_empty());
    }

    #[test]
    fn test_scroll_follows_until_user_scrolls_up() {
        let (mut app, _rx) = test_app();
        app.chat_height = 10;
        app.update_scroll(30);
        assert_eq!(app.chat_scroll, 20);

        app.scroll_up(5);
        app.update_scroll(32);
        assert_eq!(app.chat_scroll, 15);
        assert!(!app.follow_latest);

        app.scroll_down(100);
        assert!(app.follow_latest);
        app.update_scroll(40);
        assert_eq!(app.chat_scroll, 30);
    }
}

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use crate::app::App;
use crate::tui::AppEvent;

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick_animation(),
        AppEvent::Location(result) => app.on_location(result),
        AppEvent::Reply(result) => app.on_reply(result),
        AppEvent::Dictation(update) => app.on_dictation(update),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    // Global keys that work in any state
    match key.code {
        KeyCode::Char('c') if ctrl => {
            app.should_quit = true;
            return;
        }
        KeyCode::Esc => {
            app.should_quit = true;
            return;
        }
        KeyCode::Char('r') if ctrl => {
            app.toggle_dictation();
            return;
        }

        // Chat scrolling
        KeyCode::Up => {
            app.scroll_up(1);
            return;
        }
        KeyCode::Down => {
            app.scroll_down(1);
            return;
        }
        KeyCode::PageUp => {
            app.scroll_up(app.chat_height.max(2) / 2);
            return;
        }
        KeyCode::PageDown => {
            app.scroll_down(app.chat_height.max(2) / 2);
            return;
        }
        KeyCode::End if ctrl => {
            app.scroll_to_latest();
            return;
        }
        KeyCode::Enter => {
            app.submit();
            return;
        }
        _ => {}
    }

    // The input box is disabled while a request is pending or without a location
    if !app.input_enabled() {
        return;
    }

    match key.code {
        KeyCode::Backspace => app.composer.backspace(),
        KeyCode::Delete => app.composer.delete(),
        KeyCode::Left => app.composer.move_left(),
        KeyCode::Right => app.composer.move_right(),
        KeyCode::Home => app.composer.move_home(),
        KeyCode::End => app.composer.move_end(),
        KeyCode::Char('u') if ctrl => app.composer.set_draft(String::new()),
        KeyCode::Char(c) if !ctrl => app.composer.insert_char(c),
        _ => {}
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(3),
        MouseEventKind::ScrollUp => app.scroll_up(3),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::test_app;
    use crossterm::event::KeyEventKind;
    use geochat_core::UserLocation;

    fn key(code: KeyCode) -> AppEvent {
        AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            handle_event(app, key(KeyCode::Char(c))).unwrap();
        }
    }

    #[test]
    fn test_typing_requires_location() {
        let (mut app, _rx) = test_app();
        type_text(&mut app, "hi");
        assert_eq!(app.composer.draft(), "");

        handle_event(&mut app, AppEvent::Location(Ok(UserLocation { latitude: 1.0, longitude: 2.0 }))).unwrap();
        type_text(&mut app, "hi");
        handle_event(&mut app, key(KeyCode::Backspace)).unwrap();
        assert_eq!(app.composer.draft(), "h");
        assert_eq!(app.session.messages().len(), 1);
    }

    #[test]
    fn test_quit_keys() {
        let (mut app, _rx) = test_app();
        handle_event(&mut app, AppEvent::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL))).unwrap();
        assert!(app.should_quit);

        let (mut app, _rx) = test_app();
        let mut esc = KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE);
        esc.kind = KeyEventKind::Press;
        handle_event(&mut app, AppEvent::Key(esc)).unwrap();
        assert!(app.should_quit);
    }

    #[test]
    fn test_dictation_key_without_capability_is_ignored() {
        let (mut app, _rx) = test_app();
        handle_event(&mut app, AppEvent::Location(Ok(UserLocation { latitude: 1.0, longitude: 2.0 }))).unwrap();
        handle_event(&mut app, AppEvent::Key(KeyEvent::new(KeyCode::Char('r'), KeyModifiers::CONTROL))).unwrap();
        assert!(!app.composer.is_listening());
        assert_eq!(app.composer.draft(), "");
    }

    #[test]
    fn test_ctrl_end_follows_latest() {
        let (mut app, _rx) = test_app();
        app.chat_height = 5;
        app.update_scroll(20);
        handle_event(&mut app, key(KeyCode::PageUp)).unwrap();
        assert!(!app.follow_latest);
        assert!(app.chat_scroll < 15);

        handle_event(&mut app, AppEvent::Key(KeyEvent::new(KeyCode::End, KeyModifiers::CONTROL))).unwrap();
        assert!(app.follow_latest);
        assert_eq!(app.chat_scroll, 15);
    }
}

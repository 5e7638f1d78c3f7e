//! Keyboard input handling for the TUI.
//!
//! Translates key events into application state changes. Anything that
//! touches the backend is started here and finishes in the background.

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};

use crate::app::{
    can_add_email_char, can_add_password_char, App, AppState, LoginFocus, Tab, PAGE_SCROLL_SIZE,
};

/// Handle keyboard input. Returns true if the app should quit.
pub async fn handle_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match app.state {
        AppState::LoggingIn => return handle_login_input(app, key).await,
        AppState::ShowingHelp => {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
                app.state = AppState::Normal;
            }
            return Ok(false);
        }
        AppState::ConfirmingQuit => {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                    app.state = AppState::Quitting;
                    return Ok(true);
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    app.state = AppState::Normal;
                }
                _ => {}
            }
            return Ok(false);
        }
        AppState::ConfirmingReminders => {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                    app.state = AppState::Normal;
                    app.send_reminders_background();
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    app.state = AppState::Normal;
                }
                _ => {}
            }
            return Ok(false);
        }
        AppState::Normal | AppState::Quitting => {}
    }

    // A keypress dismisses the last notice
    app.status_message = None;

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => app.state = AppState::ConfirmingQuit,
        KeyCode::Char('?') => app.state = AppState::ShowingHelp,
        KeyCode::Char('u') => app.refresh_background(),
        KeyCode::Char('r') => app.state = AppState::ConfirmingReminders,
        KeyCode::Char('p') => app.record_selected_payment(),
        KeyCode::Char('L') => app.logout(),
        KeyCode::Char(c @ '1'..='4') => {
            let index = c as usize - '1' as usize;
            app.current_tab = Tab::ALL[index];
        }
        KeyCode::Right | KeyCode::Tab => app.current_tab = app.current_tab.next(),
        KeyCode::Left | KeyCode::BackTab => app.current_tab = app.current_tab.prev(),
        KeyCode::Up | KeyCode::Char('k') => move_selection(app, -1),
        KeyCode::Down | KeyCode::Char('j') => move_selection(app, 1),
        KeyCode::PageUp => move_selection(app, -(PAGE_SCROLL_SIZE as isize)),
        KeyCode::PageDown => move_selection(app, PAGE_SCROLL_SIZE as isize),
        KeyCode::Home => move_selection(app, isize::MIN),
        KeyCode::End => move_selection(app, isize::MAX),
        _ => {}
    }
    Ok(false)
}

/// Move the current tab's selection by `delta`, clamped to the list.
fn move_selection(app: &mut App, delta: isize) {
    let max_index = app.current_list_len().saturating_sub(1);
    if let Some(selection) = app.current_selection_mut() {
        *selection = step(*selection, delta, max_index);
    }
}

fn step(current: usize, delta: isize, max_index: usize) -> usize {
    if delta < 0 {
        current.saturating_sub(delta.unsigned_abs())
    } else {
        current.saturating_add(delta as usize).min(max_index)
    }
}

async fn handle_login_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match key.code {
        KeyCode::Esc => {
            app.state = AppState::Quitting;
            return Ok(true);
        }
        KeyCode::Down | KeyCode::Tab => {
            app.login_focus = match app.login_focus {
                LoginFocus::Email => LoginFocus::Password,
                LoginFocus::Password => LoginFocus::Button,
                LoginFocus::Button => LoginFocus::Email,
            };
        }
        KeyCode::Up | KeyCode::BackTab => {
            app.login_focus = match app.login_focus {
                LoginFocus::Email => LoginFocus::Button,
                LoginFocus::Password => LoginFocus::Email,
                LoginFocus::Button => LoginFocus::Password,
            };
        }
        KeyCode::Enter => match app.login_focus {
            LoginFocus::Email => app.login_focus = LoginFocus::Password,
            LoginFocus::Password | LoginFocus::Button => {
                // On failure login_error is set and the form stays open
                if app.attempt_login().await.is_ok() {
                    app.refresh_background();
                }
            }
        },
        KeyCode::Backspace => match app.login_focus {
            LoginFocus::Email => {
                app.login_email.pop();
            }
            LoginFocus::Password => {
                app.login_password.pop();
            }
            LoginFocus::Button => {}
        },
        KeyCode::Char(c) => match app.login_focus {
            LoginFocus::Email => {
                if can_add_email_char(app.login_email.chars().count(), c) {
                    app.login_email.push(c);
                }
            }
            LoginFocus::Password => {
                if can_add_password_char(app.login_password.chars().count(), c) {
                    app.login_password.push(c);
                }
            }
            LoginFocus::Button => {}
        },
        _ => {}
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_clamps() {
        assert_eq!(step(0, -1, 5), 0);
        assert_eq!(step(3, 1, 5), 4);
        assert_eq!(step(5, 1, 5), 5);
        assert_eq!(step(2, 10, 5), 5);
        assert_eq!(step(7, -10, 5), 0);
        assert_eq!(step(3, isize::MIN, 5), 0);
        assert_eq!(step(3, isize::MAX, 5), 5);
    }

    #[test]
    fn test_step_on_empty_list() {
        assert_eq!(step(0, 1, 0), 0);
        assert_eq!(step(0, isize::MAX, 0), 0);
    }
}

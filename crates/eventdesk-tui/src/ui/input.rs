//! Keyboard input handling for the TUI.
//!
//! This module handles all keyboard events and translates them into
//! application state changes.

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};

use eventdesk_core::page::Modal;
use eventdesk_core::table::RowAction;

use crate::app::{can_add_password_char, can_add_username_char, App, AppState, LoginFocus};

/// Handle keyboard input. Returns true if the app should quit.
pub async fn handle_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    // Handle login overlay
    if matches!(app.state, AppState::LoggingIn) {
        return handle_login_input(app, key).await;
    }

    // Handle help overlay
    if matches!(app.state, AppState::ShowingHelp) {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
            app.state = AppState::Normal;
        }
        return Ok(false);
    }

    // Handle quit confirmation
    if matches!(app.state, AppState::ConfirmingQuit) {
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

    // Open dialogs take every key
    if let Some(modal) = app.page.modal() {
        match modal {
            Modal::Add | Modal::Edit => handle_event_form_input(app, modal, key).await,
            Modal::Register => handle_registration_input(app, key),
            Modal::ConfirmDelete => handle_confirm_delete_input(app, key),
        }
        return Ok(false);
    }

    handle_events_input(app, key).await
}

async fn handle_login_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match key.code {
        KeyCode::Esc => {
            // Quit if on login screen
            app.state = AppState::Quitting;
            return Ok(true);
        }
        KeyCode::Down | KeyCode::Tab => {
            app.login_focus = match app.login_focus {
                LoginFocus::Username => LoginFocus::Password,
                LoginFocus::Password => LoginFocus::Button,
                LoginFocus::Button => LoginFocus::Username,
            };
        }
        KeyCode::Up | KeyCode::BackTab => {
            app.login_focus = match app.login_focus {
                LoginFocus::Username => LoginFocus::Button,
                LoginFocus::Password => LoginFocus::Username,
                LoginFocus::Button => LoginFocus::Password,
            };
        }
        KeyCode::Enter => match app.login_focus {
            LoginFocus::Username => {
                app.login_focus = LoginFocus::Password;
            }
            LoginFocus::Password | LoginFocus::Button => {
                // On failure login_error is set and the overlay stays up
                let _ = app.attempt_login().await;
                if app.state == AppState::Normal {
                    app.refresh_all().await;
                }
            }
        },
        KeyCode::Backspace => match app.login_focus {
            LoginFocus::Username => {
                app.login_username.pop();
            }
            LoginFocus::Password => {
                app.login_password.pop();
            }
            LoginFocus::Button => {}
        },
        KeyCode::Char(c) => match app.login_focus {
            LoginFocus::Username => {
                if can_add_username_char(app.login_username.chars().count(), c) {
                    app.login_username.push(c);
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

async fn handle_event_form_input(app: &mut App, modal: Modal, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.page.close_modal(),
        KeyCode::Enter => {
            let mutation = if modal == Modal::Add {
                app.page.begin_add().await
            } else {
                app.page.begin_edit()
            };
            if mutation.is_some() {
                app.dispatch(mutation);
            }
        }
        code => {
            let Some(form) = app.page.active_form_mut() else {
                return;
            };
            if form.submitting {
                return;
            }
            match code {
                KeyCode::Tab | KeyCode::Down => form.focus_next(),
                KeyCode::BackTab | KeyCode::Up => form.focus_prev(),
                KeyCode::Backspace => form.backspace(),
                KeyCode::Char(c) => form.push_char(c),
                _ => {}
            }
        }
    }
}

fn handle_registration_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.page.close_modal(),
        KeyCode::Enter => {
            let mutation = app.page.submit_registration();
            if mutation.is_some() {
                app.dispatch(mutation);
            }
        }
        code => {
            let Some(form) = app.page.registration_form_mut() else {
                return;
            };
            match code {
                KeyCode::Tab | KeyCode::BackTab | KeyCode::Down | KeyCode::Up => {
                    form.toggle_focus()
                }
                KeyCode::Backspace => form.backspace(),
                KeyCode::Char(c) => form.push_char(c),
                _ => {}
            }
        }
    }
}

fn handle_confirm_delete_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
            let mutation = app.page.confirm_delete();
            app.dispatch(mutation);
        }
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => app.page.close_modal(),
        _ => {}
    }
}

async fn handle_events_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match key.code {
        KeyCode::Char('q') => {
            app.state = AppState::ConfirmingQuit;
        }
        KeyCode::Char('?') => {
            app.state = AppState::ShowingHelp;
        }
        KeyCode::Up | KeyCode::Char('k') => app.page.select_previous(),
        KeyCode::Down | KeyCode::Char('j') => app.page.select_next(),
        KeyCode::Right | KeyCode::Char('l') | KeyCode::Char('n') => app.next_page().await,
        KeyCode::Left | KeyCode::Char('h') | KeyCode::Char('p') => app.previous_page().await,
        KeyCode::Char('a') => app.page.open_add(),
        KeyCode::Char('r') | KeyCode::Enter => app.toggle_registration(),
        KeyCode::Char('e') => app.activate_selected(RowAction::Edit),
        KeyCode::Char('d') => app.activate_selected(RowAction::Delete),
        KeyCode::Char('R') | KeyCode::F(5) => app.force_refresh().await,
        KeyCode::Char('L') => app.logout().await,
        _ => {}
    }
    Ok(false)
}

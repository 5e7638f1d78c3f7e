use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use crate::app::{App, AppState, LoginFocus, Tab};

use super::styles;
use super::tabs::{activity, overview, payments, tasks};

const TITLE: &str = "  Conservatory Office";

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2), // Title bar
            Constraint::Length(2), // Tabs
            Constraint::Min(10),   // Main content
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    render_title_bar(frame, app, chunks[0]);
    render_tabs(frame, app, chunks[1]);
    render_main_content(frame, app, chunks[2]);
    render_status_bar(frame, app, chunks[3]);

    match app.state {
        AppState::ShowingHelp => render_help_overlay(frame),
        AppState::LoggingIn => render_login_overlay(frame, app),
        AppState::ConfirmingQuit => render_confirm_overlay(frame, "Are you sure you want to quit?"),
        AppState::ConfirmingReminders => render_confirm_overlay(
            frame,
            "Email a reminder for every past-due payment?",
        ),
        AppState::Normal | AppState::Quitting => {}
    }
}

fn render_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let help_hint = "[?] Help";
    let signed_in = app
        .session
        .email()
        .map(|e| format!("{}  ", e))
        .unwrap_or_default();
    let used = TITLE.len() + signed_in.len() + help_hint.len() + 2;

    let title_line = Line::from(vec![
        Span::styled(TITLE, styles::title_style()),
        Span::raw(" ".repeat((area.width as usize).saturating_sub(used))),
        Span::styled(signed_in, styles::muted_style()),
        Span::styled(help_hint, styles::muted_style()),
    ]);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    frame.render_widget(Paragraph::new(title_line).block(block), area);
}

fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![Span::raw(" ")];
    for (i, tab) in Tab::ALL.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" | ", styles::muted_style()));
        }
        let label = format!("[{}] {}", i + 1, tab.title());
        if *tab == app.current_tab {
            spans.push(Span::styled(label, styles::tab_style(true)));
        } else {
            spans.push(Span::styled(label, styles::muted_style()));
        }
    }

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn render_main_content(frame: &mut Frame, app: &App, area: Rect) {
    match app.current_tab {
        Tab::Overview => overview::render(frame, app, area),
        Tab::Tasks => tasks::render(frame, app, area),
        Tab::Payments => payments::render(frame, app, area),
        Tab::Activity => activity::render(frame, app, area),
    }
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let shortcuts = match app.current_tab {
        Tab::Tasks | Tab::Payments => "[p]aid | [r]eminders | [u]pdate | [q]uit",
        Tab::Overview | Tab::Activity => "[r]eminders | [u]pdate | [q]uit",
    };

    let (left_text, left_style) = match app.status_message {
        Some(ref notice) => (format!(" {} ", notice.message), styles::notice_style(notice.level)),
        None => {
            let mut text = format!(" Updated {}", app.last_updated());
            if app.refreshing {
                text.push_str(" - refreshing...");
            } else if app.showing_stale {
                text.push_str(" (stale)");
            }
            text.push(' ');
            (text, styles::muted_style())
        }
    };
    let right_text = format!(" {} ", shortcuts);

    let padding_len = (area.width as usize)
        .saturating_sub(left_text.len())
        .saturating_sub(right_text.len());
    let status_line = Line::from(vec![
        Span::styled(left_text, left_style),
        Span::raw(" ".repeat(padding_len)),
        Span::styled(right_text, styles::muted_style()),
    ]);

    frame.render_widget(
        Paragraph::new(status_line).style(styles::status_bar_style()),
        area,
    );
}

fn help_line(key: &'static str, desc: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("  {:<10}", key), styles::help_key_style()),
        Span::styled(desc, styles::help_desc_style()),
    ])
}

fn render_help_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(52, 20, frame.area());
    frame.render_widget(Clear, area);

    let version = env!("CARGO_PKG_VERSION");

    let help_text = vec![
        Line::from(Span::styled(TITLE, styles::title_style())),
        Line::from(Span::styled(
            format!("  version {}", version),
            styles::muted_style(),
        )),
        Line::from(""),
        Line::from(Span::styled(" Navigation", styles::highlight_style())),
        help_line("1-4", "Switch tabs"),
        help_line("←/→", "Prev/next tab"),
        help_line("↑/↓", "Navigate list"),
        help_line("PgUp/PgDn", "Scroll a page"),
        Line::from(""),
        Line::from(Span::styled(" Actions", styles::highlight_style())),
        help_line("u", "Refresh from the backend"),
        help_line("p", "Mark selected payment as paid today"),
        help_line("r", "Send payment reminders"),
        help_line("L", "Log out"),
        help_line("q", "Quit"),
        Line::from(""),
        Line::from(vec![
            Span::styled("       Press ", styles::muted_style()),
            Span::styled("?", styles::help_key_style()),
            Span::styled(" or ", styles::muted_style()),
            Span::styled("Esc", styles::help_key_style()),
            Span::styled(" to close", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(help_text).block(block), area);
}

fn render_login_overlay(frame: &mut Frame, app: &App) {
    let height = if app.login_error.is_some() { 11 } else { 9 };
    let area = centered_rect_fixed(50, height, frame.area());
    frame.render_widget(Clear, area);

    let mut lines = vec![
        Line::from(Span::styled(TITLE, styles::title_style())),
        Line::from(""),
    ];

    let field = |label: &'static str, value: String, focused: bool| {
        let style = if focused {
            styles::selected_style()
        } else {
            styles::list_item_style()
        };
        let cursor = if focused { "▌" } else { "" };
        Line::from(vec![
            Span::raw("  "),
            Span::styled(label, styles::muted_style()),
            Span::styled(format!("{:<28}{}", value, cursor), style),
            Span::styled("]", styles::muted_style()),
        ])
    };

    let email_tail: String = {
        let chars: Vec<char> = app.login_email.chars().collect();
        chars[chars.len().saturating_sub(28)..].iter().collect()
    };
    lines.push(field(
        "Email:    [",
        email_tail,
        app.login_focus == LoginFocus::Email,
    ));
    lines.push(field(
        "Password: [",
        "*".repeat(app.login_password.chars().count().min(28)),
        app.login_focus == LoginFocus::Password,
    ));

    lines.push(Line::from(""));
    let button_focused = app.login_focus == LoginFocus::Button;
    let (button_label, button_style) = if button_focused {
        (" ▶ Login ◀ ", styles::selected_style())
    } else {
        ("   Login   ", styles::list_item_style())
    };
    lines.push(Line::from(vec![
        Span::raw("                ["),
        Span::styled(button_label, button_style),
        Span::raw("]"),
    ]));

    if let Some(ref error) = app.login_error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!(" {}", error),
            styles::error_style(),
        )));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_confirm_overlay(frame: &mut Frame, question: &str) {
    let area = centered_rect_fixed(52, 7, frame.area());
    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            format!("  {}", question),
            styles::highlight_style(),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Press ", styles::muted_style()),
            Span::styled("[Y]", styles::help_key_style()),
            Span::styled(" to confirm, ", styles::muted_style()),
            Span::styled("[N]", styles::help_key_style()),
            Span::styled(" to cancel", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// Create a centered rectangle with fixed dimensions
pub fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centered_rect_fixed() {
        let outer = Rect::new(0, 0, 100, 40);
        assert_eq!(centered_rect_fixed(50, 10, outer), Rect::new(25, 15, 50, 10));
        // Clipped to a small terminal
        let small = Rect::new(0, 0, 30, 5);
        assert_eq!(centered_rect_fixed(50, 10, small), Rect::new(0, 0, 30, 5));
    }
}

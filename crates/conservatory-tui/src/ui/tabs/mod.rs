pub mod activity;
pub mod overview;
pub mod payments;
pub mod tasks;

use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::app::App;
use crate::ui::styles;

/// Placeholder shown before any dashboard has been loaded.
pub fn render_no_data(frame: &mut Frame, app: &App, area: Rect, title: &str) {
    let message = if app.refreshing || app.tasks.is_loading() {
        "Loading..."
    } else {
        "No data yet. Press [u] to refresh."
    };
    let paragraph = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled(format!("  {}", message), styles::muted_style())),
    ])
    .block(
        Block::default()
            .title(format!(" {} ", title))
            .title_style(styles::muted_style())
            .borders(Borders::ALL)
            .border_style(styles::border_style(false)),
    );
    frame.render_widget(paragraph, area);
}

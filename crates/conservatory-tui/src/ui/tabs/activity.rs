use chrono::Local;
use ratatui::{
    layout::{Constraint, Rect},
    text::Span,
    widgets::{Block, Borders, Cell, Row, Table, TableState},
    Frame,
};

use crate::app::App;
use crate::ui::styles;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let Some(summary) = app.summary.as_ref() else {
        super::render_no_data(frame, app, area, "Activity");
        return;
    };

    let rows: Vec<Row> = summary
        .recent_activity
        .iter()
        .enumerate()
        .map(|(i, activity)| {
            let style = if i == app.activity_selection {
                styles::selected_style()
            } else {
                styles::list_item_style()
            };
            Row::new(vec![
                Cell::from(Span::styled(
                    activity
                        .created_at
                        .with_timezone(&Local)
                        .format("%b %d %H:%M")
                        .to_string(),
                    styles::muted_style(),
                )),
                Cell::from(Span::styled(
                    activity.kind.to_string(),
                    styles::highlight_style(),
                )),
                Cell::from(activity.description.as_str()),
            ])
            .style(style)
        })
        .collect();

    let widths = [
        Constraint::Length(13),
        Constraint::Length(20),
        Constraint::Fill(1),
    ];

    let table = Table::new(rows, widths)
        .block(
            Block::default()
                .title(format!(" Recent activity ({}) ", summary.recent_activity.len()))
                .title_style(styles::muted_style())
                .borders(Borders::ALL)
                .border_style(styles::border_style(true)),
        )
        .row_highlight_style(styles::selected_style());

    let mut state = TableState::default();
    state.select(Some(app.activity_selection));

    frame.render_stateful_widget(table, area, &mut state);
}

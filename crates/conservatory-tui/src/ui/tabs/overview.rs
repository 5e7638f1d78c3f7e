use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use conservatory_core::dashboard::DashboardSummary;
use conservatory_core::format::{format_currency, truncate_string};

use crate::app::App;
use crate::ui::styles;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let Some(summary) = app.summary.as_ref() else {
        super::render_no_data(frame, app, area, "Overview");
        return;
    };

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(5), Constraint::Min(6)])
        .split(area);

    render_cards(frame, summary, rows[0]);

    let bottom = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(rows[1]);

    render_top_tasks(frame, summary, bottom[0]);
    render_divisions(frame, summary, bottom[1]);
}

/// One card per headline count.
fn cards(summary: &DashboardSummary) -> Vec<(&'static str, String, String)> {
    vec![
        (
            "Active students",
            summary.active_students.to_string(),
            String::new(),
        ),
        (
            "Awaiting signatures",
            summary.awaiting_signatures.to_string(),
            format!("{} executed", summary.executed_contracts),
        ),
        (
            "Overdue payments",
            summary.overdue_count.to_string(),
            format_currency(summary.overdue_total),
        ),
        (
            "Upcoming (30 days)",
            summary.upcoming_payments.len().to_string(),
            format_currency(summary.upcoming_payments.iter().map(|p| p.amount).sum()),
        ),
        (
            "Pending documents",
            summary.pending_documents.to_string(),
            String::new(),
        ),
    ]
}

fn render_cards(frame: &mut Frame, summary: &DashboardSummary, area: Rect) {
    let cards = cards(summary);
    let constraints: Vec<Constraint> = cards
        .iter()
        .map(|_| Constraint::Ratio(1, cards.len() as u32))
        .collect();
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(constraints)
        .split(area);

    for ((label, value, detail), column) in cards.into_iter().zip(columns.iter()) {
        let value_style = if label == "Overdue payments" && summary.overdue_count > 0 {
            styles::error_style()
        } else {
            styles::card_value_style()
        };
        let paragraph = Paragraph::new(vec![
            Line::from(Span::styled(format!(" {}", value), value_style)),
            Line::from(Span::styled(format!(" {}", detail), styles::muted_style())),
        ])
        .block(
            Block::default()
                .title(format!(" {} ", label))
                .title_style(styles::muted_style())
                .borders(Borders::ALL)
                .border_style(styles::border_style(false)),
        );
        frame.render_widget(paragraph, *column);
    }
}

fn render_top_tasks(frame: &mut Frame, summary: &DashboardSummary, area: Rect) {
    let width = area.width.saturating_sub(14) as usize;
    let mut lines: Vec<Line> = summary
        .top_tasks
        .iter()
        .map(|task| {
            Line::from(vec![
                Span::styled(
                    format!(" {:<8}", task.urgency.label()),
                    styles::urgency_style(task.urgency),
                ),
                Span::raw(truncate_string(
                    &format!("{} - {}", task.title, task.detail),
                    width,
                )),
            ])
        })
        .collect();
    if lines.is_empty() {
        lines.push(Line::from(Span::styled(
            " Nothing to do",
            styles::success_style(),
        )));
    }

    let title = format!(" Open tasks ({} total) ", summary.open_tasks);
    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .title(title)
            .title_style(styles::muted_style())
            .borders(Borders::ALL)
            .border_style(styles::border_style(true)),
    );
    frame.render_widget(paragraph, area);
}

fn render_divisions(frame: &mut Frame, summary: &DashboardSummary, area: Rect) {
    let lines: Vec<Line> = summary
        .by_division
        .iter()
        .map(|d| {
            Line::from(vec![
                Span::styled(format!(" {:<18}", d.division.as_str()), styles::muted_style()),
                Span::styled(d.count.to_string(), styles::list_item_style()),
            ])
        })
        .collect();

    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .title(" Students by division ")
            .title_style(styles::muted_style())
            .borders(Borders::ALL)
            .border_style(styles::border_style(false)),
    );
    frame.render_widget(paragraph, area);
}

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
    Frame,
};

use chrono::Local;
use conservatory_core::repo::Resource;
use conservatory_core::tasks::{OpenTask, TaskKind};

use crate::app::App;
use crate::ui::styles;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    match &app.tasks {
        Resource::Idle | Resource::Loading => {
            super::render_no_data(frame, app, area, "Tasks");
            return;
        }
        Resource::Failed(message) => {
            render_failed(frame, message, area);
            return;
        }
        Resource::Loaded(_) => {}
    }

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);

    render_task_list(frame, app, chunks[0]);
    render_task_detail(frame, app.task_rows().get(app.task_selection), chunks[1]);
}

fn render_task_list(frame: &mut Frame, app: &App, area: Rect) {
    let header = Row::new([Cell::from("Urgency"), Cell::from("Task"), Cell::from("Since")])
        .style(styles::title_style())
        .height(1);

    let tasks = app.task_rows();
    let rows: Vec<Row> = tasks
        .iter()
        .enumerate()
        .map(|(i, task)| {
            let style = if i == app.task_selection {
                styles::selected_style()
            } else {
                styles::list_item_style()
            };
            Row::new(vec![
                Cell::from(Span::styled(
                    task.urgency.label(),
                    styles::urgency_style(task.urgency),
                )),
                Cell::from(task.title.as_str()),
                Cell::from(
                    task.timestamp
                        .with_timezone(&Local)
                        .format("%b %d, %Y")
                        .to_string(),
                ),
            ])
            .style(style)
        })
        .collect();

    let widths = [
        Constraint::Length(9),
        Constraint::Fill(1),
        Constraint::Length(14),
    ];

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .title(format!(" Open tasks ({}) ", tasks.len()))
                .title_style(styles::muted_style())
                .borders(Borders::ALL)
                .border_style(styles::border_style(true)),
        )
        .row_highlight_style(styles::selected_style());

    let mut state = TableState::default();
    state.select(Some(app.task_selection));

    frame.render_stateful_widget(table, area, &mut state);
}

fn render_failed(frame: &mut Frame, message: &str, area: Rect) {
    let paragraph = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled(
            "  Could not load tasks. Press [u] to retry.",
            styles::error_style(),
        )),
        Line::from(Span::styled(format!("  {}", message), styles::muted_style())),
    ])
    .wrap(Wrap { trim: true })
    .block(
        Block::default()
            .title(" Tasks ")
            .title_style(styles::muted_style())
            .borders(Borders::ALL)
            .border_style(styles::border_style(false)),
    );
    frame.render_widget(paragraph, area);
}

/// Hint for what the administrator can do about a task.
fn next_step(kind: TaskKind) -> &'static str {
    match kind {
        TaskKind::OverduePayment => "Press [p] once paid, or [r] to send reminders.",
        TaskKind::ParentSignature | TaskKind::StudentSignature => {
            "Send the contract for signature."
        }
        TaskKind::DirectorSignature => "Countersign the contract.",
        TaskKind::PendingDocument => "Follow up on the document.",
    }
}

fn render_task_detail(frame: &mut Frame, task: Option<&OpenTask>, area: Rect) {
    let lines = match task {
        Some(task) => vec![
            Line::from(Span::styled(task.title.clone(), styles::title_style())),
            Line::from(""),
            Line::from(vec![
                Span::styled("Urgency: ", styles::muted_style()),
                Span::styled(task.urgency.label(), styles::urgency_style(task.urgency)),
            ]),
            Line::from(vec![
                Span::styled("Details: ", styles::muted_style()),
                Span::raw(task.detail.clone()),
            ]),
            Line::from(vec![
                Span::styled("Since:   ", styles::muted_style()),
                Span::raw(
                    task.timestamp
                        .with_timezone(&Local)
                        .format("%B %-d, %Y")
                        .to_string(),
                ),
            ]),
            Line::from(""),
            Line::from(Span::styled(next_step(task.kind), styles::highlight_style())),
        ],
        None => vec![Line::from(Span::styled(
            "Nothing to do",
            styles::success_style(),
        ))],
    };

    let paragraph = Paragraph::new(lines).wrap(Wrap { trim: true }).block(
        Block::default()
            .title(" Details ")
            .title_style(styles::muted_style())
            .borders(Borders::ALL)
            .border_style(styles::border_style(false)),
    );
    frame.render_widget(paragraph, area);
}

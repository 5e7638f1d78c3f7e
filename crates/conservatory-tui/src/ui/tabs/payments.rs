use ratatui::{
    layout::{Constraint, Rect},
    widgets::{Block, Borders, Cell, Row, Table, TableState},
    Frame,
};

use conservatory_core::format::{format_currency, format_short_date};

use crate::app::App;
use crate::ui::styles;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let Some(summary) = app.summary.as_ref() else {
        super::render_no_data(frame, app, area, "Payments");
        return;
    };

    let header = Row::new([
        Cell::from("Due"),
        Cell::from("Description"),
        Cell::from("Amount"),
        Cell::from("Status"),
    ])
    .style(styles::title_style())
    .height(1);

    let rows: Vec<Row> = summary
        .upcoming_payments
        .iter()
        .enumerate()
        .map(|(i, payment)| {
            let style = if i == app.payment_selection {
                styles::selected_style()
            } else {
                styles::list_item_style()
            };
            Row::new(vec![
                Cell::from(format_short_date(payment.due_date)),
                Cell::from(payment.label()),
                Cell::from(format_currency(payment.amount)),
                Cell::from(payment.status.to_string()),
            ])
            .style(style)
        })
        .collect();

    let widths = [
        Constraint::Length(14),
        Constraint::Fill(1),
        Constraint::Length(12),
        Constraint::Length(9),
    ];

    let title = format!(
        " Upcoming payments ({}) - overdue: {} totalling {} ",
        summary.upcoming_payments.len(),
        summary.overdue_count,
        format_currency(summary.overdue_total)
    );

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .title(title)
                .title_style(styles::muted_style())
                .borders(Borders::ALL)
                .border_style(styles::border_style(true)),
        )
        .row_highlight_style(styles::selected_style());

    let mut state = TableState::default();
    state.select(Some(app.payment_selection));

    frame.render_stateful_widget(table, area, &mut state);
}

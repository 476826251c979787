use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
    Frame,
};

use eventdesk_core::table::{RowAction, TableBody};
use eventdesk_core::utils::truncate_string;

use crate::app::App;
use crate::ui::styles;

/// Widest a title or description gets in the table
const MAX_CELL_CHARS: usize = 40;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(area);

    render_event_table(frame, app, chunks[0]);
    render_event_detail(frame, app, chunks[1]);
}

fn action_key(action: RowAction) -> &'static str {
    match action {
        RowAction::Register | RowAction::Withdraw => "r",
        RowAction::Edit => "e",
        RowAction::Delete => "d",
    }
}

/// Message in the first cell, blanks after it so the row spans the table
fn empty_row_cells(message: &'static str, colspan: usize) -> Vec<Cell<'static>> {
    let mut cells = vec![Cell::from(message)];
    cells.resize(colspan.max(1), Cell::from(""));
    cells
}

fn render_event_table(frame: &mut Frame, app: &App, area: Rect) {
    let table_state = app.page.table();
    let placeholder = table_state.is_placeholder();

    let header = Row::new(vec![
        Cell::from("Title"),
        Cell::from("Description"),
        Cell::from("Date"),
        Cell::from("Actions"),
    ])
    .style(styles::title_style())
    .height(1);

    let rows: Vec<Row> = match app.page.rows() {
        TableBody::Loading { columns } => {
            vec![Row::new(vec![Cell::from("░░░░░░░░"); columns]).style(styles::muted_style())]
        }
        TableBody::Empty { colspan, message } => {
            vec![Row::new(empty_row_cells(message, colspan)).style(styles::muted_style())]
        }
        TableBody::Rows(rows) => rows
            .iter()
            .map(|row| {
                let event = &row.event;
                let description_style = if event.description_display() == "N/A" {
                    styles::muted_style()
                } else {
                    styles::list_item_style()
                };
                let actions = row
                    .actions
                    .iter()
                    .map(|a| format!("[{}] {}", action_key(*a), a.label()))
                    .collect::<Vec<_>>()
                    .join("  ");

                let style = if placeholder {
                    styles::placeholder_style()
                } else {
                    styles::list_item_style()
                };

                Row::new(vec![
                    Cell::from(truncate_string(&event.title, MAX_CELL_CHARS)),
                    Cell::from(Span::styled(
                        truncate_string(event.description_display(), MAX_CELL_CHARS),
                        description_style,
                    )),
                    Cell::from(event.formatted_date()),
                    Cell::from(actions),
                ])
                .style(style)
            })
            .collect(),
    };

    let widths = [
        Constraint::Percentage(25),
        Constraint::Percentage(30),
        Constraint::Length(14),
        Constraint::Fill(1),
    ];

    let title = if app.in_flight > 0 {
        " Events Management (loading) ".to_string()
    } else {
        " Events Management ".to_string()
    };

    let pagination = Line::from(vec![
        Span::styled("[←] Previous", styles::button_style(table_state.has_previous())),
        Span::styled(format!("  Page {}  ", table_state.page()), styles::highlight_style()),
        Span::styled("Next [→] ", styles::button_style(table_state.has_next())),
    ])
    .right_aligned();

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .title(title)
                .title_style(styles::muted_style())
                .title_bottom(pagination)
                .borders(Borders::ALL)
                .border_style(styles::border_style(true)),
        )
        .row_highlight_style(styles::selected_style());

    let mut state = TableState::default();
    if matches!(app.page.rows(), TableBody::Rows(_)) {
        state.select(Some(table_state.selected_index()));
    }

    frame.render_stateful_widget(table, area, &mut state);
}

fn render_event_detail(frame: &mut Frame, app: &App, area: Rect) {
    let content = match app.page.table().selected_event() {
        Some(event) => {
            let mut lines = vec![
                Line::from(Span::styled(event.title.as_str(), styles::title_style())),
                Line::from(""),
                Line::from(vec![
                    Span::styled("Date:      ", styles::muted_style()),
                    Span::raw(event.formatted_datetime_standard()),
                ]),
                Line::from(vec![
                    Span::styled("Location:  ", styles::muted_style()),
                    Span::raw(event.location_display()),
                ]),
            ];

            if event.is_organized_by(app.page.user_id()) {
                lines.push(Line::from(vec![
                    Span::styled("Organizer: ", styles::muted_style()),
                    Span::styled("You", styles::highlight_style()),
                ]));
            }

            lines.push(Line::from(""));
            if app.page.is_registered(event.id) {
                lines.push(Line::from(Span::styled(
                    "✓ You are registered",
                    styles::success_style(),
                )));
            } else {
                lines.push(Line::from(Span::styled(
                    "Not registered",
                    styles::muted_style(),
                )));
            }

            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled("Description", styles::muted_style())));
            lines.push(Line::from(event.description_display()));
            lines
        }
        None => vec![Line::from(Span::styled(
            "No event selected",
            styles::muted_style(),
        ))],
    };

    let paragraph = Paragraph::new(content)
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .title(" Details ")
                .title_style(styles::muted_style())
                .borders(Borders::ALL)
                .border_style(styles::border_style(false)),
        );

    frame.render_widget(paragraph, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_row_spans_columns() {
        let cells = empty_row_cells("No events found.", 4);
        assert_eq!(cells.len(), 4);
        assert_eq!(cells[0], Cell::from("No events found."));
        assert!(cells[1..].iter().all(|c| *c == Cell::from("")));

        assert_eq!(empty_row_cells("No events found.", 0).len(), 1);
    }
}

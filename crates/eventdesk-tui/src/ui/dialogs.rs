//! Dialogs drawn over the events table.

use ratatui::{
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use eventdesk_core::forms::{EventField, EventForm, FieldError, RegistrationField, RegistrationForm};
use eventdesk_core::page::Modal;
use eventdesk_core::utils::truncate_string;

use crate::app::App;

use super::render::centered_rect_fixed;
use super::styles;

const DIALOG_WIDTH: u16 = 60;

/// Visible width of a text input
const FIELD_WIDTH: usize = 40;

pub fn render(frame: &mut Frame, app: &App, modal: Modal) {
    match modal {
        Modal::Add => render_event_form(frame, app.page.add_form()),
        Modal::Edit => {
            if let Some(form) = app.page.edit_form() {
                render_event_form(frame, form);
            }
        }
        Modal::Register => {
            if let Some(form) = app.page.registration_form() {
                let title = app.page.selected_event().map(|e| e.title.as_str());
                render_registration(frame, form, title);
            }
        }
        Modal::ConfirmDelete => {
            let title = app
                .page
                .selected_event()
                .map(|e| e.title.as_str())
                .unwrap_or_default();
            render_confirm_delete(frame, title);
        }
    }
}

/// Show the end of the value so the cursor stays in view
fn field_tail(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    chars[chars.len().saturating_sub(FIELD_WIDTH)..].iter().collect()
}

fn input_lines(
    label: &str,
    required: bool,
    value: &str,
    focused: bool,
    error: Option<&FieldError>,
) -> Vec<Line<'static>> {
    let marker = if required { " *" } else { "" };
    let style = if focused {
        styles::selected_style()
    } else {
        styles::list_item_style()
    };
    let cursor = if focused { "▌" } else { " " };

    let mut lines = vec![
        Line::from(vec![
            Span::styled(format!("  {}", label), styles::muted_style()),
            Span::styled(marker.to_string(), styles::error_style()),
        ]),
        Line::from(vec![
            Span::styled("  [", styles::muted_style()),
            Span::styled(
                format!("{:<width$}{}", field_tail(value), cursor, width = FIELD_WIDTH),
                style,
            ),
            Span::styled("]", styles::muted_style()),
        ]),
    ];
    if let Some(error) = error {
        lines.push(Line::from(Span::styled(
            format!("  {}", error),
            styles::error_style(),
        )));
    }
    lines
}

fn dialog_block(title: &str) -> Block<'static> {
    Block::default()
        .title(format!(" {} ", title))
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
}

fn render_event_form(frame: &mut Frame, form: &EventForm) {
    let mut lines = vec![Line::from("")];

    for field in EventField::ALL {
        let value = form.value(field);
        let label = if field == EventField::Date {
            format!("{} (YYYY-MM-DDTHH:MM)", field.label())
        } else {
            field.label().to_string()
        };
        lines.extend(input_lines(
            &label,
            form.is_required(field),
            value,
            form.focus == field,
            form.error(field),
        ));
    }

    lines.push(Line::from(""));
    let save_label = if form.submitting { "Saving..." } else { "Save" };
    lines.push(Line::from(vec![
        Span::raw("  "),
        Span::styled(format!("[Enter] {}", save_label), styles::button_style(form.can_submit())),
        Span::styled("   [Esc] Cancel", styles::muted_style()),
        Span::styled("   [Tab] Next field", styles::muted_style()),
    ]));

    let height = lines.len() as u16 + 2;
    let area = centered_rect_fixed(DIALOG_WIDTH, height, frame.area());
    frame.render_widget(Clear, area);
    frame.render_widget(
        Paragraph::new(lines).block(dialog_block(form.title_text())),
        area,
    );
}

fn render_registration(frame: &mut Frame, form: &RegistrationForm, event_title: Option<&str>) {
    let mut lines = Vec::new();
    if let Some(title) = event_title {
        lines.push(Line::from(Span::styled(
            format!("  {}", truncate_string(title, FIELD_WIDTH)),
            styles::highlight_style(),
        )));
    }
    lines.push(Line::from(""));

    for field in [RegistrationField::Name, RegistrationField::Email] {
        lines.extend(input_lines(
            field.label(),
            true,
            form.value(field),
            form.focus == field,
            form.error(field),
        ));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::raw("  "),
        Span::styled("[Enter] Register", styles::help_key_style()),
        Span::styled("   [Esc] Cancel", styles::muted_style()),
    ]));

    let height = lines.len() as u16 + 2;
    let area = centered_rect_fixed(DIALOG_WIDTH, height, frame.area());
    frame.render_widget(Clear, area);
    frame.render_widget(
        Paragraph::new(lines).block(dialog_block("Register for Event")),
        area,
    );
}

fn render_confirm_delete(frame: &mut Frame, title: &str) {
    let area = centered_rect_fixed(DIALOG_WIDTH, 7, frame.area());
    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(""),
        Line::from(vec![
            Span::styled("  Delete ", styles::highlight_style()),
            Span::styled(truncate_string(title, FIELD_WIDTH), styles::title_style()),
            Span::styled("?", styles::highlight_style()),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Press ", styles::muted_style()),
            Span::styled("[Y]", styles::help_key_style()),
            Span::styled(" to delete, ", styles::muted_style()),
            Span::styled("[N]", styles::help_key_style()),
            Span::styled(" to cancel", styles::muted_style()),
        ]),
    ];

    frame.render_widget(
        Paragraph::new(lines).block(dialog_block("Delete Event")),
        area,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_tail_keeps_short_values() {
        assert_eq!(field_tail("Launch party"), "Launch party");
    }

    #[test]
    fn test_field_tail_shows_end_of_long_values() {
        let value = "x".repeat(10) + &"y".repeat(FIELD_WIDTH);
        assert_eq!(field_tail(&value), "y".repeat(FIELD_WIDTH));
    }

    #[test]
    fn test_input_lines_include_error() {
        let err = FieldError::Required("Title");
        let lines = input_lines("Title", true, "", true, Some(&err));
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2].spans[0].content, "  Title is required.");
    }
}

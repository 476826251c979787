use ratatui::style::{Color, Modifier, Style};

use eventdesk_core::notify::ToastLevel;

// Palette
pub const BRAND: Color = Color::Rgb(0, 150, 136);
pub const OK: Color = Color::Rgb(72, 187, 120);
pub const WARN: Color = Color::Rgb(236, 201, 75);
pub const DANGER: Color = Color::Rgb(229, 62, 62);
pub const DIM_TEXT: Color = Color::Rgb(120, 128, 140);
pub const ROW_SELECTED: Color = Color::Rgb(35, 52, 60);
pub const BAR: Color = Color::Rgb(26, 32, 44);

pub fn title_style() -> Style {
    Style::default().fg(BRAND).add_modifier(Modifier::BOLD)
}

pub fn selected_style() -> Style {
    Style::default().bg(ROW_SELECTED).add_modifier(Modifier::BOLD)
}

pub fn list_item_style() -> Style {
    Style::default().fg(Color::White)
}

/// Rows kept on screen while another page loads
pub fn placeholder_style() -> Style {
    Style::default().fg(DIM_TEXT).add_modifier(Modifier::DIM)
}

pub fn muted_style() -> Style {
    Style::default().fg(DIM_TEXT)
}

pub fn highlight_style() -> Style {
    Style::default().fg(WARN)
}

pub fn success_style() -> Style {
    Style::default().fg(OK)
}

pub fn error_style() -> Style {
    Style::default().fg(DANGER)
}

pub fn toast_style(level: ToastLevel) -> Style {
    match level {
        ToastLevel::Success => success_style().add_modifier(Modifier::BOLD),
        ToastLevel::Error => error_style().add_modifier(Modifier::BOLD),
    }
}

pub fn border_style(focused: bool) -> Style {
    Style::default().fg(if focused { BRAND } else { DIM_TEXT })
}

pub fn status_bar_style() -> Style {
    Style::default().bg(BAR).fg(Color::White)
}

pub fn help_key_style() -> Style {
    Style::default().fg(WARN).add_modifier(Modifier::BOLD)
}

pub fn help_desc_style() -> Style {
    Style::default().fg(Color::White)
}

/// Pagination and dialog buttons; disabled ones are greyed out
pub fn button_style(enabled: bool) -> Style {
    if enabled {
        help_key_style()
    } else {
        muted_style().add_modifier(Modifier::DIM)
    }
}

use ratatui::style::{Color, Modifier, Style};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ComposeTheme {
    pub(crate) base: Style,
    pub(crate) border: Style,
    pub(crate) label: Style,
    pub(crate) value: Style,
    pub(crate) more: Style,
    pub(crate) cursor: Style,
    pub(crate) tagged: Style,
    pub(crate) status: Style,
    pub(crate) footer: Style,
    pub(crate) error: Style,
    pub(crate) overlay_select: Style,
}

impl ComposeTheme {
    pub(crate) fn from_name(name: &str) -> Self {
        match name {
            "mono" => Self::mono(),
            _ => Self::default_theme(),
        }
    }

    pub(crate) fn default_theme() -> Self {
        Self {
            base: Style::default(),
            border: Style::default().fg(Color::DarkGray),
            label: Style::default().fg(Color::Gray),
            value: Style::default(),
            more: Style::default().fg(Color::DarkGray),
            cursor: Style::default()
                .fg(Color::Yellow)
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
            tagged: Style::default().fg(Color::Cyan),
            status: Style::default().fg(Color::Black).bg(Color::Cyan),
            footer: Style::default(),
            error: Style::default().fg(Color::LightRed),
            overlay_select: Style::default().bg(Color::DarkGray),
        }
    }

    pub(crate) fn mono() -> Self {
        Self {
            base: Style::default(),
            border: Style::default(),
            label: Style::default().add_modifier(Modifier::BOLD),
            value: Style::default(),
            more: Style::default().add_modifier(Modifier::DIM),
            cursor: Style::default().add_modifier(Modifier::REVERSED),
            tagged: Style::default().add_modifier(Modifier::UNDERLINED),
            status: Style::default().add_modifier(Modifier::REVERSED),
            footer: Style::default(),
            error: Style::default().add_modifier(Modifier::BOLD),
            overlay_select: Style::default().add_modifier(Modifier::REVERSED),
        }
    }
}

impl Default for ComposeTheme {
    fn default() -> Self {
        Self::default_theme()
    }
}

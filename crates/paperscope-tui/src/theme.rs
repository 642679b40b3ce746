use ratatui::style::{Color, Modifier, Style};

use paperscope_core::CacheState;

use crate::model::library::UploadPhase;

/// Color theme for the TUI.
pub struct Theme {
    pub ready: Color,
    pub failed: Color,
    pub warning: Color,
    pub marked: Color,

    pub header_fg: Color,
    pub header_bg: Color,
    pub border: Color,
    pub text: Color,
    pub dim: Color,
    pub highlight_bg: Color,
    pub active: Color,
    pub spinner: Color,
    pub footer_fg: Color,
    pub footer_bg: Color,
}

impl Theme {
    /// Blue-on-dark reading theme.
    pub fn lab() -> Self {
        Self {
            ready: Color::Green,
            failed: Color::Red,
            warning: Color::Yellow,
            marked: Color::Magenta,

            header_fg: Color::Black,
            header_bg: Color::LightBlue,
            border: Color::DarkGray,
            text: Color::White,
            dim: Color::DarkGray,
            highlight_bg: Color::Rgb(25, 35, 60),
            active: Color::Cyan,
            spinner: Color::Cyan,
            footer_fg: Color::DarkGray,
            footer_bg: Color::Reset,
        }
    }

    pub fn cache_state_color(&self, state: &CacheState) -> Color {
        match state {
            CacheState::Absent => self.dim,
            CacheState::Loading => self.spinner,
            CacheState::Ready(_) => self.ready,
            CacheState::Error(_) => self.failed,
        }
    }

    pub fn upload_phase_style(&self, phase: &UploadPhase) -> Style {
        match phase {
            UploadPhase::Uploading => Style::default().fg(self.spinner).add_modifier(Modifier::BOLD),
            UploadPhase::Failed(_) => Style::default().fg(self.failed),
        }
    }

    pub fn health_color(&self, healthy: bool) -> Color {
        if healthy { self.ready } else { self.failed }
    }

    pub fn header_style(&self) -> Style {
        Style::default().fg(self.header_fg).bg(self.header_bg).add_modifier(Modifier::BOLD)
    }

    pub fn highlight_style(&self) -> Style {
        Style::default().bg(self.highlight_bg).add_modifier(Modifier::BOLD)
    }

    pub fn border_style(&self) -> Style {
        Style::default().fg(self.border)
    }

    pub fn footer_style(&self) -> Style {
        Style::default().fg(self.footer_fg).bg(self.footer_bg)
    }
}

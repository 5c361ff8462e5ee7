use ratatui::style::{Color, Modifier, Style};

use super::progress_line::StartupStatus;

// ── Colour constants ──────────────────────────────────────────────────
pub const COLOR_RUNNING: Color = Color::Green;
pub const COLOR_WORKING: Color = Color::Yellow;
pub const COLOR_WAITING: Color = Color::DarkGray;

// ── Icon constants ────────────────────────────────────────────────────
pub const ICON_RUNNING: &str = "✓";
pub const ICON_WORKING: &str = "◉";
pub const ICON_WAITING: &str = "─";

// ── Helpers ───────────────────────────────────────────────────────────

pub fn status_color(status: StartupStatus) -> Color {
    match status {
        StartupStatus::Running => COLOR_RUNNING,
        StartupStatus::Working => COLOR_WORKING,
        StartupStatus::Waiting => COLOR_WAITING,
    }
}

pub fn status_icon(status: StartupStatus) -> &'static str {
    match status {
        StartupStatus::Running => ICON_RUNNING,
        StartupStatus::Working => ICON_WORKING,
        StartupStatus::Waiting => ICON_WAITING,
    }
}

pub fn name_style() -> Style {
    Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
}

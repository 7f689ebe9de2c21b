//! Debug console
//!
//! Colourised printing that only happens when debugging is switched on.
//! The console is passed to whoever prints; there is no global flag.

use chrono::{DateTime, Utc};
use colored::{Color, ColoredString, Colorize};
use std::fmt::Display;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrintStyle {
    pub color: Option<Color>,
    pub bg_color: Option<Color>,
    pub bold: bool,
}

impl PrintStyle {
    pub fn plain() -> Self {
        Self::default()
    }

    pub fn color(color: Color) -> Self {
        Self {
            color: Some(color),
            ..Self::default()
        }
    }

    pub fn on(mut self, bg_color: Color) -> Self {
        self.bg_color = Some(bg_color);
        self
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    /// Foreground colour to print with; a background alone implies white text
    pub fn effective_color(&self) -> Option<Color> {
        match (self.color, self.bg_color) {
            (None, Some(_)) => Some(Color::White),
            (color, _) => color,
        }
    }

    pub fn apply(&self, text: &str) -> ColoredString {
        let mut styled = ColoredString::from(text);
        if let Some(color) = self.effective_color() {
            styled = styled.color(color);
        }
        if let Some(bg) = self.bg_color {
            styled = styled.on_color(bg);
        }
        if self.bold {
            styled = styled.bold();
        }
        styled
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebugConsole {
    enabled: bool,
}

impl DebugConsole {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Styled payload, or `None` while debugging is off
    pub fn render(&self, payload: &dyn Display, style: PrintStyle) -> Option<String> {
        if !self.enabled {
            return None;
        }
        Some(style.apply(&payload.to_string()).to_string())
    }

    pub fn print(&self, payload: impl Display, style: PrintStyle) {
        if let Some(line) = self.render(&payload, style) {
            println!("{}", line);
        }
    }

    /// Pretty-printed JSON payload
    pub fn print_json(&self, payload: &serde_json::Value, style: PrintStyle) {
        if !self.enabled {
            return;
        }
        let text = serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string());
        self.print(text, style);
    }
}

/// UTC time `seconds` after the Unix epoch
pub fn datetime_from_seconds(seconds: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(seconds, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_disabled_console_renders_nothing() {
        let console = DebugConsole::new(false);
        assert_eq!(console.render(&"hello", PrintStyle::color(Color::Cyan)), None);
    }

    #[test]
    fn test_enabled_console_keeps_payload() {
        let console = DebugConsole::new(true);
        let line = console.render(&42, PrintStyle::plain()).unwrap();
        assert!(line.contains("42"));
    }

    #[test]
    fn test_background_implies_white_text() {
        assert_eq!(PrintStyle::plain().on(Color::Red).effective_color(), Some(Color::White));
        assert_eq!(
            PrintStyle::color(Color::Cyan).on(Color::Red).effective_color(),
            Some(Color::Cyan)
        );
        assert_eq!(PrintStyle::plain().bold().effective_color(), None);
    }

    #[test]
    fn test_datetime_from_seconds() {
        assert_eq!(
            datetime_from_seconds(1337183200),
            Some(Utc.with_ymd_and_hms(2012, 5, 16, 15, 46, 40).unwrap())
        );
        assert_eq!(datetime_from_seconds(i64::MAX), None);
    }
}

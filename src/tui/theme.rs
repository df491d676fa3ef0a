//! Terminal colors

use crossterm::style::Color;

/// Colors used by the CLI output
pub struct Theme {
    /// Header line with provider and model
    pub title: Color,
    /// Plain model answers
    pub answer: Color,
    pub system: Color,
    pub error: Color,
    /// Secondary info such as usage lines
    pub dim: Color,
    pub success: Color,
    /// Token counts and costs
    pub stats: Color,
    /// File paths in change reports
    pub path: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            title: Color::Magenta,
            answer: Color::White,
            system: Color::DarkYellow,
            error: Color::Red,
            dim: Color::DarkGrey,
            success: Color::Green,
            stats: Color::Blue,
            path: Color::Cyan,
        }
    }
}

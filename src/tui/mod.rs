//! Terminal output for the qcode CLI

pub mod renderer;
pub mod spinner;
pub mod theme;

pub use renderer::TerminalRenderer;
pub use spinner::WaitSpinner;
pub use theme::Theme;

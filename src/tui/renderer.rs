//! Styled CLI output with markdown answers

use crossterm::style::{Color, Stylize};
use termimad::MadSkin;

use super::theme::Theme;
use crate::apply::ApplyReport;
use crate::catalog::{self, Pricing, ProviderId, RateLimits};
use crate::config::{Config, PromptMode};

pub struct TerminalRenderer {
    theme: Theme,
    skin: MadSkin,
}

impl TerminalRenderer {
    pub fn new() -> Self {
        let theme = Theme::default();
        let skin = Self::build_skin(&theme);
        Self { theme, skin }
    }

    fn build_skin(theme: &Theme) -> MadSkin {
        let mut skin = MadSkin::default();
        skin.set_headers_fg(to_termimad_color(theme.title));
        skin.bold.set_fg(to_termimad_color(Color::White));
        skin.italic.set_fg(to_termimad_color(Color::DarkYellow));
        skin.inline_code.set_fg(to_termimad_color(Color::Green));
        skin.code_block.set_fg(to_termimad_color(Color::Green));
        skin
    }

    /// One-line header naming where the prompt goes
    pub fn render_header(&self, provider: &str, model: &str, mode: PromptMode) {
        let mode = match mode {
            PromptMode::Chat => "chat",
            PromptMode::Engine => "engine",
        };
        println!(
            "{} {} {}",
            "qcode".with(self.theme.title),
            format!("{} ({})", provider, model).with(self.theme.stats),
            format!("[{}]", mode).with(self.theme.dim),
        );
    }

    /// Print a model answer, through the markdown skin when it has markup
    pub fn render_answer(&self, content: &str) {
        println!();
        if has_markdown_elements(content) {
            self.skin.print_text(content);
        } else {
            println!("{}", content.with(self.theme.answer));
        }
        println!();
    }

    /// Print the text summary produced by engine mode
    pub fn render_engine_summary(&self, summary: &str) {
        println!();
        for line in summary.lines() {
            if line.starts_with("[Failed to apply change") {
                self.render_error(line);
            } else if let Some(item) = line.strip_prefix("- ") {
                if item.ends_with("(not applied)") {
                    println!("  {} {}", "\u{2717}".with(self.theme.error), item.with(self.theme.dim));
                } else {
                    self.render_success(item);
                }
            } else {
                self.render_system(line);
            }
        }
        println!();
    }

    /// Print per-change results of a batch
    pub fn render_changes(&self, report: &ApplyReport) {
        if report.results.is_empty() {
            self.render_info("No changes to apply.");
            return;
        }
        for result in &report.results {
            match &result.outcome {
                Ok(outcome) => println!(
                    "  {} {} {}",
                    "\u{2713}".with(self.theme.success),
                    outcome.to_string().with(self.theme.path),
                    format!("({})", result.reason).with(self.theme.dim),
                ),
                Err(e) => println!(
                    "  {} {} {}",
                    "\u{2717}".with(self.theme.error),
                    format!("#{} {}", result.index, result.reason).with(self.theme.dim),
                    e.to_string().with(self.theme.error),
                ),
            }
        }
        let applied = report.applied().count();
        println!(
            "\n  {} of {} change(s) applied",
            applied.to_string().with(self.theme.stats),
            report.results.len().to_string().with(self.theme.stats),
        );
    }

    /// Token and cost line for a single answer
    pub fn render_usage_line(&self, input: u64, output: u64, cost: f64, estimated: bool) {
        let note = if estimated { " (estimated)" } else { "" };
        eprintln!(
            "  {} {} in + {} out{}  ${}",
            "\u{2022}".with(self.theme.dim),
            input.to_string().with(self.theme.stats),
            output.to_string().with(self.theme.stats),
            note.with(self.theme.dim),
            format!("{:.4}", cost).with(self.theme.stats),
        );
    }

    /// Table of every provider with its settings and catalog data
    pub fn render_providers(&self, config: &Config) {
        for id in ProviderId::ALL {
            let settings = config.provider(id);
            let model = settings.model_or_default(id);
            let active = config.active_provider == id.as_str();
            let marker = if active { "*" } else { " " };
            let status = provider_status(config, id);

            println!(
                "{} {} {}",
                marker.with(self.theme.success),
                format!("{:<10}", id.as_str()).with(self.theme.title),
                model.clone().with(self.theme.stats),
            );
            println!("    {} {}", "endpoint:".with(self.theme.dim), settings.endpoint(id));
            println!(
                "    {} {}",
                "limits:  ".with(self.theme.dim),
                format_limits(catalog::rate_limits(id, &model))
            );
            println!(
                "    {} {}",
                "pricing: ".with(self.theme.dim),
                format_pricing(catalog::pricing(id, &model))
            );
            println!("    {} {}", "status:  ".with(self.theme.dim), status);
        }
    }

    pub fn render_system(&self, msg: &str) {
        println!(
            "  {} {}",
            "\u{25b6}".with(self.theme.system),
            msg.with(self.theme.system)
        );
    }

    pub fn render_error(&self, msg: &str) {
        eprintln!(
            "  {} {}",
            "\u{2717}".with(self.theme.error),
            msg.with(self.theme.error)
        );
    }

    pub fn render_success(&self, msg: &str) {
        println!(
            "  {} {}",
            "\u{2713}".with(self.theme.success),
            msg.with(self.theme.success)
        );
    }

    pub fn render_info(&self, msg: &str) {
        println!("  {}", msg.with(self.theme.dim));
    }
}

impl Default for TerminalRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn provider_status(config: &Config, id: ProviderId) -> String {
    let settings = config.provider(id);
    if !settings.enabled {
        "disabled".to_string()
    } else if id.requires_api_key() && settings.key().is_none() {
        format!("no key (set {})", id.api_key_env())
    } else {
        "ready".to_string()
    }
}

fn format_limits(limits: Option<RateLimits>) -> String {
    match limits {
        Some(l) => format!(
            "{} req/min, {} input tok/min, {} output tok/min",
            l.requests_per_minute, l.input_tokens_per_minute, l.output_tokens_per_minute
        ),
        None => "unlimited".to_string(),
    }
}

fn format_pricing(pricing: Option<Pricing>) -> String {
    match pricing {
        Some(p) => format!(
            "${} / ${} per million tokens (in / out)",
            p.input_cost_per_million, p.output_cost_per_million
        ),
        None => "free".to_string(),
    }
}

/// Whether content has markup worth running through the skin
fn has_markdown_elements(content: &str) -> bool {
    content.contains("```")
        || content.contains("# ")
        || content.contains("**")
        || content.contains("| ")
        || content.contains("- [")
}

/// termimad pins its own crossterm, so colors are mapped across
fn to_termimad_color(color: Color) -> termimad::crossterm::style::Color {
    use termimad::crossterm::style::Color as Mad;
    match color {
        Color::Black => Mad::Black,
        Color::DarkGrey => Mad::DarkGrey,
        Color::Red => Mad::Red,
        Color::DarkRed => Mad::DarkRed,
        Color::Green => Mad::Green,
        Color::DarkGreen => Mad::DarkGreen,
        Color::Yellow => Mad::Yellow,
        Color::DarkYellow => Mad::DarkYellow,
        Color::Blue => Mad::Blue,
        Color::DarkBlue => Mad::DarkBlue,
        Color::Magenta => Mad::Magenta,
        Color::DarkMagenta => Mad::DarkMagenta,
        Color::Cyan => Mad::Cyan,
        Color::DarkCyan => Mad::DarkCyan,
        Color::White => Mad::White,
        Color::Grey => Mad::Grey,
        _ => Mad::Reset,
    }
}

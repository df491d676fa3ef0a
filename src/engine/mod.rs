//! Prompt processing: the single entry point used by the editor host
//!
//! A prompt is wrapped in a project-specific template, dispatched to the
//! active provider and, in engine mode, the answer is parsed into edits and
//! applied to the workspace.

mod prompt;

pub use prompt::{build_prompt, ProjectType};

use crate::api::{AiRequest, ApiError, Dispatch};
use crate::apply::{ApplyReport, Workspace};
use crate::changes::{parse_changes, ParseError};
use crate::config::{Config, ConfigError, PromptMode};
use crate::metrics::MetricsTracker;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Could not read the suggested changes: {0}")]
    Parse(#[from] ParseError),
}

/// What the editor knows about the file being edited
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EditorContext {
    /// Active file, relative to the workspace root
    pub file_path: Option<String>,
    /// Active file's text
    pub content: Option<String>,
    /// Selected text, if any
    pub selection: Option<String>,
    /// Detected project type
    pub project_type: ProjectType,
}

/// Turns prompts into answers and applied edits
pub struct Engine<D: Dispatch> {
    dispatcher: D,
    workspace: Workspace,
    metrics: MetricsTracker,
}

impl<D: Dispatch> Engine<D> {
    pub fn new(dispatcher: D, workspace: Workspace) -> Self {
        Self {
            dispatcher,
            workspace,
            metrics: MetricsTracker::new(),
        }
    }

    pub fn with_metrics(mut self, metrics: MetricsTracker) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &MetricsTracker {
        &self.metrics
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Answer a prompt, applying suggested edits in engine mode.
    ///
    /// Dispatch and parse errors fail the whole call. Failures applying an
    /// individual change are reported inline in the returned text.
    pub async fn process_prompt(
        &self,
        prompt: &str,
        editor: &EditorContext,
        settings: &Config,
    ) -> Result<String, EngineError> {
        settings.validate()?;
        if prompt.trim().is_empty() {
            return Err(ApiError::EmptyPrompt.into());
        }

        let full_prompt = build_prompt(prompt, editor, settings.mode);
        let mut request = AiRequest::from_config(full_prompt, settings);
        // System text reflects what the user asked, not the template
        request.system_text = crate::api::system_text_for(prompt, settings.context_sensitivity);

        let response = self.dispatcher.dispatch(&request, settings).await?;
        self.metrics.record(&request.provider, &response);

        if settings.mode == PromptMode::Chat {
            return Ok(response.text);
        }

        let changes = parse_changes(&response.text)?;
        info!("model proposed {} change(s)", changes.len());

        let workspace = self
            .workspace
            .clone()
            .with_overwrite(settings.workspace.allow_overwrite);
        let report = workspace.apply_batch(&changes, editor.file_path.as_deref());

        Ok(render_report(&report))
    }
}

/// Summary of an applied batch with inline failure notes
pub fn render_report(report: &ApplyReport) -> String {
    if report.results.is_empty() {
        return "No changes were suggested.".to_string();
    }

    let mut lines = vec![format!(
        "Applied {} of {} change(s):",
        report.applied().count(),
        report.results.len()
    )];
    for result in &report.results {
        match &result.outcome {
            Ok(outcome) => lines.push(format!("- {} ({})", result.reason, outcome)),
            Err(_) => lines.push(format!("- {} (not applied)", result.reason)),
        }
    }
    lines.extend(report.failure_notes());

    lines.join("\n")
}

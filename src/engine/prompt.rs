//! Prompt templates per project type

use super::EditorContext;
use crate::config::PromptMode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of project open in the editor, as detected by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProjectType {
    Flutter,
    Rust,
    Node,
    Python,
    #[default]
    Generic,
}

impl ProjectType {
    fn intro(&self) -> &'static str {
        match self {
            ProjectType::Flutter => {
                "You are an expert Flutter and Dart developer. Follow Dart style and keep widgets small."
            }
            ProjectType::Rust => {
                "You are an expert Rust developer. Prefer idiomatic, safe Rust and propagate errors with Result."
            }
            ProjectType::Node => {
                "You are an expert JavaScript and TypeScript developer working in a Node.js project."
            }
            ProjectType::Python => {
                "You are an expert Python developer. Follow PEP 8 and keep functions focused."
            }
            ProjectType::Generic => "You are an expert software developer.",
        }
    }
}

impl fmt::Display for ProjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProjectType::Flutter => "flutter",
            ProjectType::Rust => "rust",
            ProjectType::Node => "node",
            ProjectType::Python => "python",
            ProjectType::Generic => "generic",
        };
        f.write_str(name)
    }
}

impl FromStr for ProjectType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "flutter" | "dart" => Ok(ProjectType::Flutter),
            "rust" | "cargo" => Ok(ProjectType::Rust),
            "node" | "javascript" | "typescript" => Ok(ProjectType::Node),
            "python" => Ok(ProjectType::Python),
            "generic" | "" => Ok(ProjectType::Generic),
            other => Err(format!("unknown project type '{}'", other)),
        }
    }
}

const EDIT_CONTRACT: &str = r#"Respond ONLY with a JSON array of edit operations, no prose. Each element has:
- "file": file name
- "relativePath": path from the project root (null to edit the open file)
- "action": one of "add", "replace", "remove", "create", "remove_file"
- "line", "position": 1-based line and 0-based column where the edit starts
- "finish_line", "finish_position": where a replace/remove ends (exclusive)
- "reason": why the change is needed
- "newCode": code to insert (null for remove and remove_file)

"add" needs line and position only. "replace" and "remove" need all four coordinates.
"create" and "remove_file" need relativePath and no coordinates.

Example:
[{"file": "main.dart", "relativePath": "./lib/main.dart", "line": 5, "position": 0,
  "finish_line": null, "finish_position": null, "action": "add",
  "reason": "Add entry point", "newCode": "void main() {}"}]"#;

/// Full prompt text sent to the model
pub fn build_prompt(user_prompt: &str, editor: &EditorContext, mode: PromptMode) -> String {
    let mut sections = vec![editor.project_type.intro().to_string()];

    if let Some(content) = &editor.content {
        let name = editor.file_path.as_deref().unwrap_or("current file");
        sections.push(format!(
            "Open file: {}\n```\n{}\n```",
            name,
            with_line_numbers(content)
        ));
    }
    if let Some(selection) = editor.selection.as_deref().filter(|s| !s.trim().is_empty()) {
        sections.push(format!("Selected code:\n```\n{}\n```", selection));
    }

    sections.push(format!("Request: {}", user_prompt.trim()));

    if mode == PromptMode::Engine {
        sections.push(EDIT_CONTRACT.to_string());
    }

    sections.join("\n\n")
}

/// Prefix lines with 1-based numbers so the model can address them
fn with_line_numbers(content: &str) -> String {
    content
        .split('\n')
        .enumerate()
        .map(|(i, line)| format!("{:>4} | {}", i + 1, line))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_type_parse() {
        assert_eq!("Dart".parse::<ProjectType>(), Ok(ProjectType::Flutter));
        assert_eq!("".parse::<ProjectType>(), Ok(ProjectType::Generic));
        assert!("cobol".parse::<ProjectType>().is_err());
    }

    #[test]
    fn test_engine_prompt_includes_contract_and_file() {
        let editor = EditorContext {
            file_path: Some("src/lib.rs".to_string()),
            content: Some("fn a() {}\nfn b() {}".to_string()),
            selection: None,
            project_type: ProjectType::Rust,
        };
        let prompt = build_prompt("rename b to c", &editor, PromptMode::Engine);

        assert!(prompt.starts_with("You are an expert Rust developer"));
        assert!(prompt.contains("Open file: src/lib.rs"));
        assert!(prompt.contains("   2 | fn b() {}"));
        assert!(prompt.contains("Request: rename b to c"));
        assert!(prompt.contains("\"remove_file\""));
    }

    #[test]
    fn test_chat_prompt_has_no_contract() {
        let prompt = build_prompt("what is a trait?", &EditorContext::default(), PromptMode::Chat);
        assert!(!prompt.contains("JSON array"));
        assert!(!prompt.contains("Open file"));
    }
}

//! Structured edit operations parsed from model output
//!
//! Models are asked to answer with a JSON array of edit records (see
//! [`WireChange`]). [`parse_changes`] turns that untrusted text into validated
//! [`CodeChange`] values whose [`Edit`] variant carries exactly the fields its
//! action needs.

mod field;
mod parser;

pub use parser::{parse_changes, FieldViolation, ParseError, Requirement};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The five edit actions a model may request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Add,
    Replace,
    Remove,
    Create,
    RemoveFile,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Add => "add",
            Action::Replace => "replace",
            Action::Remove => "remove",
            Action::Create => "create",
            Action::RemoveFile => "remove_file",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(Action::Add),
            "replace" => Ok(Action::Replace),
            "remove" => Ok(Action::Remove),
            "create" => Ok(Action::Create),
            "remove_file" => Ok(Action::RemoveFile),
            _ => Err(()),
        }
    }
}

/// A point in a file: 1-based line, 0-based character column.
///
/// Values come straight from the model and may be out of range; the applier
/// checks them against the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: i64,
    pub column: i64,
}

impl Position {
    pub fn new(line: i64, column: i64) -> Self {
        Self { line, column }
    }
}

/// Text between `start` (inclusive) and `end` (exclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

/// What a change does, with the fields its action requires
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    Add { at: Position, new_code: String },
    Replace { span: Span, new_code: String },
    Remove { span: Span },
    Create { new_code: String },
    RemoveFile,
}

impl Edit {
    pub fn action(&self) -> Action {
        match self {
            Edit::Add { .. } => Action::Add,
            Edit::Replace { .. } => Action::Replace,
            Edit::Remove { .. } => Action::Remove,
            Edit::Create { .. } => Action::Create,
            Edit::RemoveFile => Action::RemoveFile,
        }
    }
}

/// One validated edit operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeChange {
    /// Informational label, usually mirrors `relative_path`
    pub file: String,
    /// Target path; `None` means the file being edited. Always set for
    /// `create` and `remove_file`.
    pub relative_path: Option<String>,
    pub reason: String,
    pub edit: Edit,
}

impl CodeChange {
    pub fn action(&self) -> Action {
        self.edit.action()
    }

    /// The record in the JSON shape models emit
    pub fn to_wire(&self) -> WireChange {
        let (start, end, new_code) = match &self.edit {
            Edit::Add { at, new_code } => (Some(*at), None, Some(new_code.clone())),
            Edit::Replace { span, new_code } => {
                (Some(span.start), Some(span.end), Some(new_code.clone()))
            }
            Edit::Remove { span } => (Some(span.start), Some(span.end), None),
            Edit::Create { new_code } => (None, None, Some(new_code.clone())),
            Edit::RemoveFile => (None, None, None),
        };

        WireChange {
            file: self.file.clone(),
            relative_path: self.relative_path.clone(),
            line: start.map(|p| p.line),
            position: start.map(|p| p.column),
            finish_line: end.map(|p| p.line),
            finish_position: end.map(|p| p.column),
            action: self.action(),
            reason: self.reason.clone(),
            new_code,
        }
    }
}

/// Wire format of one edit record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireChange {
    pub file: String,
    #[serde(rename = "relativePath")]
    pub relative_path: Option<String>,
    pub line: Option<i64>,
    pub position: Option<i64>,
    pub finish_line: Option<i64>,
    pub finish_position: Option<i64>,
    pub action: Action,
    pub reason: String,
    #[serde(rename = "newCode")]
    pub new_code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_names() {
        for action in [
            Action::Add,
            Action::Replace,
            Action::Remove,
            Action::Create,
            Action::RemoveFile,
        ] {
            assert_eq!(action.as_str().parse::<Action>(), Ok(action));
        }
        assert!("Add".parse::<Action>().is_err());
    }

    #[test]
    fn test_wire_shape() {
        let change = CodeChange {
            file: "main.dart".to_string(),
            relative_path: Some("./lib/main.dart".to_string()),
            reason: "Add entry point".to_string(),
            edit: Edit::Add {
                at: Position::new(5, 0),
                new_code: "void main() {}".to_string(),
            },
        };

        let json = serde_json::to_value(change.to_wire()).unwrap();
        assert_eq!(json["relativePath"], "./lib/main.dart");
        assert_eq!(json["line"], 5);
        assert_eq!(json["position"], 0);
        assert!(json["finish_line"].is_null());
        assert_eq!(json["action"], "add");
        assert_eq!(json["newCode"], "void main() {}");
    }
}

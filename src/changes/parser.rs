//! Extracts and validates the JSON edit array from a model answer

use super::field::FieldDecoder;
use super::{Action, CodeChange, Edit, Position, Span};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("No JSON array found in the response")]
    NoJsonArrayFound,

    #[error("Response contains invalid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("Response JSON is not an array")]
    NotAnArray,

    #[error("Change {index} is not a JSON object")]
    NotAnObject { index: usize },

    #[error("Change {index} is missing required field '{field}'")]
    MissingField { index: usize, field: &'static str },

    #[error("Change {index} has an invalid value for '{field}'")]
    InvalidFieldType { index: usize, field: &'static str },

    #[error("Change {index} has unknown action '{value}'")]
    InvalidAction { index: usize, value: String },

    #[error("Change {index} ({action}): {}", join_violations(.violations))]
    FieldRule {
        index: usize,
        action: Action,
        violations: Vec<FieldViolation>,
    },
}

/// A field that breaks its action's presence rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: &'static str,
    pub requirement: Requirement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Required,
    MustBeNull,
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.requirement {
            Requirement::Required => write!(f, "{} is required", self.field),
            Requirement::MustBeNull => write!(f, "{} must be null", self.field),
        }
    }
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a model answer into validated changes.
///
/// All-or-nothing: the first invalid record aborts the whole parse, so a
/// caller never applies a partially validated batch.
pub fn parse_changes(response: &str) -> Result<Vec<CodeChange>, ParseError> {
    let clean = strip_markdown_fences(response);
    let array = extract_json_array(&clean).ok_or(ParseError::NoJsonArrayFound)?;

    let value: Value = serde_json::from_str(array).map_err(ParseError::InvalidJson)?;
    let Value::Array(items) = value else {
        return Err(ParseError::NotAnArray);
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| parse_change(index, item))
        .collect()
}

/// Drop fence lines such as "```", "```json" or "```typescript"
fn strip_markdown_fences(text: &str) -> String {
    text.trim()
        .lines()
        .filter(|line| !is_fence(line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_fence(line: &str) -> bool {
    line.trim()
        .strip_prefix("```")
        .is_some_and(|tag| tag.chars().all(|c| c.is_ascii_alphanumeric()))
}

/// Slice from the first `[` to the last `]`, inclusive
fn extract_json_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if start < end {
        Some(&text[start..=end])
    } else {
        None
    }
}

/// Raw numeric fields of one record
struct Coordinates {
    line: Option<i64>,
    position: Option<i64>,
    finish_line: Option<i64>,
    finish_position: Option<i64>,
}

impl Coordinates {
    fn fields(&self) -> [(&'static str, bool); 4] {
        [
            ("line", self.line.is_some()),
            ("position", self.position.is_some()),
            ("finish_line", self.finish_line.is_some()),
            ("finish_position", self.finish_position.is_some()),
        ]
    }
}

fn parse_change(index: usize, item: &Value) -> Result<CodeChange, ParseError> {
    let Value::Object(record) = item else {
        return Err(ParseError::NotAnObject { index });
    };
    let fields = FieldDecoder::new(record, index);

    let action_name = fields.required_string("action")?;
    let file = fields.required_string("file")?;
    let reason = fields.required_string("reason")?;
    let relative_path = fields
        .optional_string("relativePath")?
        .filter(|p| !p.trim().is_empty());
    let new_code = fields.optional_string("newCode")?;
    let coords = Coordinates {
        line: fields.optional_number("line")?,
        position: fields.optional_number("position")?,
        finish_line: fields.optional_number("finish_line")?,
        finish_position: fields.optional_number("finish_position")?,
    };

    let action: Action = action_name
        .trim()
        .parse()
        .map_err(|_| ParseError::InvalidAction {
            index,
            value: action_name.clone(),
        })?;

    check_rules(index, action, &coords, relative_path.is_some(), new_code.is_some())?;

    let start = || Position::new(coords.line.unwrap_or_default(), coords.position.unwrap_or_default());
    let span = || Span {
        start: start(),
        end: Position::new(
            coords.finish_line.unwrap_or_default(),
            coords.finish_position.unwrap_or_default(),
        ),
    };
    let code = || new_code.clone().unwrap_or_default();

    let edit = match action {
        Action::Add => Edit::Add {
            at: start(),
            new_code: code(),
        },
        Action::Replace => Edit::Replace {
            span: span(),
            new_code: code(),
        },
        Action::Remove => Edit::Remove { span: span() },
        Action::Create => Edit::Create { new_code: code() },
        Action::RemoveFile => Edit::RemoveFile,
    };

    Ok(CodeChange {
        file,
        relative_path,
        reason,
        edit,
    })
}

/// Enforce which fields each action requires or forbids
fn check_rules(
    index: usize,
    action: Action,
    coords: &Coordinates,
    has_path: bool,
    has_code: bool,
) -> Result<(), ParseError> {
    use Requirement::{MustBeNull, Required};

    // Presence rule for line, position, finish_line, finish_position
    let coordinate_rules = match action {
        Action::Add => [Required, Required, MustBeNull, MustBeNull],
        Action::Replace | Action::Remove => [Required; 4],
        Action::Create | Action::RemoveFile => [MustBeNull; 4],
    };
    let code_rule = match action {
        Action::Add | Action::Replace | Action::Create => Required,
        Action::Remove | Action::RemoveFile => MustBeNull,
    };
    let path_required = matches!(action, Action::Create | Action::RemoveFile);

    let mut violations = Vec::new();
    let mut check = |field: &'static str, present: bool, requirement: Requirement| {
        let ok = match requirement {
            Required => present,
            MustBeNull => !present,
        };
        if !ok {
            violations.push(FieldViolation { field, requirement });
        }
    };

    if path_required {
        check("relativePath", has_path, Required);
    }
    for ((field, present), requirement) in coords.fields().into_iter().zip(coordinate_rules) {
        check(field, present, requirement);
    }
    check("newCode", has_code, code_rule);

    if violations.is_empty() {
        Ok(())
    } else {
        Err(ParseError::FieldRule {
            index,
            action,
            violations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse_one(record: Value) -> Result<CodeChange, ParseError> {
        let text = Value::Array(vec![record]).to_string();
        parse_changes(&text).map(|mut v| v.remove(0))
    }

    fn base(action: &str) -> Value {
        json!({
            "file": "main.rs",
            "relativePath": "src/main.rs",
            "action": action,
            "reason": "because",
            "line": null,
            "position": null,
            "finish_line": null,
            "finish_position": null,
            "newCode": null
        })
    }

    fn minimal_valid() -> Vec<(Value, CodeChange)> {
        let change = |edit: Edit| CodeChange {
            file: "main.rs".to_string(),
            relative_path: Some("src/main.rs".to_string()),
            reason: "because".to_string(),
            edit,
        };
        let span = Span {
            start: Position::new(2, 1),
            end: Position::new(3, 4),
        };

        let mut add = base("add");
        add["line"] = json!(5);
        add["position"] = json!(0);
        add["newCode"] = json!("x");

        let mut replace = base("replace");
        replace["line"] = json!(2);
        replace["position"] = json!(1);
        replace["finish_line"] = json!(3);
        replace["finish_position"] = json!(4);
        replace["newCode"] = json!("y");

        let mut remove = replace.clone();
        remove["action"] = json!("remove");
        remove["newCode"] = Value::Null;

        let mut create = base("create");
        create["newCode"] = json!("fn main() {}");

        let remove_file = base("remove_file");

        vec![
            (
                add,
                change(Edit::Add {
                    at: Position::new(5, 0),
                    new_code: "x".to_string(),
                }),
            ),
            (
                replace,
                change(Edit::Replace {
                    span,
                    new_code: "y".to_string(),
                }),
            ),
            (remove, change(Edit::Remove { span })),
            (
                create,
                change(Edit::Create {
                    new_code: "fn main() {}".to_string(),
                }),
            ),
            (remove_file, change(Edit::RemoveFile)),
        ]
    }

    #[test]
    fn test_minimal_valid_changes_round_trip() {
        for (record, expected) in minimal_valid() {
            let parsed = parse_one(record.clone()).unwrap();
            assert_eq!(parsed, expected);
            assert_eq!(serde_json::to_value(parsed.to_wire()).unwrap(), record);
        }
    }

    #[test]
    fn test_single_field_violations_name_action_and_field() {
        let cases = [
            ("add", "finish_line", json!(5), Requirement::MustBeNull),
            ("add", "line", Value::Null, Requirement::Required),
            ("add", "newCode", Value::Null, Requirement::Required),
            ("replace", "finish_position", Value::Null, Requirement::Required),
            ("replace", "newCode", Value::Null, Requirement::Required),
            ("remove", "newCode", json!(""), Requirement::MustBeNull),
            ("remove", "position", Value::Null, Requirement::Required),
            ("create", "line", json!(1), Requirement::MustBeNull),
            ("create", "relativePath", Value::Null, Requirement::Required),
            ("remove_file", "newCode", json!("x"), Requirement::MustBeNull),
            ("remove_file", "relativePath", json!(""), Requirement::Required),
        ];

        for (action, field, value, requirement) in cases {
            let (mut record, _) = minimal_valid()
                .into_iter()
                .find(|(r, _)| r["action"] == action)
                .unwrap();
            record[field] = value;

            let err = parse_one(record).unwrap_err();
            match &err {
                ParseError::FieldRule {
                    index,
                    action: a,
                    violations,
                } => {
                    assert_eq!(*index, 0);
                    assert_eq!(a.as_str(), action);
                    assert_eq!(violations, &vec![FieldViolation { field, requirement }]);
                }
                other => panic!("{action}/{field}: unexpected {other:?}"),
            }
            let message = err.to_string();
            assert!(message.contains(action) && message.contains(field), "{message}");
        }
    }

    #[test]
    fn test_prose_and_fences_are_ignored() {
        let text = "Here is the answer:\n```json\n[{\"file\": \"a.rs\", \"relativePath\": \"a.rs\", \
                    \"action\": \"create\", \"reason\": \"new\", \"newCode\": \"x\"}]\n```\nHope this helps!";
        let changes = parse_changes(text).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].action(), Action::Create);
    }

    #[test]
    fn test_typescript_fence_and_numeric_strings() {
        let text = "```typescript\n[{\"file\": \"a.ts\", \"action\": \"add\", \"reason\": 1, \
                    \"line\": \"3\", \"position\": \"0\", \"newCode\": \"let a = 1;\"}]\n```";
        let changes = parse_changes(text).unwrap();
        assert_eq!(changes[0].reason, "1");
        assert_eq!(changes[0].relative_path, None);
        assert_eq!(
            changes[0].edit,
            Edit::Add {
                at: Position::new(3, 0),
                new_code: "let a = 1;".to_string()
            }
        );
    }

    #[test]
    fn test_structural_errors() {
        assert!(matches!(parse_changes("no json here"), Err(ParseError::NoJsonArrayFound)));
        assert!(matches!(parse_changes("] then ["), Err(ParseError::NoJsonArrayFound)));
        assert!(matches!(parse_changes("[1, 2"), Err(ParseError::NoJsonArrayFound)));
        assert!(matches!(parse_changes("[{,}]"), Err(ParseError::InvalidJson(_))));
        assert!(matches!(
            parse_changes("[{\"action\": \"add\"}, 3]"),
            Err(ParseError::MissingField { index: 0, field: "file" })
        ));
        assert!(matches!(parse_changes("[3]"), Err(ParseError::NotAnObject { index: 0 })));
        assert!(parse_changes("[]").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_action_and_field_type() {
        let mut record = base("rename");
        let err = parse_one(record.clone()).unwrap_err();
        assert!(matches!(err, ParseError::InvalidAction { index: 0, ref value } if value == "rename"));

        record["action"] = json!("add");
        record["line"] = json!("five");
        let err = parse_one(record).unwrap_err();
        assert!(matches!(err, ParseError::InvalidFieldType { index: 0, field: "line" }));
    }

    #[test]
    fn test_one_bad_record_aborts_batch() {
        let (good, _) = minimal_valid().remove(0);
        let mut bad = base("add");
        bad["finish_line"] = json!(9);
        let text = Value::Array(vec![good, bad]).to_string();

        let err = parse_changes(&text).unwrap_err();
        assert!(matches!(err, ParseError::FieldRule { index: 1, .. }));
    }

    #[test]
    fn test_out_of_range_coordinates_are_left_to_the_applier() {
        let (good, _) = minimal_valid().remove(0);
        let mut negative = base("add");
        negative["line"] = json!(-1);
        negative["position"] = json!("0");
        negative["newCode"] = json!("x");
        let text = Value::Array(vec![good, negative]).to_string();

        let changes = parse_changes(&text).unwrap();
        assert_eq!(changes.len(), 2);
        assert_eq!(
            changes[1].edit,
            Edit::Add {
                at: Position::new(-1, 0),
                new_code: "x".to_string(),
            }
        );
    }
}

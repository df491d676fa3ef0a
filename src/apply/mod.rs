//! Applying validated edits to file text
//!
//! [`apply_edit`] is the pure text transformation. [`Workspace`] wraps it
//! with path confinement and file I/O, applying a batch change by change.
//!
//! Positions follow the edit records: lines are 1-based indices into the
//! text split on `\n`, columns are 0-based character offsets within a line.
//! A span covers `start` up to but not including `end`.

mod workspace;

pub use workspace::{ApplyReport, ChangeOutcome, ChangeResult, Workspace};

use crate::changes::{Edit, Position, Span};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApplyError {
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Path escapes the workspace: {0}")]
    PathEscapesWorkspace(String),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("File already exists: {}", .0.display())]
    FileExists(PathBuf),

    #[error("Change has no target file and no file is open")]
    NoTargetFile,

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// File contents after an edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileState {
    /// Existing file with new text
    Text(String),
    /// File (re)written from scratch
    Created(String),
    /// File removed
    Deleted,
    /// Nothing to do; the file was already absent
    Skipped,
}

/// Apply one edit to a file's current text (`None` when the file is absent)
pub fn apply_edit(edit: &Edit, current: Option<&str>) -> Result<FileState, ApplyError> {
    match edit {
        Edit::Create { new_code } => Ok(FileState::Created(new_code.clone())),
        Edit::RemoveFile => Ok(match current {
            Some(_) => FileState::Deleted,
            None => FileState::Skipped,
        }),
        Edit::Add { at, new_code } => {
            let text = current.ok_or_else(|| ApplyError::FileNotFound(PathBuf::new()))?;
            insert_at(text, *at, new_code).map(FileState::Text)
        }
        Edit::Replace { span, new_code } => {
            let text = current.ok_or_else(|| ApplyError::FileNotFound(PathBuf::new()))?;
            replace_span(text, *span, new_code).map(FileState::Text)
        }
        Edit::Remove { span } => {
            let text = current.ok_or_else(|| ApplyError::FileNotFound(PathBuf::new()))?;
            replace_span(text, *span, "").map(FileState::Text)
        }
    }
}

fn insert_at(text: &str, at: Position, new_code: &str) -> Result<String, ApplyError> {
    let line = line_index(at.line)?;
    let column = column_index(at.column)?;

    let mut lines: Vec<String> = text.split('\n').map(str::to_string).collect();

    // Past the end: pad with empty lines and append as a new last line
    if line >= lines.len() {
        lines.resize(line, String::new());
        lines.push(new_code.to_string());
        return Ok(lines.join("\n"));
    }

    let target = &mut lines[line];
    let offset = byte_offset(target, column).ok_or_else(|| out_of_line(at, target))?;
    target.insert_str(offset, new_code);

    Ok(lines.join("\n"))
}

/// Replace the text in `span` with `new_code`.
///
/// The start line's prefix, `new_code` and the finish line's suffix are
/// joined and then split on `\n`, so the suffix lands on the last line of
/// `new_code`.
fn replace_span(text: &str, span: Span, new_code: &str) -> Result<String, ApplyError> {
    let mut lines: Vec<&str> = text.split('\n').collect();
    let Span { start, end } = span;

    let first_line = line_index(start.line)?;
    let last_line = line_index(end.line)?;
    let start_column = column_index(start.column)?;
    let end_column = column_index(end.column)?;

    if last_line >= lines.len() {
        return Err(ApplyError::InvalidRange(format!(
            "finish_line {} is past the end of the file ({} lines)",
            end.line,
            lines.len()
        )));
    }
    if first_line > last_line {
        return Err(ApplyError::InvalidRange(format!(
            "line {} is after finish_line {}",
            start.line, end.line
        )));
    }
    if first_line == last_line && start_column > end_column {
        return Err(ApplyError::InvalidRange(format!(
            "position {} is after finish_position {} on line {}",
            start.column, end.column, start.line
        )));
    }

    let first = lines[first_line];
    let last = lines[last_line];
    let prefix_end = byte_offset(first, start_column).ok_or_else(|| out_of_line(start, first))?;
    let suffix_start = byte_offset(last, end_column).ok_or_else(|| out_of_line(end, last))?;

    let merged = format!("{}{}{}", &first[..prefix_end], new_code, &last[suffix_start..]);
    lines.splice(first_line..=last_line, merged.split('\n'));

    Ok(lines.join("\n"))
}

/// Zero-based index of a 1-based line number
fn line_index(line: i64) -> Result<usize, ApplyError> {
    if line < 1 {
        return Err(ApplyError::InvalidRange(format!(
            "line numbers start at 1, got {}",
            line
        )));
    }
    usize::try_from(line - 1)
        .map_err(|_| ApplyError::InvalidRange(format!("line {} is out of range", line)))
}

fn column_index(column: i64) -> Result<usize, ApplyError> {
    usize::try_from(column)
        .map_err(|_| ApplyError::InvalidRange(format!("position {} is negative", column)))
}

fn out_of_line(at: Position, line: &str) -> ApplyError {
    ApplyError::InvalidRange(format!(
        "position {} is past the end of line {} ({} characters)",
        at.column,
        at.line,
        line.chars().count()
    ))
}

/// Byte offset of a character column, allowing the end-of-line column
fn byte_offset(line: &str, column: usize) -> Option<usize> {
    line.char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(line.len()))
        .nth(column)
}

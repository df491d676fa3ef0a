//! File-system side of edit application, confined to a workspace root

use super::{apply_edit, ApplyError, FileState};
use crate::changes::{CodeChange, Edit};
use std::fmt;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::{info, warn};

/// What happened to the target file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeOutcome {
    Modified(PathBuf),
    Created(PathBuf),
    Deleted(PathBuf),
    /// `remove_file` on a file that was already gone
    Skipped(PathBuf),
}

impl ChangeOutcome {
    pub fn path(&self) -> &Path {
        match self {
            ChangeOutcome::Modified(p)
            | ChangeOutcome::Created(p)
            | ChangeOutcome::Deleted(p)
            | ChangeOutcome::Skipped(p) => p,
        }
    }
}

impl fmt::Display for ChangeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeOutcome::Modified(p) => write!(f, "modified {}", p.display()),
            ChangeOutcome::Created(p) => write!(f, "created {}", p.display()),
            ChangeOutcome::Deleted(p) => write!(f, "deleted {}", p.display()),
            ChangeOutcome::Skipped(p) => write!(f, "skipped {} (already absent)", p.display()),
        }
    }
}

/// Result of one change in a batch
#[derive(Debug)]
pub struct ChangeResult {
    pub index: usize,
    pub reason: String,
    pub outcome: Result<ChangeOutcome, ApplyError>,
}

/// Per-change results of a batch; a failure never stops later changes
#[derive(Debug, Default)]
pub struct ApplyReport {
    pub results: Vec<ChangeResult>,
}

impl ApplyReport {
    pub fn applied(&self) -> impl Iterator<Item = &ChangeResult> {
        self.results.iter().filter(|r| r.outcome.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &ChangeResult> {
        self.results.iter().filter(|r| r.outcome.is_err())
    }

    /// One inline note per failed change
    pub fn failure_notes(&self) -> Vec<String> {
        self.results
            .iter()
            .filter_map(|r| r.outcome.as_ref().err())
            .map(|e| format!("[Failed to apply change: {}]", e))
            .collect()
    }
}

/// Directory that all edits are resolved against and confined to.
///
/// Edits are not locked against each other: callers must not run two
/// batches against the same file at once.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    allow_overwrite: bool,
}

impl Workspace {
    pub fn new(root: impl AsRef<Path>) -> Result<Self, ApplyError> {
        let root = root.as_ref();
        let root = root.canonicalize().map_err(|source| ApplyError::Io {
            path: root.to_path_buf(),
            source,
        })?;

        Ok(Self {
            root,
            allow_overwrite: true,
        })
    }

    /// Whether `create` may replace an existing file
    pub fn with_overwrite(mut self, allow: bool) -> Self {
        self.allow_overwrite = allow;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a path from an edit record, rejecting anything outside the root
    pub fn resolve(&self, candidate: &str) -> Result<PathBuf, ApplyError> {
        let escapes = || ApplyError::PathEscapesWorkspace(candidate.to_string());

        if candidate.trim().is_empty() {
            return Err(ApplyError::NoTargetFile);
        }

        let candidate_path = Path::new(candidate);
        let mut resolved = if candidate_path.is_absolute() {
            PathBuf::new()
        } else {
            self.root.clone()
        };
        for component in candidate_path.components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    if !resolved.pop() {
                        return Err(escapes());
                    }
                }
                Component::Normal(part) => resolved.push(part),
                Component::RootDir | Component::Prefix(_) => resolved.push(component),
            }
        }

        if !resolved.starts_with(&self.root) || resolved == self.root {
            return Err(escapes());
        }

        self.check_symlinks(&resolved, candidate)?;

        Ok(resolved)
    }

    /// Reject the path if any existing component below the root is a
    /// symlink whose target is missing or outside the root
    fn check_symlinks(&self, resolved: &Path, candidate: &str) -> Result<(), ApplyError> {
        let escapes = || ApplyError::PathEscapesWorkspace(candidate.to_string());
        let relative = resolved.strip_prefix(&self.root).map_err(|_| escapes())?;

        let mut current = self.root.clone();
        for part in relative.components() {
            current.push(part);
            match std::fs::symlink_metadata(&current) {
                Ok(meta) if meta.file_type().is_symlink() => {
                    let target = current.canonicalize().map_err(|_| escapes())?;
                    if !target.starts_with(&self.root) {
                        return Err(escapes());
                    }
                }
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => break,
                Err(source) => {
                    return Err(ApplyError::Io {
                        path: current,
                        source,
                    })
                }
            }
        }

        Ok(())
    }

    /// Apply a single change. `context_file` is used when the change names
    /// no path of its own.
    pub fn apply_change(
        &self,
        change: &CodeChange,
        context_file: Option<&str>,
    ) -> Result<ChangeOutcome, ApplyError> {
        let target = change
            .relative_path
            .as_deref()
            .or(context_file)
            .ok_or(ApplyError::NoTargetFile)?;
        let path = self.resolve(target)?;

        let current = read_if_exists(&path)?;
        if current.is_none() && !matches!(change.edit, Edit::Create { .. } | Edit::RemoveFile) {
            return Err(ApplyError::FileNotFound(path));
        }
        if current.is_some() && matches!(change.edit, Edit::Create { .. }) && !self.allow_overwrite {
            return Err(ApplyError::FileExists(path));
        }

        match apply_edit(&change.edit, current.as_deref())? {
            FileState::Text(text) => {
                write(&path, &text)?;
                Ok(ChangeOutcome::Modified(path))
            }
            FileState::Created(text) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).map_err(|source| ApplyError::Io {
                        path: parent.to_path_buf(),
                        source,
                    })?;
                }
                write(&path, &text)?;
                Ok(ChangeOutcome::Created(path))
            }
            FileState::Deleted => match std::fs::remove_file(&path) {
                Ok(()) => Ok(ChangeOutcome::Deleted(path)),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(ChangeOutcome::Skipped(path)),
                Err(source) => Err(ApplyError::Io { path, source }),
            },
            FileState::Skipped => Ok(ChangeOutcome::Skipped(path)),
        }
    }

    /// Apply changes in order, isolating failures per change
    pub fn apply_batch(&self, changes: &[CodeChange], context_file: Option<&str>) -> ApplyReport {
        let results = changes
            .iter()
            .enumerate()
            .map(|(index, change)| {
                let outcome = self.apply_change(change, context_file);
                match &outcome {
                    Ok(done) => info!("change {} ({}): {}", index, change.action(), done),
                    Err(e) => warn!("change {} ({}) failed: {}", index, change.action(), e),
                }
                ChangeResult {
                    index,
                    reason: change.reason.clone(),
                    outcome,
                }
            })
            .collect();

        ApplyReport { results }
    }
}

fn read_if_exists(path: &Path) -> Result<Option<String>, ApplyError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ApplyError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn write(path: &Path, text: &str) -> Result<(), ApplyError> {
    std::fs::write(path, text).map_err(|source| ApplyError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::{Position, Span};
    use std::fs;
    use tempfile::TempDir;

    fn change(path: Option<&str>, edit: Edit) -> CodeChange {
        CodeChange {
            file: path.unwrap_or_default().to_string(),
            relative_path: path.map(str::to_string),
            reason: "test".to_string(),
            edit,
        }
    }

    fn setup() -> (TempDir, Workspace) {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::new(dir.path()).unwrap();
        (dir, workspace)
    }

    #[test]
    fn test_resolve_stays_inside_root() {
        let (_dir, ws) = setup();

        let resolved = ws.resolve("./lib/main.dart").unwrap();
        assert_eq!(resolved, ws.root().join("lib").join("main.dart"));
        assert_eq!(ws.resolve("lib/../main.rs").unwrap(), ws.root().join("main.rs"));

        for bad in ["../outside.txt", "lib/../../x", "/etc/passwd", ".", "lib/.."] {
            assert!(
                matches!(ws.resolve(bad), Err(ApplyError::PathEscapesWorkspace(_))),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_absolute_path_inside_root_is_allowed() {
        let (_dir, ws) = setup();
        let inside = ws.root().join("a.txt");
        assert_eq!(ws.resolve(inside.to_str().unwrap()).unwrap(), inside);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_is_rejected() {
        let (_dir, ws) = setup();
        let outside = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), ws.root().join("link")).unwrap();

        assert!(matches!(
            ws.resolve("link/secret.txt"),
            Err(ApplyError::PathEscapesWorkspace(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_is_not_followed() {
        let (_dir, ws) = setup();
        let outside = TempDir::new().unwrap();
        let target = outside.path().join("created.txt");
        std::os::unix::fs::symlink(&target, ws.root().join("link.txt")).unwrap();

        let create = change(
            Some("link.txt"),
            Edit::Create {
                new_code: "data".to_string(),
            },
        );
        let result = ws.apply_change(&create, None);

        assert!(matches!(result, Err(ApplyError::PathEscapesWorkspace(_))));
        assert!(!target.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_within_root_is_allowed() {
        let (_dir, ws) = setup();
        fs::create_dir(ws.root().join("real")).unwrap();
        std::os::unix::fs::symlink(ws.root().join("real"), ws.root().join("alias")).unwrap();

        let create = change(
            Some("alias/new.txt"),
            Edit::Create {
                new_code: "ok".to_string(),
            },
        );
        ws.apply_change(&create, None).unwrap();

        assert_eq!(fs::read_to_string(ws.root().join("real/new.txt")).unwrap(), "ok");
    }

    #[test]
    fn test_replace_in_file() {
        let (_dir, ws) = setup();
        fs::write(ws.root().join("a.txt"), "abc\ndef\nghi").unwrap();

        let edit = Edit::Replace {
            span: Span {
                start: Position::new(2, 1),
                end: Position::new(2, 2),
            },
            new_code: "X".to_string(),
        };
        let outcome = ws.apply_change(&change(Some("a.txt"), edit), None).unwrap();

        assert!(matches!(outcome, ChangeOutcome::Modified(_)));
        assert_eq!(fs::read_to_string(ws.root().join("a.txt")).unwrap(), "abc\ndXf\nghi");
    }

    #[test]
    fn test_context_file_used_when_path_missing() {
        let (_dir, ws) = setup();
        fs::write(ws.root().join("open.rs"), "fn a() {}").unwrap();

        let edit = Edit::Add {
            at: Position::new(2, 0),
            new_code: "fn b() {}".to_string(),
        };
        ws.apply_change(&change(None, edit.clone()), Some("open.rs")).unwrap();
        assert_eq!(
            fs::read_to_string(ws.root().join("open.rs")).unwrap(),
            "fn a() {}\nfn b() {}"
        );

        assert!(matches!(
            ws.apply_change(&change(None, edit), None),
            Err(ApplyError::NoTargetFile)
        ));
    }

    #[test]
    fn test_create_makes_parent_dirs() {
        let (_dir, ws) = setup();
        let edit = Edit::Create {
            new_code: "void main() {}".to_string(),
        };
        let outcome = ws.apply_change(&change(Some("lib/src/main.dart"), edit), None).unwrap();

        assert!(matches!(outcome, ChangeOutcome::Created(_)));
        assert_eq!(
            fs::read_to_string(ws.root().join("lib/src/main.dart")).unwrap(),
            "void main() {}"
        );
    }

    #[test]
    fn test_create_respects_overwrite_policy() {
        let (_dir, ws) = setup();
        fs::write(ws.root().join("a.txt"), "old").unwrap();
        let create = change(
            Some("a.txt"),
            Edit::Create {
                new_code: "new".to_string(),
            },
        );

        let strict = ws.clone().with_overwrite(false);
        assert!(matches!(strict.apply_change(&create, None), Err(ApplyError::FileExists(_))));
        assert_eq!(fs::read_to_string(ws.root().join("a.txt")).unwrap(), "old");

        ws.apply_change(&create, None).unwrap();
        assert_eq!(fs::read_to_string(ws.root().join("a.txt")).unwrap(), "new");
    }

    #[test]
    fn test_remove_file_is_idempotent() {
        let (_dir, ws) = setup();
        fs::write(ws.root().join("gone.txt"), "bye").unwrap();
        let remove = change(Some("gone.txt"), Edit::RemoveFile);

        assert!(matches!(ws.apply_change(&remove, None), Ok(ChangeOutcome::Deleted(_))));
        assert!(!ws.root().join("gone.txt").exists());

        for _ in 0..2 {
            assert!(matches!(ws.apply_change(&remove, None), Ok(ChangeOutcome::Skipped(_))));
        }
    }

    #[test]
    fn test_batch_isolates_failures() {
        let (_dir, ws) = setup();
        fs::write(ws.root().join("a.txt"), "one").unwrap();

        let changes = vec![
            change(
                Some("../escape.txt"),
                Edit::Create {
                    new_code: "x".to_string(),
                },
            ),
            change(
                Some("a.txt"),
                Edit::Add {
                    at: Position::new(1, 3),
                    new_code: "!".to_string(),
                },
            ),
            change(Some("missing.txt"), Edit::Remove {
                span: Span {
                    start: Position::new(1, 0),
                    end: Position::new(1, 1),
                },
            }),
        ];

        let report = ws.apply_batch(&changes, None);
        assert_eq!(report.results.len(), 3);
        assert_eq!(report.applied().count(), 1);
        assert_eq!(report.failures().count(), 2);
        assert_eq!(fs::read_to_string(ws.root().join("a.txt")).unwrap(), "one!");

        let notes = report.failure_notes();
        assert!(notes[0].starts_with("[Failed to apply change: Path escapes the workspace"));
        assert!(notes[1].contains("File not found"));
    }

    #[test]
    fn test_negative_line_fails_only_its_own_change() {
        let (_dir, ws) = setup();
        fs::write(ws.root().join("a.txt"), "one").unwrap();

        let answer = r#"[
          {"file": "a.txt", "relativePath": "a.txt", "action": "add", "reason": "ok",
           "line": 1, "position": 3, "newCode": "!"},
          {"file": "a.txt", "relativePath": "a.txt", "action": "add", "reason": "off by one",
           "line": -1, "position": 0, "newCode": "?"}
        ]"#;
        let changes = crate::changes::parse_changes(answer).unwrap();
        let report = ws.apply_batch(&changes, None);

        assert_eq!(report.applied().count(), 1);
        assert!(matches!(
            report.results[1].outcome,
            Err(ApplyError::InvalidRange(_))
        ));
        assert_eq!(fs::read_to_string(ws.root().join("a.txt")).unwrap(), "one!");
    }
}

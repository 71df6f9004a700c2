//! Per-request scratch directories.
//!
//! Every execution gets its own directory under the configured scratch root. The name
//! combines the language, a v4 UUID and a random tempfile suffix, so concurrent requests
//! never share a directory and no locking is needed.

use crate::errors::EngineError;
use crate::language::{extract_public_class, Language};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{Builder, TempDir};
use uuid::Uuid;

pub const INPUT_FILE_NAME: &str = "input.txt";

#[derive(Debug, Clone)]
pub struct WorkspaceStager {
    scratch_root: PathBuf,
    retain: bool,
}

impl WorkspaceStager {
    pub fn new(scratch_root: impl Into<PathBuf>) -> Self {
        Self {
            scratch_root: scratch_root.into(),
            retain: false,
        }
    }

    /// Leave finished workspaces on disk for external reaping.
    pub fn with_retain(mut self, retain: bool) -> Self {
        self.retain = retain;
        self
    }

    pub fn scratch_root(&self) -> &Path {
        &self.scratch_root
    }

    /// Creates a fresh workspace holding the source and the stdin payload.
    ///
    /// The Java entry point is resolved before anything touches the filesystem, so a
    /// submission without a `public class` leaves the scratch root untouched.
    pub fn stage(
        &self,
        language: Language,
        source: &str,
        stdin: &str,
    ) -> Result<Workspace, EngineError> {
        let entry_point = match language {
            Language::Java => Some(extract_public_class(source)?),
            _ => None,
        };
        let source_file = match &entry_point {
            Some(class_name) => format!("{}.java", class_name),
            None => language.source_file_name(source)?,
        };

        fs::create_dir_all(&self.scratch_root).map_err(|e| {
            EngineError::Infrastructure(format!(
                "Failed to create scratch root {}: {}",
                self.scratch_root.display(),
                e
            ))
        })?;

        let request_id = Uuid::new_v4();
        let dir = Builder::new()
            .prefix(&format!("{}-{}-", language, request_id.simple()))
            .tempdir_in(&self.scratch_root)
            .map_err(|e| {
                EngineError::Infrastructure(format!("Failed to create workspace: {}", e))
            })?;

        write_file(&dir.path().join(&source_file), source)?;
        write_file(&dir.path().join(INPUT_FILE_NAME), stdin)?;

        log::debug!(
            "Staged {} workspace {} ({})",
            language,
            dir.path().display(),
            source_file
        );

        Ok(Workspace {
            request_id,
            language,
            dir: Some(dir),
            source_file,
            entry_point,
            retain: self.retain,
        })
    }
}

fn write_file(path: &Path, content: &str) -> Result<(), EngineError> {
    let mut file = fs::File::create(path).map_err(|e| {
        EngineError::Infrastructure(format!("Failed to create {}: {}", path.display(), e))
    })?;
    file.write_all(content.as_bytes())?;
    file.flush()?;
    Ok(())
}

/// A staged scratch directory, exclusively owned by one execution.
///
/// Dropping the workspace removes the directory unless retention was requested.
#[derive(Debug)]
pub struct Workspace {
    request_id: Uuid,
    language: Language,
    dir: Option<TempDir>,
    source_file: String,
    entry_point: Option<String>,
    retain: bool,
}

impl Workspace {
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn path(&self) -> &Path {
        // only taken in Drop
        self.dir
            .as_ref()
            .map(|d| d.path())
            .unwrap_or_else(|| Path::new(""))
    }

    pub fn source_file(&self) -> &str {
        &self.source_file
    }

    pub fn input_path(&self) -> PathBuf {
        self.path().join(INPUT_FILE_NAME)
    }

    /// Java class name; `None` for languages without a name-bound entry point.
    pub fn entry_point(&self) -> Option<&str> {
        self.entry_point.as_deref()
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        if self.retain {
            let path = dir.keep();
            log::debug!("Retaining workspace {}", path.display());
            return;
        }
        let path = dir.path().to_path_buf();
        if let Err(e) = dir.close() {
            log::warn!("Failed to clean up workspace {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::tempdir;

    #[test]
    fn stages_python_source_and_empty_input() {
        let root = tempdir().unwrap();
        let stager = WorkspaceStager::new(root.path());

        let ws = stager.stage(Language::Python, "print('hi')", "").unwrap();

        assert_eq!(ws.source_file(), "main.py");
        assert_eq!(fs::read_to_string(ws.path().join("main.py")).unwrap(), "print('hi')");
        assert_eq!(fs::read_to_string(ws.input_path()).unwrap(), "");
        assert!(ws.path().starts_with(root.path()));
        assert!(ws.entry_point().is_none());
    }

    #[test]
    fn stages_java_under_class_name() {
        let root = tempdir().unwrap();
        let stager = WorkspaceStager::new(root.path());
        let src = "public class Greeter { public static void main(String[] a) {} }";

        let ws = stager.stage(Language::Java, src, "42\n").unwrap();

        assert_eq!(ws.source_file(), "Greeter.java");
        assert_eq!(ws.entry_point(), Some("Greeter"));
        assert!(ws.path().join("Greeter.java").exists());
        assert_eq!(fs::read_to_string(ws.input_path()).unwrap(), "42\n");
    }

    #[test]
    fn malformed_java_writes_nothing() {
        let root = tempdir().unwrap();
        let scratch = root.path().join("scratch");
        let stager = WorkspaceStager::new(&scratch);

        let err = stager
            .stage(Language::Java, "class Hidden {}", "")
            .unwrap_err();

        assert!(matches!(err, EngineError::MalformedSource(_)));
        assert!(!scratch.exists(), "scratch root must not be created");
    }

    #[test]
    fn workspaces_are_unique() {
        let root = tempdir().unwrap();
        let stager = WorkspaceStager::new(root.path());

        let workspaces: Vec<_> = (0..32)
            .map(|_| stager.stage(Language::C, "int main(){}", "").unwrap())
            .collect();
        let paths: HashSet<_> = workspaces.iter().map(|w| w.path().to_path_buf()).collect();
        let ids: HashSet<_> = workspaces.iter().map(|w| w.request_id()).collect();

        assert_eq!(paths.len(), 32);
        assert_eq!(ids.len(), 32);
    }

    #[test]
    fn drop_removes_directory() {
        let root = tempdir().unwrap();
        let stager = WorkspaceStager::new(root.path());
        let ws = stager.stage(Language::Cpp, "int main(){}", "").unwrap();
        let path = ws.path().to_path_buf();
        assert!(path.exists());

        drop(ws);

        assert!(!path.exists());
    }

    #[test]
    fn retained_workspace_survives_drop() {
        let root = tempdir().unwrap();
        let stager = WorkspaceStager::new(root.path()).with_retain(true);
        let ws = stager.stage(Language::Python, "pass", "").unwrap();
        let path = ws.path().to_path_buf();

        drop(ws);

        assert!(path.join("main.py").exists());
    }
}

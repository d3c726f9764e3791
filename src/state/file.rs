//! YAML state file on local disk.

use super::{StateDocument, StateError, StateStore};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// State kept in a single YAML file
///
/// Saves go to a temporary file in the same directory which is then renamed
/// over the target, so a crash mid-write leaves the previous state intact.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_error(&self, source: std::io::Error) -> StateError {
        StateError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

impl StateStore for FileStateStore {
    fn load(&self) -> Result<StateDocument, StateError> {
        let content = std::fs::read_to_string(&self.path).map_err(|source| StateError::Read {
            path: self.path.clone(),
            source,
        })?;
        let document: StateDocument =
            serde_yaml::from_str(&content).map_err(|source| StateError::Parse {
                path: self.path.clone(),
                source,
            })?;
        document.validate()?;
        debug!(
            "Loaded {} declared resource(s) from {}",
            document.resources.len(),
            self.path.display()
        );
        Ok(document)
    }

    fn save(&self, document: &StateDocument) -> Result<(), StateError> {
        let content = serde_yaml::to_string(document)?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut file = tempfile::NamedTempFile::new_in(&dir).map_err(|e| self.write_error(e))?;
        file.write_all(content.as_bytes())
            .map_err(|e| self.write_error(e))?;
        file.as_file().sync_all().map_err(|e| self.write_error(e))?;
        file.persist(&self.path)
            .map_err(|e| self.write_error(e.error))?;
        debug!("Saved state to {}", self.path.display());
        Ok(())
    }
}

//! Artifact store and per-instance extraction.
//!
//! Artifacts live in a flat directory as `<name>.model.toml`. Every
//! instantiation works from its own extracted copy inside a temporary
//! directory; the directory is removed when the [`ExtractedArtifact`] is
//! dropped.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use super::description::ModelDescription;
use super::error::{ModelError, ModelResult};

/// File suffix identifying artifacts inside the store directory.
pub const ARTIFACT_SUFFIX: &str = ".model.toml";

/// File name of the description inside an extraction directory.
const EXTRACTED_DESCRIPTION: &str = "modelDescription.toml";

/// Read-only view of a directory holding simulation artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    work_dir: Option<PathBuf>,
}

impl ArtifactStore {
    /// Creates a store rooted at `root`. Extractions go to the system temp dir.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            work_dir: None,
        }
    }

    /// Places extraction directories under `work_dir` instead of the system temp dir.
    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(work_dir.into());
        self
    }

    /// Directory the store reads from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns `true` when `name` is a plain artifact name (no path components).
    pub fn is_valid_name(name: &str) -> bool {
        !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\'])
            && !name.contains('\0')
    }

    /// Path of the artifact file for `name`, or `None` for names that would
    /// escape the store directory.
    pub fn path_of(&self, name: &str) -> Option<PathBuf> {
        Self::is_valid_name(name).then(|| self.root.join(format!("{name}{ARTIFACT_SUFFIX}")))
    }

    /// Returns `true` if an artifact called `name` exists.
    pub fn contains(&self, name: &str) -> bool {
        self.path_of(name).is_some_and(|p| p.is_file())
    }

    /// Lists artifact names in the store, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Read`] if the directory cannot be listed.
    pub fn list(&self) -> ModelResult<Vec<String>> {
        let entries = fs::read_dir(&self.root).map_err(|source| ModelError::Read {
            path: self.root.clone(),
            source,
        })?;

        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|e| e.path().is_file())
            .filter_map(|e| {
                e.file_name()
                    .to_str()
                    .and_then(|f| f.strip_suffix(ARTIFACT_SUFFIX))
                    .map(str::to_string)
            })
            .collect();
        names.sort();
        Ok(names)
    }

    /// Reads and parses the description of `name` without extracting it.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Read`] if the artifact is missing or unreadable,
    /// or a parse error if its description is invalid.
    pub fn describe(&self, name: &str) -> ModelResult<ModelDescription> {
        let path = self.require(name)?;
        let content = fs::read_to_string(&path).map_err(|source| ModelError::Read {
            path: path.clone(),
            source,
        })?;
        ModelDescription::from_toml_str(&content)
    }

    /// Extracts `name` into a fresh temporary directory and parses the
    /// extracted description.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Read`] if the artifact is missing,
    /// [`ModelError::Extract`] if the temporary copy cannot be written, or a
    /// parse error for an invalid description. No directory is left behind
    /// on failure.
    pub fn extract(&self, name: &str) -> ModelResult<ExtractedArtifact> {
        let path = self.require(name)?;

        let mut builder = tempfile::Builder::new();
        builder.prefix("cosim-");
        let dir = match &self.work_dir {
            Some(work) => builder.tempdir_in(work),
            None => builder.tempdir(),
        }
        .map_err(|source| ModelError::Extract {
            path: self.work_dir.clone().unwrap_or_else(std::env::temp_dir),
            source,
        })?;

        let target = dir.path().join(EXTRACTED_DESCRIPTION);
        fs::copy(&path, &target).map_err(|source| ModelError::Extract {
            path: target.clone(),
            source,
        })?;
        let content = fs::read_to_string(&target).map_err(|source| ModelError::Read {
            path: target.clone(),
            source,
        })?;
        let description = ModelDescription::from_toml_str(&content)?;

        Ok(ExtractedArtifact {
            name: name.to_string(),
            description,
            dir,
        })
    }

    fn require(&self, name: &str) -> ModelResult<PathBuf> {
        let path = self
            .path_of(name)
            .ok_or_else(|| ModelError::Invalid(format!("invalid artifact name \"{name}\"")))?;
        if !path.is_file() {
            return Err(ModelError::Read {
                path,
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "artifact not found"),
            });
        }
        Ok(path)
    }
}

/// An artifact unpacked into a temporary directory it exclusively owns.
#[derive(Debug)]
pub struct ExtractedArtifact {
    name: String,
    description: ModelDescription,
    dir: TempDir,
}

impl ExtractedArtifact {
    /// Artifact name in the store.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parsed model description.
    pub fn description(&self) -> &ModelDescription {
        &self.description
    }

    /// Extraction directory; removed on drop.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

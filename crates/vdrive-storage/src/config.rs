use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{DiskError, Result};

/// Which backend to open a drive with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendSelect {
    /// Pick from [`autodetect`](crate::autodetect); plain files use the file backend.
    #[default]
    Auto,
    File,
    Ram,
}

/// Description of one emulated drive, as found in a machine configuration.
///
/// ```json
/// { "path": "disks/hda.img", "backend": "file", "modifyBackingFile": false }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub backend: BackendSelect,
    /// Write guest modifications through to the image file. When unset, file-backed images
    /// are opened read-only and writes only live for the session.
    #[serde(default)]
    pub modify_backing_file: bool,
}

impl DriveConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            backend: BackendSelect::default(),
            modify_backing_file: false,
        }
    }

    pub fn with_backend(mut self, backend: BackendSelect) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_modify_backing_file(mut self, modify: bool) -> Self {
        self.modify_backing_file = modify;
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(DiskError::InvalidConfig("drive path must not be empty"));
        }
        Ok(())
    }
}

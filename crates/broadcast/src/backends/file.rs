//! FileBackend - appends messages to a file

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use contracts::{Backend, ContractError};
use tracing::{debug, instrument, warn};

/// Configuration for FileBackend
#[derive(Debug, Clone)]
pub struct FileBackendConfig {
    /// Output file
    pub path: PathBuf,
    /// Keep existing contents instead of truncating on open
    pub append: bool,
}

impl FileBackendConfig {
    /// Create config from params map (`path`, optional `append`)
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, ContractError> {
        let path = params
            .get("path")
            .map(PathBuf::from)
            .ok_or_else(|| {
                ContractError::config_validation("params.path", "file backend requires a path")
            })?;

        let append = match params.get("append").map(String::as_str) {
            None => false,
            Some("true") => true,
            Some("false") => false,
            Some(other) => {
                return Err(ContractError::config_validation(
                    "params.append",
                    format!("expected true or false, got '{other}'"),
                ))
            }
        };

        Ok(Self { path, append })
    }
}

/// Backend that writes every message to one file
///
/// The file is opened at construction. If that fails, every later output
/// retries the open until it succeeds.
#[derive(Debug)]
pub struct FileBackend {
    name: String,
    config: FileBackendConfig,
    file: Option<File>,
}

impl FileBackend {
    pub fn new(name: impl Into<String>, config: FileBackendConfig) -> Self {
        let name = name.into();
        let file = match open(&config) {
            Ok(file) => Some(file),
            Err(e) => {
                warn!(
                    sink = %name,
                    path = %config.path.display(),
                    error = %e,
                    "Open failed, will retry on write"
                );
                None
            }
        };
        Self { name, config, file }
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        Ok(Self::new(name, FileBackendConfig::from_params(params)?))
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    fn file(&mut self) -> Result<&mut File, ContractError> {
        if self.file.is_none() {
            let file = open(&self.config).map_err(|e| {
                let message = format!("open {}: {e}", self.config.path.display());
                ContractError::backend_write(&self.name, message)
            })?;
            debug!(sink = %self.name, path = %self.config.path.display(), "File reopened");
            self.file = Some(file);
        }
        self.file
            .as_mut()
            .ok_or_else(|| ContractError::backend_write(&self.name, "file not open"))
    }
}

fn open(config: &FileBackendConfig) -> std::io::Result<File> {
    if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new()
        .create(true)
        .write(true)
        .append(config.append)
        .truncate(!config.append)
        .open(&config.path)
}

impl Backend for FileBackend {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_backend_output",
        level = "trace",
        skip(self, bytes),
        fields(sink = %self.name, len = bytes.len())
    )]
    fn output(&mut self, bytes: &[u8], _char_count: usize) -> Result<(), ContractError> {
        let result = self.file()?.write_all(bytes);
        result.map_err(|e| ContractError::backend_write(&self.name, e.to_string()))
    }

    fn flush(&mut self) -> Result<(), ContractError> {
        match self.file.as_mut() {
            Some(file) => file
                .flush()
                .map_err(|e| ContractError::backend_write(&self.name, e.to_string())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_file_backend_truncates_then_appends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.log");
        fs::write(&path, "stale").unwrap();

        let mut backend = FileBackend::new(
            "file",
            FileBackendConfig {
                path: path.clone(),
                append: false,
            },
        );
        backend.output(b"one ", 4).unwrap();
        backend.output(b"two", 3).unwrap();
        backend.flush().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "one two");
    }

    #[test]
    fn test_append_mode_keeps_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.log");
        fs::write(&path, "kept|").unwrap();

        let params = HashMap::from([
            ("path".to_string(), path.display().to_string()),
            ("append".to_string(), "true".to_string()),
        ]);
        let mut backend = FileBackend::from_params("file", &params).unwrap();
        backend.output(b"new", 3).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "kept|new");
    }

    #[test]
    fn test_reopen_after_failed_open() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();
        // parent is a regular file, so the first open fails
        let path = blocker.join("out.log");

        let mut backend = FileBackend::new(
            "file",
            FileBackendConfig {
                path: path.clone(),
                append: false,
            },
        );
        assert!(!backend.is_open());
        assert!(backend.output(b"lost", 4).is_err());

        fs::remove_file(&blocker).unwrap();
        backend.output(b"found", 5).unwrap();
        assert!(backend.is_open());
        assert_eq!(fs::read_to_string(&path).unwrap(), "found");
    }

    #[test]
    fn test_missing_path_param() {
        let err = FileBackendConfig::from_params(&HashMap::new()).unwrap_err();
        assert!(err.to_string().contains("params.path"));
    }
}

//! File areas the compositor manages: user uploads and rendered outputs

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Local};
use tracing::{debug, info};

use crate::config::StorageConfig;
use crate::error::{ComposerError, Result, StorageError};

/// Timestamp appended to output names so concurrent requests never collide
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%3f";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageArea {
    Uploads,
    Outputs,
}

impl FromStr for StorageArea {
    type Err = ComposerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "uploads" | "upload" => Ok(Self::Uploads),
            "outputs" | "output" => Ok(Self::Outputs),
            _ => Err(StorageError::UnknownArea { area: s.to_string() }.into()),
        }
    }
}

impl fmt::Display for StorageArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uploads => write!(f, "uploads"),
            Self::Outputs => write!(f, "outputs"),
        }
    }
}

/// One file in a storage area
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub name: String,
    pub size: u64,
    pub modified: Option<DateTime<Local>>,
}

#[derive(Debug, Clone)]
pub struct Storage {
    upload_dir: PathBuf,
    output_dir: PathBuf,
    staging_dir: PathBuf,
}

impl Storage {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            upload_dir: config.upload_dir.clone(),
            output_dir: config.output_dir.clone(),
            staging_dir: config.staging_dir.clone(),
        }
    }

    pub fn dir(&self, area: StorageArea) -> &Path {
        match area {
            StorageArea::Uploads => &self.upload_dir,
            StorageArea::Outputs => &self.output_dir,
        }
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Create the output and staging directories
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.output_dir)?;
        std::fs::create_dir_all(&self.staging_dir)?;
        Ok(())
    }

    /// Relative sources are looked up in the uploads area
    pub fn resolve_source(&self, source: &str) -> PathBuf {
        let path = Path::new(source);
        if path.is_absolute() || path.exists() {
            path.to_path_buf()
        } else {
            self.upload_dir.join(path)
        }
    }

    /// `<stem>_<timestamp>.<extension>` inside the outputs area
    pub fn output_path(&self, stem: &str, extension: &str) -> Result<PathBuf> {
        check_file_name(stem)?;
        let timestamp = Local::now().format(TIMESTAMP_FORMAT);
        let name = format!("{}_{}.{}", stem, timestamp, extension.trim_start_matches('.'));
        Ok(self.output_dir.join(name))
    }

    /// Regular files in `area`, sorted by name; a missing directory is empty
    pub fn list(&self, area: StorageArea) -> Result<Vec<StoredFile>> {
        let dir = self.dir(area);
        if !dir.exists() {
            debug!("{} directory {:?} does not exist yet", area, dir);
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            files.push(StoredFile {
                name: entry.file_name().to_string_lossy().into_owned(),
                size: metadata.len(),
                modified: metadata.modified().ok().map(DateTime::<Local>::from),
            });
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    /// Delete one file by name; names may not leave the area
    pub fn delete(&self, area: StorageArea, name: &str) -> Result<()> {
        check_file_name(name)?;
        let path = self.dir(area).join(name);
        if !path.is_file() {
            return Err(StorageError::FileNotFound { name: name.to_string() }.into());
        }

        std::fs::remove_file(&path)?;
        info!("Deleted {} from {}", name, area);
        Ok(())
    }
}

/// Reject empty names, separators and parent references
fn check_file_name(name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name == "."
        || name.contains("..")
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');
    if invalid {
        return Err(StorageError::InvalidFileName { name: name.to_string() }.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn storage(root: &Path) -> Storage {
        Storage::new(&StorageConfig {
            upload_dir: root.join("uploads"),
            output_dir: root.join("outputs"),
            staging_dir: root.join("uploads/staging"),
        })
    }

    #[test]
    fn test_area_names() {
        assert_eq!("uploads".parse::<StorageArea>().unwrap(), StorageArea::Uploads);
        assert_eq!("Outputs".parse::<StorageArea>().unwrap(), StorageArea::Outputs);
        assert!(matches!(
            "tmp".parse::<StorageArea>(),
            Err(ComposerError::Storage(StorageError::UnknownArea { .. }))
        ));
    }

    #[test]
    fn test_output_path_is_timestamped() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path());
        let path = storage.output_path("composition", "mp4").unwrap();

        assert_eq!(path.parent().unwrap(), dir.path().join("outputs"));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("composition_"));
        assert!(name.ends_with(".mp4"));
        // composition_YYYYmmdd_HHMMSS_mmm.mp4
        assert_eq!(name.len(), "composition_".len() + 19 + ".mp4".len());

        assert!(storage.output_path("../escape", "mp4").is_err());
    }

    #[test]
    fn test_list_sorted_files() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path());
        assert!(storage.list(StorageArea::Outputs).unwrap().is_empty());

        let uploads = dir.path().join("uploads");
        std::fs::create_dir_all(uploads.join("staging")).unwrap();
        std::fs::write(uploads.join("b.png"), b"12345").unwrap();
        std::fs::write(uploads.join("a.mp3"), b"1").unwrap();

        let files = storage.list(StorageArea::Uploads).unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.mp3", "b.png"]);
        assert_eq!(files[1].size, 5);
        assert!(files[0].modified.is_some());
    }

    #[test]
    fn test_delete() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path());
        storage.ensure_dirs().unwrap();
        let target = dir.path().join("outputs/result.mp4");
        std::fs::write(&target, b"data").unwrap();

        storage.delete(StorageArea::Outputs, "result.mp4").unwrap();
        assert!(!target.exists());

        assert!(matches!(
            storage.delete(StorageArea::Outputs, "result.mp4"),
            Err(ComposerError::Storage(StorageError::FileNotFound { .. }))
        ));
    }

    #[test]
    fn test_delete_refuses_traversal() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path());
        storage.ensure_dirs().unwrap();
        std::fs::write(dir.path().join("secret.txt"), b"x").unwrap();

        for name in ["../secret.txt", "..", "sub/file", "", "a\\b"] {
            assert!(
                matches!(
                    storage.delete(StorageArea::Outputs, name),
                    Err(ComposerError::Storage(StorageError::InvalidFileName { .. }))
                ),
                "{:?} should be rejected",
                name
            );
        }
        assert!(dir.path().join("secret.txt").exists());
    }

    #[test]
    fn test_resolve_source_uses_uploads() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path());
        assert_eq!(storage.resolve_source("does-not-exist.png"), dir.path().join("uploads/does-not-exist.png"));
        assert_eq!(storage.resolve_source("/abs/a.png"), PathBuf::from("/abs/a.png"));
    }
}

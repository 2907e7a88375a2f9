use std::path::{Path, PathBuf};

use crate::error::StoreError;

/// Configuration for a [`crate::Store`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Root directory under which all logical files live. Created recursively
    /// and idempotently the first time it is needed, not at construction time.
    pub dir_path: PathBuf,

    /// Upper bound on the number of path workers allowed to hold an open file
    /// descriptor at once. Must be at least 1.
    pub max_open_files: usize,
}

impl StoreConfig {
    pub fn new(dir_path: impl Into<PathBuf>, max_open_files: usize) -> Self {
        Self {
            dir_path: dir_path.into(),
            max_open_files,
        }
    }

    /// Validates this configuration without constructing a [`crate::Store`].
    /// `Store::new` calls this itself; exposed separately so callers can
    /// check configuration synchronously, without needing a tokio runtime.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.max_open_files == 0 {
            return Err(StoreError::InvalidMaxOpenFiles);
        }
        if self.dir_path.as_os_str().is_empty() {
            return Err(StoreError::InvalidDirPath(
                self.dir_path.clone(),
                "must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn resolve(&self, short_path: &str) -> Result<PathBuf, StoreError> {
        if short_path.is_empty() {
            return Err(StoreError::InvalidDirPath(
                self.dir_path.clone(),
                "short_path must not be empty".to_string(),
            ));
        }
        let candidate = Path::new(short_path);
        if candidate.is_absolute() || candidate.components().any(|c| {
            matches!(
                c,
                std::path::Component::ParentDir | std::path::Component::Prefix(_)
            )
        }) {
            return Err(StoreError::InvalidDirPath(
                self.dir_path.clone(),
                format!("short_path '{short_path}' escapes the store root"),
            ));
        }
        Ok(self.dir_path.join(candidate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_max_open_files_is_invalid() {
        let err = StoreConfig::new("/tmp/fdstore", 0).validate().unwrap_err();
        assert!(matches!(err, StoreError::InvalidMaxOpenFiles));
    }

    #[test]
    fn empty_dir_path_is_invalid() {
        let err = StoreConfig::new("", 4).validate().unwrap_err();
        assert!(matches!(err, StoreError::InvalidDirPath(..)));
    }

    #[test]
    fn valid_config_passes() {
        StoreConfig::new("/tmp/fdstore", 4).validate().unwrap();
    }

    #[test]
    fn resolve_joins_relative_short_path() {
        let cfg = StoreConfig::new("/data/store", 4);
        assert_eq!(
            cfg.resolve("sub/nested/leaf").unwrap(),
            PathBuf::from("/data/store/sub/nested/leaf")
        );
    }

    #[test]
    fn resolve_rejects_parent_dir_escape() {
        let cfg = StoreConfig::new("/data/store", 4);
        assert!(matches!(
            cfg.resolve("../outside").unwrap_err(),
            StoreError::InvalidDirPath(..)
        ));
    }

    #[test]
    fn resolve_rejects_absolute_short_path() {
        let cfg = StoreConfig::new("/data/store", 4);
        assert!(matches!(
            cfg.resolve("/etc/passwd").unwrap_err(),
            StoreError::InvalidDirPath(..)
        ));
    }

    #[test]
    fn resolve_rejects_empty_short_path() {
        let cfg = StoreConfig::new("/data/store", 4);
        assert!(matches!(
            cfg.resolve("").unwrap_err(),
            StoreError::InvalidDirPath(..)
        ));
    }
}

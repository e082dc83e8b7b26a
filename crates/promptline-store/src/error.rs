//! Error type for reading and writing dataset, answer, and result files

use std::path::{Path, PathBuf};

/// Error from loading or persisting one of the JSON files a run touches.
///
/// Always carries the path, since a run spans many files and the caller
/// reports the failing one and moves on.
#[derive(Debug)]
pub enum StoreError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// File exists but is not the expected JSON shape
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    Encode {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "IO on {}: {source}", path.display()),
            Self::Parse { path, source } => {
                write!(f, "malformed JSON in {}: {source}", path.display())
            }
            Self::Encode { path, source } => {
                write!(f, "cannot encode records for {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } | Self::Encode { source, .. } => Some(source),
        }
    }
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn parse(path: &Path, source: serde_json::Error) -> Self {
        Self::Parse {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Path of the file that failed
    pub fn path(&self) -> &Path {
        match self {
            Self::Io { path, .. } | Self::Parse { path, .. } | Self::Encode { path, .. } => path,
        }
    }

    /// True when the file content is corrupt rather than unreachable
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }
}

/// Read a whole file, attaching the path to any error.
pub(crate) fn read_file(path: &Path) -> Result<String, StoreError> {
    std::fs::read_to_string(path).map_err(|e| StoreError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_path() {
        let err = StoreError::io(
            Path::new("/data/out/age_r1.json"),
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = format!("{err}");
        assert!(msg.contains("/data/out/age_r1.json"));
        assert!(!err.is_corrupt());
    }

    #[test]
    fn parse_errors_are_corrupt() {
        let source = serde_json::from_str::<Vec<u8>>("[1,").unwrap_err();
        let err = StoreError::parse(Path::new("x.json"), source);
        assert!(err.is_corrupt());
        assert_eq!(err.path(), Path::new("x.json"));
        assert!(format!("{err}").starts_with("malformed JSON in x.json"));
    }
}

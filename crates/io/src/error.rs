use std::fmt;

use crate::version::Version;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store could not be read or parsed.
    Read { target: String, message: String },
    /// The write itself failed (disk, permissions, remote). The in-memory
    /// table is untouched and the save may be retried.
    StorageWriteFailure { target: String, message: String },
    /// Storage changed since the table was loaded.
    VersionConflict { target: String, expected: Version, found: Version },
    /// The dataset is an archive and never written.
    ReadOnly { target: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read { target, message } => write!(f, "cannot read {target}: {message}"),
            Self::StorageWriteFailure { target, message } => {
                write!(f, "cannot write {target}: {message}")
            }
            Self::VersionConflict { target, expected, found } => write!(
                f,
                "{target} changed since it was loaded (loaded {}, now {})",
                expected.short(),
                found.short()
            ),
            Self::ReadOnly { target } => write!(f, "{target} is read-only"),
        }
    }
}

impl std::error::Error for StoreError {}

//! CLI Exit Code Registry
//!
//! This is the single source of truth for all `keros` exit codes.
//! Scripts that wrap the register rely on them.
//!
//! | Code | Meaning                                              |
//! |------|------------------------------------------------------|
//! | 0    | Success                                              |
//! | 1    | General error (unspecified)                          |
//! | 2    | Usage error (bad arguments, bad filter, bad date)    |
//! | 3    | Config missing or invalid                            |
//! | 4    | Register or session file could not be read           |
//! | 5    | Stale view or expired session; re-render and redo    |
//! | 6    | Register changed since it was loaded                 |
//! | 7    | Writing the register failed; nothing was changed     |
//! | 8    | Dataset is read-only                                 |

use keros_config::ConfigError;
use keros_io::StoreError;
use keros_recon::ReconError;

use crate::session::SessionError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, malformed `--where`, unparseable date.
pub const EXIT_USAGE: u8 = 2;

/// Config file not found, unparseable, or failing validation.
pub const EXIT_CONFIG: u8 = 3;

/// Register or session file unreadable.
pub const EXIT_IO: u8 = 4;

/// A View no longer matches the register, or the session expired.
pub const EXIT_STALE_VIEW: u8 = 5;

/// Optimistic concurrency check failed on save.
pub const EXIT_VERSION_CONFLICT: u8 = 6;

/// The write itself failed. Storage is unchanged; the save may be retried.
pub const EXIT_WRITE_FAILED: u8 = 7;

/// Save attempted against an archive dataset.
pub const EXIT_READ_ONLY: u8 = 8;

pub fn store_exit_code(err: &StoreError) -> u8 {
    match err {
        StoreError::Read { .. } => EXIT_IO,
        StoreError::StorageWriteFailure { .. } => EXIT_WRITE_FAILED,
        StoreError::VersionConflict { .. } => EXIT_VERSION_CONFLICT,
        StoreError::ReadOnly { .. } => EXIT_READ_ONLY,
    }
}

pub fn config_exit_code(err: &ConfigError) -> u8 {
    match err {
        ConfigError::UnknownDataset { .. } => EXIT_USAGE,
        _ => EXIT_CONFIG,
    }
}

pub fn recon_exit_code(err: &ReconError) -> u8 {
    if err.is_stale() {
        EXIT_STALE_VIEW
    } else {
        EXIT_ERROR
    }
}

pub fn session_exit_code(err: &SessionError) -> u8 {
    match err {
        SessionError::Io { .. } | SessionError::Parse { .. } => EXIT_IO,
        SessionError::Expired { .. } => EXIT_STALE_VIEW,
    }
}

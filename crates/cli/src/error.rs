use keros_config::ConfigError;
use keros_io::StoreError;
use keros_recon::ReconError;

use crate::exit_codes::{
    config_exit_code, recon_exit_code, session_exit_code, store_exit_code, EXIT_ERROR, EXIT_USAGE,
};
use crate::session::SessionError;

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn general(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn config(err: ConfigError) -> Self {
        let hint = match &err {
            ConfigError::NotFound { .. } => {
                Some("pass --config FILE or set KEROS_CONFIG".to_string())
            }
            ConfigError::UnknownDataset { .. } => Some("see `keros config validate`".to_string()),
            _ => None,
        };
        Self { code: config_exit_code(&err), message: err.to_string(), hint }
    }

    pub fn store(err: StoreError) -> Self {
        let hint = match &err {
            StoreError::VersionConflict { .. } => {
                Some("someone else saved first; run `keros render` again and redo the edits".to_string())
            }
            StoreError::StorageWriteFailure { .. } => {
                Some("the register was not changed; the save can be retried".to_string())
            }
            StoreError::ReadOnly { .. } => Some("this dataset is an archive".to_string()),
            StoreError::Read { .. } => None,
        };
        Self { code: store_exit_code(&err), message: err.to_string(), hint }
    }

    pub fn recon(err: ReconError) -> Self {
        let hint = err
            .is_stale()
            .then(|| "the register changed under this view; run `keros render` again".to_string());
        Self { code: recon_exit_code(&err), message: err.to_string(), hint }
    }

    pub fn session(err: SessionError) -> Self {
        let hint = match &err {
            SessionError::Expired { .. } => Some("run `keros render` for a fresh session".to_string()),
            _ => None,
        };
        Self { code: session_exit_code(&err), message: err.to_string(), hint }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::config(err)
    }
}

impl From<StoreError> for CliError {
    fn from(err: StoreError) -> Self {
        Self::store(err)
    }
}

impl From<ReconError> for CliError {
    fn from(err: ReconError) -> Self {
        Self::recon(err)
    }
}

impl From<SessionError> for CliError {
    fn from(err: SessionError) -> Self {
        Self::session(err)
    }
}

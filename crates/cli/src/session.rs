//! Edit sessions.
//!
//! `keros render` writes a session file holding the rendered Views, the
//! version of the register they were rendered from, and one empty edit delta
//! per View. The grid (or a person with an editor) fills the deltas in, and
//! `keros save` consumes the file. Nothing in a session is ever written to the
//! register itself.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use keros_engine::View;
use keros_io::Version;
use keros_recon::EditDelta;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_TTL_HOURS: i64 = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionView {
    pub view: View,
    #[serde(default)]
    pub delta: EditDelta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub dataset: String,
    pub base_version: Version,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub views: Vec<SessionView>,
}

#[derive(Debug)]
pub enum SessionError {
    Io { path: PathBuf, message: String },
    Parse { path: PathBuf, message: String },
    Expired { id: Uuid, expired_at: DateTime<Utc> },
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Io { path, message } => write!(f, "{}: {message}", path.display()),
            SessionError::Parse { path, message } => {
                write!(f, "{}: not a session file: {message}", path.display())
            }
            SessionError::Expired { id, expired_at } => {
                write!(f, "session {id} expired at {}", expired_at.format("%Y-%m-%d %H:%M UTC"))
            }
        }
    }
}

impl std::error::Error for SessionError {}

impl Session {
    pub fn new(dataset: impl Into<String>, base_version: Version, views: Vec<View>, ttl: Duration) -> Self {
        let created_at = Utc::now();
        Self {
            id: Uuid::new_v4(),
            dataset: dataset.into(),
            base_version,
            created_at,
            expires_at: created_at + ttl,
            views: views
                .into_iter()
                .map(|view| SessionView { view, delta: EditDelta::default() })
                .collect(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn check_live(&self, now: DateTime<Utc>) -> Result<(), SessionError> {
        if self.is_expired(now) {
            return Err(SessionError::Expired { id: self.id, expired_at: self.expires_at });
        }
        Ok(())
    }

    /// Views and deltas as parallel lists, the shape reconcile takes.
    pub fn split(&self) -> (Vec<View>, Vec<EditDelta>) {
        self.views
            .iter()
            .map(|sv| (sv.view.clone(), sv.delta.clone()))
            .unzip()
    }

    pub fn has_edits(&self) -> bool {
        self.views.iter().any(|sv| !sv.delta.is_empty())
    }

    pub fn load(path: &Path) -> Result<Self, SessionError> {
        let raw = fs::read_to_string(path).map_err(|e| SessionError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&raw).map_err(|e| SessionError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), SessionError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| SessionError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        fs::write(path, json + "\n").map_err(|e| SessionError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

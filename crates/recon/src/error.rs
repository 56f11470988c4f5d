use std::fmt;

use keros_engine::RowKey;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconError {
    /// A delta position has no entry in its View's captured key list.
    StaleViewReference { view: String, position: usize, len: usize },
    /// The captured key exists in the View but no longer in the Master Table.
    StaleRowKey { view: String, position: usize, key: RowKey },
    /// Views and deltas must be paired one-to-one.
    ViewDeltaMismatch { views: usize, deltas: usize },
}

impl ReconError {
    /// True when the View and the Master Table diverged between render and
    /// save; the caller should reload and redo the edit.
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleViewReference { .. } | Self::StaleRowKey { .. })
    }
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StaleViewReference { view, position, len } => write!(
                f,
                "view '{view}': row {position} is out of range (view has {len} rows)"
            ),
            Self::StaleRowKey { view, position, key } => write!(
                f,
                "view '{view}': row {position} refers to record {key}, which no longer exists"
            ),
            Self::ViewDeltaMismatch { views, deltas } => {
                write!(f, "{views} view(s) but {deltas} delta(s); expected one delta per view")
            }
        }
    }
}

impl std::error::Error for ReconError {}

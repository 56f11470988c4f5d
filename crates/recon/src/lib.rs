//! `keros-recon` - edit reconciliation.
//!
//! Pure engine crate: receives a Master Table, the Views it was rendered
//! into and the grid deltas reported against them, returns one corrected
//! table. No IO.

pub mod engine;
pub mod error;
pub mod model;

pub use engine::reconcile;
pub use error::ReconError;
pub use model::{CellChanges, EditDelta, ReconSummary, Reconciled};

//! `keros-engine` - the in-memory register.
//!
//! Pure crate: typed tables, coercion, filtered views and summary counts.
//! Nothing here performs IO.

pub mod stats;
pub mod table;
pub mod value;
pub mod view;

pub use table::{Column, Row, RowKey, Schema, Table};
pub use value::{ColumnKind, Value};
pub use view::{FilterOp, RowFilter, View};

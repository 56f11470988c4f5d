// keros - photogrammetry register command line

pub mod error;
pub mod exit_codes;
pub mod output;
pub mod register;
pub mod session;

pub use error::CliError;
pub use register::{NewLayer, Query, Register};
pub use session::Session;

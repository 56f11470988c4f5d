// Register configuration loading

pub mod error;
pub mod register;

pub use error::ConfigError;
pub use register::{locate, ColumnNames, DatasetConfig, RegisterConfig, CONFIG_ENV};

use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No config file at any of the searched locations.
    NotFound { searched: Vec<PathBuf> },
    Io { path: PathBuf, message: String },
    Parse(String),
    Validation(String),
    UnknownDataset { name: String, known: Vec<String> },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { searched } => {
                write!(f, "no keros.toml found (searched: ")?;
                for (i, path) in searched.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", path.display())?;
                }
                write!(f, ")")
            }
            Self::Io { path, message } => write!(f, "{}: {message}", path.display()),
            Self::Parse(msg) => write!(f, "config parse error: {msg}"),
            Self::Validation(msg) => write!(f, "config validation error: {msg}"),
            Self::UnknownDataset { name, known } => {
                write!(f, "unknown dataset '{name}' (configured: {})", known.join(", "))
            }
        }
    }
}

impl std::error::Error for ConfigError {}

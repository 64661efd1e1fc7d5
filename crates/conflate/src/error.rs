use std::fmt;

#[derive(Debug)]
pub enum ConflateError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (bad demi distance, negative epsilon, etc.).
    ConfigValidation(String),
    /// The matcher reached a state that should be impossible.
    Invariant(String),
    /// IO error (config file read).
    Io(String),
}

impl fmt::Display for ConflateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::Invariant(msg) => write!(f, "conflation invariant violated: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for ConflateError {}

use thiserror::Error;

/// Errors surfaced by the crate outside of the feed request path
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("session record error: {0}")]
    Session(#[from] serde_json::Error),

    /// The terminal actor failed; the terminal has already been
    /// restored as far as possible
    #[error("terminal failure: {0}")]
    Terminal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

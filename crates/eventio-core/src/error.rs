use thiserror::Error;

pub type Result<T> = std::result::Result<T, EventIoError>;

#[derive(Debug, Error)]
pub enum EventIoError {
    /// Bad mapping file, duplicate ids, nothing to merge.
    #[error("configuration error: {0}")]
    Config(String),

    /// Unexpected block type, nested length overflow, malformed count.
    #[error("format error: {0}")]
    Format(String),

    /// The two inputs disagree about something that must be identical.
    #[error("inputs do not match: {0}")]
    Mismatch(String),

    /// Showers or events arrived with decreasing identifiers.
    #[error("wrong order of processing: {0}")]
    Order(String),

    /// Buffer growth past the configured maximum.
    #[error("resource limit exceeded: {0}")]
    Resource(String),

    #[error("internal consistency failure: {0}")]
    Internal(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

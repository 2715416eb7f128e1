use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Malformed or inconsistent wire data. Aborts the whole read.
    #[error("stream corrupted: {}", .0)]
    StreamCorrupted(String),

    #[error("not serializable: {}", .0)]
    NotSerializable(String),

    /// Caller bug: duplicate registration, oversized field count or short string,
    /// inconsistent resolver pairs.
    #[error("configuration error: {}", .0)]
    Configuration(String),

    #[error("field '{field}' of {class} is declared more than once")]
    DuplicateField { class: String, field: String },

    #[error("{} is already mutably borrowed", .0)]
    Borrowed(String),

    #[error("RwLock failed")]
    RwLock,

    #[error("config: {}", .0)]
    Config(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

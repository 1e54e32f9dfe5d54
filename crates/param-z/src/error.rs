//! Error type for structural and I/O operations.
//!
//! Value-path operations (setting, clamping, converting, pushing) never
//! return these: they no-op, return `false` or yield [`Value::Invalid`].
//! Only tree manipulation, presets, configuration and transport setup are
//! fallible in the `Result` sense.
//!
//! [`Value::Invalid`]: crate::value::Value::Invalid

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no node at address '{0}'")]
    NotFound(String),

    #[error("invalid address '{0}'")]
    InvalidAddress(String),

    #[error("preset error: {0}")]
    Preset(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("zenoh error: {0}")]
    Zenoh(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<zenoh::Error> for Error {
    fn from(e: zenoh::Error) -> Self {
        Error::Zenoh(e.to_string())
    }
}

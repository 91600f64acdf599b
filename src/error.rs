use thiserror::Error;

/// Library error type for loupe operations.
#[derive(Debug, Error)]
pub enum Error {
    /// No hardware-accelerated GPU context could be acquired.
    #[error("no hardware GPU context available: {0}")]
    ContextUnavailable(String),

    /// The image decoder rejected the source.
    #[error("failed to decode image: {0:#}")]
    Decode(#[source] anyhow::Error),

    /// A GPU texture could not be created for a level of detail.
    #[error("texture creation failed: {0}")]
    TextureCreation(String),

    /// The platform offers no usable clipboard write API.
    #[error("clipboard unavailable: {0}")]
    ClipboardUnsupported(String),

    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The engine has been torn down; no further operations are valid.
    #[error("viewer has been destroyed")]
    Destroyed,

    /// Underlying IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// YAML/serde configuration error.
    #[error(transparent)]
    Config(#[from] serde_yaml::Error),
}

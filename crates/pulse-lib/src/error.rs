use thiserror::Error;

#[derive(Debug, Error)]
pub enum PulseError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = PulseError> = std::result::Result<T, E>;

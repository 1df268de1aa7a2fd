use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid tracker configuration: {0}")]
    InvalidConfig(String),
    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Yaml Error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Detector Error: {0}")]
    Detector(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, Error>;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScannerError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("hardware scanner backend unavailable: {0}")]
    Unavailable(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ScannerError>;

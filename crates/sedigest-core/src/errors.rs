/// Core error type for the digest pipeline.
///
/// Adapter crates map their library errors into this type so the binary can
/// turn any failure into one log line and a non-zero exit.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("auth error: {0}")]
    Auth(String),

    #[error("fetch error: {0}")]
    Fetch(String),

    #[error("delivery error: {0}")]
    Delivery(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

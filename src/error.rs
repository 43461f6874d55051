/// Failures inside the tracker. None of these ever reach the hosting page;
/// the dispatcher and reactor log and swallow them.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("collector answered {status} for {endpoint}")]
    Status { endpoint: String, status: u16 },

    #[error("malformed collector response: {reason}")]
    MalformedResponse { reason: String },

    #[error("preference store unavailable: {reason}")]
    Preferences { reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {reason}")]
    Config { reason: String },
}

pub type Result<T> = std::result::Result<T, TrackerError>;

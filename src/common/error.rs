use thiserror::Error;

// Error
//------------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ScanError {
    // Store
    #[error("User not authenticated")]
    NotAuthenticated,
    #[error("Failed to save: {0}")]
    StoreWriteFailure(String),
    #[error("Failed to load: {0}")]
    StoreReadFailure(String),

    // Reader
    #[error("Failed to scan: {0}")]
    DecodeFailure(String),

    // Builder
    #[error("Text to encode must not be blank")]
    EmptyText,
    #[error("Failed to encode QR: {0}")]
    Encode(String),

    // Profile
    #[error("Invalid profile: {0}")]
    InvalidProfile(&'static str),

    // Config
    #[error("Invalid config: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(String),
}

impl ScanError {
    /// Message shown to the user as a transient notice. None of these errors stop
    /// the scanning loop.
    pub fn notice(&self) -> String {
        match self {
            Self::NotAuthenticated => "User not authenticated".to_string(),
            Self::StoreWriteFailure(m) => format!("Failed to save to history: {m}"),
            Self::StoreReadFailure(m) => format!("Error loading history: {m}"),
            Self::DecodeFailure(_) => "Failed to scan".to_string(),
            Self::EmptyText => "Please enter text".to_string(),
            Self::InvalidProfile(m) => (*m).to_string(),
            other => other.to_string(),
        }
    }
}

impl From<std::io::Error> for ScanError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<image::ImageError> for ScanError {
    fn from(e: image::ImageError) -> Self {
        Self::DecodeFailure(e.to_string())
    }
}

pub type ScanResult<T> = Result<T, ScanError>;

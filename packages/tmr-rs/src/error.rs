use thiserror::Error;

#[derive(Error, Debug)]
pub enum TmrError {
    #[error("Input file not found: {0}")]
    FileNotFound(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("Failed to parse {0}")]
    Parse(String),

    #[error("Column '{column}' not found in {source_name}")]
    MissingColumn { column: String, source_name: String },

    #[error("Channel '{0}' not found in recording")]
    MissingChannel(String),

    #[error("Event not found: {0}")]
    MissingEvent(String),

    #[error("Window [{start}, {end}) is outside the recording (0..{len} samples)")]
    WindowOutOfBounds { start: i64, end: i64, len: usize },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Not enough data: {0}")]
    InsufficientData(String),

    #[error("Plot rendering failed: {0}")]
    Plot(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl TmrError {
    /// True for errors caused by the caller's inputs rather than by processing.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            TmrError::FileNotFound(_)
                | TmrError::UnsupportedFileType(_)
                | TmrError::MissingColumn { .. }
                | TmrError::MissingChannel(_)
                | TmrError::MissingEvent(_)
                | TmrError::InvalidParameter(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, TmrError>;

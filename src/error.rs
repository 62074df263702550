use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReportError>;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("qr encoding failed: {0}")]
    Qr(String),

    #[error("asset error: {0}")]
    Asset(String),

    #[error("pdf generation failed: {0}")]
    Pdf(String),

    #[error("archive error: {0}")]
    Archive(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("record data error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<zip::result::ZipError> for ReportError {
    fn from(value: zip::result::ZipError) -> Self {
        ReportError::Archive(value.to_string())
    }
}

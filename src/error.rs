use thiserror::Error;

#[derive(Error, Debug)]
pub enum IssueError {
    #[error("Missing required fields: {}", .0.join(", "))]
    Validation(Vec<&'static str>),

    #[error("Invalid date '{0}': use YYYY-MM-DD or DD/MM/YYYY")]
    Format(String),

    #[error("Batch source is missing required columns: {}", .0.join(", "))]
    Schema(Vec<&'static str>),

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF error: {0}")]
    Pdf(#[from] genpdf::error::Error),

    #[error("Font error: {0}")]
    Fonts(String),

    #[error("Background template error: {0}")]
    Background(String),
}

#[derive(Error, Debug)]
pub enum BatchSourceError {
    #[error("Unsupported batch file '{0}': expected .csv or .json")]
    UnsupportedFormat(String),

    #[error("Batch file is not valid UTF-8")]
    Encoding,

    #[error("Batch file is empty")]
    Empty,

    #[error("Invalid JSON batch: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid CSV batch at line {line}: {message}")]
    Csv { line: usize, message: String },
}

pub type Result<T> = std::result::Result<T, IssueError>;

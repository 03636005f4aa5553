///! Error taxonomy for the chart pipeline
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChartError>;

/// Errors surfaced by the catalog, discovery and S-57 components
#[derive(Debug, Error)]
pub enum ChartError {
    /// Chart or cell does not exist
    #[error("chart not found: {0}")]
    NotFound(String),

    /// Connection refused, DNS failure, reset, ...
    #[error("connection failed: {0}")]
    Connectivity(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    /// Body is not JSON or does not have the expected shape
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("operation cancelled: {0}")]
    Cancelled(String),

    /// Truncated or invalid ENC payload
    #[error("{}", describe_corrupt(.cell_id, .offset, .reason))]
    CorruptData {
        cell_id: Option<String>,
        offset: Option<usize>,
        reason: String,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{}", describe_unsupported_state(.name, .suggestion))]
    UnsupportedState {
        name: String,
        suggestion: Option<String>,
    },

    /// Durable store write failed
    #[error("storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive error: {0}")]
    Archive(String),

    #[error(
        "catalog produced no usable charts ({parsed} parsed, {skipped} skipped, {failed} failed)"
    )]
    EmptyCatalog {
        parsed: usize,
        skipped: usize,
        failed: usize,
    },

    #[error("download already in progress for {0}")]
    DownloadInProgress(String),
}

fn describe_corrupt(cell_id: &Option<String>, offset: &Option<usize>, reason: &str) -> String {
    let mut message = String::from("corrupt chart data");
    if let Some(cell_id) = cell_id {
        message.push_str(&format!(" in {}", cell_id));
    }
    if let Some(offset) = offset {
        message.push_str(&format!(" at byte {}", offset));
    }
    message.push_str(": ");
    message.push_str(reason);
    message
}

fn describe_unsupported_state(name: &str, suggestion: &Option<String>) -> String {
    match suggestion {
        Some(suggestion) => {
            format!("unsupported state '{}' (did you mean '{}'?)", name, suggestion)
        }
        None => format!("unsupported state '{}'", name),
    }
}

impl ChartError {
    pub fn corrupt(offset: usize, reason: impl Into<String>) -> Self {
        ChartError::CorruptData {
            cell_id: None,
            offset: Some(offset),
            reason: reason.into(),
        }
    }

    /// Attach the cell ID to a corrupt-data error raised below the archive layer.
    pub fn with_cell_id(self, cell: &str) -> Self {
        match self {
            ChartError::CorruptData { cell_id: None, offset, reason } => ChartError::CorruptData {
                cell_id: Some(cell.to_string()),
                offset,
                reason,
            },
            other => other,
        }
    }

    /// Transient network failures may be retried; everything else is final.
    pub fn is_retryable(&self) -> bool {
        match self {
            ChartError::Connectivity(_) | ChartError::Timeout(_) => true,
            ChartError::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ChartError::NotFound(_) | ChartError::HttpStatus { status: 404, .. }
        )
    }
}

impl From<reqwest::Error> for ChartError {
    fn from(e: reqwest::Error) -> Self {
        let url = e.url().map(|u| u.to_string()).unwrap_or_default();
        if e.is_timeout() {
            ChartError::Timeout(url)
        } else if let Some(status) = e.status() {
            ChartError::HttpStatus {
                status: status.as_u16(),
                url,
            }
        } else if e.is_decode() {
            ChartError::MalformedResponse(e.to_string())
        } else {
            ChartError::Connectivity(e.to_string())
        }
    }
}

impl From<zip::result::ZipError> for ChartError {
    fn from(e: zip::result::ZipError) -> Self {
        ChartError::Archive(e.to_string())
    }
}

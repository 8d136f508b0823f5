use std::fmt;
use thiserror::Error;

/// Which size limit a write ran into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeLimit {
    Document,
    Transaction,
}

impl fmt::Display for SizeLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeLimit::Document => f.write_str("document exceeds limit"),
            SizeLimit::Transaction => f.write_str("transaction exceeds limit"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidArgument,
    SizeLimitExceeded(SizeLimit),
    AlreadyExists,
    Cancelled,
    DeadlineExceeded,
    Io,
    Internal,
}

#[derive(Debug, Error)]
#[error("{message}")]
pub struct StoreError {
    kind: ErrorKind,
    message: String,
}

impl StoreError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AlreadyExists, message)
    }

    pub fn size_limit(limit: SizeLimit) -> Self {
        Self::new(ErrorKind::SizeLimitExceeded(limit), limit.to_string())
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_size_limit(&self) -> bool {
        matches!(self.kind, ErrorKind::SizeLimitExceeded(_))
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::new(ErrorKind::Io, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_limit_messages() {
        assert_eq!(
            StoreError::size_limit(SizeLimit::Document).to_string(),
            "document exceeds limit"
        );
        assert_eq!(
            StoreError::size_limit(SizeLimit::Transaction).to_string(),
            "transaction exceeds limit"
        );
        assert!(StoreError::size_limit(SizeLimit::Transaction).is_size_limit());
    }

    #[test]
    fn test_message_text_does_not_imply_kind() {
        let err = StoreError::invalid_argument("document exceeds limit");
        assert!(!err.is_size_limit());
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}

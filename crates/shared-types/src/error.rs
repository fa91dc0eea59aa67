//! Error taxonomy for key management, signing and verification

use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DocSignError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocSignError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Unsupported key size: {0}")]
    UnsupportedKeySize(String),

    #[error("Unsupported security level: {0}")]
    UnsupportedLevel(String),

    /// Deliberately carries no detail so callers cannot tell a bad password
    /// from a damaged blob.
    #[error("Wrong password or corrupted key data")]
    WrongPasswordOrCorrupted,

    #[error("Invalid subject info: {0}")]
    InvalidSubjectInfo(String),

    #[error("Storage write failed: {0}")]
    StorageWrite(String),

    #[error("Storage read failed: {0}")]
    StorageRead(String),

    #[error("Malformed PDF: {0}")]
    MalformedPdf(String),

    #[error("Signing failed: {0}")]
    SigningFailure(String),

    #[error("Byte range tampering detected: {0}")]
    ByteRangeTamperDetected(String),

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
}

/// Discriminant of [`DocSignError`] for shells that branch on the failure
/// category without inspecting messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidParameters,
    UnsupportedKeySize,
    UnsupportedLevel,
    WrongPasswordOrCorrupted,
    InvalidSubjectInfo,
    StorageWriteError,
    StorageReadError,
    MalformedPdf,
    SigningFailure,
    ByteRangeTamperDetected,
    UnsupportedAlgorithm,
}

impl DocSignError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DocSignError::InvalidParameters(_) => ErrorKind::InvalidParameters,
            DocSignError::UnsupportedKeySize(_) => ErrorKind::UnsupportedKeySize,
            DocSignError::UnsupportedLevel(_) => ErrorKind::UnsupportedLevel,
            DocSignError::WrongPasswordOrCorrupted => ErrorKind::WrongPasswordOrCorrupted,
            DocSignError::InvalidSubjectInfo(_) => ErrorKind::InvalidSubjectInfo,
            DocSignError::StorageWrite(_) => ErrorKind::StorageWriteError,
            DocSignError::StorageRead(_) => ErrorKind::StorageReadError,
            DocSignError::MalformedPdf(_) => ErrorKind::MalformedPdf,
            DocSignError::SigningFailure(_) => ErrorKind::SigningFailure,
            DocSignError::ByteRangeTamperDetected(_) => ErrorKind::ByteRangeTamperDetected,
            DocSignError::UnsupportedAlgorithm(_) => ErrorKind::UnsupportedAlgorithm,
        }
    }

    /// Human-readable detail without the category prefix
    pub fn detail(&self) -> &str {
        match self {
            DocSignError::WrongPasswordOrCorrupted => "wrong password or corrupted key data",
            DocSignError::InvalidParameters(d)
            | DocSignError::UnsupportedKeySize(d)
            | DocSignError::UnsupportedLevel(d)
            | DocSignError::InvalidSubjectInfo(d)
            | DocSignError::StorageWrite(d)
            | DocSignError::StorageRead(d)
            | DocSignError::MalformedPdf(d)
            | DocSignError::SigningFailure(d)
            | DocSignError::ByteRangeTamperDetected(d)
            | DocSignError::UnsupportedAlgorithm(d) => d,
        }
    }
}

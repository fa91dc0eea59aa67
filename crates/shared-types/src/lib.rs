//! Types shared by the signing crates: the error taxonomy, security levels,
//! the storage collaborator and the vocabulary of verification outcomes.

pub mod error;
pub mod level;
pub mod storage;
pub mod verification;

pub use error::{DocSignError, ErrorKind, Result};
pub use level::{DigestAlgorithm, KdfCost, SecurityLevel};
pub use storage::{FileStorage, MemoryStorage, Storage};
pub use verification::VerificationFailure;

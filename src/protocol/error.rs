use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::crypto;
use crate::protocol::certificate::CertificateError;
use crate::protocol::models::{CertificateLevel, EndResult};
use crate::protocol::ports::TransportError;

pub type Result<T> = std::result::Result<T, Error>;

/// Every way an authentication or signing attempt can fail
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid response (empty result)")]
    EmptyResult,

    #[error("Authentication denied: {0}")]
    AuthenticationDenied(EndResult),

    #[error("Invalid signature (verify failed)")]
    SignatureInvalid,

    #[error("Certificate is not active yet (not before {not_before})")]
    CertificateNotYetValid { not_before: DateTime<Utc> },

    #[error("Certificate has expired (not after {not_after})")]
    CertificateExpired { not_after: DateTime<Utc> },

    #[error("Certificate level {actual} is below the required {required}")]
    CertificateLevelMismatch {
        required: CertificateLevel,
        actual: CertificateLevel,
    },

    #[error("Certificate error: {0}")]
    Certificate(#[from] CertificateError),

    #[error("Session polling was cancelled")]
    Cancelled,

    #[error("Session did not complete before the deadline")]
    DeadlineExceeded,

    #[error("Cryptographic failure: {0}")]
    Crypto(#[from] crypto::Error),
}

impl Error {
    /// Failures that mean the provider's assertion must not be trusted
    pub fn is_security_failure(&self) -> bool {
        matches!(
            self,
            Error::SignatureInvalid
                | Error::CertificateNotYetValid { .. }
                | Error::CertificateExpired { .. }
                | Error::CertificateLevelMismatch { .. }
        )
    }
}

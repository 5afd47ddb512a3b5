use openssl::error::ErrorStack;
use thiserror::Error;

pub(crate) type CryptoResult<T> = Result<T, Error>;

/// Error type for cryptographic operations
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid data format or corrupted data
    #[error("Invalid data: {0}")]
    Invalid(String),

    /// Unsupported hash or signature algorithm
    #[error("Unsupported algorithm: {0}")]
    Unsupported(String),

    /// The operating system random source failed
    #[error("Random source failure: {0}")]
    Random(String),

    /// Internal OpenSSL error
    #[error("OpenSSL error: {0}")]
    OpenSsl(#[from] ErrorStack),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    HexDecode(#[from] hex::FromHexError),
}

use base64::{Engine as _, engine::general_purpose::STANDARD};
use std::fmt;

use crate::crypto::{self, HashAlg};
use crate::protocol::error::{Error, Result};
use crate::protocol::ports::RandomSource;

/// Number of random bytes in an authentication challenge
pub const CHALLENGE_LENGTH: usize = 64;

/// A one-time authentication nonce.
///
/// Only [`Challenge::digest`] is sent to the provider; the raw bytes stay
/// here because the returned signature has to be verified against them.
#[derive(Clone, PartialEq, Eq)]
pub struct Challenge {
    raw: Vec<u8>,
    digest: String,
    algorithm: HashAlg,
}

impl Challenge {
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Base64 encoded hash of the raw bytes
    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn algorithm(&self) -> HashAlg {
        self.algorithm
    }
}

impl fmt::Debug for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Challenge")
            .field("raw", &"[REDACTED]")
            .field("digest", &self.digest)
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

/// Draw a fresh challenge from `random` and hash it with `algorithm`.
///
/// A failing random source is fatal for the attempt.
pub fn generate_challenge(random: &dyn RandomSource, algorithm: HashAlg) -> Result<Challenge> {
    let mut raw = vec![0u8; CHALLENGE_LENGTH];
    random.fill(&mut raw)?;
    let digest = STANDARD.encode(algorithm.hash(&raw)?);

    Ok(Challenge {
        raw,
        digest,
        algorithm,
    })
}

/// A digest of a document, computed by the caller, to be signed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentDigest {
    bytes: Vec<u8>,
    algorithm: HashAlg,
}

impl DocumentDigest {
    pub fn new(algorithm: HashAlg, bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.len() != algorithm.output_size() {
            return Err(Error::Validation(format!(
                "{algorithm} digest must be {} bytes, got {}",
                algorithm.output_size(),
                bytes.len()
            )));
        }
        Ok(Self { bytes, algorithm })
    }

    pub fn from_hex(algorithm: HashAlg, hex_str: &str) -> Result<Self> {
        let bytes = crypto::hex_to_bytes(hex_str)
            .map_err(|e| Error::Validation(format!("Invalid digest: {e}")))?;
        Self::new(algorithm, bytes)
    }

    /// Hash `document` with `algorithm`
    pub fn of(algorithm: HashAlg, document: impl AsRef<[u8]>) -> Result<Self> {
        Self::new(algorithm, algorithm.hash(document)?)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn algorithm(&self) -> HashAlg {
        self.algorithm
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}

/// Derive the four digit code shown to the user from a base64 digest.
///
/// SHA-256 over the decoded digest, last two bytes as a big-endian integer,
/// modulo 10000. Independent of the algorithm that produced the digest.
pub fn verification_code(digest: &str) -> Result<String> {
    let decoded = STANDARD
        .decode(digest)
        .map_err(|e| Error::Validation(format!("Digest is not valid base64: {e}")))?;
    let hashed = HashAlg::Sha256.hash(decoded)?;
    let tail = [hashed[hashed.len() - 2], hashed[hashed.len() - 1]];
    let code = u16::from_be_bytes(tail) % 10_000;

    Ok(format!("{code:04}"))
}

use crate::crypto::errors::{CryptoResult, Error};
use rand::{TryRngCore, rngs::OsRng};

/// Fill `buf` from the operating system CSPRNG
pub fn fill_random_bytes(buf: &mut [u8]) -> CryptoResult<()> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| Error::Random(e.to_string()))
}

/// Convert hex string to bytes with validation
pub fn hex_to_bytes(hex_str: &str) -> CryptoResult<Vec<u8>> {
    // Remove common prefixes and whitespace
    let cleaned = hex_str
        .trim()
        .strip_prefix("0x")
        .or_else(|| hex_str.trim().strip_prefix("0X"))
        .unwrap_or(hex_str.trim());

    Ok(hex::decode(cleaned)?)
}

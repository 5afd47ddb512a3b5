//! Collaborator interfaces the protocol engine depends on.
//!
//! The engine never talks to the network, the random source, the signature
//! primitive or the X.509 parser directly; the default adapters live in
//! [`crate::adapters`] and [`crate::crypto`].

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::crypto::{self, SignatureAlgorithm, SignedData};
use crate::protocol::certificate::{CertificateError, ParsedCertificate};
use crate::protocol::error::Error as ProtocolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A single JSON request towards the provider
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
    /// Upper bound for this request alone, independent of any poll interval
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn json(status: u16, body: &Value) -> Self {
        Self {
            status,
            body: body.to_string().into_bytes(),
        }
    }

    /// Anything but a `200` carrying a JSON object is an invalid response.
    pub fn into_json_object(self) -> Result<Map<String, Value>, ProtocolError> {
        if self.status != 200 {
            return Err(ProtocolError::InvalidResponse(format!(
                "unexpected HTTP status {}",
                self.status
            )));
        }
        match serde_json::from_slice::<Value>(&self.body) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(ProtocolError::InvalidResponse(
                "body is not a JSON object".to_string(),
            )),
            Err(e) => Err(ProtocolError::InvalidResponse(format!("body is not JSON: {e}"))),
        }
    }
}

/// Network level failures. Non-200 answers are not transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("HTTP error: {0}")]
    Other(String),
}

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

pub trait RandomSource: Send + Sync + 'static {
    /// Fill `buf` completely or fail; partial fills are never used.
    fn fill(&self, buf: &mut [u8]) -> Result<(), crypto::Error>;
}

/// Operating system CSPRNG
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill(&self, buf: &mut [u8]) -> Result<(), crypto::Error> {
        crypto::fill_random_bytes(buf)
    }
}

pub trait SignatureVerifier: Send + Sync + 'static {
    /// Verify `signature` over `signed` with the public key of the DER
    /// encoded certificate.
    fn verify(
        &self,
        algorithm: SignatureAlgorithm,
        certificate_der: &[u8],
        signed: SignedData<'_>,
        signature: &[u8],
    ) -> Result<bool, crypto::Error>;
}

pub trait CertificateParser: Send + Sync + 'static {
    fn parse(&self, certificate_der: &[u8]) -> Result<ParsedCertificate, CertificateError>;
}

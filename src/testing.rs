//! Fixtures for exercising the protocol without a live provider.
//!
//! [`TestIdentity`] generates a throwaway signer certificate shaped like the
//! ones the provider issues, and [`FakeProvider`] answers the relying-party
//! API from memory, signing whatever digest it is sent.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{Duration, Utc};
use openssl::asn1::{Asn1Integer, Asn1Time};
use openssl::bn::{BigNum, MsbOption};
use openssl::error::ErrorStack;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::pkey_ctx::PkeyCtx;
use openssl::rsa::{Padding, Rsa};
use openssl::sign::Signer;
use openssl::x509::extension::{BasicConstraints, KeyUsage};
use openssl::x509::{X509, X509Builder, X509Name, X509NameBuilder};
use serde_json::{Value, json};

use crate::crypto::{HashAlg, SignatureAlgorithm};
use crate::protocol::ports::{HttpRequest, HttpResponse, Method, Transport, TransportError};

pub const TEST_COUNTRY: &str = "EE";
pub const TEST_NATIONAL_ID: &str = "10101010005";
pub const TEST_GIVEN_NAME: &str = "JOHN";
pub const TEST_SURNAME: &str = "SMITH";
pub const TEST_SERIAL_NUMBER: &str = "PNOEE-10101010005";
pub const TEST_COMMON_NAME: &str = "SMITH,JOHN,PNOEE-10101010005";
pub const TEST_SIGNATURE_ALGORITHM: &str = "sha512WithRSAEncryption";

/// A signer key pair and its certificate
#[derive(Clone)]
pub struct TestIdentity {
    pub key: PKey<Private>,
    pub cert_der: Vec<u8>,
}

impl TestIdentity {
    /// Certificate valid from yesterday for a year
    pub fn valid() -> Result<Self, ErrorStack> {
        Self::with_validity(Duration::days(-1), Duration::days(365))
    }

    /// Certificate whose validity window starts tomorrow
    pub fn not_yet_valid() -> Result<Self, ErrorStack> {
        Self::with_validity(Duration::days(1), Duration::days(365))
    }

    /// Certificate whose validity window ended yesterday
    pub fn expired() -> Result<Self, ErrorStack> {
        Self::with_validity(Duration::days(-365), Duration::days(-1))
    }

    /// Certificate valid between `now + not_before` and `now + not_after`
    pub fn with_validity(not_before: Duration, not_after: Duration) -> Result<Self, ErrorStack> {
        let rsa = Rsa::generate(2048)?;
        let key = PKey::from_rsa(rsa)?;

        let mut cert_builder = X509Builder::new()?;
        cert_builder.set_version(2)?;
        let serial = generate_serial_number()?;
        cert_builder.set_serial_number(&serial)?;

        let subject_name = create_x509_name(&[
            (Nid::COUNTRYNAME, TEST_COUNTRY),
            (Nid::SURNAME, TEST_SURNAME),
            (Nid::GIVENNAME, TEST_GIVEN_NAME),
            (Nid::SERIALNUMBER, TEST_SERIAL_NUMBER),
            (Nid::COMMONNAME, TEST_COMMON_NAME),
        ])?;
        let issuer_name = create_x509_name(&[
            (Nid::COUNTRYNAME, TEST_COUNTRY),
            (Nid::ORGANIZATIONNAME, "Test Trust Services"),
            (Nid::COMMONNAME, "TEST of Smart-ID issuing CA"),
        ])?;
        cert_builder.set_subject_name(&subject_name)?;
        cert_builder.set_issuer_name(&issuer_name)?;
        cert_builder.set_pubkey(&key)?;

        let now = Utc::now();
        let not_before = Asn1Time::from_unix((now + not_before).timestamp() as _)?;
        let not_after = Asn1Time::from_unix((now + not_after).timestamp() as _)?;
        cert_builder.set_not_before(&not_before)?;
        cert_builder.set_not_after(&not_after)?;

        cert_builder.append_extension(BasicConstraints::new().build()?)?;
        cert_builder.append_extension(
            KeyUsage::new()
                .critical()
                .digital_signature()
                .non_repudiation()
                .build()?,
        )?;
        cert_builder.sign(&key, MessageDigest::sha256())?;

        let cert: X509 = cert_builder.build();
        Ok(Self {
            key,
            cert_der: cert.to_der()?,
        })
    }

    /// Base64 DER, as carried in the `cert.value` response field
    pub fn cert_base64(&self) -> String {
        STANDARD.encode(&self.cert_der)
    }

    /// Hash `data` with the algorithm's digest and sign it
    pub fn sign_message(
        &self,
        algorithm: SignatureAlgorithm,
        data: &[u8],
    ) -> Result<Vec<u8>, ErrorStack> {
        let mut signer = Signer::new(algorithm.hash.into(), &self.key)?;
        signer.set_rsa_padding(Padding::PKCS1)?;
        signer.update(data)?;
        signer.sign_to_vec()
    }

    /// Sign an already computed digest, as the provider does with the `hash` it receives
    pub fn sign_prehashed(
        &self,
        algorithm: SignatureAlgorithm,
        digest: &[u8],
    ) -> Result<Vec<u8>, ErrorStack> {
        let mut ctx = PkeyCtx::new(&self.key)?;
        ctx.sign_init()?;
        ctx.set_rsa_padding(Padding::PKCS1)?;
        ctx.set_signature_md(algorithm.hash.md())?;
        let mut signature = Vec::new();
        ctx.sign_to_vec(digest, &mut signature)?;
        Ok(signature)
    }
}

fn generate_serial_number() -> Result<Asn1Integer, ErrorStack> {
    let mut serial = BigNum::new()?;
    serial.rand(159, MsbOption::MAYBE_ZERO, false)?;
    serial.to_asn1_integer()
}

fn create_x509_name(entries: &[(Nid, &str)]) -> Result<X509Name, ErrorStack> {
    let mut name_builder = X509NameBuilder::new()?;
    for (nid, value) in entries {
        name_builder.append_entry_by_nid(*nid, value)?;
    }
    Ok(name_builder.build())
}

#[derive(Debug, Default)]
struct ProviderState {
    submissions: Vec<Value>,
    digest: Option<(HashAlg, Vec<u8>)>,
    status_queries: usize,
}

/// In-memory stand-in for the provider's relying-party API.
///
/// Accepts one submission, answers `RUNNING` for the configured number of
/// status queries and then completes with the configured end result.
pub struct FakeProvider {
    identity: TestIdentity,
    session_id: String,
    running_polls: usize,
    end_result: String,
    certificate_level: String,
    tamper_signature: bool,
    state: Mutex<ProviderState>,
}

impl FakeProvider {
    pub fn new(identity: TestIdentity) -> Self {
        Self {
            identity,
            session_id: "abc123".to_string(),
            running_polls: 0,
            end_result: "OK".to_string(),
            certificate_level: "QUALIFIED".to_string(),
            tamper_signature: false,
            state: Mutex::new(ProviderState::default()),
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    /// Number of status queries answered with `RUNNING` before completing
    pub fn with_running_polls(mut self, running_polls: usize) -> Self {
        self.running_polls = running_polls;
        self
    }

    pub fn with_end_result(mut self, end_result: impl Into<String>) -> Self {
        self.end_result = end_result.into();
        self
    }

    pub fn with_certificate_level(mut self, level: impl Into<String>) -> Self {
        self.certificate_level = level.into();
        self
    }

    /// Flip one byte of the returned signature
    pub fn with_tampered_signature(mut self) -> Self {
        self.tamper_signature = true;
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn identity(&self) -> &TestIdentity {
        &self.identity
    }

    pub fn status_queries(&self) -> usize {
        self.lock().status_queries
    }

    pub fn submissions(&self) -> Vec<Value> {
        self.lock().submissions.clone()
    }

    /// Handle an authentication or signature submission body
    pub fn submit(&self, body: &Value) -> (u16, Value) {
        let hash_alg = body
            .get("hashType")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<HashAlg>().ok());
        let digest = body
            .get("hash")
            .and_then(Value::as_str)
            .and_then(|s| STANDARD.decode(s).ok());

        let mut state = self.lock();
        state.submissions.push(body.clone());
        match (hash_alg, digest) {
            (Some(alg), Some(digest)) => {
                state.digest = Some((alg, digest));
                (200, json!({ "sessionID": self.session_id }))
            }
            _ => (400, json!({ "title": "Bad Request" })),
        }
    }

    /// Handle a session status query
    pub fn status(&self) -> (u16, Value) {
        let mut state = self.lock();
        state.status_queries += 1;
        if state.status_queries <= self.running_polls {
            return (200, json!({ "state": "RUNNING" }));
        }

        if self.end_result != "OK" {
            return (
                200,
                json!({ "state": "COMPLETE", "result": { "endResult": self.end_result } }),
            );
        }

        let Some((hash_alg, digest)) = state.digest.clone() else {
            return (404, json!({ "title": "Not Found" }));
        };
        let algorithm = SignatureAlgorithm {
            hash: hash_alg,
            scheme: crate::crypto::SignatureScheme::RsaPkcs1,
        };
        let mut signature = match self.identity.sign_prehashed(algorithm, &digest) {
            Ok(signature) => signature,
            Err(_) => return (500, json!({ "title": "Internal Server Error" })),
        };
        if self.tamper_signature {
            signature[10] ^= 0x01;
        }

        (
            200,
            json!({
                "state": "COMPLETE",
                "result": {
                    "endResult": "OK",
                    "documentNumber": format!("{TEST_SERIAL_NUMBER}-Q")
                },
                "signature": {
                    "algorithm": algorithm.to_string(),
                    "value": STANDARD.encode(&signature)
                },
                "cert": {
                    "value": self.identity.cert_base64(),
                    "certificateLevel": self.certificate_level
                }
            }),
        )
    }

    fn lock(&self) -> MutexGuard<'_, ProviderState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Transport for FakeProvider {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let (status, body) = match request.method {
            Method::Post => self.submit(request.body.as_ref().unwrap_or(&Value::Null)),
            Method::Get => self.status(),
        };
        Ok(HttpResponse::json(status, &body))
    }
}

/// Transport answering every request with a closure, recording what was sent
pub struct FnTransport<F> {
    handler: F,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
}

impl<F> FnTransport<F>
where
    F: Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync + 'static,
{
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl<F> Transport for FnTransport<F>
where
    F: Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync + 'static,
{
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let response = (self.handler)(&request);
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);
        response
    }
}

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::adapters::{ReqwestTransport, X509CertificateParser};
use crate::config::{Config, ProviderConfig, RelyingPartyConfig};
use crate::crypto::{OpenSslVerifier, SignedData};
use crate::protocol::cancel::CancelSignal;
use crate::protocol::challenge::{Challenge, DocumentDigest, generate_challenge, verification_code};
use crate::protocol::error::{Error, Result};
use crate::protocol::models::{DeniedSession, SessionKind, SessionOutcome};
use crate::protocol::poller::SessionPoller;
use crate::protocol::ports::{
    CertificateParser, OsRandom, RandomSource, SignatureVerifier, Transport,
};
use crate::protocol::submitter::{RequestSubmitter, SubmissionTarget};
use crate::protocol::verify::ResponseVerifier;

/// What the provider was asked to sign, kept to verify the answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignedPayload {
    Challenge(Challenge),
    Digest(DocumentDigest),
}

impl SignedPayload {
    /// Authentication signatures are checked over the raw challenge, never
    /// its digest. Document signatures are checked over the caller's digest.
    fn signed_data(&self) -> SignedData<'_> {
        match self {
            SignedPayload::Challenge(challenge) => SignedData::Message(challenge.raw()),
            SignedPayload::Digest(digest) => SignedData::Prehashed(digest.bytes()),
        }
    }
}

/// An accepted request awaiting the user's answer.
///
/// Awaiting consumes the session, so it is polled by one caller at a time and
/// not again once an outcome was produced.
#[derive(Debug)]
pub struct Session {
    id: String,
    verification_code: String,
    kind: SessionKind,
    payload: SignedPayload,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Four digit code to show the user so they can match it on their device
    pub fn verification_code(&self) -> &str {
        &self.verification_code
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    pub fn payload(&self) -> &SignedPayload {
        &self.payload
    }
}

/// How to wait for a session result
#[derive(Debug, Clone, Default)]
pub struct AwaitOptions {
    /// Overall deadline; the configured session timeout when unset
    pub timeout: Option<Duration>,
    pub cancel: Option<CancelSignal>,
    /// Raise a non-`OK` end result as [`Error::AuthenticationDenied`]
    pub reject_on_denied: bool,
}

impl AwaitOptions {
    pub fn new(reject_on_denied: bool) -> Self {
        Self {
            reject_on_denied,
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Relying-party client for remote authentication and signing
#[derive(Clone)]
pub struct SmartIdClient {
    provider: ProviderConfig,
    relying_party: Arc<RelyingPartyConfig>,
    transport: Arc<dyn Transport>,
    random: Arc<dyn RandomSource>,
    signatures: Arc<dyn SignatureVerifier>,
    certificates: Arc<dyn CertificateParser>,
}

impl SmartIdClient {
    pub fn new(config: Config) -> Result<Self> {
        config.provider.validate().map_err(Error::Configuration)?;
        let relying_party = config.relying_party.ok_or_else(|| {
            Error::Configuration("Relying party UUID and name are required".to_string())
        })?;
        if relying_party.name.trim().is_empty() {
            return Err(Error::Configuration(
                "Relying party name cannot be empty".to_string(),
            ));
        }

        let transport = ReqwestTransport::new().map_err(|e| Error::Configuration(e.to_string()))?;

        Ok(Self {
            provider: config.provider,
            relying_party: Arc::new(relying_party),
            transport: Arc::new(transport),
            random: Arc::new(OsRandom),
            signatures: Arc::new(OpenSslVerifier),
            certificates: Arc::new(X509CertificateParser),
        })
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_random(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = random;
        self
    }

    pub fn with_signature_verifier(mut self, signatures: Arc<dyn SignatureVerifier>) -> Self {
        self.signatures = signatures;
        self
    }

    pub fn with_certificate_parser(mut self, certificates: Arc<dyn CertificateParser>) -> Self {
        self.certificates = certificates;
        self
    }

    /// Start authenticating the person with `national_id` in `country`.
    ///
    /// A fresh challenge is drawn for every call.
    pub async fn authenticate(
        &self,
        country: &str,
        national_id: &str,
        display_text: Option<&str>,
    ) -> Result<Session> {
        let country = require("country", country)?.to_uppercase();
        let national_id = require("national identity number", national_id)?;

        let challenge = generate_challenge(self.random.as_ref(), self.provider.hash_algorithm)?;
        let code = verification_code(challenge.digest())?;

        let id = self
            .submitter()
            .submit(
                SubmissionTarget::NationalIdentity {
                    country: &country,
                    national_id,
                },
                challenge.digest(),
                challenge.algorithm(),
                display_text,
            )
            .await?;

        info!("Authentication session {} started for {}", id, country);
        Ok(Session {
            id,
            verification_code: code,
            kind: SessionKind::Authentication,
            payload: SignedPayload::Challenge(challenge),
        })
    }

    /// Ask the holder of `document_number` to sign `digest`.
    pub async fn sign(
        &self,
        document_number: &str,
        digest: DocumentDigest,
        display_text: Option<&str>,
    ) -> Result<Session> {
        let document_number = require("document number", document_number)?;

        let encoded = digest.to_base64();
        let code = verification_code(&encoded)?;

        let id = self
            .submitter()
            .submit(
                SubmissionTarget::Document { document_number },
                &encoded,
                digest.algorithm(),
                display_text,
            )
            .await?;

        info!("Signature session {} started", id);
        Ok(Session {
            id,
            verification_code: code,
            kind: SessionKind::Signature,
            payload: SignedPayload::Digest(digest),
        })
    }

    /// Wait for `session` within the configured session timeout.
    pub async fn await_result(
        &self,
        session: Session,
        reject_on_denied: bool,
    ) -> Result<SessionOutcome> {
        self.await_result_with(session, AwaitOptions::new(reject_on_denied))
            .await
    }

    /// Wait for `session`, then verify the signature and certificate of an
    /// `OK` answer. Denials are returned as [`SessionOutcome::Denied`] unless
    /// `reject_on_denied` is set.
    pub async fn await_result_with(
        &self,
        session: Session,
        options: AwaitOptions,
    ) -> Result<SessionOutcome> {
        let timeout = options
            .timeout
            .unwrap_or_else(|| self.provider.session_timeout());
        // A timeout beyond the clock's range means no deadline at all
        let deadline = Instant::now().checked_add(timeout);
        if deadline.is_none() {
            debug!("Session {} awaited without a deadline", session.id);
        }

        let status = self
            .poller()
            .poll_until(&session.id, deadline, options.cancel)
            .await?;

        let end_result = status
            .result
            .as_ref()
            .map(|result| result.end_result.clone())
            .ok_or(Error::EmptyResult)?;
        if !end_result.is_ok() {
            if options.reject_on_denied {
                warn!("Session {} denied: {}", session.id, end_result);
                return Err(Error::AuthenticationDenied(end_result));
            }
            info!("Session {} ended with {}", session.id, end_result);
            return Ok(SessionOutcome::Denied(DeniedSession { end_result, status }));
        }

        let verified = ResponseVerifier::new(
            self.signatures.clone(),
            self.certificates.clone(),
            self.relying_party.certificate_level,
        )
        .verify(status, session.payload.signed_data(), Utc::now())?;

        info!("Session {} verified", session.id);
        Ok(SessionOutcome::Verified(verified))
    }

    fn submitter(&self) -> RequestSubmitter {
        RequestSubmitter::new(
            self.transport.clone(),
            &self.provider.host,
            self.provider.request_timeout(),
            self.relying_party.clone(),
        )
    }

    fn poller(&self) -> SessionPoller {
        SessionPoller::new(
            self.transport.clone(),
            &self.provider.host,
            self.provider.poll_interval(),
            self.provider.status_timeout(),
        )
    }
}

fn require<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::Validation(format!("{field} is required")));
    }
    Ok(value)
}

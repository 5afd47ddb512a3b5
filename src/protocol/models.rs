//! Wire models of the relying-party API and the values handed to callers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::protocol::certificate::SubjectFields;

/// Terminal outcome code reported by the provider, kept verbatim
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EndResult {
    Ok,
    UserRefused,
    Timeout,
    DocumentUnusable,
    WrongVc,
    Other(String),
}

impl EndResult {
    pub fn as_str(&self) -> &str {
        match self {
            EndResult::Ok => "OK",
            EndResult::UserRefused => "USER_REFUSED",
            EndResult::Timeout => "TIMEOUT",
            EndResult::DocumentUnusable => "DOCUMENT_UNUSABLE",
            EndResult::WrongVc => "WRONG_VC",
            EndResult::Other(code) => code,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, EndResult::Ok)
    }
}

impl From<String> for EndResult {
    fn from(value: String) -> Self {
        match value.as_str() {
            "OK" => EndResult::Ok,
            "USER_REFUSED" => EndResult::UserRefused,
            "TIMEOUT" => EndResult::Timeout,
            "DOCUMENT_UNUSABLE" => EndResult::DocumentUnusable,
            "WRONG_VC" => EndResult::WrongVc,
            _ => EndResult::Other(value),
        }
    }
}

impl From<&str> for EndResult {
    fn from(value: &str) -> Self {
        value.to_string().into()
    }
}

impl From<EndResult> for String {
    fn from(value: EndResult) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for EndResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Certificate level requested by the relying party, weakest first
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CertificateLevel {
    Advanced,
    #[default]
    Qualified,
}

impl CertificateLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            CertificateLevel::Advanced => "ADVANCED",
            CertificateLevel::Qualified => "QUALIFIED",
        }
    }
}

impl FromStr for CertificateLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADVANCED" => Ok(CertificateLevel::Advanced),
            "QUALIFIED" => Ok(CertificateLevel::Qualified),
            _ => Err(format!("Unknown certificate level {s}")),
        }
    }
}

impl fmt::Display for CertificateLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Poll state derived from the `state` field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Running,
    Complete,
    Unknown(String),
}

/// Session status snapshot as returned by `GET /session/{id}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<SessionResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<SessionSignature>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert: Option<SessionCertificate>,
}

impl SessionStatus {
    /// A missing `state` means the session is complete.
    pub fn state(&self) -> SessionState {
        match self.state.as_deref() {
            None | Some("COMPLETE") => SessionState::Complete,
            Some("RUNNING") => SessionState::Running,
            Some(other) => SessionState::Unknown(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResult {
    pub end_result: EndResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSignature {
    pub algorithm: String,
    /// Base64 signature value
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCertificate {
    /// Base64 DER, i.e. a PEM body without the armor lines
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_level: Option<String>,
}

/// What a session was opened for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Authentication,
    Signature,
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionKind::Authentication => f.write_str("authentication"),
            SessionKind::Signature => f.write_str("signature"),
        }
    }
}

/// Identity released after the signature and certificate checks passed
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedIdentity {
    pub end_result: EndResult,
    pub subject: SubjectFields,
    pub document_number: Option<String>,
    pub status: SessionStatus,
}

/// A session the provider completed without `OK`
#[derive(Debug, Clone, PartialEq)]
pub struct DeniedSession {
    pub end_result: EndResult,
    pub status: SessionStatus,
}

/// Result of awaiting a session when denials are not raised as errors
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Verified(VerifiedIdentity),
    Denied(DeniedSession),
}

impl SessionOutcome {
    pub fn end_result(&self) -> &EndResult {
        match self {
            SessionOutcome::Verified(identity) => &identity.end_result,
            SessionOutcome::Denied(denied) => &denied.end_result,
        }
    }

    pub fn verified(&self) -> Option<&VerifiedIdentity> {
        match self {
            SessionOutcome::Verified(identity) => Some(identity),
            SessionOutcome::Denied(_) => None,
        }
    }
}

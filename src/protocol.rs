//! Relying-party side of the remote authentication and signing protocol.
//!
//! A session goes through submission, polling and verification:
//! [`SmartIdClient::authenticate`] or [`SmartIdClient::sign`] hand the
//! provider a digest and return a [`Session`];
//! [`SmartIdClient::await_result`] polls it to completion and releases the
//! signer's identity only after the signature and certificate checks pass.

pub mod cancel;
pub mod certificate;
pub mod challenge;
mod client;
pub mod error;
pub mod models;
pub mod poller;
pub mod ports;
pub mod submitter;
pub mod verify;

pub use cancel::{CancelHandle, CancelSignal, cancellation};
pub use certificate::{SemanticsIdentifier, SubjectFields};
pub use challenge::{Challenge, DocumentDigest, generate_challenge, verification_code};
pub use client::{AwaitOptions, Session, SignedPayload, SmartIdClient};
pub use error::{Error, Result};
pub use models::{
    CertificateLevel, DeniedSession, EndResult, SessionKind, SessionOutcome, SessionStatus,
    VerifiedIdentity,
};

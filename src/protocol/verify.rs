use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::crypto::{SignatureAlgorithm, SignedData};
use crate::protocol::certificate;
use crate::protocol::error::{Error, Result};
use crate::protocol::models::{CertificateLevel, SessionStatus, VerifiedIdentity};
use crate::protocol::ports::{CertificateParser, SignatureVerifier};

const PEM_ARMOR: &str = "-----";

/// Signature then certificate checks over a completed `OK` session
#[derive(Clone)]
pub struct ResponseVerifier {
    signatures: Arc<dyn SignatureVerifier>,
    certificates: Arc<dyn CertificateParser>,
    required_level: CertificateLevel,
}

impl ResponseVerifier {
    pub fn new(
        signatures: Arc<dyn SignatureVerifier>,
        certificates: Arc<dyn CertificateParser>,
        required_level: CertificateLevel,
    ) -> Self {
        Self {
            signatures,
            certificates,
            required_level,
        }
    }

    /// Verify the provider's signature over `signed`, then the certificate
    /// at `now`. The subject is read only after the signature verified.
    pub fn verify(
        &self,
        status: SessionStatus,
        signed: SignedData<'_>,
        now: DateTime<Utc>,
    ) -> Result<VerifiedIdentity> {
        let result = status.result.clone().ok_or(Error::EmptyResult)?;
        if !result.end_result.is_ok() {
            return Err(Error::AuthenticationDenied(result.end_result));
        }

        let signature = status
            .signature
            .as_ref()
            .ok_or_else(|| Error::InvalidResponse("missing signature".to_string()))?;
        let cert = status
            .cert
            .as_ref()
            .ok_or_else(|| Error::InvalidResponse("missing certificate".to_string()))?;

        let algorithm: SignatureAlgorithm = signature
            .algorithm
            .parse()
            .map_err(|e| Error::InvalidResponse(format!("{e}")))?;
        let signature_bytes = STANDARD
            .decode(signature.value.trim())
            .map_err(|e| Error::InvalidResponse(format!("signature is not base64: {e}")))?;
        let cert_der = decode_certificate(&cert.value)?;

        match self
            .signatures
            .verify(algorithm, &cert_der, signed, &signature_bytes)
        {
            Ok(true) => debug!("Signature verified with {algorithm}"),
            Ok(false) => {
                warn!("Signature verification failed with {algorithm}");
                return Err(Error::SignatureInvalid);
            }
            Err(e) => {
                warn!("Signature verification error with {algorithm}: {e}");
                return Err(Error::SignatureInvalid);
            }
        }

        if let Some(level) = cert.certificate_level.as_deref() {
            let actual: CertificateLevel = level.parse().map_err(Error::InvalidResponse)?;
            if actual < self.required_level {
                return Err(Error::CertificateLevelMismatch {
                    required: self.required_level,
                    actual,
                });
            }
        }

        let parsed = self.certificates.parse(&cert_der)?;
        let subject = certificate::validate(parsed, now)?;

        Ok(VerifiedIdentity {
            end_result: result.end_result,
            subject,
            document_number: result.document_number,
            status,
        })
    }
}

/// Accept the bare base64 body the provider sends, or a full PEM block.
fn decode_certificate(value: &str) -> Result<Vec<u8>> {
    let body: String = value
        .lines()
        .filter(|line| !line.starts_with(PEM_ARMOR))
        .flat_map(|line| line.chars())
        .filter(|c| !c.is_whitespace())
        .collect();

    STANDARD
        .decode(body)
        .map_err(|e| Error::InvalidResponse(format!("certificate is not base64: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::X509CertificateParser;
    use crate::crypto::{HashAlg, OpenSslVerifier};
    use crate::protocol::models::{EndResult, SessionCertificate, SessionResult, SessionSignature};
    use crate::testing::{TEST_SERIAL_NUMBER, TEST_SIGNATURE_ALGORITHM, TestIdentity};

    fn verifier(level: CertificateLevel) -> ResponseVerifier {
        ResponseVerifier::new(
            Arc::new(OpenSslVerifier),
            Arc::new(X509CertificateParser),
            level,
        )
    }

    fn signed_status(identity: &TestIdentity, raw: &[u8], level: &str) -> SessionStatus {
        let algorithm: SignatureAlgorithm = TEST_SIGNATURE_ALGORITHM.parse().unwrap();
        let signature = identity.sign_message(algorithm, raw).unwrap();
        SessionStatus {
            state: Some("COMPLETE".to_string()),
            result: Some(SessionResult {
                end_result: EndResult::Ok,
                document_number: None,
            }),
            signature: Some(SessionSignature {
                algorithm: TEST_SIGNATURE_ALGORITHM.to_string(),
                value: STANDARD.encode(signature),
            }),
            cert: Some(SessionCertificate {
                value: identity.cert_base64(),
                certificate_level: Some(level.to_string()),
            }),
        }
    }

    #[test]
    fn test_valid_signature_and_certificate() {
        let identity = TestIdentity::valid().unwrap();
        let raw = [7u8; 64];
        let status = signed_status(&identity, &raw, "QUALIFIED");

        let verified = verifier(CertificateLevel::Qualified)
            .verify(status, SignedData::Message(&raw), Utc::now())
            .unwrap();
        assert_eq!(verified.end_result, EndResult::Ok);
        assert_eq!(
            verified.subject.serial_number.as_deref(),
            Some(TEST_SERIAL_NUMBER)
        );
    }

    #[test]
    fn test_flipped_signature_byte_is_rejected() {
        let identity = TestIdentity::valid().unwrap();
        let raw = [7u8; 64];
        let mut status = signed_status(&identity, &raw, "QUALIFIED");

        let signature = status.signature.as_mut().unwrap();
        let mut bytes = STANDARD.decode(&signature.value).unwrap();
        bytes[0] ^= 0x01;
        signature.value = STANDARD.encode(bytes);

        let result = verifier(CertificateLevel::Qualified).verify(
            status,
            SignedData::Message(&raw),
            Utc::now(),
        );
        assert!(matches!(result, Err(Error::SignatureInvalid)));
    }

    #[test]
    fn test_signature_over_digest_instead_of_raw_is_rejected() {
        let identity = TestIdentity::valid().unwrap();
        let raw = [7u8; 64];
        let status = signed_status(&identity, &raw, "QUALIFIED");
        let digest = HashAlg::Sha512.hash(raw).unwrap();

        let result = verifier(CertificateLevel::Qualified).verify(
            status,
            SignedData::Message(&digest),
            Utc::now(),
        );
        assert!(matches!(result, Err(Error::SignatureInvalid)));
    }

    #[test]
    fn test_signature_checked_before_certificate_validity() {
        let identity = TestIdentity::expired().unwrap();
        let raw = [7u8; 64];
        let mut status = signed_status(&identity, &raw, "QUALIFIED");
        status.signature.as_mut().unwrap().value = STANDARD.encode([0u8; 256]);

        let result = verifier(CertificateLevel::Qualified).verify(
            status,
            SignedData::Message(&raw),
            Utc::now(),
        );
        assert!(matches!(result, Err(Error::SignatureInvalid)));
    }

    #[test]
    fn test_expired_certificate() {
        let identity = TestIdentity::expired().unwrap();
        let raw = [7u8; 64];
        let status = signed_status(&identity, &raw, "QUALIFIED");

        let result = verifier(CertificateLevel::Qualified).verify(
            status,
            SignedData::Message(&raw),
            Utc::now(),
        );
        assert!(matches!(result, Err(Error::CertificateExpired { .. })));
    }

    #[test]
    fn test_not_yet_valid_certificate() {
        let identity = TestIdentity::not_yet_valid().unwrap();
        let raw = [7u8; 64];
        let status = signed_status(&identity, &raw, "QUALIFIED");

        let result = verifier(CertificateLevel::Qualified).verify(
            status,
            SignedData::Message(&raw),
            Utc::now(),
        );
        assert!(matches!(result, Err(Error::CertificateNotYetValid { .. })));
    }

    #[test]
    fn test_certificate_level_below_required() {
        let identity = TestIdentity::valid().unwrap();
        let raw = [7u8; 64];
        let status = signed_status(&identity, &raw, "ADVANCED");

        let result = verifier(CertificateLevel::Qualified).verify(
            status.clone(),
            SignedData::Message(&raw),
            Utc::now(),
        );
        assert!(matches!(
            result,
            Err(Error::CertificateLevelMismatch {
                required: CertificateLevel::Qualified,
                actual: CertificateLevel::Advanced,
            })
        ));

        assert!(
            verifier(CertificateLevel::Advanced)
                .verify(status, SignedData::Message(&raw), Utc::now())
                .is_ok()
        );
    }

    #[test]
    fn test_missing_signature_is_invalid_response() {
        let identity = TestIdentity::valid().unwrap();
        let raw = [7u8; 64];
        let mut status = signed_status(&identity, &raw, "QUALIFIED");
        status.signature = None;

        let result = verifier(CertificateLevel::Qualified).verify(
            status,
            SignedData::Message(&raw),
            Utc::now(),
        );
        assert!(matches!(result, Err(Error::InvalidResponse(_))));
    }

    #[test]
    fn test_unsupported_algorithm_is_invalid_response() {
        let identity = TestIdentity::valid().unwrap();
        let raw = [7u8; 64];
        let mut status = signed_status(&identity, &raw, "QUALIFIED");
        status.signature.as_mut().unwrap().algorithm = "md5WithRSAEncryption".to_string();

        let result = verifier(CertificateLevel::Qualified).verify(
            status,
            SignedData::Message(&raw),
            Utc::now(),
        );
        assert!(matches!(result, Err(Error::InvalidResponse(_))));
    }

    #[test]
    fn test_decode_pem_wrapped_certificate() {
        let identity = TestIdentity::valid().unwrap();
        let body = identity.cert_base64();
        let wrapped: Vec<String> = body
            .as_bytes()
            .chunks(64)
            .map(|c| String::from_utf8_lossy(c).to_string())
            .collect();
        let pem = format!(
            "-----BEGIN CERTIFICATE-----\n{}\n-----END CERTIFICATE-----",
            wrapped.join("\n")
        );
        assert_eq!(decode_certificate(&pem).unwrap(), identity.cert_der);
        assert_eq!(decode_certificate(&body).unwrap(), identity.cert_der);
    }
}

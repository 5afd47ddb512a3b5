use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::protocol::error::{Error, Result};

#[derive(Debug, thiserror::Error)]
pub enum CertificateError {
    #[error("Failed to parse X.509 certificate: {0}")]
    Parse(String),

    #[error("Certificate validity time out of range")]
    InvalidTime,
}

/// Identity attributes of the certificate subject DN
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectFields {
    pub common_name: Option<String>,
    pub given_name: Option<String>,
    pub surname: Option<String>,
    pub country: Option<String>,
    /// Raw `serialNumber` attribute, e.g. `PNOEE-10101010005`
    pub serial_number: Option<String>,
}

impl SubjectFields {
    pub fn semantics_identifier(&self) -> Option<SemanticsIdentifier> {
        self.serial_number.as_deref().map(SemanticsIdentifier::parse)
    }

    /// The national identifier without the `PNOxx-` prefix
    pub fn national_identifier(&self) -> Option<String> {
        self.semantics_identifier().map(|id| id.identifier)
    }
}

/// Natural person identifier as encoded in the subject `serialNumber`
/// (ETSI EN 319 412-1): three letter type, two letter country, `-`, value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticsIdentifier {
    pub identity_type: Option<String>,
    pub country: Option<String>,
    pub identifier: String,
}

impl SemanticsIdentifier {
    pub fn parse(serial_number: &str) -> Self {
        let structured = serial_number.split_once('-').filter(|(prefix, _)| {
            prefix.len() == 5 && prefix.chars().all(|c| c.is_ascii_uppercase())
        });

        match structured {
            Some((prefix, identifier)) => Self {
                identity_type: Some(prefix[..3].to_string()),
                country: Some(prefix[3..].to_string()),
                identifier: identifier.to_string(),
            },
            None => Self {
                identity_type: None,
                country: None,
                identifier: serial_number.to_string(),
            },
        }
    }
}

/// The parts of a signer certificate the protocol looks at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCertificate {
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub subject: SubjectFields,
}

/// Check the validity window at `now` and release the subject.
///
/// Only call this with a certificate whose signature already verified.
pub fn validate(certificate: ParsedCertificate, now: DateTime<Utc>) -> Result<SubjectFields> {
    if now < certificate.not_before {
        return Err(Error::CertificateNotYetValid {
            not_before: certificate.not_before,
        });
    }
    if now > certificate.not_after {
        return Err(Error::CertificateExpired {
            not_after: certificate.not_after,
        });
    }

    debug!(
        "Certificate valid from {} to {}",
        certificate.not_before, certificate.not_after
    );
    Ok(certificate.subject)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn fixture(not_before: Duration, not_after: Duration) -> ParsedCertificate {
        let now = Utc::now();
        ParsedCertificate {
            not_before: now + not_before,
            not_after: now + not_after,
            subject: SubjectFields {
                common_name: Some("SMITH,JOHN,PNOEE-10101010005".to_string()),
                given_name: Some("JOHN".to_string()),
                surname: Some("SMITH".to_string()),
                country: Some("EE".to_string()),
                serial_number: Some("PNOEE-10101010005".to_string()),
            },
        }
    }

    #[test]
    fn test_not_yet_valid() {
        let cert = fixture(Duration::days(1), Duration::days(30));
        assert!(matches!(
            validate(cert, Utc::now()),
            Err(Error::CertificateNotYetValid { .. })
        ));
    }

    #[test]
    fn test_expired() {
        let cert = fixture(Duration::days(-30), Duration::days(-1));
        assert!(matches!(
            validate(cert, Utc::now()),
            Err(Error::CertificateExpired { .. })
        ));
    }

    #[test]
    fn test_valid_returns_subject_unchanged() {
        let cert = fixture(Duration::days(-1), Duration::days(1));
        let expected = cert.subject.clone();
        assert_eq!(validate(cert, Utc::now()).unwrap(), expected);
    }

    #[test]
    fn test_window_bounds_are_inclusive() {
        let cert = fixture(Duration::days(-1), Duration::days(1));
        assert!(validate(cert.clone(), cert.not_before).is_ok());
        assert!(validate(cert.clone(), cert.not_after).is_ok());
    }

    #[test]
    fn test_semantics_identifier() {
        let id = SemanticsIdentifier::parse("PNOLV-010101-10006");
        assert_eq!(id.identity_type.as_deref(), Some("PNO"));
        assert_eq!(id.country.as_deref(), Some("LV"));
        assert_eq!(id.identifier, "010101-10006");

        let legacy = SemanticsIdentifier::parse("10101010005");
        assert_eq!(legacy.identity_type, None);
        assert_eq!(legacy.identifier, "10101010005");
    }

    #[test]
    fn test_national_identifier() {
        let cert = fixture(Duration::days(-1), Duration::days(1));
        assert_eq!(
            cert.subject.national_identifier().as_deref(),
            Some("10101010005")
        );
    }
}

use chrono::{DateTime, Utc};
use x509_parser::oid_registry::{
    OID_X509_COMMON_NAME, OID_X509_COUNTRY_NAME, OID_X509_GIVEN_NAME, OID_X509_SERIALNUMBER,
    OID_X509_SURNAME, Oid,
};
use x509_parser::prelude::{ASN1Time, FromDer, X509Certificate};
use x509_parser::x509::X509Name;

use crate::protocol::certificate::{CertificateError, ParsedCertificate, SubjectFields};
use crate::protocol::ports::CertificateParser;

/// Reads validity and subject attributes with x509-parser
#[derive(Debug, Clone, Copy, Default)]
pub struct X509CertificateParser;

impl CertificateParser for X509CertificateParser {
    fn parse(&self, certificate_der: &[u8]) -> Result<ParsedCertificate, CertificateError> {
        let (_, certificate) = X509Certificate::from_der(certificate_der)
            .map_err(|e| CertificateError::Parse(e.to_string()))?;

        let validity = certificate.validity();
        let subject = certificate.subject();

        Ok(ParsedCertificate {
            not_before: asn1_time_to_chrono(validity.not_before)?,
            not_after: asn1_time_to_chrono(validity.not_after)?,
            subject: SubjectFields {
                common_name: attribute(subject, &OID_X509_COMMON_NAME),
                given_name: attribute(subject, &OID_X509_GIVEN_NAME),
                surname: attribute(subject, &OID_X509_SURNAME),
                country: attribute(subject, &OID_X509_COUNTRY_NAME),
                serial_number: attribute(subject, &OID_X509_SERIALNUMBER),
            },
        })
    }
}

fn asn1_time_to_chrono(time: ASN1Time) -> Result<DateTime<Utc>, CertificateError> {
    DateTime::<Utc>::from_timestamp(time.timestamp(), 0).ok_or(CertificateError::InvalidTime)
}

fn attribute(name: &X509Name<'_>, oid: &Oid<'_>) -> Option<String> {
    name.iter_by_oid(oid)
        .filter_map(|attr| attr.as_str().map(String::from).ok())
        .next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        TEST_COMMON_NAME, TEST_COUNTRY, TEST_GIVEN_NAME, TEST_SERIAL_NUMBER, TEST_SURNAME,
        TestIdentity,
    };

    #[test]
    fn test_parse_subject_and_validity() {
        let identity = TestIdentity::valid().unwrap();
        let parsed = X509CertificateParser.parse(&identity.cert_der).unwrap();

        assert_eq!(parsed.subject.common_name.as_deref(), Some(TEST_COMMON_NAME));
        assert_eq!(parsed.subject.given_name.as_deref(), Some(TEST_GIVEN_NAME));
        assert_eq!(parsed.subject.surname.as_deref(), Some(TEST_SURNAME));
        assert_eq!(parsed.subject.country.as_deref(), Some(TEST_COUNTRY));
        assert_eq!(parsed.subject.serial_number.as_deref(), Some(TEST_SERIAL_NUMBER));

        let now = Utc::now();
        assert!(parsed.not_before < now);
        assert!(parsed.not_after > now);
    }

    #[test]
    fn test_expired_window_is_reported_as_is() {
        let identity = TestIdentity::expired().unwrap();
        let parsed = X509CertificateParser.parse(&identity.cert_der).unwrap();
        assert!(parsed.not_after < Utc::now());
    }

    #[test]
    fn test_garbage_is_parse_error() {
        let result = X509CertificateParser.parse(b"not a certificate");
        assert!(matches!(result, Err(CertificateError::Parse(_))));
    }
}

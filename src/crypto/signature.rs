use crate::crypto::HashAlg;
use crate::crypto::errors::{CryptoResult, Error};
use crate::protocol::ports::SignatureVerifier;
use openssl::pkey::{Id, PKey, Public};
use openssl::pkey_ctx::PkeyCtx;
use openssl::rsa::Padding;
use openssl::sign::Verifier;
use openssl::x509::X509;
use std::fmt;
use std::str::FromStr;

/// Asymmetric scheme half of a provider signature algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureScheme {
    /// RSASSA-PKCS1-v1_5
    RsaPkcs1,
    /// ECDSA with a DER encoded (r, s) signature
    Ecdsa,
}

/// Signature algorithm as named in the `signature.algorithm` response field,
/// e.g. `sha512WithRSAEncryption` or `SHA256withECDSA`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureAlgorithm {
    pub hash: HashAlg,
    pub scheme: SignatureScheme,
}

impl FromStr for SignatureAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let (hash, scheme) = lower
            .split_once("with")
            .ok_or_else(|| Error::Unsupported(format!("signature algorithm {s}")))?;

        let hash: HashAlg = hash.parse()?;
        let scheme = match scheme {
            "rsaencryption" | "rsa" => SignatureScheme::RsaPkcs1,
            "ecdsa" => SignatureScheme::Ecdsa,
            _ => return Err(Error::Unsupported(format!("signature algorithm {s}"))),
        };

        Ok(Self { hash, scheme })
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = &self.hash.wire_name()[3..];
        match self.scheme {
            SignatureScheme::RsaPkcs1 => write!(f, "sha{digits}WithRSAEncryption"),
            SignatureScheme::Ecdsa => write!(f, "SHA{digits}withECDSA"),
        }
    }
}

/// The bytes a provider signature covers
#[derive(Debug, Clone, Copy)]
pub enum SignedData<'a> {
    /// Message that is hashed with the algorithm's digest before verification
    Message(&'a [u8]),
    /// Digest that was computed by the caller and is verified as-is
    Prehashed(&'a [u8]),
}

/// Verify a signature against data using a public key
pub fn verify(
    algorithm: SignatureAlgorithm,
    public_key: &PKey<Public>,
    signed: SignedData<'_>,
    signature: &[u8],
) -> CryptoResult<bool> {
    let is_rsa = match (algorithm.scheme, public_key.id()) {
        (SignatureScheme::RsaPkcs1, Id::RSA) => true,
        (SignatureScheme::Ecdsa, Id::EC) => false,
        _ => {
            return Err(Error::Invalid(format!(
                "{algorithm} does not match the certificate key type"
            )));
        }
    };

    match signed {
        SignedData::Message(data) => {
            let mut verifier = Verifier::new(algorithm.hash.into(), public_key)?;
            if is_rsa {
                verifier.set_rsa_padding(Padding::PKCS1)?;
            }
            verifier.update(data)?;
            Ok(verifier.verify(signature)?)
        }
        SignedData::Prehashed(digest) => {
            if digest.len() != algorithm.hash.output_size() {
                return Err(Error::Invalid(format!(
                    "digest length {} does not match {}",
                    digest.len(),
                    algorithm.hash
                )));
            }
            let mut ctx = PkeyCtx::new(public_key)?;
            ctx.verify_init()?;
            if is_rsa {
                ctx.set_rsa_padding(Padding::PKCS1)?;
            }
            ctx.set_signature_md(algorithm.hash.md())?;
            Ok(ctx.verify(digest, signature)?)
        }
    }
}

/// Verify a signature with the public key embedded in a DER encoded certificate
pub fn verify_with_certificate(
    algorithm: SignatureAlgorithm,
    certificate_der: &[u8],
    signed: SignedData<'_>,
    signature: &[u8],
) -> CryptoResult<bool> {
    let certificate = X509::from_der(certificate_der)?;
    let public_key = certificate.public_key()?;
    verify(algorithm, &public_key, signed, signature)
}

/// OpenSSL backed signature verification
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenSslVerifier;

impl SignatureVerifier for OpenSslVerifier {
    fn verify(
        &self,
        algorithm: SignatureAlgorithm,
        certificate_der: &[u8],
        signed: SignedData<'_>,
        signature: &[u8],
    ) -> CryptoResult<bool> {
        verify_with_certificate(algorithm, certificate_der, signed, signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestIdentity;

    #[test]
    fn test_parse_algorithm_names() {
        let rsa: SignatureAlgorithm = "sha512WithRSAEncryption".parse().unwrap();
        assert_eq!(rsa.hash, HashAlg::Sha512);
        assert_eq!(rsa.scheme, SignatureScheme::RsaPkcs1);

        let ec: SignatureAlgorithm = "SHA256withECDSA".parse().unwrap();
        assert_eq!(ec.hash, HashAlg::Sha256);
        assert_eq!(ec.scheme, SignatureScheme::Ecdsa);

        assert!("md5WithRSAEncryption".parse::<SignatureAlgorithm>().is_err());
        assert!("sha256WithDSA".parse::<SignatureAlgorithm>().is_err());
        assert!("garbage".parse::<SignatureAlgorithm>().is_err());
    }

    #[test]
    fn test_display_matches_provider_names() {
        for name in ["sha384WithRSAEncryption", "SHA512withECDSA"] {
            let alg: SignatureAlgorithm = name.parse().unwrap();
            assert_eq!(alg.to_string(), name);
        }
    }

    #[test]
    fn test_verify_message_signature() {
        let identity = TestIdentity::valid().unwrap();
        let alg: SignatureAlgorithm = "sha512WithRSAEncryption".parse().unwrap();
        let data = b"sixty four bytes of challenge would normally go right here....";

        let signature = identity.sign_message(alg, data).unwrap();
        let ok = OpenSslVerifier
            .verify(alg, &identity.cert_der, SignedData::Message(data), &signature)
            .unwrap();
        assert!(ok);

        let ok = OpenSslVerifier
            .verify(alg, &identity.cert_der, SignedData::Message(b"other"), &signature)
            .unwrap_or(false);
        assert!(!ok);
    }

    #[test]
    fn test_prehashed_signature_equals_message_signature() {
        let identity = TestIdentity::valid().unwrap();
        let alg: SignatureAlgorithm = "sha256WithRSAEncryption".parse().unwrap();
        let data = b"document";
        let digest = HashAlg::Sha256.hash(data).unwrap();

        let signature = identity.sign_prehashed(alg, &digest).unwrap();
        assert!(
            OpenSslVerifier
                .verify(alg, &identity.cert_der, SignedData::Message(data), &signature)
                .unwrap()
        );
        assert!(
            OpenSslVerifier
                .verify(alg, &identity.cert_der, SignedData::Prehashed(&digest), &signature)
                .unwrap()
        );
    }

    #[test]
    fn test_prehashed_length_mismatch() {
        let identity = TestIdentity::valid().unwrap();
        let alg: SignatureAlgorithm = "sha512WithRSAEncryption".parse().unwrap();
        let result = OpenSslVerifier.verify(
            alg,
            &identity.cert_der,
            SignedData::Prehashed(&[0u8; 32]),
            &[0u8; 256],
        );
        assert!(matches!(result, Err(Error::Invalid(_))));
    }

    #[test]
    fn test_scheme_key_mismatch() {
        let identity = TestIdentity::valid().unwrap();
        let alg: SignatureAlgorithm = "SHA256withECDSA".parse().unwrap();
        let result = OpenSslVerifier.verify(
            alg,
            &identity.cert_der,
            SignedData::Message(b"data"),
            &[0u8; 72],
        );
        assert!(matches!(result, Err(Error::Invalid(_))));
    }
}

//! Default implementations of the protocol ports.

mod http;
mod x509;

pub use http::ReqwestTransport;
pub use x509::X509CertificateParser;

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{debug, info};
use urlencoding::encode;

use crate::config::RelyingPartyConfig;
use crate::crypto::HashAlg;
use crate::protocol::error::{Error, Result};
use crate::protocol::models::SessionKind;
use crate::protocol::ports::{HttpRequest, Method, Transport};

/// Request fields carrying the relying party's identity; never overridable.
pub const RESERVED_FIELDS: [&str; 3] = ["relyingPartyUUID", "relyingPartyName", "certificateLevel"];

/// Who or what a request is addressed to
#[derive(Debug, Clone, Copy)]
pub enum SubmissionTarget<'a> {
    /// Natural person identified by country and national identity number
    NationalIdentity {
        country: &'a str,
        national_id: &'a str,
    },
    /// A specific Smart-ID account document
    Document { document_number: &'a str },
}

impl SubmissionTarget<'_> {
    pub fn kind(&self) -> SessionKind {
        match self {
            SubmissionTarget::NationalIdentity { .. } => SessionKind::Authentication,
            SubmissionTarget::Document { .. } => SessionKind::Signature,
        }
    }

    fn path(&self) -> String {
        match self {
            SubmissionTarget::NationalIdentity {
                country,
                national_id,
            } => format!(
                "/authentication/pno/{}/{}",
                encode(country),
                encode(national_id)
            ),
            SubmissionTarget::Document { document_number } => {
                format!("/signature/document/{}", encode(document_number))
            }
        }
    }
}

/// Sends authentication and signature requests and returns the session id
#[derive(Clone)]
pub struct RequestSubmitter {
    transport: Arc<dyn Transport>,
    host: String,
    timeout: Duration,
    relying_party: Arc<RelyingPartyConfig>,
}

impl RequestSubmitter {
    pub fn new(
        transport: Arc<dyn Transport>,
        host: &str,
        timeout: Duration,
        relying_party: Arc<RelyingPartyConfig>,
    ) -> Self {
        Self {
            transport,
            host: host.trim_end_matches('/').to_string(),
            timeout,
            relying_party,
        }
    }

    pub async fn submit(
        &self,
        target: SubmissionTarget<'_>,
        digest: &str,
        hash_alg: HashAlg,
        display_text: Option<&str>,
    ) -> Result<String> {
        let body = build_body(&self.relying_party, digest, hash_alg, display_text);
        let request = HttpRequest {
            method: Method::Post,
            url: format!("{}{}", self.host, target.path()),
            body: Some(body),
            timeout: self.timeout,
        };
        debug!("Submitting {} request to {}", target.kind(), request.url);

        let response = self.transport.send(request).await?;
        let body = response.into_json_object()?;

        let session_id = body
            .get("sessionID")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::InvalidResponse("missing sessionID".to_string()))?;

        info!("Provider accepted {} request: session {}", target.kind(), session_id);
        Ok(session_id.to_string())
    }
}

/// Merge order: configured extras, then request fields, then the relying
/// party's identity fields which always win.
pub fn build_body(
    relying_party: &RelyingPartyConfig,
    digest: &str,
    hash_alg: HashAlg,
    display_text: Option<&str>,
) -> Value {
    let mut body: Map<String, Value> = relying_party
        .extra
        .iter()
        .filter(|(key, _)| !RESERVED_FIELDS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    body.insert("hash".to_string(), Value::from(digest));
    body.insert("hashType".to_string(), Value::from(hash_alg.wire_name()));
    match display_text {
        Some(text) => {
            body.insert("displayText".to_string(), Value::from(text));
        }
        None => {
            body.remove("displayText");
        }
    }

    body.insert(
        "relyingPartyUUID".to_string(),
        Value::from(relying_party.uuid.to_string()),
    );
    body.insert(
        "relyingPartyName".to_string(),
        Value::from(relying_party.name.clone()),
    );
    body.insert(
        "certificateLevel".to_string(),
        Value::from(relying_party.certificate_level.as_str()),
    );

    Value::Object(body)
}

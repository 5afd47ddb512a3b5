use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tokio::time::timeout;
use tracing::debug;

use crate::protocol::ports::{HttpRequest, HttpResponse, Method, Transport, TransportError};

const USER_AGENT: &str = concat!("smartid-client/", env!("CARGO_PKG_VERSION"));

/// JSON over HTTPS with reqwest and rustls
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder()
            .use_rustls_tls()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| TransportError::Other(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Use a preconfigured client, e.g. with a proxy or extra root certificates
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        }
        .header(ACCEPT, "application/json");
        if let Some(body) = &request.body {
            builder = builder
                .header(CONTENT_TYPE, "application/json")
                .body(body.to_string());
        }

        let exchange = async {
            let response = builder.send().await?;
            let status = response.status().as_u16();
            let body = response.bytes().await?.to_vec();
            Ok::<_, reqwest::Error>((status, body))
        };

        let (status, body) = match timeout(request.timeout, exchange).await {
            Ok(result) => result.map_err(|e| map_error(e, request.timeout))?,
            Err(_) => return Err(TransportError::Timeout(request.timeout)),
        };

        debug!("{:?} {} -> {}", request.method, request.url, status);
        Ok(HttpResponse { status, body })
    }
}

fn map_error(error: reqwest::Error, limit: Duration) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(limit)
    } else if error.is_connect() {
        TransportError::Connection(error.to_string())
    } else {
        TransportError::Other(error.to_string())
    }
}

use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::{Instant, sleep, sleep_until};
use tracing::{debug, info, warn};
use urlencoding::encode;

use crate::protocol::cancel::CancelSignal;
use crate::protocol::error::{Error, Result};
use crate::protocol::models::{SessionState, SessionStatus};
use crate::protocol::ports::{HttpRequest, Method, Transport};

/// Slack on top of the provider's long-poll horizon before a status request
/// is abandoned.
pub const STATUS_REQUEST_MARGIN: Duration = Duration::from_secs(5);

/// Queries a session until the provider reports it complete.
///
/// Only the `RUNNING` state is retried. Transport failures, non-200 answers
/// and malformed bodies end the attempt immediately.
#[derive(Clone)]
pub struct SessionPoller {
    transport: Arc<dyn Transport>,
    host: String,
    interval: Duration,
    status_timeout: Duration,
}

impl SessionPoller {
    pub fn new(
        transport: Arc<dyn Transport>,
        host: &str,
        interval: Duration,
        status_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            host: host.trim_end_matches('/').to_string(),
            interval,
            status_timeout,
        }
    }

    fn status_request(&self, session_id: &str) -> HttpRequest {
        HttpRequest {
            method: Method::Get,
            url: format!(
                "{}/session/{}?timeoutMs={}",
                self.host,
                encode(session_id),
                self.status_timeout.as_millis()
            ),
            body: None,
            timeout: self.status_timeout + STATUS_REQUEST_MARGIN,
        }
    }

    /// Poll without a bound. The returned status is complete and carries a
    /// result.
    pub async fn poll(&self, session_id: &str) -> Result<SessionStatus> {
        let mut retries = 0usize;

        loop {
            let response = self.transport.send(self.status_request(session_id)).await?;
            let body = response.into_json_object()?;
            let status: SessionStatus = serde_json::from_value(Value::Object(body))
                .map_err(|e| Error::InvalidResponse(format!("malformed session status: {e}")))?;

            match status.state() {
                SessionState::Running => {
                    retries += 1;
                    debug!(
                        "Session {} still running, retry {} in {:?}",
                        session_id, retries, self.interval
                    );
                    sleep(self.interval).await;
                }
                SessionState::Complete => {
                    let Some(result) = status.result.as_ref() else {
                        warn!("Session {} completed without a result", session_id);
                        return Err(Error::EmptyResult);
                    };
                    info!(
                        "Session {} complete after {} retries: {}",
                        session_id, retries, result.end_result
                    );
                    return Ok(status);
                }
                SessionState::Unknown(state) => {
                    return Err(Error::InvalidResponse(format!(
                        "unknown session state {state}"
                    )));
                }
            }
        }
    }

    /// Poll until complete, `deadline` passes or `cancel` fires, whichever
    /// comes first. On expiry the in-flight request is dropped and nothing
    /// further is sent.
    pub async fn poll_until(
        &self,
        session_id: &str,
        deadline: Option<Instant>,
        cancel: Option<CancelSignal>,
    ) -> Result<SessionStatus> {
        let expired = async {
            match deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => pending::<()>().await,
            }
        };
        let cancelled = async {
            match cancel {
                Some(mut signal) => signal.cancelled().await,
                None => pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => {
                warn!("Polling of session {} cancelled", session_id);
                Err(Error::Cancelled)
            }
            _ = expired => {
                warn!("Session {} did not complete before the deadline", session_id);
                Err(Error::DeadlineExceeded)
            }
            status = self.poll(session_id) => status,
        }
    }
}

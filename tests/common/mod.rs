use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{StatusCode, Uri},
    routing::{get, post},
};
use serde_json::{Value, json};
use smartid_client::{SmartIdClient, adapters::ReqwestTransport, config::Config, testing::FakeProvider};
use tokio::net::TcpListener;

#[derive(Clone)]
struct AppState {
    provider: Arc<FakeProvider>,
    requests: Arc<Mutex<Vec<String>>>,
}

/// A fake provider listening on a random local port
pub struct ProviderServer {
    pub base_url: String,
    pub provider: Arc<FakeProvider>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl ProviderServer {
    /// Path and query of every request received so far
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn client(&self) -> SmartIdClient {
        let config = Config::load_with_sources(Some(HashMap::from([
            ("provider.host".to_string(), self.base_url.clone()),
            ("provider.poll_interval_ms".to_string(), "20".to_string()),
            (
                "relying_party.uuid".to_string(),
                "00000000-0000-0000-0000-000000000000".to_string(),
            ),
            ("relying_party.name".to_string(), "DEMO".to_string()),
        ])))
        .unwrap();

        SmartIdClient::new(config)
            .unwrap()
            .with_transport(Arc::new(ReqwestTransport::new().unwrap()))
    }
}

// Helper function to spawn a fake provider on a random port
pub async fn spawn_provider(provider: FakeProvider) -> ProviderServer {
    let state = AppState {
        provider: Arc::new(provider),
        requests: Arc::new(Mutex::new(Vec::new())),
    };

    let app = Router::new()
        .route("/authentication/pno/{country}/{national_id}", post(submit))
        .route("/signature/document/{document_number}", post(submit))
        .route("/session/{session_id}", get(status))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("failed to run server");
    });

    ProviderServer {
        base_url: format!("http://127.0.0.1:{port}"),
        provider: state.provider,
        requests: state.requests,
    }
}

fn record(state: &AppState, uri: &Uri) {
    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_default();
    state.requests.lock().unwrap().push(target);
}

async fn submit(
    State(state): State<AppState>,
    uri: Uri,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    record(&state, &uri);
    let (status, body) = state.provider.submit(&body);
    (StatusCode::from_u16(status).unwrap(), Json(body))
}

async fn status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    uri: Uri,
) -> (StatusCode, Json<Value>) {
    record(&state, &uri);
    if session_id != state.provider.session_id() {
        return (StatusCode::NOT_FOUND, Json(json!({ "title": "Not Found" })));
    }
    let (status, body) = state.provider.status();
    (StatusCode::from_u16(status).unwrap(), Json(body))
}

/*!
Fake metrics backend

Serves `GET /api/v1/query?query=<expr>` on an ephemeral localhost port with
canned answers keyed by the exact expression. Unknown expressions get a
`bad_data` error envelope with HTTP 400, like a real backend rejecting a
query it cannot parse.
*/

use crate::fixtures::error_envelope;
use anyhow::Result;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

#[derive(Clone, Default)]
struct BackendState {
    answers: Arc<Mutex<HashMap<String, (StatusCode, Value)>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

pub struct FakeMetricsBackend {
    addr: SocketAddr,
    state: BackendState,
    server: JoinHandle<()>,
}

impl FakeMetricsBackend {
    pub async fn start() -> Result<Self> {
        let state = BackendState::default();
        let app = Router::new()
            .route("/api/v1/query", get(handle_query))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let server = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                log::error!("❌ Fake metrics backend stopped: {}", e);
            }
        });

        log::info!("🧪 Fake metrics backend on {}", addr);
        Ok(Self { addr, state, server })
    }

    /// Full query endpoint, ready for `MetricsConfig::url`.
    pub fn query_url(&self) -> String {
        format!("http://{}/api/v1/query", self.addr)
    }

    /// Answer `expression` with `body` and HTTP 200.
    pub fn answer(&self, expression: &str, body: Value) {
        self.answer_with_status(expression, StatusCode::OK, body);
    }

    pub fn answer_with_status(&self, expression: &str, status: StatusCode, body: Value) {
        self.state.answers.lock().insert(expression.to_string(), (status, body));
    }

    /// Forget the canned answer, later requests get the error envelope.
    pub fn forget(&self, expression: &str) {
        self.state.answers.lock().remove(expression);
    }

    /// Expressions received so far, in arrival order.
    pub fn requests(&self) -> Vec<String> {
        self.state.requests.lock().clone()
    }
}

impl Drop for FakeMetricsBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn handle_query(
    State(state): State<BackendState>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    let expression = params.get("query").cloned().unwrap_or_default();
    state.requests.lock().push(expression.clone());

    let canned = state.answers.lock().get(&expression).cloned();
    match canned {
        Some((status, body)) => (status, Json(body)),
        None => {
            log::warn!("⚠️ No canned answer for `{}`", expression);
            (
                StatusCode::BAD_REQUEST,
                Json(error_envelope("bad_data", &format!("unknown expression: {expression}"))),
            )
        }
    }
}

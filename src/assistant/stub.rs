//! In-process stub of the assistant threads/runs API.
//!
//! Used by gateway, coordinator, and websocket tests instead of a mock
//! crate: tests talk to a real axum server bound to an ephemeral port,
//! the same way the production gateway talks to the real API. The stub
//! also tracks concurrently in-flight runs so turn-serialization tests
//! can assert that no two runs ever overlap.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

const TERMINAL_STATUSES: &[&str] = &[
    "completed",
    "failed",
    "cancelled",
    "expired",
    "requires_action",
];

pub(crate) struct StubAssistant {
    pub base_url: String,
    pub state: Arc<StubAssistantState>,
    server: tokio::task::JoinHandle<()>,
}

impl StubAssistant {
    pub(crate) async fn spawn() -> Self {
        let state = Arc::new(StubAssistantState::default());

        let app = Router::new()
            .route("/threads", post(create_thread))
            .route(
                "/threads/:thread_id/messages",
                post(create_message).get(list_messages),
            )
            .route("/threads/:thread_id/runs", post(create_run))
            .route("/threads/:thread_id/runs/:run_id", get(get_run))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
            server,
        }
    }
}

impl Drop for StubAssistant {
    fn drop(&mut self) {
        self.server.abort();
    }
}

pub(crate) struct StubAssistantState {
    /// Poll statuses served per run, in order; the last entry repeats.
    statuses: Mutex<Vec<String>>,
    reply: Mutex<String>,
    last_assistant_id: Mutex<Option<String>>,
    threads: AtomicUsize,
    runs: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    run_progress: Mutex<HashMap<String, RunProgress>>,
}

struct RunProgress {
    served: usize,
    done: bool,
}

impl Default for StubAssistantState {
    fn default() -> Self {
        Self {
            statuses: Mutex::new(vec!["completed".to_string()]),
            reply: Mutex::new("Understood.".to_string()),
            last_assistant_id: Mutex::new(None),
            threads: AtomicUsize::new(0),
            runs: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            run_progress: Mutex::new(HashMap::new()),
        }
    }
}

impl StubAssistantState {
    pub(crate) fn set_reply(&self, reply: &str) {
        *lock(&self.reply) = reply.to_string();
    }

    pub(crate) fn set_statuses(&self, statuses: &[&str]) {
        *lock(&self.statuses) = statuses.iter().map(|s| s.to_string()).collect();
    }

    pub(crate) fn threads_created(&self) -> usize {
        self.threads.load(Ordering::SeqCst)
    }

    pub(crate) fn runs_started(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    /// Highest number of runs that were ever in flight at once.
    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn last_assistant_id(&self) -> Option<String> {
        lock(&self.last_assistant_id).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn create_thread(State(state): State<Arc<StubAssistantState>>) -> Json<Value> {
    let n = state.threads.fetch_add(1, Ordering::SeqCst) + 1;
    Json(json!({ "id": format!("thread_{n}") }))
}

async fn create_message(
    State(_state): State<Arc<StubAssistantState>>,
    Path(_thread_id): Path<String>,
    Json(_body): Json<Value>,
) -> Json<Value> {
    Json(json!({ "id": "msg_1" }))
}

async fn create_run(
    State(state): State<Arc<StubAssistantState>>,
    Path(_thread_id): Path<String>,
    Json(body): Json<Value>,
) -> Json<Value> {
    if let Some(assistant_id) = body.get("assistant_id").and_then(|v| v.as_str()) {
        *lock(&state.last_assistant_id) = Some(assistant_id.to_string());
    }

    let n = state.runs.fetch_add(1, Ordering::SeqCst) + 1;
    let run_id = format!("run_{n}");

    let now_in_flight = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    state.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);
    lock(&state.run_progress).insert(
        run_id.clone(),
        RunProgress {
            served: 0,
            done: false,
        },
    );

    Json(json!({ "id": run_id, "status": "queued" }))
}

async fn get_run(
    State(state): State<Arc<StubAssistantState>>,
    Path((_thread_id, run_id)): Path<(String, String)>,
) -> Json<Value> {
    let statuses = lock(&state.statuses).clone();
    let mut progress = lock(&state.run_progress);
    let entry = progress.entry(run_id.clone()).or_insert(RunProgress {
        served: 0,
        done: false,
    });

    let idx = entry.served.min(statuses.len().saturating_sub(1));
    let status = statuses
        .get(idx)
        .cloned()
        .unwrap_or_else(|| "completed".to_string());
    entry.served += 1;

    if TERMINAL_STATUSES.contains(&status.as_str()) && !entry.done {
        entry.done = true;
        state.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    Json(json!({ "id": run_id, "status": status }))
}

async fn list_messages(
    State(state): State<Arc<StubAssistantState>>,
    Path(_thread_id): Path<String>,
) -> Json<Value> {
    let reply = lock(&state.reply).clone();
    Json(json!({
        "data": [
            {
                "role": "assistant",
                "content": [
                    { "type": "text", "text": { "value": reply } }
                ]
            }
        ]
    }))
}

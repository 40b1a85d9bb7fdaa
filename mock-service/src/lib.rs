//! In-memory notes API used to exercise the load driver end to end.
use axum::extract::{Path, State};
use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use base64::{engine::general_purpose::STANDARD, Engine};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "password";

/// Misbehaviour to inject into otherwise well-formed responses.
#[derive(Clone, Debug, Default)]
pub struct Faults {
    /// Added to every request before it is handled
    pub delay: Duration,
    /// Requests beyond this rate are answered with a 500
    pub max_rps: Option<NonZeroU32>,
    pub create_status: Option<u16>,
    pub create_without_id: bool,
    pub get_wrong_id: bool,
    /// Updates succeed but echo the previous title
    pub update_keeps_title: bool,
    pub list_as_object: bool,
    /// Append an element that is not a note to list responses
    pub list_with_junk: bool,
    pub delete_status: Option<u16>,
    /// Render ids as JSON numbers instead of strings
    pub numeric_ids: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NoteInput {
    pub title: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Clone, Debug)]
struct StoredNote {
    id: u64,
    title: String,
    content: String,
}

pub struct MockNotes {
    faults: Faults,
    auth: String,
    limiter: Option<DefaultDirectRateLimiter>,
    notes: RwLock<HashMap<u64, StoredNote>>,
    next_id: AtomicU64,
    requests: Mutex<BTreeMap<&'static str, u64>>,
}

impl MockNotes {
    pub fn new(faults: Faults) -> Self {
        Self {
            auth: format!("Basic {}", STANDARD.encode(format!("{USERNAME}:{PASSWORD}"))),
            limiter: faults.max_rps.map(|rps| RateLimiter::direct(Quota::per_second(rps))),
            faults,
            notes: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            requests: Mutex::new(BTreeMap::new()),
        }
    }

    /// Requests received for `operation`, including rejected ones.
    pub fn requests(&self, operation: &str) -> u64 {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(operation)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_requests(&self) -> u64 {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .sum()
    }

    /// Notes currently stored.
    pub fn len(&self) -> usize {
        self.notes.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn begin(&self, operation: &'static str, headers: &HeaderMap) -> Result<(), Response> {
        counter!("mock_notes.requests", "operation" => operation).increment(1);
        *self
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(operation)
            .or_default() += 1;

        if !self.faults.delay.is_zero() {
            tokio::time::sleep(self.faults.delay).await;
        }

        if let Some(limiter) = &self.limiter {
            if limiter.check().is_err() {
                debug!("{operation} over rate limit");
                return Err(status_only(500));
            }
        }

        let authorized = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value == self.auth);
        if !authorized {
            return Err((StatusCode::UNAUTHORIZED, "unauthorized").into_response());
        }

        Ok(())
    }

    fn render(&self, note: &StoredNote) -> Value {
        let id = if self.faults.numeric_ids {
            json!(note.id)
        } else {
            json!(note.id.to_string())
        };
        json!({ "id": id, "title": note.title, "content": note.content })
    }

    fn lookup(&self, id: &str) -> Option<StoredNote> {
        let id = id.parse().ok()?;
        self.notes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }
}

pub fn router(mock: Arc<MockNotes>) -> Router {
    Router::new()
        .route("/notes", get(list_notes).post(create_note))
        .route(
            "/notes/:id",
            get(get_note).put(update_note).delete(delete_note),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(mock)
}

/// Serve on `addr` until the process exits.
pub async fn run(addr: SocketAddr, faults: Faults) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router(Arc::new(MockNotes::new(faults)))).await
}

/// Serve on an ephemeral local port in the background.
pub async fn spawn(faults: Faults) -> std::io::Result<(SocketAddr, Arc<MockNotes>)> {
    let mock = Arc::new(MockNotes::new(faults));
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let app = router(mock.clone());
    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            error!("Mock notes service failed: {err}");
        }
    });

    Ok((addr, mock))
}

async fn create_note(
    State(mock): State<Arc<MockNotes>>,
    headers: HeaderMap,
    Json(input): Json<NoteInput>,
) -> Response {
    if let Err(res) = mock.begin("create_note", &headers).await {
        return res;
    }
    if let Some(status) = mock.faults.create_status {
        return status_only(status);
    }

    let note = StoredNote {
        id: mock.next_id.fetch_add(1, Ordering::Relaxed),
        title: input.title,
        content: input.content,
    };
    mock.notes
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(note.id, note.clone());

    let mut body = mock.render(&note);
    if mock.faults.create_without_id {
        if let Some(fields) = body.as_object_mut() {
            fields.remove("id");
        }
    }
    (StatusCode::CREATED, Json(body)).into_response()
}

async fn get_note(
    State(mock): State<Arc<MockNotes>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if let Err(res) = mock.begin("get_note", &headers).await {
        return res;
    }
    let Some(mut note) = mock.lookup(&id) else {
        return status_only(404);
    };

    if mock.faults.get_wrong_id {
        note.id += 1000;
    }
    Json(mock.render(&note)).into_response()
}

async fn update_note(
    State(mock): State<Arc<MockNotes>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(input): Json<NoteInput>,
) -> Response {
    if let Err(res) = mock.begin("update_note", &headers).await {
        return res;
    }
    let Some(previous) = mock.lookup(&id) else {
        return status_only(404);
    };

    let updated = StoredNote {
        id: previous.id,
        title: input.title,
        content: input.content,
    };
    mock.notes
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(updated.id, updated.clone());

    let shown = if mock.faults.update_keeps_title {
        StoredNote {
            title: previous.title,
            ..updated
        }
    } else {
        updated
    };
    Json(mock.render(&shown)).into_response()
}

async fn list_notes(State(mock): State<Arc<MockNotes>>, headers: HeaderMap) -> Response {
    if let Err(res) = mock.begin("list_notes", &headers).await {
        return res;
    }

    let mut notes: Vec<StoredNote> = mock
        .notes
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .values()
        .cloned()
        .collect();
    notes.sort_by_key(|note| note.id);
    let mut rendered: Vec<Value> = notes.iter().map(|note| mock.render(note)).collect();
    if mock.faults.list_with_junk {
        rendered.push(json!({ "unexpected": true }));
    }

    if mock.faults.list_as_object {
        Json(json!({ "notes": rendered })).into_response()
    } else {
        Json(rendered).into_response()
    }
}

async fn delete_note(
    State(mock): State<Arc<MockNotes>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if let Err(res) = mock.begin("delete_note", &headers).await {
        return res;
    }
    if let Some(status) = mock.faults.delete_status {
        return status_only(status);
    }

    let removed = id.parse::<u64>().ok().and_then(|id| {
        mock.notes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
    });
    match removed {
        Some(note) => Json(json!({ "deleted": note.id.to_string() })).into_response(),
        None => status_only(404),
    }
}

fn status_only(status: u16) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, status.canonical_reason().unwrap_or("error")).into_response()
}

//! HTTP client for the notes API
//!
//! Every call issues exactly one request, validates the response and records the outcome into the
//! shared [`MetricsCollector`]. Failures never escape as `Err`: they are reported through the
//! [`OperationOutcome`] attached to each [`CallResult`].
use crate::collector::MetricsCollector;
use crate::error::ClientError;
use base64::{engine::general_purpose::STANDARD, Engine};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use notesload_core::{LoadTestConfig, Note, NotePayload, Operation, TargetConfig};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
#[allow(unused_imports)]
use tracing::{debug, error, trace, warn};

/// Verdict and diagnostics for a single API call.
#[derive(Debug)]
pub struct OperationOutcome {
    pub operation: Operation,
    pub success: bool,
    /// `None` when no response was received.
    pub status: Option<u16>,
    pub duration: Duration,
    /// The note the call targeted, or the one it created.
    pub note_id: Option<String>,
    pub error: Option<ClientError>,
}

/// Decoded value (if any) of a call together with its outcome.
#[derive(Debug)]
pub struct CallResult<T> {
    pub value: Option<T>,
    pub outcome: OperationOutcome,
}

impl<T> CallResult<T> {
    pub fn succeeded(&self) -> bool {
        self.outcome.success
    }

    pub fn into_parts(self) -> (Option<T>, OperationOutcome) {
        (self.value, self.outcome)
    }
}

/// Client for the notes collection of a single target.
///
/// Holds only immutable configuration plus shared handles, so one instance per virtual user is
/// cheap. The `reqwest::Client` (and its connection pool) can be shared between instances with
/// [`ApiClient::with_http_client`].
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    auth: HeaderValue,
    metrics: Arc<MetricsCollector>,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl ApiClient {
    pub fn new(target: &TargetConfig, metrics: Arc<MetricsCollector>) -> Result<Self, ClientError> {
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: target.base_url.as_str().trim_end_matches('/').to_string(),
            auth: basic_auth(&target.credentials.username, &target.credentials.password)?,
            metrics,
            limiter: None,
        })
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Share a request rate limit with other clients. Each call waits on the limiter before its
    /// request is timed.
    pub fn with_rate_limiter(mut self, limiter: Arc<DefaultDirectRateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    pub async fn create_note(&self, title: &str, content: &str) -> CallResult<String> {
        let request = self
            .http
            .post(self.url("/notes"))
            .json(&NotePayload::new(title, content));

        let mut result = self
            .call(Operation::CreateNote, None, request, |res| {
                let id = res.json.as_ref().and_then(note_id);
                let has_id = id.is_some();
                Validated::new(id)
                    .check(res.status == 201, "status is 201")
                    .check(has_id, "has id")
            })
            .await;

        if result.succeeded() {
            result.outcome.note_id = result.value.clone();
        } else {
            result.value = None;
        }
        result
    }

    /// The decoded body is returned even when it fails validation.
    pub async fn get_note(&self, id: &str) -> CallResult<Note> {
        let request = self.http.get(self.url(&format!("/notes/{id}")));

        self.call(Operation::GetNote, Some(id), request, |res| {
            let returned_id = res.json.as_ref().and_then(note_id);
            Validated::new(res.decode())
                .check(res.status == 200, "status is 200")
                .check(returned_id.as_deref() == Some(id), "has correct id")
        })
        .await
    }

    pub async fn update_note(&self, id: &str, title: &str, content: &str) -> CallResult<Note> {
        let request = self
            .http
            .put(self.url(&format!("/notes/{id}")))
            .json(&NotePayload::new(title, content));

        self.call(Operation::UpdateNote, Some(id), request, |res| {
            let returned_title = res
                .json
                .as_ref()
                .and_then(|json| json.get("title"))
                .and_then(Value::as_str);
            Validated::new(res.decode())
                .check(res.status == 200, "status is 200")
                .check(returned_title == Some(title), "has updated title")
        })
        .await
    }

    /// Notes that decode are returned even when some elements of the array do not.
    pub async fn list_notes(&self) -> CallResult<Vec<Note>> {
        let request = self.http.get(self.url("/notes"));

        self.call(Operation::ListNotes, None, request, |res| {
            let (notes, all_decoded) = match &res.json {
                Some(Value::Array(items)) => {
                    let notes: Vec<Note> = items
                        .iter()
                        .filter_map(|item| serde_json::from_value(item.clone()).ok())
                        .collect();
                    let all_decoded = notes.len() == items.len();
                    (Some(notes), all_decoded)
                }
                _ => (None, true),
            };
            let is_array = notes.is_some();
            Validated::new(notes)
                .check(res.status == 200, "status is 200")
                .check(is_array, "returns array")
                .check(all_decoded, "has valid notes")
        })
        .await
    }

    pub async fn delete_note(&self, id: &str) -> CallResult<()> {
        let request = self.http.delete(self.url(&format!("/notes/{id}")));

        let mut result = self
            .call(Operation::DeleteNote, Some(id), request, |res| {
                Validated::new(Some(())).check(res.status == 200, "status is 200")
            })
            .await;

        if !result.succeeded() {
            result.value = None;
        }
        result
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn call<T, C>(
        &self,
        operation: Operation,
        note_id: Option<&str>,
        request: RequestBuilder,
        validate: C,
    ) -> CallResult<T>
    where
        C: FnOnce(&RawResponse) -> Validated<T>,
    {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        let request = request.header(AUTHORIZATION, self.auth.clone());

        let start = Instant::now();
        let response = send(request).await;
        let duration = start.elapsed();

        let (value, status, error) = match response {
            Ok(res) => {
                let Validated { value, failed } = validate(&res);
                let error = failed.map(|reason| {
                    error!(
                        operation = operation.as_str(),
                        status = res.status,
                        "{operation} failed ({reason}): {} - {}",
                        res.status,
                        res.body
                    );
                    ClientError::Validation {
                        operation,
                        status: res.status,
                        reason,
                        body: res.body.clone(),
                    }
                });
                (value, Some(res.status), error)
            }
            Err(err) => {
                error!(
                    operation = operation.as_str(),
                    "{operation} failed to complete: {err}"
                );
                (None, None, Some(ClientError::Transport(err)))
            }
        };

        let success = error.is_none();
        self.metrics
            .record_request(operation.as_str(), duration, !success);
        trace!(
            operation = operation.as_str(),
            ?status,
            ?duration,
            success,
            "request complete"
        );

        CallResult {
            value,
            outcome: OperationOutcome {
                operation,
                success,
                status,
                duration,
                note_id: note_id.map(str::to_string),
                error,
            },
        }
    }
}

/// Build the HTTP client shared by every virtual user of a run.
pub fn http_client(config: &LoadTestConfig) -> Result<reqwest::Client, ClientError> {
    Ok(reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()?)
}

pub fn rate_limiter(max_rps: NonZeroU32) -> DefaultDirectRateLimiter {
    RateLimiter::direct(Quota::per_second(max_rps))
}

fn basic_auth(username: &str, password: &str) -> Result<HeaderValue, ClientError> {
    let encoded = STANDARD.encode(format!("{username}:{password}"));
    let mut value = HeaderValue::from_str(&format!("Basic {encoded}"))?;
    value.set_sensitive(true);
    Ok(value)
}

struct RawResponse {
    status: u16,
    body: String,
    // `None` when the body is empty or not JSON
    json: Option<Value>,
}

impl RawResponse {
    fn decode<T: DeserializeOwned>(&self) -> Option<T> {
        self.json
            .as_ref()
            .and_then(|json| serde_json::from_value(json.clone()).ok())
    }
}

async fn send(request: RequestBuilder) -> Result<RawResponse, reqwest::Error> {
    let response = request.send().await?;
    let status = response.status().as_u16();
    let body = response.text().await?;
    let json = serde_json::from_str(&body).ok();

    Ok(RawResponse { status, body, json })
}

/// Ids are opaque; numeric ids are accepted and rendered as strings. `null` counts as missing.
fn note_id(json: &Value) -> Option<String> {
    match json.get("id")? {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

struct Validated<T> {
    value: Option<T>,
    failed: Option<&'static str>,
}

impl<T> Validated<T> {
    fn new(value: Option<T>) -> Self {
        Self {
            value,
            failed: None,
        }
    }

    // Keeps the first failing reason
    fn check(mut self, ok: bool, reason: &'static str) -> Self {
        if !ok && self.failed.is_none() {
            self.failed = Some(reason);
        }
        self
    }
}

//! Best-effort adapter for the upstream academic-management API.
//!
//! Every outbound call goes through [`UpstreamClient`], which attaches the
//! caller's bearer token, bounds the call with a timeout, and classifies
//! failures into [`UpstreamFailure`] categories. Transport errors never
//! escape to route handlers.

use std::{collections::HashMap, sync::Arc, time::Duration};

use reqwest::{multipart, StatusCode};
use serde_json::Value;
use shared::error::UpstreamFailure;
use tokio::sync::RwLock;
use tracing::{debug, warn};

pub mod normalize;

pub use normalize::{normalize_list, parse_identity, ListKeys};
pub use reqwest::Method;

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: String,
    call_timeout: Duration,
    /// Probe results memoized per logical operation, so route discovery
    /// happens at most once per operation per process lifetime.
    probed: Arc<RwLock<HashMap<String, String>>>,
}

impl UpstreamClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            probed: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Observed upstream latencies vary wildly per endpoint; call sites
    /// that know better can override the default timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        if path.contains("://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    /// Performs an authenticated JSON call. A 2xx response parses to its
    /// JSON body (empty body becomes `Null`); everything else becomes a
    /// classified [`UpstreamFailure`].
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<&Value>,
    ) -> Result<Value, UpstreamFailure> {
        let url = self.url_for(path);
        let mut request = self
            .http
            .request(method.clone(), &url)
            .timeout(self.call_timeout);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!(%method, %url, "upstream call");
        let response = request.send().await.map_err(classify_transport)?;
        let status = response.status();
        let text = response.text().await.map_err(classify_transport)?;

        if !status.is_success() {
            let failure = classify_status(status, &text);
            warn!(%method, %url, status = status.as_u16(), "upstream call failed");
            return Err(failure);
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|_| UpstreamFailure::Malformed {
            context: format!("non-JSON body from {path}"),
        })
    }

    /// Forwards one uploaded document as multipart form data, with any
    /// extra form fields attached as text parts.
    pub async fn upload(
        &self,
        path: &str,
        token: Option<&str>,
        field_name: &str,
        filename: &str,
        bytes: Vec<u8>,
        extra_fields: &[(String, String)],
    ) -> Result<Value, UpstreamFailure> {
        let part = multipart::Part::bytes(bytes).file_name(filename.to_string());
        let mut form = multipart::Form::new().part(field_name.to_string(), part);
        for (key, value) in extra_fields {
            form = form.text(key.clone(), value.clone());
        }

        let url = self.url_for(path);
        let mut request = self.http.post(&url).timeout(self.call_timeout);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request
            .multipart(form)
            .send()
            .await
            .map_err(classify_transport)?;
        let status = response.status();
        let text = response.text().await.map_err(classify_transport)?;
        if !status.is_success() {
            return Err(classify_status(status, &text));
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|_| UpstreamFailure::Malformed {
            context: format!("non-JSON body from {path}"),
        })
    }

    /// Discovers which of several candidate paths the upstream actually
    /// serves. Any response status except 404 counts as "the endpoint
    /// exists" (400/401/403/405 all mean the route is there and merely
    /// dislikes an unauthenticated GET). Connection failures and 404s move
    /// on to the next candidate; if none responds usefully the configured
    /// default wins. Never errors, never retries.
    pub async fn probe_endpoint(
        &self,
        operation: &str,
        candidates: &[&str],
        default_path: &str,
    ) -> String {
        if let Some(found) = self.probed.read().await.get(operation) {
            return found.clone();
        }

        let mut resolved = default_path.to_string();
        for candidate in candidates {
            let url = self.url_for(candidate);
            let outcome = self.http.get(&url).timeout(PROBE_TIMEOUT).send().await;
            match outcome {
                Ok(response) if response.status() != StatusCode::NOT_FOUND => {
                    debug!(operation, candidate, status = response.status().as_u16(), "probe hit");
                    resolved = (*candidate).to_string();
                    break;
                }
                Ok(_) => continue,
                Err(err) => {
                    debug!(operation, candidate, %err, "probe candidate unreachable");
                    continue;
                }
            }
        }

        self.probed
            .write()
            .await
            .insert(operation.to_string(), resolved.clone());
        resolved
    }
}

fn classify_transport(err: reqwest::Error) -> UpstreamFailure {
    if err.is_timeout() {
        UpstreamFailure::Timeout
    } else {
        UpstreamFailure::Unreachable
    }
}

fn classify_status(status: StatusCode, body: &str) -> UpstreamFailure {
    match status.as_u16() {
        401 => UpstreamFailure::Unauthorized,
        403 => UpstreamFailure::Forbidden {
            hint: body_detail(body, &["required_role", "detail", "message"]),
        },
        404 => UpstreamFailure::NotFound,
        400 | 422 => UpstreamFailure::Validation {
            detail: body_detail(body, &["detail", "message", "error", "erro"])
                .unwrap_or_else(|| "The service rejected the submitted data.".to_string()),
        },
        code @ 500..=599 => UpstreamFailure::Server { status: code },
        code => UpstreamFailure::Validation {
            detail: format!("unexpected upstream status {code}"),
        },
    }
}

/// Pulls the upstream's own error detail out of its body when the body is
/// parseable JSON; otherwise there is nothing worth surfacing.
fn body_detail(body: &str, keys: &[&str]) -> Option<String> {
    let parsed: Value = serde_json::from_str(body).ok()?;
    let obj = parsed.as_object()?;
    normalize::first_non_empty(obj, keys).map(normalize::stringify)
}

#[cfg(test)]
#[path = "tests/client_tests.rs"]
mod tests;

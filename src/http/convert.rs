//! Conversion between axum messages and relay records.
//!
//! # Responsibilities
//! - Turn an incoming request into a `Submission` (method, path + query, headers, body)
//! - Turn a `ResponseRecord` back into a response with the exact status, headers and body
//! - Map relay failures to gateway status codes
//!
//! # Design Decisions
//! - Hop-by-hop headers are connection-scoped and never stored or replayed
//! - `host` and `content-length` are recomputed by whoever sends the message next

use axum::body::Body as AxumBody;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::front::RelayError;
use crate::store::{append_header, Body, Headers, ResponseRecord, Submission};

/// Headers that describe one connection rather than the message.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Dropped from incoming requests in addition to the hop-by-hop set.
const RECOMPUTED: &[&str] = &["host", "content-length"];

pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h))
}

/// Header names listed in `Connection` are hop-by-hop for this message too.
fn connection_tokens(map: &HeaderMap) -> Vec<String> {
    map.get_all(axum::http::header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect()
}

fn collect_headers(map: &HeaderMap, skip: &[&str]) -> Headers {
    let listed = connection_tokens(map);
    let mut headers = Headers::new();
    for (name, value) in map {
        let name = name.as_str();
        if is_hop_by_hop(name) || skip.contains(&name) || listed.iter().any(|t| t == name) {
            continue;
        }
        append_header(&mut headers, name, String::from_utf8_lossy(value.as_bytes()));
    }
    headers
}

/// Why an incoming request could not be turned into a submission.
#[derive(Debug, thiserror::Error)]
#[error("request body exceeds {limit} bytes or could not be read: {reason}")]
pub struct BodyRejection {
    pub limit: usize,
    pub reason: String,
}

/// Buffer `request` (body capped at `max_body_bytes`) into a submission.
pub async fn into_submission(
    request: Request<AxumBody>,
    max_body_bytes: usize,
) -> Result<Submission, BodyRejection> {
    let (parts, body) = request.into_parts();

    let path = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let bytes = axum::body::to_bytes(body, max_body_bytes)
        .await
        .map_err(|e| BodyRejection {
            limit: max_body_bytes,
            reason: e.to_string(),
        })?;

    let mut submission = Submission::new(parts.method.as_str(), path);
    submission.headers = collect_headers(&parts.headers, RECOMPUTED);
    if !bytes.is_empty() {
        submission = submission.body(Body::from(bytes.to_vec()));
    }
    Ok(submission)
}

/// Rebuild the HTTP response a record describes.
pub fn into_response(record: ResponseRecord) -> Response {
    let status = StatusCode::from_u16(record.status_code).unwrap_or(StatusCode::BAD_GATEWAY);

    let mut map = HeaderMap::new();
    for (name, values) in &record.headers {
        if is_hop_by_hop(name) || name == "content-length" {
            continue;
        }
        let Ok(header) = HeaderName::from_bytes(name.as_bytes()) else {
            tracing::warn!(id = %record.id, header = %name, "Dropping invalid response header name");
            continue;
        };
        for value in values.iter() {
            match HeaderValue::from_str(value) {
                Ok(value) => {
                    map.append(header.clone(), value);
                }
                Err(_) => {
                    tracing::warn!(id = %record.id, header = %name, "Dropping invalid response header value");
                }
            }
        }
    }

    let mut response = Response::new(AxumBody::from(record.body.into_bytes()));
    *response.status_mut() = status;
    *response.headers_mut() = map;
    response
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        match self {
            RelayError::Timeout { id, elapsed } => (
                StatusCode::GATEWAY_TIMEOUT,
                axum::Json(json!({
                    "error": "no response before deadline",
                    "id": id.as_str(),
                    "elapsedMs": elapsed.as_millis() as u64,
                })),
            )
                .into_response(),
            RelayError::Store(e) => {
                tracing::error!(error = %e, "Failed to submit request");
                (
                    StatusCode::BAD_GATEWAY,
                    axum::Json(json!({ "error": "request could not be queued" })),
                )
                    .into_response()
            }
        }
    }
}

impl IntoResponse for BodyRejection {
    fn into_response(self) -> Response {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            axum::Json(json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

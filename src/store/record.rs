//! Request and response record types.
//!
//! Records are stored as pretty-printed JSON so an operator can `cat` the store and see
//! exactly what is in flight. Bodies that are valid UTF-8 are stored as text; anything
//! else is base64.

use std::collections::BTreeMap;
use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::store::error::{StoreError, StoreResult};
use crate::store::id::RequestId;

/// Header marking a response the relay produced itself rather than the target.
pub const SYNTHETIC_HEADER: &str = "x-relay-synthetic";

/// Lifecycle of a request record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Claimed,
    Completed,
    Failed,
}

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Transitions only move forward: pending → claimed → {completed | failed}.
    pub fn can_transition_to(self, next: RequestStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Claimed)
                | (Self::Claimed, Self::Completed)
                | (Self::Claimed, Self::Failed)
        )
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Claimed => "claimed",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One or several values for a header name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderValues {
    One(String),
    Many(Vec<String>),
}

impl HeaderValues {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let slice: &[String] = match self {
            Self::One(value) => std::slice::from_ref(value),
            Self::Many(values) => values,
        };
        slice.iter().map(String::as_str)
    }

    fn push(&mut self, value: String) {
        match self {
            Self::One(first) => {
                let first = std::mem::take(first);
                *self = Self::Many(vec![first, value]);
            }
            Self::Many(values) => values.push(value),
        }
    }
}

/// Header collection keyed by lowercase name, preserving value order per name.
pub type Headers = BTreeMap<String, HeaderValues>;

/// Append a header value, turning a single value into a sequence when repeated.
pub fn append_header(headers: &mut Headers, name: &str, value: impl Into<String>) {
    let value = value.into();
    match headers.get_mut(&name.to_ascii_lowercase()) {
        Some(existing) => existing.push(value),
        None => {
            headers.insert(name.to_ascii_lowercase(), HeaderValues::One(value));
        }
    }
}

/// Opaque byte payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Body(Vec<u8>);

impl Body {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Self(text.as_bytes().to_vec())
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum BodyEncoding {
    Utf8,
    Base64,
}

#[derive(Serialize, Deserialize)]
struct EncodedBody {
    encoding: BodyEncoding,
    data: String,
}

impl Serialize for Body {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let encoded = match std::str::from_utf8(&self.0) {
            Ok(text) => EncodedBody {
                encoding: BodyEncoding::Utf8,
                data: text.to_string(),
            },
            Err(_) => EncodedBody {
                encoding: BodyEncoding::Base64,
                data: BASE64.encode(&self.0),
            },
        };
        encoded.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Body {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = EncodedBody::deserialize(deserializer)?;
        match encoded.encoding {
            BodyEncoding::Utf8 => Ok(Self(encoded.data.into_bytes())),
            BodyEncoding::Base64 => BASE64
                .decode(encoded.data.as_bytes())
                .map(Self)
                .map_err(serde::de::Error::custom),
        }
    }
}

/// What the front role hands to the submission channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub method: String,
    pub path: String,
    pub headers: Headers,
    pub body: Option<Body>,
}

impl Submission {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            headers: Headers::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        append_header(&mut self.headers, name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// A pending or in-flight request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestRecord {
    pub id: RequestId,
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub headers: Headers,
    pub body: Option<Body>,
    pub submitted_at: DateTime<Utc>,
    pub status: RequestStatus,
}

impl RequestRecord {
    pub fn pending(id: RequestId, submission: Submission) -> Self {
        Self {
            id,
            method: submission.method,
            path: submission.path,
            headers: submission.headers,
            body: submission.body,
            submitted_at: Utc::now(),
            status: RequestStatus::Pending,
        }
    }

    /// Move to `next`, rejecting anything but a forward step.
    pub fn transition(&mut self, next: RequestStatus) -> StoreResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(StoreError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

/// A response produced by the worker role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseRecord {
    pub id: RequestId,
    pub status_code: u16,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default)]
    pub body: Body,
    pub produced_at: DateTime<Utc>,
}

impl ResponseRecord {
    pub fn new(id: RequestId, status_code: u16, headers: Headers, body: Body) -> Self {
        Self {
            id,
            status_code,
            headers,
            body,
            produced_at: Utc::now(),
        }
    }

    /// A response describing a failure the relay itself detected.
    pub fn synthetic(id: RequestId, status_code: u16, message: &str) -> Self {
        let mut headers = Headers::new();
        append_header(&mut headers, "content-type", "application/json");
        append_header(&mut headers, SYNTHETIC_HEADER, "true");
        let body = serde_json::json!({ "error": message }).to_string();
        Self::new(id, status_code, headers, Body::from(body.as_str()))
    }

    pub fn is_synthetic(&self) -> bool {
        self.headers.contains_key(SYNTHETIC_HEADER)
    }
}

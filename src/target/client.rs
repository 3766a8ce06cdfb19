//! reqwest-backed target client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::redirect::Policy;
use reqwest::Method;

use crate::config::TargetConfig;
use crate::store::{append_header, Body, Headers, RequestRecord};
use crate::target::{Target, TargetResponse, TransportError};

/// Forwards requests to `base_url` over plain HTTP.
#[derive(Debug, Clone)]
pub struct HttpTarget {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTarget {
    pub fn new(config: &TargetConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .no_proxy()
            .build()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

#[async_trait]
impl Target for HttpTarget {
    async fn call(&self, request: &RequestRecord) -> Result<TargetResponse, TransportError> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| TransportError::InvalidRequest(format!("invalid method '{}'", request.method)))?;
        let headers = to_header_map(&request.headers)?;

        let mut builder = self
            .client
            .request(method, self.url_for(&request.path))
            .headers(headers);
        if let Some(body) = &request.body {
            builder = builder.body(body.as_bytes().to_vec());
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let headers = from_header_map(response.headers());
        let body = response.bytes().await.map_err(classify)?;

        Ok(TargetResponse {
            status,
            headers,
            body: Body::from(body.to_vec()),
        })
    }
}

fn classify(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else if error.is_connect() {
        TransportError::Connect(error.to_string())
    } else if error.is_builder() {
        TransportError::InvalidRequest(error.to_string())
    } else {
        TransportError::Request(error.to_string())
    }
}

fn to_header_map(headers: &Headers) -> Result<HeaderMap, TransportError> {
    let mut map = HeaderMap::new();
    for (name, values) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| TransportError::InvalidRequest(format!("invalid header name '{name}'")))?;
        for value in values.iter() {
            let value = HeaderValue::from_str(value).map_err(|_| {
                TransportError::InvalidRequest(format!("invalid value for header '{name}'"))
            })?;
            map.append(name.clone(), value);
        }
    }
    Ok(map)
}

fn from_header_map(map: &HeaderMap) -> Headers {
    let mut headers = Headers::new();
    for (name, value) in map {
        append_header(
            &mut headers,
            name.as_str(),
            String::from_utf8_lossy(value.as_bytes()),
        );
    }
    headers
}

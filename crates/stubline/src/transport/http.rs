//! reqwest-backed transport.

use super::Transport;
use crate::error::InterceptError;
use crate::message::{body_from_bytes, body_to_bytes, InterceptedRequest, InterceptedResponse};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Sends requests over the network with a shared connection pool.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, InterceptError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| InterceptError::Transport {
                method: "-".to_string(),
                url: "-".to_string(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn transport_error(request: &InterceptedRequest, reason: impl ToString) -> InterceptError {
        InterceptError::Transport {
            method: request.method.clone(),
            url: request.url.clone(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: &InterceptedRequest,
    ) -> Result<InterceptedResponse, InterceptError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| Self::transport_error(request, e))?;

        debug!("Sending {} {}", request.method, request.url);

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            // Recomputed by the client
            if name.eq_ignore_ascii_case("host") || name.eq_ignore_ascii_case("content-length") {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.body.is_null() {
            builder = builder.body(body_to_bytes(&request.body));
        }

        let response = builder.send().await.map_err(|e| {
            warn!("Request {} {} failed: {}", request.method, request.url, e);
            Self::transport_error(request, e)
        })?;

        let status_code = response.status().as_u16();
        let headers = header_map(response.headers());
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Self::transport_error(request, e))?;
        let content_type = headers.get("content-type").map(String::as_str);
        let body = body_from_bytes(&bytes, content_type);

        debug!(
            "Received {} for {} {} ({} bytes)",
            status_code,
            request.method,
            request.url,
            bytes.len()
        );

        Ok(InterceptedResponse {
            status_code,
            headers,
            body,
        })
    }
}

/// Flatten response headers. Non-UTF-8 bytes in a value are replaced, not dropped.
fn header_map(headers: &reqwest::header::HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .map(|(k, v)| {
            (
                k.as_str().to_string(),
                String::from_utf8_lossy(v.as_bytes()).into_owned(),
            )
        })
        .collect()
}

//! Downstream HTTP client.
//!
//! One buffered client is shared by every request. A downstream call
//! always terminates: success yields the reply's parts, and every failure
//! mode (connect error, timeout, non-2xx status) yields a synthesized
//! error part attributed to the service, so the dependency graph can keep
//! draining.

use std::time::Duration;

use braid_common::protocol::{MultipartMessage, Part};
use braid_common::{BraidError, Result};
use bytes::Bytes;
use http::Method;

/// A fully prepared outgoing downstream request.
#[derive(Debug, Clone)]
pub struct OutgoingRequest {
    /// Service this request is addressed to; error parts are attributed
    /// to it.
    pub service: String,
    pub method: Method,
    pub url: String,
    /// Host header value, the endpoint picked from the service's host
    /// group.
    pub host: String,
    pub content_type: String,
    pub body: Bytes,
}

/// Shared, buffered HTTP client with a mandatory per-call timeout.
pub struct DownstreamClient {
    http: reqwest::Client,
    timeout: Duration,
}

impl DownstreamClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            timeout,
        }
    }

    /// Issues the request and converts any failure into a synthesized
    /// error part. Every call produces a terminal reply.
    pub async fn call(&self, request: OutgoingRequest) -> Vec<Part> {
        match self.try_call(&request).await {
            Ok(parts) => parts,
            Err(err) => {
                tracing::warn!(
                    service = %request.service,
                    url = %request.url,
                    error = %err,
                    "downstream call failed"
                );
                vec![Part::error(request.service, &err.to_string())]
            }
        }
    }

    async fn try_call(&self, request: &OutgoingRequest) -> Result<Vec<Part>> {
        let response = self
            .http
            .request(request.method.clone(), &request.url)
            .header(http::header::HOST, request.host.as_str())
            .header(http::header::CONTENT_TYPE, request.content_type.as_str())
            .body(request.body.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| self.classify(err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BraidError::DownstreamStatus(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(http::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response
            .bytes()
            .await
            .map_err(|err| self.classify(err))?;

        Ok(reply_parts(&request.service, &content_type, body))
    }

    fn classify(&self, err: reqwest::Error) -> BraidError {
        if err.is_timeout() {
            BraidError::DownstreamTimeout(self.timeout.as_millis() as u64)
        } else {
            BraidError::DownstreamConnect(err.to_string())
        }
    }
}

/// Splits a downstream reply into labelled parts.
///
/// Multipart replies contribute their parts under their own labels;
/// anything else becomes a single part named after the producing service.
fn reply_parts(service: &str, content_type: &str, body: Bytes) -> Vec<Part> {
    if MultipartMessage::is_multipart(content_type) {
        match MultipartMessage::decode(content_type, &body) {
            Ok(message) => return message.into_parts(),
            Err(err) => {
                tracing::warn!(
                    service = %service,
                    error = %err,
                    "treating undecodable multipart reply as opaque"
                );
            }
        }
    }
    vec![Part::new(service, body)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use braid_common::protocol::DEFAULT_CHUNK_NAME;

    #[test]
    fn test_plain_reply_becomes_one_part_named_after_service() {
        let parts = reply_parts("svc", "text/plain", Bytes::from("hello"));
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].name, "svc");
        assert_eq!(parts[0].body, Bytes::from("hello"));
    }

    #[test]
    fn test_multipart_reply_keeps_its_own_labels() {
        let mut message = MultipartMessage::with_boundary("b");
        message.push(Part::new("left", "l"));
        message.push(Part::new("right", "r"));
        let parts = reply_parts("svc", &message.content_type(), message.encode());
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].name, "left");
        assert_eq!(parts[1].name, "right");
    }

    #[test]
    fn test_unnamed_multipart_reply_part_gets_default_name() {
        let body = "--b\r\n\r\npayload\r\n--b--\r\n";
        let parts = reply_parts(
            "svc",
            "multipart/form-data; boundary=b",
            Bytes::from(body),
        );
        assert_eq!(parts[0].name, DEFAULT_CHUNK_NAME);
    }

    #[test]
    fn test_undecodable_multipart_reply_is_opaque() {
        let parts = reply_parts("svc", "multipart/form-data", Bytes::from("junk"));
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].name, "svc");
    }
}

//! Labelled body parts.
//!
//! A part is one segment of a multipart body: a label, an optional set of
//! auxiliary headers, and an opaque payload. Parts produced by a service
//! that does not name them explicitly carry [`DEFAULT_CHUNK_NAME`].

use bytes::Bytes;

/// Label applied to parts that carry no explicit name of their own.
pub const DEFAULT_CHUNK_NAME: &str = "default";

/// Part header marking a synthesized error reply.
pub const ERROR_HEADER: &str = "x-braid-error";

/// One labelled segment of a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    /// Part label. For downstream replies this is the producing service's
    /// name unless the reply named its parts itself.
    pub name: String,
    /// Auxiliary part headers, excluding the Content-Disposition line that
    /// carries the label.
    pub headers: Vec<(String, String)>,
    /// Opaque payload.
    pub body: Bytes,
}

impl Part {
    /// Creates a part with a label and payload and no auxiliary headers.
    pub fn new(name: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Adds an auxiliary header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Looks up an auxiliary header, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Synthesized reply part for a failed downstream call. The diagnostic
    /// is carried both in the payload and in the [`ERROR_HEADER`] header.
    pub fn error(service: impl Into<String>, message: &str) -> Self {
        Self {
            name: service.into(),
            headers: vec![(ERROR_HEADER.to_string(), message.to_string())],
            body: Bytes::copy_from_slice(message.as_bytes()),
        }
    }

    /// Whether this part is a synthesized error reply.
    pub fn is_error(&self) -> bool {
        self.header(ERROR_HEADER).is_some()
    }
}

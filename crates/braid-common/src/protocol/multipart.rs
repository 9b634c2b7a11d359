//! Multipart wire codec.
//!
//! Messages are framed the `multipart/form-data` way: each part opens with
//! `--<boundary>`, carries a `Content-Disposition` line naming the part,
//! optional auxiliary headers, a blank line, and the payload; the message
//! closes with `--<boundary>--`.
//!
//! # Wire Format
//!
//! ```text
//! --<boundary>\r\n
//! Content-Disposition: form-data; name="<label>"\r\n
//! <header>: <value>\r\n
//! \r\n
//! <payload>\r\n
//! --<boundary>--\r\n
//! ```
//!
//! Decoding is lenient about unnamed parts (they get
//! [`DEFAULT_CHUNK_NAME`]) and strict about framing: a missing boundary
//! parameter or an unterminated part is an error.

use bytes::Bytes;

use crate::protocol::error::{BraidError, Result};
use crate::protocol::part::{Part, DEFAULT_CHUNK_NAME};

/// An ordered sequence of labelled parts plus the boundary framing them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartMessage {
    boundary: String,
    parts: Vec<Part>,
}

impl MultipartMessage {
    /// Creates an empty message with a fresh random boundary.
    pub fn new() -> Self {
        Self::with_boundary(format!("braid{:032x}", rand::random::<u128>()))
    }

    /// Creates an empty message with an explicit boundary.
    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            parts: Vec::new(),
        }
    }

    /// Whether a Content-Type header value denotes a multipart body.
    pub fn is_multipart(content_type: &str) -> bool {
        content_type
            .trim_start()
            .to_ascii_lowercase()
            .starts_with("multipart/")
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// The Content-Type header value announcing this message.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn push(&mut self, part: Part) {
        self.parts.push(part);
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn into_parts(self) -> Vec<Part> {
        self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Encodes the message into its wire form.
    pub fn encode(&self) -> Bytes {
        let mut buf = Vec::new();
        for part in &self.parts {
            buf.extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
            buf.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n", part.name).as_bytes(),
            );
            for (name, value) in &part.headers {
                buf.extend_from_slice(format!("{}: {}\r\n", name, value).as_bytes());
            }
            buf.extend_from_slice(b"\r\n");
            buf.extend_from_slice(&part.body);
            buf.extend_from_slice(b"\r\n");
        }
        buf.extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        Bytes::from(buf)
    }

    /// Decodes a multipart body given its Content-Type header value.
    ///
    /// # Arguments
    ///
    /// * `content_type` - The Content-Type header value carrying the
    ///   boundary parameter
    /// * `body` - The raw body bytes
    ///
    /// # Errors
    ///
    /// Returns `BraidError::Multipart` when the boundary parameter is
    /// missing or the framing is malformed.
    pub fn decode(content_type: &str, body: &[u8]) -> Result<Self> {
        let boundary = boundary_param(content_type)
            .ok_or_else(|| BraidError::Multipart("missing boundary parameter".to_string()))?;
        let delimiter = format!("--{}", boundary);
        let delimiter = delimiter.as_bytes();

        let mut parts = Vec::new();
        let mut pos = find(body, delimiter)
            .ok_or_else(|| BraidError::Multipart("opening boundary not found".to_string()))?;

        loop {
            pos += delimiter.len();
            let rest = &body[pos..];
            if rest.starts_with(b"--") {
                break;
            }
            let rest = rest
                .strip_prefix(b"\r\n")
                .ok_or_else(|| BraidError::Multipart("malformed boundary line".to_string()))?;
            pos += 2;

            let end = find(rest, delimiter)
                .ok_or_else(|| BraidError::Multipart("unterminated part".to_string()))?;
            let block = rest[..end].strip_suffix(b"\r\n").unwrap_or(&rest[..end]);
            parts.push(parse_part(block)?);
            pos += end;
        }

        Ok(Self {
            boundary: boundary.to_string(),
            parts,
        })
    }
}

impl Default for MultipartMessage {
    fn default() -> Self {
        Self::new()
    }
}

/// Extracts the boundary parameter from a Content-Type header value.
fn boundary_param(content_type: &str) -> Option<&str> {
    content_type.split(';').find_map(|segment| {
        let segment = segment.trim();
        segment
            .strip_prefix("boundary=")
            .map(|value| value.trim_matches('"'))
    })
}

/// Parses one part block: headers, blank line, payload.
fn parse_part(block: &[u8]) -> Result<Part> {
    let (head, payload) = match find(block, b"\r\n\r\n") {
        Some(split) => (&block[..split], &block[split + 4..]),
        None => (block, &[][..]),
    };
    let head = std::str::from_utf8(head)
        .map_err(|_| BraidError::Multipart("part headers are not valid UTF-8".to_string()))?;

    let mut name = DEFAULT_CHUNK_NAME.to_string();
    let mut headers = Vec::new();
    for line in head.split("\r\n").filter(|line| !line.is_empty()) {
        let (key, value) = line
            .split_once(':')
            .ok_or_else(|| BraidError::Multipart(format!("malformed part header: {line}")))?;
        let key = key.trim();
        let value = value.trim();
        if key.eq_ignore_ascii_case("content-disposition") {
            if let Some(label) = disposition_name(value) {
                name = label.to_string();
            }
        } else {
            headers.push((key.to_string(), value.to_string()));
        }
    }

    Ok(Part {
        name,
        headers,
        body: Bytes::copy_from_slice(payload),
    })
}

/// Extracts `name="…"` from a Content-Disposition value.
fn disposition_name(value: &str) -> Option<&str> {
    let start = value.find("name=\"")? + "name=\"".len();
    let rest = &value[start..];
    let end = rest.find('"')?;
    Some(&rest[..end])
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_wire_format() {
        let mut message = MultipartMessage::with_boundary("b0");
        message.push(Part::new("svc", "hello"));
        let encoded = message.encode();
        let expected = "--b0\r\n\
                        Content-Disposition: form-data; name=\"svc\"\r\n\
                        \r\n\
                        hello\r\n\
                        --b0--\r\n";
        assert_eq!(encoded, Bytes::from(expected));
    }

    #[test]
    fn test_decode_named_parts() {
        let body = "--xyz\r\n\
                    Content-Disposition: form-data; name=\"first\"\r\n\
                    \r\n\
                    one\r\n\
                    --xyz\r\n\
                    Content-Disposition: form-data; name=\"second\"\r\n\
                    X-Extra: yes\r\n\
                    \r\n\
                    two\r\n\
                    --xyz--\r\n";
        let message =
            MultipartMessage::decode("multipart/form-data; boundary=xyz", body.as_bytes()).unwrap();
        assert_eq!(message.len(), 2);
        assert_eq!(message.parts()[0].name, "first");
        assert_eq!(message.parts()[0].body, Bytes::from("one"));
        assert_eq!(message.parts()[1].name, "second");
        assert_eq!(message.parts()[1].header("x-extra"), Some("yes"));
        assert_eq!(message.parts()[1].body, Bytes::from("two"));
    }

    #[test]
    fn test_decode_unnamed_part_gets_default_chunk_name() {
        let body = "--xyz\r\n\
                    X-Extra: yes\r\n\
                    \r\n\
                    payload\r\n\
                    --xyz--\r\n";
        let message =
            MultipartMessage::decode("multipart/form-data; boundary=xyz", body.as_bytes()).unwrap();
        assert_eq!(message.parts()[0].name, DEFAULT_CHUNK_NAME);
    }

    #[test]
    fn test_encode_decode_preserves_parts() {
        let mut message = MultipartMessage::new();
        message.push(Part::new("a", "alpha").with_header("X-A", "1"));
        message.push(Part::new("b", Bytes::from_static(b"\x00\x01binary")));
        let decoded =
            MultipartMessage::decode(&message.content_type(), &message.encode()).unwrap();
        assert_eq!(decoded.parts(), message.parts());
    }

    #[test]
    fn test_decode_missing_boundary_parameter() {
        let result = MultipartMessage::decode("multipart/form-data", b"--x--\r\n");
        assert!(matches!(result, Err(BraidError::Multipart(_))));
    }

    #[test]
    fn test_decode_unterminated_part() {
        let body = "--xyz\r\n\
                    Content-Disposition: form-data; name=\"first\"\r\n\
                    \r\n\
                    one";
        let result = MultipartMessage::decode("multipart/form-data; boundary=xyz", body.as_bytes());
        assert!(matches!(result, Err(BraidError::Multipart(_))));
    }

    #[test]
    fn test_decode_quoted_boundary() {
        let body = "--xyz\r\n\
                    Content-Disposition: form-data; name=\"only\"\r\n\
                    \r\n\
                    data\r\n\
                    --xyz--\r\n";
        let message =
            MultipartMessage::decode("multipart/form-data; boundary=\"xyz\"", body.as_bytes())
                .unwrap();
        assert_eq!(message.parts()[0].name, "only");
    }

    #[test]
    fn test_is_multipart() {
        assert!(MultipartMessage::is_multipart("multipart/form-data; boundary=x"));
        assert!(MultipartMessage::is_multipart("Multipart/Mixed"));
        assert!(!MultipartMessage::is_multipart("application/json"));
    }

    #[test]
    fn test_empty_message_encodes_closing_boundary_only() {
        let message = MultipartMessage::with_boundary("b");
        assert_eq!(message.encode(), Bytes::from("--b--\r\n"));
        assert!(message.is_empty());
    }
}

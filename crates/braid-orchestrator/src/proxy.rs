//! Proxy handler glue.
//!
//! One handler exists per configured graph. It binds an incoming request
//! to the graph, extracts the client parts, allocates the per-request
//! state, kicks the orchestrator, and awaits the completion latch. It
//! holds nothing beyond shared references.

use std::sync::Arc;

use braid_common::protocol::{MultipartMessage, Part, DEFAULT_CHUNK_NAME};
use bytes::Bytes;
use http::Method;
use tokio::sync::{oneshot, Mutex};

use crate::graph::CompiledGraph;
use crate::orchestrator::Orchestrator;
use crate::request_state::RequestState;

pub struct ProxyHandler {
    graph: Arc<CompiledGraph>,
    orchestrator: Arc<Orchestrator>,
    allow_nested_requests: bool,
}

impl ProxyHandler {
    pub fn new(
        graph: Arc<CompiledGraph>,
        orchestrator: Arc<Orchestrator>,
        allow_nested_requests: bool,
    ) -> Self {
        Self {
            graph,
            orchestrator,
            allow_nested_requests,
        }
    }

    pub fn graph(&self) -> &CompiledGraph {
        &self.graph
    }

    /// Entry point from the routing layer. Returns the aggregated
    /// multipart response once every service has replied.
    ///
    /// # Arguments
    ///
    /// * `method` - Client request method, forwarded to every downstream
    /// * `path` - Client request path, the target for services without a
    ///   path override
    /// * `content_type` - Client Content-Type header, if any
    /// * `body` - Buffered client request body
    ///
    /// # Behavior
    ///
    /// The orchestrator runs as its own task: if the caller goes away
    /// (client disconnect) the graph still drains, and the completed
    /// response is dropped silently.
    pub async fn handle(
        &self,
        method: Method,
        path: String,
        content_type: Option<&str>,
        body: Bytes,
    ) -> MultipartMessage {
        let client_parts = client_parts(self.allow_nested_requests, content_type, body);
        let (responder, completion) = oneshot::channel();
        let state = Arc::new(Mutex::new(RequestState::new(
            Arc::clone(&self.graph),
            method,
            path,
            client_parts,
            responder,
        )));

        let orchestrator = Arc::clone(&self.orchestrator);
        tokio::spawn(async move { orchestrator.run(state).await });

        let mut message = MultipartMessage::new();
        if let Ok(parts) = completion.await {
            for part in parts {
                message.push(part);
            }
        }
        message
    }
}

/// Extracts the client request parts that get folded into outgoing
/// downstream bodies.
///
/// With nested requests enabled, a multipart client body contributes its
/// parts verbatim. Otherwise the body is opaque: a single part carrying
/// the default chunk name, or nothing when empty.
fn client_parts(allow_nested: bool, content_type: Option<&str>, body: Bytes) -> Vec<Part> {
    if allow_nested {
        if let Some(content_type) =
            content_type.filter(|value| MultipartMessage::is_multipart(value))
        {
            match MultipartMessage::decode(content_type, &body) {
                Ok(message) => return message.into_parts(),
                Err(err) => {
                    tracing::warn!(error = %err, "treating undecodable client body as opaque");
                }
            }
        }
    }
    if body.is_empty() {
        Vec::new()
    } else {
        vec![Part::new(DEFAULT_CHUNK_NAME, body)]
    }
}

//! Per-request mutable state.
//!
//! Everything a single in-flight client request accumulates lives here,
//! behind one per-request lock: which services are still pending, which
//! are in flight, which have replied, and the parts gathered for the final
//! response. The compiled graph itself is shared and never mutated.
//!
//! Per service the state machine is `pending -> in_progress -> replied`,
//! with no back edges; a service is always in exactly one of the three
//! sets.

use std::collections::HashSet;
use std::sync::Arc;

use braid_common::protocol::Part;
use http::Method;
use tokio::sync::oneshot;

use crate::graph::CompiledGraph;

pub struct RequestState {
    graph: Arc<CompiledGraph>,
    pending: HashSet<String>,
    in_progress: HashSet<String>,
    replied: HashSet<String>,
    client_method: Method,
    client_path: String,
    /// Parts extracted from the inbound request body; folded into every
    /// outgoing downstream body.
    client_parts: Vec<Part>,
    /// Reply parts in arrival order; the final aggregated response, and
    /// the window through which dependents see their dependencies.
    response_parts: Vec<Part>,
    /// One-shot completion latch. Taking it is the `done` transition;
    /// afterwards late replies are dropped.
    responder: Option<oneshot::Sender<Vec<Part>>>,
}

impl RequestState {
    pub fn new(
        graph: Arc<CompiledGraph>,
        client_method: Method,
        client_path: String,
        client_parts: Vec<Part>,
        responder: oneshot::Sender<Vec<Part>>,
    ) -> Self {
        let pending = graph.order().iter().cloned().collect();
        Self {
            graph,
            pending,
            in_progress: HashSet::new(),
            replied: HashSet::new(),
            client_method,
            client_path,
            client_parts,
            response_parts: Vec::new(),
            responder: Some(responder),
        }
    }

    pub fn graph(&self) -> &CompiledGraph {
        &self.graph
    }

    pub fn client_method(&self) -> &Method {
        &self.client_method
    }

    pub fn client_path(&self) -> &str {
        &self.client_path
    }

    pub fn client_parts(&self) -> &[Part] {
        &self.client_parts
    }

    pub fn response_parts(&self) -> &[Part] {
        &self.response_parts
    }

    /// Moves every ready service from `pending` to `in_progress` and
    /// returns them in configuration order.
    ///
    /// A service is ready when it is still pending and every one of its
    /// dependencies has replied.
    pub fn take_ready(&mut self) -> Vec<String> {
        let ready: Vec<String> = self
            .graph
            .order()
            .iter()
            .filter(|name| {
                self.pending.contains(*name)
                    && self
                        .graph
                        .dependencies(name)
                        .all(|dep| self.replied.contains(dep))
            })
            .cloned()
            .collect();

        for name in &ready {
            self.pending.remove(name);
            self.in_progress.insert(name.clone());
        }
        ready
    }

    /// Records a downstream reply, appending its parts to the aggregated
    /// response.
    ///
    /// Returns `false` when the reply has no matching dispatch (unknown
    /// service, double reply, reply after completion); such replies must
    /// be dropped by the caller.
    pub fn record_reply(&mut self, service: &str, parts: Vec<Part>) -> bool {
        if !self.in_progress.remove(service) {
            return false;
        }
        self.replied.insert(service.to_string());
        self.response_parts.extend(parts);
        true
    }

    /// The request is complete when nothing is pending or in flight.
    pub fn is_complete(&self) -> bool {
        self.pending.is_empty() && self.in_progress.is_empty()
    }

    /// Takes the completion latch together with the accumulated response
    /// parts. Yields `Some` exactly once.
    pub fn take_completion(&mut self) -> Option<(oneshot::Sender<Vec<Part>>, Vec<Part>)> {
        let responder = self.responder.take()?;
        Some((responder, std::mem::take(&mut self.response_parts)))
    }
}

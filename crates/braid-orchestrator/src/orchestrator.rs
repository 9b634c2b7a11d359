//! Per-request orchestration engine.
//!
//! The orchestrator drives one request's service graph to completion. It
//! reacts to two kinds of events: the initial start, and each downstream
//! reply. On every event it re-scans the pending set under the request
//! lock, dispatches every service whose dependencies are satisfied, and
//! folds replies into the request state. When nothing remains pending or
//! in flight it releases the completion latch, exactly once.
//!
//! Dispatches are spawned tasks; the lock is held only for the readiness
//! scan and request preparation, never across I/O. Reply delivery re-enters
//! the engine through a per-request channel, which keeps all state
//! transitions serialized without blocking any worker thread.

use std::sync::Arc;

use braid_common::protocol::{MultipartMessage, Part};
use braid_common::{BraidError, Result};
use tokio::sync::{mpsc, Mutex};

use crate::downstream::{DownstreamClient, OutgoingRequest};
use crate::host_pool::HostPool;
use crate::request_state::RequestState;

type Reply = (String, Vec<Part>);

/// Shared orchestration engine. One instance serves every request; all
/// per-request state lives in the [`RequestState`] passed to [`run`].
///
/// [`run`]: Orchestrator::run
pub struct Orchestrator {
    hosts: Arc<HostPool>,
    client: Arc<DownstreamClient>,
}

impl Orchestrator {
    pub fn new(hosts: Arc<HostPool>, client: Arc<DownstreamClient>) -> Self {
        Self { hosts, client }
    }

    /// Drives the request to completion. The completion latch inside the
    /// state fires exactly once, after every service has replied.
    ///
    /// # Behavior
    ///
    /// - Dispatches every service with no unsatisfied dependencies
    /// - Re-scans after each downstream reply and dispatches the newly
    ///   ready services
    /// - Converts every downstream failure into a synthesized error part,
    ///   so the graph always drains
    pub async fn run(&self, state: Arc<Mutex<RequestState>>) {
        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<Reply>();

        if self.on_event(&state, &reply_tx, None).await {
            return;
        }
        while let Some(reply) = reply_rx.recv().await {
            if self.on_event(&state, &reply_tx, Some(reply)).await {
                return;
            }
        }
    }

    /// One orchestration event: record the reply (if any), re-scan for
    /// newly-ready services, dispatch them, and release the completion
    /// latch when the graph has drained. Returns `true` on completion.
    async fn on_event(
        &self,
        state: &Arc<Mutex<RequestState>>,
        reply_tx: &mpsc::UnboundedSender<Reply>,
        reply: Option<Reply>,
    ) -> bool {
        let (dispatches, completion) = {
            let mut state = state.lock().await;

            if let Some((service, parts)) = reply {
                if !state.record_reply(&service, parts) {
                    tracing::debug!(
                        service = %service,
                        "dropping reply with no matching dispatch"
                    );
                    return false;
                }
                tracing::debug!(
                    graph = %state.graph().name(),
                    service = %service,
                    "service replied"
                );
            }

            let ready = state.take_ready();
            let dispatches: Vec<(String, Result<OutgoingRequest>)> = ready
                .into_iter()
                .map(|service| {
                    let prepared = self.prepare_outgoing(&state, &service);
                    (service, prepared)
                })
                .collect();

            let completion = if state.is_complete() {
                state.take_completion()
            } else {
                None
            };
            (dispatches, completion)
        };

        if let Some((responder, parts)) = completion {
            // The receiver may be gone when the client disconnected; late
            // completion is dropped silently.
            let _ = responder.send(parts);
            return true;
        }

        for (service, prepared) in dispatches {
            tracing::debug!(service = %service, "dispatching");
            let client = Arc::clone(&self.client);
            let reply_tx = reply_tx.clone();
            tokio::spawn(async move {
                let parts = match prepared {
                    Ok(outgoing) => client.call(outgoing).await,
                    // A service that cannot be prepared still satisfies its
                    // dependents, through a synthesized error reply.
                    Err(err) => vec![Part::error(service.clone(), &err.to_string())],
                };
                let _ = reply_tx.send((service, parts));
            });
        }
        false
    }

    /// Builds the outgoing request for a ready service: method and path
    /// from the service definition (falling back to the client request
    /// path), endpoint from the service's host group, and a multipart body
    /// carrying the client parts plus every reply gathered so far.
    fn prepare_outgoing(&self, state: &RequestState, service: &str) -> Result<OutgoingRequest> {
        let graph = state.graph();
        let definition = graph
            .service(service)
            .ok_or_else(|| BraidError::UnknownService {
                graph: graph.name().to_string(),
                service: service.to_string(),
            })?;
        let host = self
            .hosts
            .pick(&definition.hosts_from)
            .ok_or_else(|| BraidError::UnknownHostGroup {
                graph: graph.name().to_string(),
                group: definition.hosts_from.clone(),
            })?;

        let path = definition.path.as_deref().unwrap_or(state.client_path());
        let mut message = MultipartMessage::new();
        for part in state.client_parts() {
            message.push(part.clone());
        }
        for part in state.response_parts() {
            message.push(part.clone());
        }

        let authority = host.authority();
        Ok(OutgoingRequest {
            service: service.to_string(),
            method: state.client_method().clone(),
            url: format!("http://{}{}", authority, path),
            host: authority,
            content_type: message.content_type(),
            body: message.encode(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use braid_common::config::{GraphConfig, HostEntry};
    use http::Method;
    use std::collections::BTreeMap;
    use std::time::Duration;
    use tokio::sync::oneshot;

    use crate::graph::CompiledGraph;

    fn test_pool() -> Arc<HostPool> {
        let mut hosts = BTreeMap::new();
        hosts.insert(
            "svc".to_string(),
            vec![
                HostEntry {
                    addr: "10.0.0.1".to_string(),
                    port: 81,
                },
                HostEntry {
                    addr: "10.0.0.2".to_string(),
                    port: 82,
                },
            ],
        );
        Arc::new(HostPool::new(hosts))
    }

    fn test_orchestrator() -> Orchestrator {
        Orchestrator::new(
            test_pool(),
            Arc::new(DownstreamClient::new(Duration::from_millis(100))),
        )
    }

    fn state_for(
        graph_json: serde_json::Value,
        client_parts: Vec<Part>,
    ) -> RequestState {
        let config: GraphConfig = serde_json::from_value(graph_json).unwrap();
        let graph =
            Arc::new(CompiledGraph::compile("g", &config, &test_pool()).unwrap());
        let (responder, _completion) = oneshot::channel();
        RequestState::new(graph, Method::POST, "/x".to_string(), client_parts, responder)
    }

    #[test]
    fn test_prepare_outgoing_uses_client_path_when_unset() {
        let orchestrator = test_orchestrator();
        let state = state_for(serde_json::json!({"services": ["svc"]}), Vec::new());
        let outgoing = orchestrator.prepare_outgoing(&state, "svc").unwrap();
        assert_eq!(outgoing.method, Method::POST);
        assert_eq!(outgoing.url, "http://10.0.0.1:81/x");
        assert_eq!(outgoing.host, "10.0.0.1:81");
    }

    #[test]
    fn test_prepare_outgoing_prefers_service_path() {
        let orchestrator = test_orchestrator();
        let state = state_for(
            serde_json::json!({
                "services": [{"name": "svc", "path": "/v1/override"}]
            }),
            Vec::new(),
        );
        let outgoing = orchestrator.prepare_outgoing(&state, "svc").unwrap();
        assert_eq!(outgoing.url, "http://10.0.0.1:81/v1/override");
    }

    #[test]
    fn test_prepare_outgoing_rotates_hosts() {
        let orchestrator = test_orchestrator();
        let state = state_for(serde_json::json!({"services": ["svc"]}), Vec::new());
        let first = orchestrator.prepare_outgoing(&state, "svc").unwrap();
        let second = orchestrator.prepare_outgoing(&state, "svc").unwrap();
        assert_eq!(first.host, "10.0.0.1:81");
        assert_eq!(second.host, "10.0.0.2:82");
    }

    #[test]
    fn test_prepare_outgoing_folds_client_and_reply_parts() {
        let orchestrator = test_orchestrator();
        let mut state = state_for(
            serde_json::json!({
                "services": ["svc", {"name": "dep", "hosts_from": "svc"}],
                "deps": [{"a": "svc", "b": "dep"}]
            }),
            vec![Part::new("default", "client-body")],
        );
        assert_eq!(state.take_ready(), ["dep"]);
        assert!(state.record_reply("dep", vec![Part::new("dep", "dep-reply")]));

        let outgoing = orchestrator.prepare_outgoing(&state, "svc").unwrap();
        let message =
            MultipartMessage::decode(&outgoing.content_type, &outgoing.body).unwrap();
        let names: Vec<&str> = message
            .parts()
            .iter()
            .map(|part| part.name.as_str())
            .collect();
        assert_eq!(names, ["default", "dep"]);
        assert_eq!(message.parts()[1].body, bytes::Bytes::from("dep-reply"));
    }

    #[test]
    fn test_prepare_outgoing_unknown_service() {
        let orchestrator = test_orchestrator();
        let state = state_for(serde_json::json!({"services": ["svc"]}), Vec::new());
        assert!(matches!(
            orchestrator.prepare_outgoing(&state, "ghost"),
            Err(BraidError::UnknownService { .. })
        ));
    }
}

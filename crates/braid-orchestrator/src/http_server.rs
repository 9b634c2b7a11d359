//! HTTP front-end.
//!
//! This module assembles the application from a parsed configuration
//! document — host pool, compiled graphs, proxy handlers, route table —
//! and serves it with axum. Every method and path funnels through a
//! fallback handler that consults the route table; `GET /__health` is the
//! only fixed route.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use braid_common::config::Config;
use braid_common::{BraidError, Result};
use bytes::Bytes;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::downstream::DownstreamClient;
use crate::graph::CompiledGraph;
use crate::host_pool::HostPool;
use crate::orchestrator::Orchestrator;
use crate::proxy::ProxyHandler;
use crate::route_table::RouteTable;

/// Maximum inbound body size in bytes (16 MB).
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

struct AppState {
    routes: RouteTable,
}

/// The assembled server: shared application state plus bind parameters.
pub struct HttpServer {
    state: Arc<AppState>,
    bind4: Option<String>,
    bind6: Option<String>,
    port: u16,
}

impl HttpServer {
    /// Builds the full application from a validated configuration
    /// document.
    ///
    /// # Errors
    ///
    /// Any graph compilation failure, plus `UnknownGraphInRoute` when a
    /// route references an undeclared graph.
    pub fn from_config(config: &Config) -> Result<Self> {
        let hosts = Arc::new(HostPool::new(config.parse_hosts()?));
        let client = Arc::new(DownstreamClient::new(Duration::from_millis(
            config.downstream_timeout_ms,
        )));
        let orchestrator = Arc::new(Orchestrator::new(Arc::clone(&hosts), client));

        let mut handlers: HashMap<&str, Arc<ProxyHandler>> = HashMap::new();
        for (name, graph_config) in &config.graphs {
            let graph = Arc::new(CompiledGraph::compile(name, graph_config, &hosts)?);
            info!(graph = %name, services = graph.len(), "compiled graph");
            handlers.insert(
                name,
                Arc::new(ProxyHandler::new(
                    graph,
                    Arc::clone(&orchestrator),
                    config.allow_nested_requests,
                )),
            );
        }

        let mut routes = RouteTable::new();
        for route in &config.routes {
            let handler =
                handlers
                    .get(route.g.as_str())
                    .ok_or_else(|| BraidError::UnknownGraphInRoute {
                        route: route.r.clone(),
                        graph: route.g.clone(),
                    })?;
            routes.add(route.r.clone(), Arc::clone(handler));
        }

        // Default to all-interfaces IPv4 when no bind address is given.
        let bind4 = match (&config.bind4, &config.bind6) {
            (None, None) => Some("0.0.0.0".to_string()),
            (bind4, _) => bind4.clone(),
        };

        Ok(Self {
            state: Arc::new(AppState { routes }),
            bind4,
            bind6: config.bind6.clone(),
            port: config.port(),
        })
    }

    /// Binds the configured listeners and serves until failure.
    pub async fn run(self) -> Result<()> {
        let app = self.router();

        let mut addrs = Vec::new();
        if let Some(addr) = &self.bind4 {
            addrs.push(format!("{}:{}", addr, self.port));
        }
        if let Some(addr) = &self.bind6 {
            addrs.push(format!("[{}]:{}", addr, self.port));
        }

        let mut servers = Vec::with_capacity(addrs.len());
        for addr in addrs {
            let listener = TcpListener::bind(&addr).await?;
            info!(address = %listener.local_addr()?, "listening");
            let app = app.clone();
            servers.push(tokio::spawn(async move { axum::serve(listener, app).await }));
        }

        for server in servers {
            server
                .await
                .map_err(|err| BraidError::Io(std::io::Error::other(err)))??;
        }
        Ok(())
    }

    /// The axum router; separate from [`run`] so tests can serve it on an
    /// ephemeral listener.
    ///
    /// [`run`]: HttpServer::run
    pub fn router(&self) -> Router {
        Router::new()
            .route("/__health", get(health))
            .fallback(dispatch)
            .layer(CorsLayer::permissive())
            .layer(DefaultBodyLimit::max(MAX_PAYLOAD_SIZE))
            .with_state(Arc::clone(&self.state))
    }
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Funnel for every routed request: match the path against the route
/// table and hand the request to the graph's proxy handler.
async fn dispatch(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();
    let Some(handler) = state.routes.lookup(&path) else {
        return (StatusCode::NOT_FOUND, "no route\n").into_response();
    };

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());

    let message = handler.handle(method, path, content_type, body).await;
    (
        [(header::CONTENT_TYPE, message.content_type())],
        message.encode(),
    )
        .into_response()
}

//! Braid Orchestration Engine
//!
//! This crate contains the core of the braid composition router: the graph
//! compiler, the per-request orchestration engine, and the HTTP front-end
//! that ties them together.
//!
//! # Architecture Overview
//!
//! ```text
//!  client ──▶ http_server ──▶ route_table ──▶ proxy ──▶ orchestrator
//!                                                           │
//!                                              host_pool ◀──┼──▶ downstream
//!                                                           │
//!  client ◀───────────── aggregated multipart response ◀────┘
//! ```
//!
//! A request is matched to a [`CompiledGraph`] by the route table. The
//! [`Orchestrator`] then fires every service whose dependencies are
//! satisfied, folds each reply into the per-request state, and releases the
//! completion latch once the whole graph has drained. Graphs, the host
//! pool, and the downstream client are built once at startup and shared
//! read-only across requests; all per-request state lives in
//! [`request_state::RequestState`] behind its own lock.

pub mod downstream;
pub mod graph;
pub mod host_pool;
pub mod http_server;
pub mod orchestrator;
pub mod proxy;
pub mod request_state;
pub mod route_table;

pub use downstream::DownstreamClient;
pub use graph::{CompiledGraph, Service};
pub use host_pool::HostPool;
pub use http_server::HttpServer;
pub use orchestrator::Orchestrator;
pub use proxy::ProxyHandler;

//! Braid Common Types
//!
//! This crate provides the shared protocol and configuration layer for the
//! braid HTTP composition router.
//!
//! # Overview
//!
//! Braid sits in front of a fleet of internal services. A single client
//! request is dispatched to a configured set of downstream services in a
//! dependency-respecting order, and their replies are assembled into one
//! multipart response. This crate contains the pieces shared by the engine
//! and the binary:
//!
//! - **Protocol Layer**: labelled multipart parts and the wire codec used
//!   both for outgoing downstream bodies and for the aggregated client
//!   response.
//! - **Configuration Layer**: the serde schema for the JSON configuration
//!   document, plus loading and validation.
//!
//! # Components
//!
//! - [`protocol`] - Multipart message model, codec, and error type
//! - [`config`] - Configuration document schema and loader

pub mod config;
pub mod protocol;

pub use protocol::error::{BraidError, Result};
pub use protocol::{MultipartMessage, Part, DEFAULT_CHUNK_NAME};

//! Braid Protocol Types
//!
//! This module defines the multipart message model used throughout the
//! router. Every downstream reply, every outgoing downstream body, and the
//! final aggregated client response are expressed as ordered sequences of
//! labelled [`Part`]s framed as a multipart body.
//!
//! # Components
//!
//! - **[`Part`]**: one labelled segment of a multipart body
//! - **[`MultipartMessage`]**: an ordered part sequence plus the boundary
//!   used to frame it on the wire
//! - **[`error`]**: the crate-wide error type

pub mod error;
pub mod multipart;
pub mod part;

pub use multipart::MultipartMessage;
pub use part::{Part, DEFAULT_CHUNK_NAME, ERROR_HEADER};

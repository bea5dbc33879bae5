// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Parlance Wire
//!
//! Wire protocol decoders and HTTP plumbing for Parlance.
//!
//! This crate turns raw byte streams into discrete protocol events, with
//! no knowledge of any specific AI API:
//!
//! - [`SseDecoder`] / [`sse_stream`] - Server-Sent Events
//! - [`NdjsonDecoder`] / [`ndjson_stream`] - newline-delimited JSON
//! - [`build_client`] / [`check_status`] - the shared HTTP client and the
//!   canonical status-to-error mapping
//!
//! Decoding is lazy and restartable per call but not rewindable: each
//! decoder instance serves one connection. Malformed individual records
//! are skipped; only the buffer ceiling and transport failures terminate
//! a stream.

pub mod client;
pub mod error;
pub mod ndjson;
pub mod sse;

pub use client::{build_client, build_client_with_timeout, check_status, map_transport_error};
pub use error::WireError;
pub use ndjson::{NdjsonDecoder, ndjson_stream};
pub use sse::{DEFAULT_MAX_BUFFER_BYTES, SseDecoder, SseEvent, sse_stream};

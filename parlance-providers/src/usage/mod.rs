//! Quota monitoring: per-provider parsers and the polling monitor.
//!
//! Each integration decodes one vendor's quota endpoint into the common
//! window model; [`generic`] is the best-effort fallback for shapes
//! nobody has written a parser for. All parsers tolerate missing fields.

pub mod anthropic;
pub mod deepseek;
pub mod generic;
pub mod monitor;
pub mod openrouter;

pub use monitor::{DEFAULT_REFRESH_INTERVAL, UsageMonitor};

//! Common utilities shared by Resque clients and workers.
//!
//! This crate provides:
//! - The wire codec for jobs, failures, worker statuses and admin commands
//! - Legacy date parsing
//! - Redis key naming
//! - Configuration management
//! - Telemetry setup

pub mod codec;
pub mod config;
pub mod datetime;
pub mod keys;
pub mod telemetry;

// Re-export commonly used types
pub use codec::{Codec, CodecError, CommandRegistry, WireRecord};
pub use config::{RedisConfig, ResqueConfig, TelemetryConfig};
pub use datetime::{format_datetime, now_utc, parse_datetime, DateFormat, DateParseError};
pub use keys::KeyNamer;
pub use telemetry::init_tracing;

/// Common error type used at bootstrap
pub type Result<T> = std::result::Result<T, anyhow::Error>;

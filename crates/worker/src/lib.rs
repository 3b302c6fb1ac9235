//! Resque client and worker-side admin protocol
//!
//! This crate provides:
//! - [`Client`]: enqueue jobs into simple, delayed and recurring queues and
//!   take distributed locks
//! - [`AdminChannel`] and [`AdminListener`]: broadcast pause and shutdown
//!   commands and apply them to a running [`Worker`]
//!
//! ## Usage
//!
//! ```rust,ignore
//! use resque_common::{Codec, ResqueConfig};
//! use resque_domain::Job;
//! use resque_worker::Client;
//! use std::sync::Arc;
//!
//! let config = ResqueConfig::load()?;
//! let client = Client::connect(&config, Arc::new(Codec::default())).await?;
//! client.enqueue("mail", Some(&Job::without_args("SendEmail"))).await?;
//! client.end();
//! ```

pub mod admin;
pub mod client;
pub mod error;
pub mod worker;

pub use admin::{AdminChannel, AdminListener, Invocation};
pub use client::Client;
pub use error::{AdminError, ClientError};
pub use worker::Worker;

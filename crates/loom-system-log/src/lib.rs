// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! In-process log aggregation for Loom.
//!
//! This crate provides:
//! - [`SystemLog`] - Sequences entries, keeps the most recent ones in a ring
//!   buffer, and fans them out to attached sinks
//! - [`LogEntry`] - An immutable entry with severity, template, arguments, and attached data
//! - [`LogSink`] / [`LogDecorator`] - Consumer and enrichment extension points
//! - [`SystemLogLayer`] - A tracing Layer that writes tracing events into a [`SystemLog`]
//! - [`LogStream`] - Async consumption over a broadcast channel
//!
//! A sink attached after entries were written first receives the buffered
//! backlog in sequence order, then live entries, with nothing missed or
//! repeated in between.
//!
//! # Usage
//!
//! ```ignore
//! use loom_system_log::{system_log, LogLevel, SystemLog, SystemLogLayer};
//! use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
//!
//! let log = SystemLog::new(10_000)?;
//! system_log!(log, LogLevel::Info, "listening on {0}", addr.to_string())?;
//!
//! tracing_subscriber::registry()
//!     .with(tracing_subscriber::fmt::layer())
//!     .with(SystemLogLayer::new(log.clone()))
//!     .init();
//!
//! // Replays what was already written, then follows live entries.
//! let handle = log.add_sink_fn(|entry| println!("{entry}"))?;
//! ```

mod broadcast;
mod config;
mod entry;
mod error;
mod factory;
pub mod format;
pub mod global;
mod layer;
mod macros;
mod registry;
mod ring;
mod system_log;

pub use broadcast::{BroadcastSink, LogStream};
pub use config::{
	SystemLogConfig, SystemLogConfigLayer, DEFAULT_BUFFER_CAPACITY, DEFAULT_STREAM_CAPACITY,
};
pub use entry::{EntryData, LogEntry, LogId, LogLevel};
pub use error::{Result, SystemLogError};
pub use factory::{
	Clock, DecoratorHandle, EntryDraft, EntryFactory, FnDecorator, LogDecorator, ManualClock,
	PendingEntry, SystemClock,
};
pub use layer::{SystemLogLayer, TracingEvent};
pub use registry::{FnSink, LogSink, Registration, SinkHandle, SinkRegistry, SinkStats};
pub use ring::RingBuffer;
pub use system_log::SystemLog;

#[doc(hidden)]
pub mod __private {
	pub use serde_json;
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Sink trait and the registry of attached sinks.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::warn;

use crate::entry::LogEntry;
use crate::error::{panic_message, Result, SystemLogError};

/// A consumer of log entries.
///
/// `consume` is called synchronously on the thread that wrote the entry (or
/// that attached the sink, during replay). Entries arrive in sequence order.
/// Returned errors and panics are caught, counted, and reported through
/// `tracing`; they never reach the writer or other sinks.
pub trait LogSink: Send + Sync {
	fn consume(&self, entry: &Arc<LogEntry>) -> anyhow::Result<()>;

	/// Name used in diagnostics.
	fn name(&self) -> &str {
		std::any::type_name::<Self>()
	}
}

/// A [`LogSink`] backed by a closure.
pub struct FnSink<F> {
	name: String,
	f: F,
}

impl<F> FnSink<F>
where
	F: Fn(&Arc<LogEntry>) -> anyhow::Result<()> + Send + Sync,
{
	pub fn new(f: F) -> Self {
		Self::named("fn-sink", f)
	}

	pub fn named(name: impl Into<String>, f: F) -> Self {
		Self {
			name: name.into(),
			f,
		}
	}
}

impl<F> LogSink for FnSink<F>
where
	F: Fn(&Arc<LogEntry>) -> anyhow::Result<()> + Send + Sync,
{
	fn consume(&self, entry: &Arc<LogEntry>) -> anyhow::Result<()> {
		(self.f)(entry)
	}

	fn name(&self) -> &str {
		&self.name
	}
}

/// Handle returned when a sink is attached; used to detach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SinkHandle(u64);

impl fmt::Display for SinkHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "sink-{}", self.0)
	}
}

/// Delivery counters for one registration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkStats {
	/// Entries consumed successfully (replay included).
	pub delivered: u64,
	/// Entries whose `consume` returned an error or panicked.
	pub failed: u64,
}

#[derive(Default)]
struct SinkCounters {
	delivered: AtomicU64,
	failed: AtomicU64,
}

/// One attached sink.
#[derive(Clone)]
pub struct Registration {
	handle: SinkHandle,
	sink: Arc<dyn LogSink>,
	counters: Arc<SinkCounters>,
}

impl Registration {
	pub fn handle(&self) -> SinkHandle {
		self.handle
	}

	pub fn sink(&self) -> &Arc<dyn LogSink> {
		&self.sink
	}

	pub fn stats(&self) -> SinkStats {
		SinkStats {
			delivered: self.counters.delivered.load(Ordering::Relaxed),
			failed: self.counters.failed.load(Ordering::Relaxed),
		}
	}

	/// Hand one entry to the sink, isolating any failure.
	pub(crate) fn deliver(&self, entry: &Arc<LogEntry>) {
		let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.sink.consume(entry)));
		match outcome {
			Ok(Ok(())) => {
				self.counters.delivered.fetch_add(1, Ordering::Relaxed);
			}
			Ok(Err(err)) => {
				self.counters.failed.fetch_add(1, Ordering::Relaxed);
				warn!(
					sink = self.sink.name(),
					handle = %self.handle,
					sequence_id = entry.sequence_id,
					error = %err,
					"log sink failed to consume entry"
				);
			}
			Err(payload) => {
				self.counters.failed.fetch_add(1, Ordering::Relaxed);
				warn!(
					sink = self.sink.name(),
					handle = %self.handle,
					sequence_id = entry.sequence_id,
					panic = %panic_message(payload.as_ref()),
					"log sink panicked while consuming entry"
				);
			}
		}
	}
}

impl fmt::Debug for Registration {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Registration")
			.field("handle", &self.handle)
			.field("sink", &self.sink.name())
			.field("stats", &self.stats())
			.finish()
	}
}

/// The set of attached sinks.
///
/// Membership is copy-on-write: [`SinkRegistry::members`] hands out an
/// immutable snapshot that stays valid while the registry keeps changing, so
/// fan-out never iterates a set that is being modified. The registry takes
/// `&mut self` for changes; [`SystemLog`](crate::SystemLog) serializes those
/// behind its own lock.
#[derive(Debug)]
pub struct SinkRegistry {
	members: Arc<Vec<Registration>>,
	next_handle: u64,
}

impl SinkRegistry {
	pub fn new() -> Self {
		Self {
			members: Arc::new(Vec::new()),
			next_handle: 1,
		}
	}

	/// Register a sink.
	///
	/// The same sink instance (by `Arc` identity) cannot be registered twice.
	pub fn add(&mut self, sink: Arc<dyn LogSink>) -> Result<Registration> {
		if let Some(existing) = self.members.iter().find(|r| same_sink(&r.sink, &sink)) {
			return Err(SystemLogError::DuplicateSink(existing.handle));
		}

		let registration = Registration {
			handle: SinkHandle(self.next_handle),
			sink,
			counters: Arc::new(SinkCounters::default()),
		};
		self.next_handle += 1;
		Arc::make_mut(&mut self.members).push(registration.clone());
		Ok(registration)
	}

	/// Unregister a sink. Returns `false` if the handle is not registered.
	pub fn remove(&mut self, handle: SinkHandle) -> bool {
		let Some(index) = self.members.iter().position(|r| r.handle == handle) else {
			return false;
		};
		Arc::make_mut(&mut self.members).remove(index);
		true
	}

	/// Snapshot of the current members, in registration order.
	pub fn members(&self) -> Arc<Vec<Registration>> {
		Arc::clone(&self.members)
	}

	pub fn get(&self, handle: SinkHandle) -> Option<&Registration> {
		self.members.iter().find(|r| r.handle == handle)
	}

	pub fn len(&self) -> usize {
		self.members.len()
	}

	pub fn is_empty(&self) -> bool {
		self.members.is_empty()
	}
}

impl Default for SinkRegistry {
	fn default() -> Self {
		Self::new()
	}
}

fn same_sink(a: &Arc<dyn LogSink>, b: &Arc<dyn LogSink>) -> bool {
	std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! The log aggregator: level filter, sequencing, ring buffer, and sink fan-out.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::ReentrantMutex;
use serde_json::Value;
use tracing::debug;

use crate::broadcast::{BroadcastSink, LogStream};
use crate::config::{SystemLogConfig, DEFAULT_BUFFER_CAPACITY, DEFAULT_STREAM_CAPACITY};
use crate::entry::{EntryData, LogEntry, LogId, LogLevel};
use crate::error::{Result, SystemLogError};
use crate::factory::{
	Clock, DecoratorHandle, EntryDraft, EntryFactory, FnDecorator, LogDecorator, SystemClock,
};
use crate::registry::{FnSink, LogSink, Registration, SinkHandle, SinkRegistry, SinkStats};
use crate::ring::RingBuffer;

const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(DEFAULT_BUFFER_CAPACITY) {
	Some(capacity) => capacity,
	None => panic!("default buffer capacity must be non-zero"),
};

/// An in-process log aggregator.
///
/// Every accepted write gets the next sequence number (starting at 0), is
/// kept in a bounded ring buffer, and is delivered synchronously to every
/// attached sink. A sink attached later first receives the buffered backlog,
/// oldest first, and then live entries, with no gap and no duplicate between
/// the two.
///
/// Accepting an entry, attaching a sink (snapshot + register + replay), and
/// detaching a sink each happen inside one critical section, so sinks see a
/// totally ordered stream. Delivery cost is paid by the calling thread.
///
/// Cloning is cheap and yields a handle to the same log.
#[derive(Clone)]
pub struct SystemLog {
	inner: Arc<Inner>,
}

struct Inner {
	level: AtomicU8,
	factory: EntryFactory,
	stream_capacity: usize,
	state: ReentrantMutex<RefCell<State>>,
}

struct State {
	ring: RingBuffer<Arc<LogEntry>>,
	registry: SinkRegistry,
	/// Set while a frame on the lock-holding thread is delivering.
	delivering: bool,
	/// Accepted entries waiting for the active delivery frame.
	queue: VecDeque<Delivery>,
}

/// An accepted entry and the sinks that were attached when it was accepted.
struct Delivery {
	entry: Arc<LogEntry>,
	targets: Arc<Vec<Registration>>,
}

/// Ownership of delivery on the lock-holding thread.
///
/// Sinks may write to (or attach to) the same log from inside `consume`.
/// Those nested calls find `delivering` set, only enqueue, and leave the
/// outermost frame to deliver, which keeps every sink's stream in sequence
/// order.
struct DeliveryFrame<'a> {
	cell: &'a RefCell<State>,
}

impl<'a> DeliveryFrame<'a> {
	fn enter(cell: &'a RefCell<State>) -> Option<Self> {
		let mut state = cell.borrow_mut();
		if state.delivering {
			return None;
		}
		state.delivering = true;
		Some(Self { cell })
	}

	fn drain(&self) {
		loop {
			let next = self.cell.borrow_mut().queue.pop_front();
			let Some(delivery) = next else {
				break;
			};
			for registration in delivery.targets.iter() {
				registration.deliver(&delivery.entry);
			}
		}
	}
}

impl Drop for DeliveryFrame<'_> {
	fn drop(&mut self) {
		if let Ok(mut state) = self.cell.try_borrow_mut() {
			state.delivering = false;
		}
	}
}

impl SystemLog {
	/// Create a log retaining the `capacity` most recent entries.
	pub fn new(capacity: usize) -> Result<Self> {
		Self::with_clock(capacity, Arc::new(SystemClock))
	}

	/// Create a log with an injected clock.
	pub fn with_clock(capacity: usize, clock: Arc<dyn Clock>) -> Result<Self> {
		let config = SystemLogConfig {
			buffer_capacity: capacity,
			..SystemLogConfig::default()
		};
		Self::from_config_with_clock(&config, clock)
	}

	/// Create a log retaining [`DEFAULT_BUFFER_CAPACITY`] entries.
	pub fn with_default_capacity() -> Self {
		Self::build(
			DEFAULT_CAPACITY,
			LogLevel::Trace,
			DEFAULT_STREAM_CAPACITY,
			Arc::new(SystemClock),
		)
	}

	/// Create a log from validated configuration.
	pub fn from_config(config: &SystemLogConfig) -> Result<Self> {
		Self::from_config_with_clock(config, Arc::new(SystemClock))
	}

	/// Create a log from configuration with an injected clock.
	pub fn from_config_with_clock(config: &SystemLogConfig, clock: Arc<dyn Clock>) -> Result<Self> {
		config.validate()?;
		let capacity = NonZeroUsize::new(config.buffer_capacity)
			.ok_or(SystemLogError::InvalidCapacity(config.buffer_capacity))?;
		Ok(Self::build(
			capacity,
			config.level,
			config.stream_capacity,
			clock,
		))
	}

	fn build(
		capacity: NonZeroUsize,
		level: LogLevel,
		stream_capacity: usize,
		clock: Arc<dyn Clock>,
	) -> Self {
		Self {
			inner: Arc::new(Inner {
				level: AtomicU8::new(level.as_u8()),
				factory: EntryFactory::new(LogId::new(), clock),
				stream_capacity,
				state: ReentrantMutex::new(RefCell::new(State {
					ring: RingBuffer::new(capacity),
					registry: SinkRegistry::new(),
					delivering: false,
					queue: VecDeque::new(),
				})),
			}),
		}
	}

	/// Identifier stamped on every entry written to this log.
	pub fn log_id(&self) -> LogId {
		self.inner.factory.log_id()
	}

	/// Write an entry.
	///
	/// Returns the assigned sequence number, or `None` if `severity` is below
	/// the current level (in which case nothing is recorded or delivered).
	/// An empty template is rejected. Sink and decorator failures never
	/// surface here.
	pub fn write(
		&self,
		severity: LogLevel,
		template: impl Into<String>,
		args: Vec<Value>,
	) -> Result<Option<u64>> {
		self.write_with_data(severity, template, args, EntryData::new())
	}

	/// Write an entry with `data` attached at creation.
	///
	/// Decorator contributions are appended after `data`.
	pub fn write_with_data(
		&self,
		severity: LogLevel,
		template: impl Into<String>,
		args: Vec<Value>,
		data: EntryData,
	) -> Result<Option<u64>> {
		let template = template.into();
		if template.is_empty() {
			return Err(SystemLogError::EmptyTemplate);
		}
		if !self.is_enabled(severity) {
			return Ok(None);
		}

		// Decorators run before the critical section so they may log freely.
		let pending = self
			.inner
			.factory
			.prepare_with_data(severity, template, args, data);

		let guard = self.inner.state.lock();
		let sequence_id = {
			let mut state = guard.borrow_mut();
			let sequence_id = state.ring.total_pushed();
			let entry = Arc::new(pending.seal(sequence_id));
			state.ring.push(Arc::clone(&entry));
			let targets = state.registry.members();
			if !targets.is_empty() {
				state.queue.push_back(Delivery { entry, targets });
			}
			sequence_id
		};
		if let Some(frame) = DeliveryFrame::enter(&guard) {
			frame.drain();
		}

		Ok(Some(sequence_id))
	}

	/// Write an entry at [`LogLevel::Trace`].
	pub fn trace(&self, template: impl Into<String>, args: Vec<Value>) -> Result<Option<u64>> {
		self.write(LogLevel::Trace, template, args)
	}

	/// Write an entry at [`LogLevel::Debug`].
	pub fn debug(&self, template: impl Into<String>, args: Vec<Value>) -> Result<Option<u64>> {
		self.write(LogLevel::Debug, template, args)
	}

	/// Write an entry at [`LogLevel::Info`].
	pub fn info(&self, template: impl Into<String>, args: Vec<Value>) -> Result<Option<u64>> {
		self.write(LogLevel::Info, template, args)
	}

	/// Write an entry at [`LogLevel::Warn`].
	pub fn warn(&self, template: impl Into<String>, args: Vec<Value>) -> Result<Option<u64>> {
		self.write(LogLevel::Warn, template, args)
	}

	/// Write an entry at [`LogLevel::Error`].
	pub fn error(&self, template: impl Into<String>, args: Vec<Value>) -> Result<Option<u64>> {
		self.write(LogLevel::Error, template, args)
	}

	/// Write an entry at [`LogLevel::Fatal`].
	pub fn fatal(&self, template: impl Into<String>, args: Vec<Value>) -> Result<Option<u64>> {
		self.write(LogLevel::Fatal, template, args)
	}

	/// Attach a sink.
	///
	/// Before this returns, the sink has been handed every buffered entry in
	/// sequence order. From then on it receives each newly accepted entry.
	/// Attaching the same sink instance twice is rejected.
	pub fn add_sink(&self, sink: Arc<dyn LogSink>) -> Result<SinkHandle> {
		let guard = self.inner.state.lock();
		let (registration, backlog) = {
			let mut state = guard.borrow_mut();
			let registration = state.registry.add(sink)?;
			(registration, state.ring.snapshot())
		};

		debug!(
			sink = registration.sink().name(),
			handle = %registration.handle(),
			backlog = backlog.len(),
			"attached log sink"
		);

		let frame = DeliveryFrame::enter(&guard);
		for entry in &backlog {
			registration.deliver(entry);
		}
		if let Some(frame) = frame {
			frame.drain();
		}

		Ok(registration.handle())
	}

	/// Attach a closure as a sink.
	pub fn add_sink_fn<F>(&self, f: F) -> Result<SinkHandle>
	where
		F: Fn(&Arc<LogEntry>) + Send + Sync + 'static,
	{
		self.add_sink(Arc::new(FnSink::new(move |entry: &Arc<LogEntry>| {
			f(entry);
			Ok(())
		})))
	}

	/// Detach a sink.
	///
	/// Entries accepted after this returns are not delivered to it. Returns
	/// `false`, and does nothing else, if the handle is not attached.
	pub fn remove_sink(&self, handle: SinkHandle) -> bool {
		let guard = self.inner.state.lock();
		let removed = guard.borrow_mut().registry.remove(handle);
		if removed {
			debug!(handle = %handle, "detached log sink");
		}
		removed
	}

	/// Attach a broadcast stream. The receiver already holds the replayed backlog.
	///
	/// The stream detaches itself when dropped.
	pub fn stream(&self) -> Result<LogStream> {
		let capacity = self.inner.stream_capacity.max(self.buffer_capacity());
		let (sink, receiver) = BroadcastSink::new(capacity);
		let handle = self.add_sink(Arc::new(sink))?;
		Ok(LogStream::new(self.downgrade(), handle, receiver))
	}

	/// Whether the calling thread is currently handing entries of this log to sinks.
	///
	/// Anything a sink writes back into the log from this state is delivered
	/// to every sink again, including the one that wrote it.
	pub fn is_delivering_on_current_thread(&self) -> bool {
		// Another thread holding the lock means this one is not delivering.
		let Some(guard) = self.inner.state.try_lock() else {
			return false;
		};
		guard.try_borrow().map_or(false, |state| state.delivering)
	}

	pub(crate) fn downgrade(&self) -> WeakSystemLog {
		WeakSystemLog {
			inner: Arc::downgrade(&self.inner),
		}
	}

	/// Number of attached sinks.
	pub fn sink_count(&self) -> usize {
		self.inner.state.lock().borrow().registry.len()
	}

	/// Delivery counters of an attached sink, `None` if the handle is not attached.
	pub fn sink_stats(&self, handle: SinkHandle) -> Option<SinkStats> {
		self.inner
			.state
			.lock()
			.borrow()
			.registry
			.get(handle)
			.map(Registration::stats)
	}

	/// Add a decorator. It runs for every entry written after this returns.
	pub fn add_decorator(&self, decorator: Arc<dyn LogDecorator>) -> Result<DecoratorHandle> {
		self.inner.factory.add_decorator(decorator)
	}

	/// Add a closure as a decorator.
	pub fn add_decorator_fn<F>(&self, f: F) -> Result<DecoratorHandle>
	where
		F: Fn(&EntryDraft<'_>, &mut EntryData) -> anyhow::Result<()> + Send + Sync + 'static,
	{
		self.add_decorator(Arc::new(FnDecorator::new(f)))
	}

	/// Remove a decorator. Returns `false` if the handle is unknown.
	pub fn remove_decorator(&self, handle: DecoratorHandle) -> bool {
		self.inner.factory.remove_decorator(handle)
	}

	/// Minimum severity accepted by [`SystemLog::write`]. Defaults to `Trace`.
	pub fn current_level(&self) -> LogLevel {
		LogLevel::from_u8(self.inner.level.load(Ordering::Relaxed))
	}

	/// Change the minimum accepted severity. Takes effect for the next write.
	pub fn set_current_level(&self, level: LogLevel) {
		self.inner.level.store(level.as_u8(), Ordering::Relaxed);
	}

	/// Whether a write at `severity` would be accepted.
	pub fn is_enabled(&self, severity: LogLevel) -> bool {
		severity >= self.current_level()
	}

	/// Maximum number of retained entries.
	pub fn buffer_capacity(&self) -> usize {
		self.inner.state.lock().borrow().ring.capacity()
	}

	/// Number of entries currently retained.
	pub fn len(&self) -> usize {
		self.inner.state.lock().borrow().ring.len()
	}

	/// Whether nothing is retained.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Number of entries accepted so far; also the next sequence number.
	pub fn total_accepted(&self) -> u64 {
		self.inner.state.lock().borrow().ring.total_pushed()
	}

	/// Retained entries, oldest first.
	pub fn snapshot(&self) -> Vec<Arc<LogEntry>> {
		self.inner.state.lock().borrow().ring.snapshot()
	}

	/// Query retained entries.
	///
	/// Returns up to `limit` of the most recent entries, optionally filtered by
	/// minimum severity and by sequence number strictly greater than `after`,
	/// oldest first.
	pub fn entries(
		&self,
		limit: usize,
		min_level: Option<LogLevel>,
		after: Option<u64>,
	) -> Vec<Arc<LogEntry>> {
		let guard = self.inner.state.lock();
		let state = guard.borrow();

		let mut entries = state
			.ring
			.iter()
			.rev()
			.filter(|e| min_level.map_or(true, |min| e.severity >= min))
			.filter(|e| after.map_or(true, |after| e.sequence_id > after))
			.take(limit)
			.cloned()
			.collect::<Vec<_>>();
		entries.reverse();
		entries
	}
}

/// A non-owning handle to a [`SystemLog`].
#[derive(Debug, Clone)]
pub(crate) struct WeakSystemLog {
	inner: Weak<Inner>,
}

impl WeakSystemLog {
	pub(crate) fn upgrade(&self) -> Option<SystemLog> {
		self.inner.upgrade().map(|inner| SystemLog { inner })
	}
}

impl Default for SystemLog {
	fn default() -> Self {
		Self::with_default_capacity()
	}
}

impl fmt::Debug for SystemLog {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SystemLog")
			.field("log_id", &self.log_id())
			.field("level", &self.current_level())
			.field("capacity", &self.buffer_capacity())
			.field("total_accepted", &self.total_accepted())
			.finish_non_exhaustive()
	}
}

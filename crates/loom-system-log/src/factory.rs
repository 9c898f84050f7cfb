// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Entry construction: clock, decorators, and the factory that applies them.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::warn;

use crate::entry::{EntryData, LogEntry, LogId, LogLevel};
use crate::error::{panic_message, Result, SystemLogError};

/// Source of entry timestamps.
pub trait Clock: Send + Sync {
	fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> DateTime<Utc> {
		Utc::now()
	}
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
	now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
	pub fn new(start: DateTime<Utc>) -> Self {
		Self {
			now: Mutex::new(start),
		}
	}

	pub fn set(&self, now: DateTime<Utc>) {
		*self.now.lock() = now;
	}

	pub fn advance(&self, by: Duration) {
		let mut now = self.now.lock();
		*now = *now + by;
	}
}

impl Clock for ManualClock {
	fn now(&self) -> DateTime<Utc> {
		*self.now.lock()
	}
}

/// Read-only view of an entry while decorators run.
///
/// `data` holds what earlier decorators contributed; it cannot be modified.
#[derive(Debug)]
pub struct EntryDraft<'a> {
	pub log_id: LogId,
	pub severity: LogLevel,
	pub timestamp: DateTime<Utc>,
	pub message: &'a str,
	pub message_arguments: &'a [Value],
	pub data: &'a EntryData,
}

/// Enriches entries with contextual data at creation time.
///
/// Whatever is pushed into `data` is appended to the entry only if
/// `decorate` returns `Ok`. An error or panic discards that decorator's
/// contribution; the entry is still written.
pub trait LogDecorator: Send + Sync {
	fn decorate(&self, entry: &EntryDraft<'_>, data: &mut EntryData) -> anyhow::Result<()>;

	/// Name used in diagnostics.
	fn name(&self) -> &str {
		std::any::type_name::<Self>()
	}
}

/// A [`LogDecorator`] backed by a closure.
pub struct FnDecorator<F> {
	name: String,
	f: F,
}

impl<F> FnDecorator<F>
where
	F: Fn(&EntryDraft<'_>, &mut EntryData) -> anyhow::Result<()> + Send + Sync,
{
	pub fn new(f: F) -> Self {
		Self::named("fn-decorator", f)
	}

	pub fn named(name: impl Into<String>, f: F) -> Self {
		Self {
			name: name.into(),
			f,
		}
	}
}

impl<F> LogDecorator for FnDecorator<F>
where
	F: Fn(&EntryDraft<'_>, &mut EntryData) -> anyhow::Result<()> + Send + Sync,
{
	fn decorate(&self, entry: &EntryDraft<'_>, data: &mut EntryData) -> anyhow::Result<()> {
		(self.f)(entry, data)
	}

	fn name(&self) -> &str {
		&self.name
	}
}

/// Handle returned when a decorator is added; used to remove it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DecoratorHandle(u64);

impl fmt::Display for DecoratorHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "decorator-{}", self.0)
	}
}

#[derive(Clone)]
struct DecoratorSlot {
	handle: DecoratorHandle,
	decorator: Arc<dyn LogDecorator>,
}

/// An entry that has been timestamped and decorated but not yet sequenced.
#[derive(Debug)]
pub struct PendingEntry {
	log_id: LogId,
	severity: LogLevel,
	timestamp: DateTime<Utc>,
	message: String,
	message_arguments: Vec<Value>,
	data: EntryData,
}

impl PendingEntry {
	/// Finish the entry with its sequence number.
	pub fn seal(self, sequence_id: u64) -> LogEntry {
		LogEntry {
			sequence_id,
			severity: self.severity,
			timestamp: self.timestamp,
			message: self.message,
			message_arguments: self.message_arguments,
			data: self.data,
			log_id: self.log_id,
		}
	}
}

/// Builds entries for one log: stamps them with the clock and runs the
/// registered decorators in registration order.
pub struct EntryFactory {
	log_id: LogId,
	clock: Arc<dyn Clock>,
	decorators: RwLock<Arc<Vec<DecoratorSlot>>>,
	next_handle: AtomicU64,
}

impl EntryFactory {
	pub fn new(log_id: LogId, clock: Arc<dyn Clock>) -> Self {
		Self {
			log_id,
			clock,
			decorators: RwLock::new(Arc::new(Vec::new())),
			next_handle: AtomicU64::new(1),
		}
	}

	pub fn log_id(&self) -> LogId {
		self.log_id
	}

	/// Register a decorator. The same instance cannot be added twice.
	pub fn add_decorator(&self, decorator: Arc<dyn LogDecorator>) -> Result<DecoratorHandle> {
		let mut decorators = self.decorators.write();
		if let Some(existing) = decorators
			.iter()
			.find(|slot| same_decorator(&slot.decorator, &decorator))
		{
			return Err(SystemLogError::DuplicateDecorator(existing.handle));
		}

		let handle = DecoratorHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
		Arc::make_mut(&mut *decorators).push(DecoratorSlot { handle, decorator });
		Ok(handle)
	}

	/// Remove a decorator. Returns `false` if the handle is unknown.
	pub fn remove_decorator(&self, handle: DecoratorHandle) -> bool {
		let mut decorators = self.decorators.write();
		let Some(index) = decorators.iter().position(|slot| slot.handle == handle) else {
			return false;
		};
		Arc::make_mut(&mut *decorators).remove(index);
		true
	}

	pub fn decorator_count(&self) -> usize {
		self.decorators.read().len()
	}

	/// Timestamp and decorate an entry. Decorator failures are logged and skipped.
	pub fn prepare(
		&self,
		severity: LogLevel,
		message: String,
		message_arguments: Vec<Value>,
	) -> PendingEntry {
		self.prepare_with_data(severity, message, message_arguments, EntryData::new())
	}

	/// Like [`EntryFactory::prepare`], with `data` attached ahead of decorator output.
	pub fn prepare_with_data(
		&self,
		severity: LogLevel,
		message: String,
		message_arguments: Vec<Value>,
		mut data: EntryData,
	) -> PendingEntry {
		let decorators = Arc::clone(&*self.decorators.read());
		let timestamp = self.clock.now();

		for slot in decorators.iter() {
			let mut contribution = EntryData::new();
			let draft = EntryDraft {
				log_id: self.log_id,
				severity,
				timestamp,
				message: &message,
				message_arguments: &message_arguments,
				data: &data,
			};
			let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
				slot.decorator.decorate(&draft, &mut contribution)
			}));

			match outcome {
				Ok(Ok(())) => data.append(contribution),
				Ok(Err(err)) => {
					warn!(
						decorator = slot.decorator.name(),
						handle = %slot.handle,
						error = %err,
						"log decorator failed, skipping its data"
					);
				}
				Err(payload) => {
					warn!(
						decorator = slot.decorator.name(),
						handle = %slot.handle,
						panic = %panic_message(payload.as_ref()),
						"log decorator panicked, skipping its data"
					);
				}
			}
		}

		PendingEntry {
			log_id: self.log_id,
			severity,
			timestamp,
			message,
			message_arguments,
			data,
		}
	}

	/// Build a complete entry with the given sequence number.
	pub fn create(
		&self,
		sequence_id: u64,
		severity: LogLevel,
		message: String,
		message_arguments: Vec<Value>,
	) -> LogEntry {
		self.prepare(severity, message, message_arguments)
			.seal(sequence_id)
	}
}

impl fmt::Debug for EntryFactory {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("EntryFactory")
			.field("log_id", &self.log_id)
			.field("decorators", &self.decorator_count())
			.finish()
	}
}

fn same_decorator(a: &Arc<dyn LogDecorator>, b: &Arc<dyn LogDecorator>) -> bool {
	std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

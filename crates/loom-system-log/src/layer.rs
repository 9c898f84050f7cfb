// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Tracing layer that writes tracing events into a [`SystemLog`].

use std::cell::Cell;
use std::fmt;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use crate::entry::{EntryData, LogLevel};
use crate::error::SystemLogError;
use crate::system_log::SystemLog;

/// Events from this crate are never captured, so sink failure reports
/// cannot feed back into the log they came from.
const OWN_TARGET: &str = "loom_system_log";

thread_local! {
	/// Set while this thread is inside a layer-initiated write.
	static CAPTURING: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as capturing until dropped.
struct CaptureScope;

impl CaptureScope {
	fn enter() -> Option<Self> {
		if CAPTURING.with(|c| c.replace(true)) {
			None
		} else {
			Some(Self)
		}
	}
}

impl Drop for CaptureScope {
	fn drop(&mut self) {
		CAPTURING.with(|c| c.set(false));
	}
}

/// Metadata of the tracing event an entry was captured from.
///
/// Attached to each captured entry; read it with
/// `entry.get_data::<TracingEvent>()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingEvent {
	/// The module/target that emitted the event.
	pub target: String,
	/// Additional structured fields as key-value pairs.
	pub fields: Vec<(String, String)>,
}

/// A tracing Layer that captures events into a [`SystemLog`].
///
/// This layer can be composed with other layers (like `fmt::layer()`) so
/// sinks attached to the log also see the application's tracing output.
/// The event message becomes the entry template (with no arguments); the
/// target and remaining fields are attached as [`TracingEvent`] data.
///
/// Events raised while the log is already working on the same thread are
/// not captured: from a sink during delivery, or from a decorator during a
/// captured write. Capturing those would feed every delivery back into the
/// log.
#[derive(Clone)]
pub struct SystemLogLayer {
	log: SystemLog,
}

impl SystemLogLayer {
	pub fn new(log: SystemLog) -> Self {
		Self { log }
	}

	/// Get a reference to the underlying log.
	pub fn log(&self) -> &SystemLog {
		&self.log
	}
}

impl<S> Layer<S> for SystemLogLayer
where
	S: Subscriber + for<'a> LookupSpan<'a>,
{
	fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
		let metadata = event.metadata();
		if metadata.target().starts_with(OWN_TARGET) {
			return;
		}
		let level = LogLevel::from_tracing(metadata.level());
		if !self.log.is_enabled(level) || self.log.is_delivering_on_current_thread() {
			return;
		}
		let Some(_scope) = CaptureScope::enter() else {
			return;
		};

		let mut visitor = FieldVisitor::new();
		event.record(&mut visitor);

		let message = visitor
			.message
			.filter(|m| !m.is_empty())
			.unwrap_or_else(|| metadata.name().to_string());
		let captured = TracingEvent {
			target: metadata.target().to_string(),
			fields: visitor.fields,
		};

		let mut data = EntryData::new();
		data.push(captured);
		match self.log.write_with_data(level, message, vec![], data) {
			Ok(_) => {}
			// Unreachable: the message falls back to the event name.
			Err(SystemLogError::EmptyTemplate) => {}
			Err(err) => {
				tracing::debug!(error = %err, "failed to capture tracing event");
			}
		}
	}
}

/// Visitor that extracts fields from a tracing event.
struct FieldVisitor {
	message: Option<String>,
	fields: Vec<(String, String)>,
}

impl FieldVisitor {
	fn new() -> Self {
		Self {
			message: None,
			fields: Vec::new(),
		}
	}

	fn record(&mut self, field: &Field, value: String) {
		if field.name() == "message" {
			self.message = Some(value);
		} else {
			self.fields.push((field.name().to_string(), value));
		}
	}
}

impl Visit for FieldVisitor {
	fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
		self.record(field, format!("{:?}", value));
	}

	fn record_str(&mut self, field: &Field, value: &str) {
		self.record(field, value.to_string());
	}

	fn record_i64(&mut self, field: &Field, value: i64) {
		self.record(field, value.to_string());
	}

	fn record_u64(&mut self, field: &Field, value: u64) {
		self.record(field, value.to_string());
	}

	fn record_bool(&mut self, field: &Field, value: bool) {
		self.record(field, value.to_string());
	}

	fn record_f64(&mut self, field: &Field, value: f64) {
		self.record(field, value.to_string());
	}

	fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
		self.record(field, value.to_string());
	}
}

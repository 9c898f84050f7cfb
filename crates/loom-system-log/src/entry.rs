// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Log entry types.

use std::any::Any;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::SystemLogError;
use crate::format::format_template;

/// Severity of a log entry, ordered from most verbose to most severe.
#[derive(
	Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum LogLevel {
	#[default]
	Trace = 0,
	Debug = 1,
	Info = 2,
	Warn = 3,
	Error = 4,
	Fatal = 5,
}

impl LogLevel {
	/// Every level, most verbose first.
	pub const ALL: [LogLevel; 6] = [
		LogLevel::Trace,
		LogLevel::Debug,
		LogLevel::Info,
		LogLevel::Warn,
		LogLevel::Error,
		LogLevel::Fatal,
	];

	/// Convert from tracing Level.
	pub fn from_tracing(level: &tracing::Level) -> Self {
		match *level {
			tracing::Level::TRACE => LogLevel::Trace,
			tracing::Level::DEBUG => LogLevel::Debug,
			tracing::Level::INFO => LogLevel::Info,
			tracing::Level::WARN => LogLevel::Warn,
			tracing::Level::ERROR => LogLevel::Error,
		}
	}

	/// Get the string representation.
	pub fn as_str(&self) -> &'static str {
		match self {
			LogLevel::Trace => "trace",
			LogLevel::Debug => "debug",
			LogLevel::Info => "info",
			LogLevel::Warn => "warn",
			LogLevel::Error => "error",
			LogLevel::Fatal => "fatal",
		}
	}

	pub(crate) fn as_u8(self) -> u8 {
		self as u8
	}

	pub(crate) fn from_u8(value: u8) -> Self {
		match value {
			0 => LogLevel::Trace,
			1 => LogLevel::Debug,
			2 => LogLevel::Info,
			3 => LogLevel::Warn,
			4 => LogLevel::Error,
			_ => LogLevel::Fatal,
		}
	}
}

impl fmt::Display for LogLevel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.as_str())
	}
}

impl FromStr for LogLevel {
	type Err = SystemLogError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"trace" => Ok(LogLevel::Trace),
			"debug" => Ok(LogLevel::Debug),
			"info" => Ok(LogLevel::Info),
			"warn" | "warning" => Ok(LogLevel::Warn),
			"error" => Ok(LogLevel::Error),
			"fatal" | "critical" => Ok(LogLevel::Fatal),
			_ => Err(SystemLogError::UnknownLevel(s.to_string())),
		}
	}
}

/// Identifies the [`SystemLog`](crate::SystemLog) an entry was written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogId(pub Uuid);

impl LogId {
	#[must_use]
	pub fn new() -> Self {
		Self(Uuid::now_v7())
	}
}

impl Default for LogId {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for LogId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl FromStr for LogId {
	type Err = uuid::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(Self(Uuid::parse_str(s)?))
	}
}

/// Ordered, append-only list of arbitrary values attached to an entry.
///
/// Values are usually contributed by a [`LogDecorator`](crate::LogDecorator).
/// Lookup is by type: [`EntryData::get`] returns the first value of the
/// requested type.
#[derive(Clone, Default)]
pub struct EntryData {
	items: Vec<Arc<dyn Any + Send + Sync>>,
}

impl EntryData {
	pub fn new() -> Self {
		Self::default()
	}

	/// Append a value.
	pub fn push<T: Any + Send + Sync>(&mut self, value: T) {
		self.items.push(Arc::new(value));
	}

	/// First attached value of type `T`, if any.
	pub fn get<T: Any>(&self) -> Option<&T> {
		self.items.iter().find_map(|item| (**item).downcast_ref::<T>())
	}

	/// All attached values of type `T`, in attachment order.
	pub fn get_all<T: Any>(&self) -> impl Iterator<Item = &T> + '_ {
		self.items.iter().filter_map(|item| (**item).downcast_ref::<T>())
	}

	pub fn len(&self) -> usize {
		self.items.len()
	}

	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}

	pub(crate) fn append(&mut self, other: EntryData) {
		self.items.extend(other.items);
	}
}

impl fmt::Debug for EntryData {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("EntryData")
			.field("len", &self.items.len())
			.finish()
	}
}

/// A structured log entry.
///
/// Entries are shared as `Arc<LogEntry>` once accepted and are never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
	/// Position of this entry in the owning log's accepted stream, starting at 0.
	pub sequence_id: u64,
	/// Log level.
	pub severity: LogLevel,
	/// Timestamp from the owning log's clock at creation.
	pub timestamp: DateTime<Utc>,
	/// The unformatted message template.
	pub message: String,
	/// Positional arguments for the message template.
	#[serde(skip_serializing_if = "Vec::is_empty", default)]
	pub message_arguments: Vec<Value>,
	/// Values attached by decorators. Not serialized.
	#[serde(skip)]
	pub data: EntryData,
	/// The log this entry was written to.
	pub log_id: LogId,
}

impl LogEntry {
	/// First attached value of type `T`, if any.
	pub fn get_data<T: std::any::Any>(&self) -> Option<&T> {
		self.data.get::<T>()
	}

	/// The message with its positional arguments substituted.
	pub fn formatted_message(&self) -> String {
		format_template(&self.message, &self.message_arguments)
	}
}

impl fmt::Display for LogEntry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{} #{} [{}] {}",
			self.timestamp.to_rfc3339(),
			self.sequence_id,
			self.severity,
			self.formatted_message()
		)
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::any::Any;

use thiserror::Error;

use crate::factory::DecoratorHandle;
use crate::registry::SinkHandle;

/// Result type alias for system log operations.
pub type Result<T> = std::result::Result<T, SystemLogError>;

/// Errors surfaced to direct callers of the system log API.
///
/// Sink and decorator failures never appear here; they are isolated and
/// reported through `tracing` instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SystemLogError {
	#[error("Invalid buffer capacity {0}: must be at least 1")]
	InvalidCapacity(usize),

	#[error("Log message template must not be empty")]
	EmptyTemplate,

	#[error("Sink is already registered as {0}")]
	DuplicateSink(SinkHandle),

	#[error("Decorator is already registered as {0}")]
	DuplicateDecorator(DecoratorHandle),

	#[error("Unknown log level: {0}")]
	UnknownLevel(String),

	#[error("Configuration error: {0}")]
	Config(String),
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
	if let Some(msg) = payload.downcast_ref::<&'static str>() {
		(*msg).to_string()
	} else if let Some(msg) = payload.downcast_ref::<String>() {
		msg.clone()
	} else {
		"unknown panic".to_string()
	}
}

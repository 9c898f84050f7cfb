// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Optional process-wide default log.
//!
//! Prefer passing a [`SystemLog`] explicitly. This exists for call sites that
//! have no way to receive one.

use std::sync::OnceLock;

use crate::system_log::SystemLog;

static GLOBAL: OnceLock<SystemLog> = OnceLock::new();

/// Install the process-wide log. Returns the log back if one is already installed.
pub fn install(log: SystemLog) -> Result<(), SystemLog> {
	GLOBAL.set(log)
}

/// The installed log, if any.
pub fn get() -> Option<&'static SystemLog> {
	GLOBAL.get()
}

/// The installed log, installing one with default capacity if needed.
pub fn get_or_default() -> &'static SystemLog {
	GLOBAL.get_or_init(SystemLog::default)
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! System log configuration.
//!
//! Layers are merged in precedence order (defaults, TOML, environment) and
//! then finalized. Environment convention: `LOOM_SYSTEM_LOG_<FIELD>`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::entry::LogLevel;
use crate::error::{Result, SystemLogError};

/// Default number of retained entries.
pub const DEFAULT_BUFFER_CAPACITY: usize = 10_000;

/// Default broadcast channel capacity for [`SystemLog::stream`](crate::SystemLog::stream).
pub const DEFAULT_STREAM_CAPACITY: usize = 1024;

pub const ENV_BUFFER_CAPACITY: &str = "LOOM_SYSTEM_LOG_BUFFER_CAPACITY";
pub const ENV_LEVEL: &str = "LOOM_SYSTEM_LOG_LEVEL";
pub const ENV_STREAM_CAPACITY: &str = "LOOM_SYSTEM_LOG_STREAM_CAPACITY";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SystemLogConfigLayer {
	pub buffer_capacity: Option<usize>,
	pub level: Option<LogLevel>,
	pub stream_capacity: Option<usize>,
}

impl SystemLogConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.buffer_capacity.is_some() {
			self.buffer_capacity = other.buffer_capacity;
		}
		if other.level.is_some() {
			self.level = other.level;
		}
		if other.stream_capacity.is_some() {
			self.stream_capacity = other.stream_capacity;
		}
	}

	pub fn finalize(self) -> SystemLogConfig {
		SystemLogConfig {
			buffer_capacity: self.buffer_capacity.unwrap_or(DEFAULT_BUFFER_CAPACITY),
			level: self.level.unwrap_or_default(),
			stream_capacity: self.stream_capacity.unwrap_or(DEFAULT_STREAM_CAPACITY),
		}
	}

	pub fn from_toml_str(content: &str) -> Result<Self> {
		toml::from_str(content)
			.map_err(|e| SystemLogError::Config(format!("invalid system log TOML: {e}")))
	}

	/// Read `LOOM_SYSTEM_LOG_*` variables from the process environment.
	pub fn from_env() -> Result<Self> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Read `LOOM_SYSTEM_LOG_*` values through `lookup`. Empty values are ignored.
	pub fn from_lookup<F>(lookup: F) -> Result<Self>
	where
		F: Fn(&str) -> Option<String>,
	{
		let var = |name: &str| lookup(name).filter(|v| !v.is_empty());

		let usize_var = |name: &str| -> Result<Option<usize>> {
			match var(name) {
				Some(v) => v.trim().parse().map(Some).map_err(|_| {
					SystemLogError::Config(format!("{name}: invalid unsigned integer '{v}'"))
				}),
				None => Ok(None),
			}
		};

		let level = match var(ENV_LEVEL) {
			Some(v) => Some(
				v.parse::<LogLevel>()
					.map_err(|e| SystemLogError::Config(format!("{ENV_LEVEL}: {e}")))?,
			),
			None => None,
		};

		Ok(Self {
			buffer_capacity: usize_var(ENV_BUFFER_CAPACITY)?,
			level,
			stream_capacity: usize_var(ENV_STREAM_CAPACITY)?,
		})
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemLogConfig {
	pub buffer_capacity: usize,
	pub level: LogLevel,
	pub stream_capacity: usize,
}

impl SystemLogConfig {
	/// Load defaults, then the optional TOML document, then the environment.
	pub fn load(toml: Option<&str>) -> Result<Self> {
		let mut layer = SystemLogConfigLayer::default();
		if let Some(content) = toml {
			debug!("loading system log config from TOML");
			layer.merge(SystemLogConfigLayer::from_toml_str(content)?);
		}
		layer.merge(SystemLogConfigLayer::from_env()?);

		let config = layer.finalize();
		config.validate()?;
		Ok(config)
	}

	pub fn validate(&self) -> Result<()> {
		if self.buffer_capacity == 0 {
			return Err(SystemLogError::InvalidCapacity(self.buffer_capacity));
		}
		if self.stream_capacity == 0 {
			return Err(SystemLogError::Config(
				"stream_capacity must be at least 1".to_string(),
			));
		}
		Ok(())
	}
}

impl Default for SystemLogConfig {
	fn default() -> Self {
		Self {
			buffer_capacity: DEFAULT_BUFFER_CAPACITY,
			level: LogLevel::Trace,
			stream_capacity: DEFAULT_STREAM_CAPACITY,
		}
	}
}

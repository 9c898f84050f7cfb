// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

/// Write to a [`SystemLog`](crate::SystemLog) with positional arguments.
///
/// Each argument is converted with `serde_json::Value::from`.
///
/// ```ignore
/// system_log!(log, LogLevel::Info, "user {0} logged in from {1}", user_id, addr.to_string())?;
/// ```
#[macro_export]
macro_rules! system_log {
	($log:expr, $level:expr, $template:expr $(, $arg:expr)* $(,)?) => {
		$log.write(
			$level,
			$template,
			::std::vec![$($crate::__private::serde_json::Value::from($arg)),*],
		)
	};
}

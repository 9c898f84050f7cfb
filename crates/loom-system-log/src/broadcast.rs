// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Asynchronous consumption of a system log over a broadcast channel.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use crate::entry::LogEntry;
use crate::registry::{LogSink, SinkHandle};
use crate::system_log::WeakSystemLog;

/// A sink that forwards entries into a broadcast channel.
///
/// Sending never blocks the writer. A receiver that falls more than the
/// channel capacity behind loses the oldest entries and sees
/// [`broadcast::error::RecvError::Lagged`].
#[derive(Debug, Clone)]
pub struct BroadcastSink {
	sender: broadcast::Sender<Arc<LogEntry>>,
}

impl BroadcastSink {
	pub fn new(capacity: usize) -> (Self, broadcast::Receiver<Arc<LogEntry>>) {
		let (sender, receiver) = broadcast::channel(capacity.max(1));
		(Self { sender }, receiver)
	}
}

impl LogSink for BroadcastSink {
	fn consume(&self, entry: &Arc<LogEntry>) -> anyhow::Result<()> {
		// Ignore errors if no receivers
		let _ = self.sender.send(Arc::clone(entry));
		Ok(())
	}

	fn name(&self) -> &str {
		"broadcast"
	}
}

/// A sink attachment read from async code.
///
/// Created by [`SystemLog::stream`](crate::SystemLog::stream); the receiver
/// starts with the replayed backlog. Dropping the stream detaches its sink.
#[derive(Debug)]
pub struct LogStream {
	log: WeakSystemLog,
	handle: SinkHandle,
	receiver: broadcast::Receiver<Arc<LogEntry>>,
}

impl LogStream {
	pub(crate) fn new(
		log: WeakSystemLog,
		handle: SinkHandle,
		receiver: broadcast::Receiver<Arc<LogEntry>>,
	) -> Self {
		Self {
			log,
			handle,
			receiver,
		}
	}

	pub fn handle(&self) -> SinkHandle {
		self.handle
	}

	/// Next entry, skipping over any lagged gap. `None` once the sink is gone.
	pub async fn recv(&mut self) -> Option<Arc<LogEntry>> {
		loop {
			match self.receiver.recv().await {
				Ok(entry) => return Some(entry),
				Err(broadcast::error::RecvError::Lagged(skipped)) => {
					debug!(handle = %self.handle, skipped, "log stream lagged");
				}
				Err(broadcast::error::RecvError::Closed) => return None,
			}
		}
	}

	/// Next entry if one is already queued.
	pub fn try_recv(&mut self) -> Option<Arc<LogEntry>> {
		loop {
			match self.receiver.try_recv() {
				Ok(entry) => return Some(entry),
				Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
					debug!(handle = %self.handle, skipped, "log stream lagged");
				}
				Err(_) => return None,
			}
		}
	}

	/// Detach without dropping. Entries already queued remain readable.
	///
	/// Returns `false` if already detached or the log is gone.
	pub fn close(&self) -> bool {
		self.log
			.upgrade()
			.map_or(false, |log| log.remove_sink(self.handle))
	}
}

impl Drop for LogStream {
	fn drop(&mut self) {
		self.close();
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Fixed-capacity ring buffer holding the most recent accepted entries.

use std::collections::VecDeque;
use std::num::NonZeroUsize;

/// Upper bound on the up-front allocation; larger buffers grow on demand.
const MAX_PREALLOCATED: usize = 4096;

/// A fixed-capacity FIFO window over the most recently pushed items.
///
/// When the buffer is full, the oldest item is evicted to make room for the new one.
/// After `n` pushes it holds exactly the items `[n - len, n)` where
/// `len = min(capacity, n)`.
///
/// The buffer itself is not synchronized; [`SystemLog`](crate::SystemLog)
/// only touches it from inside its critical section, which is what makes
/// [`RingBuffer::snapshot`] atomic with respect to [`RingBuffer::push`].
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
	entries: VecDeque<T>,
	capacity: NonZeroUsize,
	total_pushed: u64,
}

impl<T> RingBuffer<T> {
	/// Create a new ring buffer with the specified capacity.
	pub fn new(capacity: NonZeroUsize) -> Self {
		Self {
			entries: VecDeque::with_capacity(capacity.get().min(MAX_PREALLOCATED)),
			capacity,
			total_pushed: 0,
		}
	}

	/// Append an item, returning the evicted oldest item if the buffer was full.
	pub fn push(&mut self, item: T) -> Option<T> {
		let evicted = if self.entries.len() >= self.capacity.get() {
			self.entries.pop_front()
		} else {
			None
		};
		self.entries.push_back(item);
		self.total_pushed += 1;
		evicted
	}

	/// Copy of every held item, oldest first.
	pub fn snapshot(&self) -> Vec<T>
	where
		T: Clone,
	{
		self.entries.iter().cloned().collect()
	}

	/// Iterate held items, oldest first.
	pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator + '_ {
		self.entries.iter()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn capacity(&self) -> usize {
		self.capacity.get()
	}

	/// Total number of pushes over the buffer's lifetime, including evicted items.
	pub fn total_pushed(&self) -> u64 {
		self.total_pushed
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Writers and sink attachment racing on one `SystemLog`.

use std::sync::Arc;
use std::thread;

use loom_system_log::{LogLevel, SystemLog};
use parking_lot::Mutex;

const WRITERS: usize = 4;
const WRITES_PER_THREAD: usize = 500;
const LATE_SINKS: usize = 8;

fn assert_contiguous(ids: &[u64], last: u64) {
	assert!(!ids.is_empty());
	for pair in ids.windows(2) {
		assert_eq!(pair[1], pair[0] + 1, "gap or duplicate in {ids:?}");
	}
	assert_eq!(ids.last(), Some(&last));
}

#[test]
fn late_sinks_see_gap_free_streams_under_concurrent_writes() {
	let log = SystemLog::new(64).unwrap();
	let total = (WRITERS * WRITES_PER_THREAD) as u64;
	let sinks: Vec<Arc<Mutex<Vec<u64>>>> = (0..LATE_SINKS)
		.map(|_| Arc::new(Mutex::new(Vec::new())))
		.collect();

	thread::scope(|scope| {
		for writer in 0..WRITERS {
			let log = &log;
			scope.spawn(move || {
				for i in 0..WRITES_PER_THREAD {
					log.write(LogLevel::Info, "writer {0} entry {1}", vec![writer.into(), i.into()])
						.unwrap();
				}
			});
		}

		for seen in &sinks {
			let log = &log;
			let seen = Arc::clone(seen);
			scope.spawn(move || {
				thread::yield_now();
				log.add_sink_fn(move |entry| seen.lock().push(entry.sequence_id))
					.unwrap();
			});
		}
	});

	assert_eq!(log.total_accepted(), total);
	assert_eq!(log.sink_count(), LATE_SINKS);
	for seen in &sinks {
		let seen = seen.lock();
		assert_contiguous(&seen, total - 1);
	}
}

#[test]
fn concurrent_writers_get_unique_sequence_numbers() {
	let log = SystemLog::new(WRITERS * WRITES_PER_THREAD).unwrap();
	let assigned = Mutex::new(Vec::new());

	thread::scope(|scope| {
		for _ in 0..WRITERS {
			scope.spawn(|| {
				for _ in 0..WRITES_PER_THREAD {
					let id = log.info("entry", vec![]).unwrap().unwrap();
					assigned.lock().push(id);
				}
			});
		}
	});

	let mut assigned = assigned.into_inner();
	assigned.sort_unstable();
	let expected: Vec<u64> = (0..(WRITERS * WRITES_PER_THREAD) as u64).collect();
	assert_eq!(assigned, expected);

	let buffered: Vec<u64> = log.snapshot().iter().map(|e| e.sequence_id).collect();
	assert_eq!(buffered, expected);
}

#[test]
fn sink_removed_concurrently_stops_at_a_prefix() {
	let log = SystemLog::new(16).unwrap();
	let seen = Arc::new(Mutex::new(Vec::new()));
	let sink_seen = Arc::clone(&seen);
	let handle = log
		.add_sink_fn(move |entry| sink_seen.lock().push(entry.sequence_id))
		.unwrap();

	thread::scope(|scope| {
		scope.spawn(|| {
			for i in 0..1_000usize {
				log.debug("entry {0}", vec![i.into()]).unwrap();
			}
		});
		scope.spawn(|| {
			thread::yield_now();
			assert!(log.remove_sink(handle));
		});
	});

	let seen = seen.lock();
	let expected: Vec<u64> = (0..seen.len() as u64).collect();
	assert_eq!(*seen, expected);
}

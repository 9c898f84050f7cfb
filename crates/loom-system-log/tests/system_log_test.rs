// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Replay and fan-out behaviour of `SystemLog` as seen by attached sinks.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use loom_system_log::{
	system_log, FnSink, LogEntry, LogLevel, LogSink, ManualClock, SinkStats, SystemLog,
};
use parking_lot::Mutex;
use proptest::prelude::*;

const BUFFER_SIZE: usize = 50;

/// Levels every scenario is run at.
const LEVELS: [LogLevel; 4] = [
	LogLevel::Error,
	LogLevel::Warn,
	LogLevel::Info,
	LogLevel::Trace,
];

struct Recorder {
	entries: Arc<Mutex<Vec<Arc<LogEntry>>>>,
}

impl Recorder {
	fn attach(log: &SystemLog) -> Self {
		let entries = Arc::new(Mutex::new(Vec::new()));
		let sink_entries = Arc::clone(&entries);
		log.add_sink_fn(move |entry| sink_entries.lock().push(Arc::clone(entry)))
			.unwrap();
		Self { entries }
	}

	fn sequence_ids(&self) -> Vec<u64> {
		self.entries.lock().iter().map(|e| e.sequence_id).collect()
	}

	fn messages(&self) -> Vec<String> {
		self.entries
			.lock()
			.iter()
			.map(|e| e.formatted_message())
			.collect()
	}

	fn len(&self) -> usize {
		self.entries.lock().len()
	}
}

fn new_log() -> SystemLog {
	SystemLog::new(BUFFER_SIZE).unwrap()
}

/// Writes `count` entries at `level` and returns their rendered messages.
fn write_strings(log: &SystemLog, level: LogLevel, count: usize) -> Vec<String> {
	(0..count)
		.map(|x| {
			let token = format!("token-{:04}", x * 7919 % 10_000);
			system_log!(log, level, "test {0} {1}", x, token.clone()).unwrap();
			format!("test {x} {token}")
		})
		.collect()
}

#[test]
fn default_log_level_is_trace() {
	assert_eq!(new_log().current_level(), LogLevel::Trace);
}

#[test]
fn buffer_capacity_is_fixed_at_construction() {
	let log = new_log();
	write_strings(&log, LogLevel::Info, 120);
	assert_eq!(log.buffer_capacity(), BUFFER_SIZE);
	assert_eq!(log.len(), BUFFER_SIZE);
}

#[test]
fn after_writing_one_entry_a_newly_attached_sink_receives_it() {
	for level in LEVELS {
		let log = new_log();
		let written = write_strings(&log, level, 1);

		let sink = Recorder::attach(&log);

		assert_eq!(sink.len(), 1, "level {level}");
		assert_eq!(sink.messages(), written, "level {level}");
	}
}

#[test]
fn after_writing_one_entry_a_previously_attached_sink_received_it() {
	for level in LEVELS {
		let log = new_log();
		let sink = Recorder::attach(&log);

		let written = write_strings(&log, level, 1);

		assert_eq!(sink.messages(), written, "level {level}");
	}
}

#[test]
fn after_filling_the_buffer_a_newly_attached_sink_receives_all_in_sequence_order() {
	for level in LEVELS {
		let log = new_log();
		let written = write_strings(&log, level, BUFFER_SIZE);

		let sink = Recorder::attach(&log);

		let expected: Vec<u64> = (0..BUFFER_SIZE as u64).collect();
		assert_eq!(sink.sequence_ids(), expected, "level {level}");
		assert_eq!(sink.messages(), written, "level {level}");
	}
}

#[test]
fn after_filling_the_buffer_a_previously_attached_sink_received_all() {
	for level in LEVELS {
		let log = new_log();
		let sink = Recorder::attach(&log);

		write_strings(&log, level, BUFFER_SIZE);

		assert_eq!(sink.len(), BUFFER_SIZE, "level {level}");
	}
}

#[test]
fn after_overfilling_the_buffer_a_newly_attached_sink_receives_the_most_recent_window() {
	for level in LEVELS {
		let log = new_log();
		let written = write_strings(&log, level, 72);

		let sink = Recorder::attach(&log);

		let expected: Vec<u64> = (22..72).collect();
		assert_eq!(sink.sequence_ids(), expected, "level {level}");
		assert_eq!(sink.messages(), written[22..].to_vec(), "level {level}");
	}
}

#[test]
fn after_overfilling_the_buffer_an_attached_sink_received_every_entry() {
	for level in LEVELS {
		let log = new_log();
		let sink = Recorder::attach(&log);

		write_strings(&log, level, 72);

		let expected: Vec<u64> = (0..72).collect();
		assert_eq!(sink.sequence_ids(), expected, "level {level}");
	}
}

#[test]
fn second_sink_attached_after_overfill_sees_only_the_retained_window() {
	let log = new_log();
	let first = Recorder::attach(&log);
	write_strings(&log, LogLevel::Info, 68);

	let second = Recorder::attach(&log);

	assert_eq!(first.sequence_ids(), (0..68).collect::<Vec<u64>>());
	assert_eq!(second.sequence_ids(), (18..68).collect::<Vec<u64>>());

	system_log!(log, LogLevel::Info, "one more").unwrap();
	assert_eq!(first.sequence_ids().last(), Some(&68));
	assert_eq!(second.sequence_ids().len(), 51);
	assert_eq!(second.sequence_ids().last(), Some(&68));
}

#[test]
fn empty_buffer_attach_replays_nothing_then_goes_live() {
	let log = new_log();
	let sink = Recorder::attach(&log);
	assert_eq!(sink.len(), 0);

	write_strings(&log, LogLevel::Warn, 3);
	assert_eq!(sink.sequence_ids(), vec![0, 1, 2]);
}

#[test]
fn removed_sink_receives_nothing_further() {
	let log = new_log();
	let entries = Arc::new(Mutex::new(0usize));
	let counter = Arc::clone(&entries);
	let handle = log.add_sink_fn(move |_| *counter.lock() += 1).unwrap();

	assert!(log.remove_sink(handle));
	write_strings(&log, LogLevel::Error, 10);

	assert_eq!(*entries.lock(), 0);
	assert_eq!(log.total_accepted(), 10);
}

#[test]
fn filtered_writes_leave_no_trace() {
	let log = new_log();
	let sink = Recorder::attach(&log);
	write_strings(&log, LogLevel::Info, 2);

	log.set_current_level(LogLevel::Error);
	assert_eq!(log.current_level(), LogLevel::Error);
	write_strings(&log, LogLevel::Warn, 5);

	assert_eq!(log.total_accepted(), 2);
	assert_eq!(log.len(), 2);
	assert_eq!(sink.sequence_ids(), vec![0, 1]);

	log.set_current_level(LogLevel::Trace);
	assert_eq!(
		system_log!(log, LogLevel::Debug, "accepted again").unwrap(),
		Some(2)
	);
}

#[test]
fn failing_sinks_do_not_affect_other_sinks_or_the_writer() {
	let log = new_log();
	let erroring: Arc<dyn LogSink> = Arc::new(FnSink::named(
		"erroring",
		|_: &Arc<LogEntry>| -> anyhow::Result<()> { anyhow::bail!("remote endpoint down") },
	));
	let panicking: Arc<dyn LogSink> = Arc::new(FnSink::named(
		"panicking",
		|_: &Arc<LogEntry>| -> anyhow::Result<()> { panic!("sink bug") },
	));
	let before = Recorder::attach(&log);
	let erroring = log.add_sink(erroring).unwrap();
	let panicking = log.add_sink(panicking).unwrap();
	let after = Recorder::attach(&log);

	write_strings(&log, LogLevel::Info, 20);

	let expected: Vec<u64> = (0..20).collect();
	assert_eq!(before.sequence_ids(), expected);
	assert_eq!(after.sequence_ids(), expected);
	assert_eq!(log.len(), 20);
	assert_eq!(
		log.sink_stats(erroring),
		Some(SinkStats {
			delivered: 0,
			failed: 20
		})
	);
	assert_eq!(log.sink_stats(panicking).map(|s| s.failed), Some(20));
}

#[test]
fn entries_use_the_injected_clock() {
	let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
	let clock = Arc::new(ManualClock::new(start));
	let log = SystemLog::with_clock(BUFFER_SIZE, clock.clone()).unwrap();

	system_log!(log, LogLevel::Info, "first").unwrap();
	clock.advance(chrono::Duration::minutes(5));
	system_log!(log, LogLevel::Info, "second").unwrap();

	let entries = log.snapshot();
	assert_eq!(entries[0].timestamp, start);
	assert_eq!(entries[1].timestamp, start + chrono::Duration::minutes(5));
}

proptest! {
	#[test]
	fn late_sink_receives_min_of_capacity_and_written(
		capacity in 1usize..40,
		written in 0usize..120,
	) {
		let log = SystemLog::new(capacity).unwrap();
		for i in 0..written {
			log.info("entry {0}", vec![i.into()]).unwrap();
		}

		let sink = Recorder::attach(&log);

		let retained = capacity.min(written) as u64;
		let expected: Vec<u64> = (written as u64 - retained..written as u64).collect();
		prop_assert_eq!(sink.sequence_ids(), expected);
	}

	#[test]
	fn attached_sink_sees_every_accepted_write(
		levels in proptest::collection::vec(0usize..6, 0..80),
		threshold in 0usize..6,
	) {
		let log = SystemLog::new(8).unwrap();
		log.set_current_level(LogLevel::ALL[threshold]);
		let sink = Recorder::attach(&log);

		let mut accepted = 0u64;
		for level in levels {
			let level = LogLevel::ALL[level];
			let result = log.write(level, "x", vec![]).unwrap();
			if level >= LogLevel::ALL[threshold] {
				prop_assert_eq!(result, Some(accepted));
				accepted += 1;
			} else {
				prop_assert_eq!(result, None);
			}
		}

		prop_assert_eq!(sink.sequence_ids(), (0..accepted).collect::<Vec<u64>>());
		prop_assert_eq!(log.total_accepted(), accepted);
	}
}

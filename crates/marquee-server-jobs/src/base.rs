// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Bookkeeping shared by every job: status machine, run counters and last error.
//!
//! Counters are atomics so metric readers never contend with the scheduling
//! loop. Only the config and the last error text sit behind a lock.

use crate::context::{CancellationToken, JobContext};
use crate::error::{JobError, Result};
use crate::types::{JobConfig, JobMetrics, JobName, JobStatus};
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicU8, Ordering};
use std::time::Duration;
use tracing::{debug, info};

/// Sentinel for timestamps that were never recorded.
const NEVER: i64 = i64::MIN;

/// A [`JobStatus`] stored as its ordinal.
#[derive(Debug)]
pub struct AtomicJobStatus(AtomicU8);

impl AtomicJobStatus {
	pub const fn new(status: JobStatus) -> Self {
		Self(AtomicU8::new(status.ordinal()))
	}

	pub fn load(&self) -> JobStatus {
		JobStatus::from_ordinal(self.0.load(Ordering::Acquire))
	}

	pub fn store(&self, status: JobStatus) {
		self.0.store(status.ordinal(), Ordering::Release);
	}

	pub fn compare_exchange(
		&self,
		current: JobStatus,
		new: JobStatus,
	) -> std::result::Result<JobStatus, JobStatus> {
		self.0
			.compare_exchange(
				current.ordinal(),
				new.ordinal(),
				Ordering::AcqRel,
				Ordering::Acquire,
			)
			.map(JobStatus::from_ordinal)
			.map_err(JobStatus::from_ordinal)
	}
}

struct BaseState {
	config: JobConfig,
	last_error: Option<String>,
}

pub struct BaseJob {
	name: JobName,
	status: AtomicJobStatus,
	started: AtomicBool,
	run_count: AtomicU64,
	error_count: AtomicU64,
	consecutive_failures: AtomicU64,
	total_run_time_nanos: AtomicU64,
	last_run_nanos: AtomicI64,
	last_error_nanos: AtomicI64,
	state: RwLock<BaseState>,
	/// Cancelled by `stop`. Replaced with a child of the start context on `start`.
	stop_token: Mutex<CancellationToken>,
}

impl BaseJob {
	pub fn new(name: JobName, config: JobConfig) -> Self {
		Self {
			name,
			status: AtomicJobStatus::new(JobStatus::Stopped),
			started: AtomicBool::new(false),
			run_count: AtomicU64::new(0),
			error_count: AtomicU64::new(0),
			consecutive_failures: AtomicU64::new(0),
			total_run_time_nanos: AtomicU64::new(0),
			last_run_nanos: AtomicI64::new(NEVER),
			last_error_nanos: AtomicI64::new(NEVER),
			state: RwLock::new(BaseState {
				config,
				last_error: None,
			}),
			stop_token: Mutex::new(CancellationToken::new()),
		}
	}

	pub fn name(&self) -> &JobName {
		&self.name
	}

	pub fn config(&self) -> JobConfig {
		self.state.read().config.clone()
	}

	/// Replace the config. Invocations already in flight keep the config they started with.
	pub fn set_config(&self, config: JobConfig) -> Result<()> {
		config
			.validate()
			.map_err(|message| JobError::InvalidConfig {
				name: self.name.clone(),
				message,
			})?;
		self.state.write().config = config;
		Ok(())
	}

	pub fn status(&self) -> JobStatus {
		self.status.load()
	}

	pub fn is_started(&self) -> bool {
		self.started.load(Ordering::Acquire)
	}

	/// Signal observed by the scheduling loop and by runs in progress.
	pub fn stop_token(&self) -> CancellationToken {
		self.stop_token.lock().clone()
	}

	/// No-op when already started, unless the current stop signal has been
	/// cancelled: a start after a shutdown that never finished stopping the job
	/// installs a fresh signal and resumes.
	pub fn start(&self, ctx: &JobContext) -> Result<()> {
		let mut stop_token = self.stop_token.lock();
		if self.started.swap(true, Ordering::AcqRel) && !stop_token.is_cancelled() {
			return Ok(());
		}
		*stop_token = ctx.cancellation_token.child_token();
		self.status.store(JobStatus::Running);
		debug!(job = %self.name, "Job started");
		Ok(())
	}

	/// No-op when already stopped, so the stop signal is cancelled at most once per start.
	///
	/// A request whose own context is already cancelled is the tail of an
	/// earlier shutdown; it is ignored once the job has been started again.
	pub fn stop(&self, ctx: &JobContext) -> Result<()> {
		let stop_token = self.stop_token.lock();
		if ctx.is_cancelled() && !stop_token.is_cancelled() {
			debug!(job = %self.name, "Ignoring stale stop request");
			return Ok(());
		}
		if !self.started.swap(false, Ordering::AcqRel) {
			return Ok(());
		}
		self.status.store(JobStatus::Stopping);
		stop_token.cancel();
		self.status.store(JobStatus::Stopped);
		debug!(job = %self.name, "Job stopped");
		Ok(())
	}

	pub fn on_success(&self, ctx: &JobContext, duration: Duration) {
		self.run_count.fetch_add(1, Ordering::AcqRel);
		self.total_run_time_nanos
			.fetch_add(duration_nanos(duration), Ordering::AcqRel);
		self.last_run_nanos.store(now_nanos(), Ordering::Release);
		self.consecutive_failures.store(0, Ordering::Release);

		let recovered = if self.is_started() {
			JobStatus::Running
		} else {
			JobStatus::Stopped
		};
		// Clearing the error and leaving Error happen under one lock so an
		// overlapping failure cannot land between them.
		let left_error = {
			let mut state = self.state.write();
			state.last_error = None;
			self.status
				.compare_exchange(JobStatus::Error, recovered)
				.is_ok()
		};
		if left_error {
			info!(job = %self.name, run_id = %ctx.run_id, "Job recovered from error state");
		}
	}

	pub fn on_error(&self, ctx: &JobContext, error: &JobError) {
		self.error_count.fetch_add(1, Ordering::AcqRel);
		self.consecutive_failures.fetch_add(1, Ordering::AcqRel);
		self.last_error_nanos.store(now_nanos(), Ordering::Release);

		let mut state = self.state.write();
		state.last_error = Some(error.to_string());
		// A run interrupted by shutdown must not overwrite Stopping/Stopped.
		if error.is_cancelled() || ctx.is_cancelled() {
			let _ = self
				.status
				.compare_exchange(JobStatus::Running, JobStatus::Error);
		} else {
			self.status.store(JobStatus::Error);
		}
	}

	/// `Err` exactly when the status is `Error`.
	pub fn health(&self) -> Result<()> {
		if self.status() != JobStatus::Error {
			return Ok(());
		}
		let message = self
			.state
			.read()
			.last_error
			.clone()
			.unwrap_or_else(|| "unknown error".to_string());
		Err(JobError::Unhealthy(message))
	}

	pub fn metrics(&self) -> JobMetrics {
		let (config, last_error) = {
			let state = self.state.read();
			(state.config.clone(), state.last_error.clone())
		};

		let run_count = self.run_count.load(Ordering::Acquire);
		let total_run_time = self.total_run_time_nanos.load(Ordering::Acquire);
		let average_run_time = if run_count == 0 {
			Duration::ZERO
		} else {
			Duration::from_nanos(total_run_time / run_count)
		};

		let last_run = timestamp(self.last_run_nanos.load(Ordering::Acquire));
		let next_run = if config.enabled {
			last_run.and_then(|at| {
				chrono::Duration::from_std(config.interval)
					.ok()
					.and_then(|interval| at.checked_add_signed(interval))
			})
		} else {
			None
		};

		JobMetrics {
			name: self.name.clone(),
			status: self.status(),
			enabled: config.enabled,
			interval: config.interval,
			last_run,
			next_run,
			run_count,
			error_count: self.error_count.load(Ordering::Acquire),
			consecutive_failures: self.consecutive_failures.load(Ordering::Acquire),
			average_run_time,
			last_error,
			last_error_time: timestamp(self.last_error_nanos.load(Ordering::Acquire)),
		}
	}
}

fn now_nanos() -> i64 {
	Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
}

fn timestamp(nanos: i64) -> Option<DateTime<Utc>> {
	(nanos != NEVER).then(|| Utc.timestamp_nanos(nanos))
}

fn duration_nanos(duration: Duration) -> u64 {
	u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::TriggerSource;
	use proptest::prelude::*;

	fn base() -> BaseJob {
		BaseJob::new(
			JobName::LIBRARY_SYNC,
			JobConfig::every(Duration::from_secs(60)),
		)
	}

	fn ctx() -> JobContext {
		JobContext::new(
			JobName::LIBRARY_SYNC,
			TriggerSource::Schedule,
			CancellationToken::new(),
		)
	}

	#[test]
	fn test_atomic_status_compare_exchange() {
		let status = AtomicJobStatus::new(JobStatus::Running);
		assert_eq!(
			status.compare_exchange(JobStatus::Error, JobStatus::Stopped),
			Err(JobStatus::Running)
		);
		assert_eq!(
			status.compare_exchange(JobStatus::Running, JobStatus::Error),
			Ok(JobStatus::Running)
		);
		assert_eq!(status.load(), JobStatus::Error);
	}

	#[test]
	fn test_start_is_idempotent() {
		let job = base();
		let ctx = ctx();
		job.start(&ctx).unwrap();
		let token = job.stop_token();
		job.start(&ctx).unwrap();

		assert_eq!(job.status(), JobStatus::Running);
		assert!(job.is_started());
		assert!(!token.is_cancelled());
		assert!(!job.stop_token().is_cancelled());
	}

	#[test]
	fn test_stop_twice_is_a_no_op() {
		let job = base();
		let ctx = ctx();
		job.start(&ctx).unwrap();
		let token = job.stop_token();

		assert!(job.stop(&ctx).is_ok());
		assert!(job.stop(&ctx).is_ok());
		assert_eq!(job.status(), JobStatus::Stopped);
		assert!(token.is_cancelled());
	}

	#[test]
	fn test_stop_before_start_leaves_status_alone() {
		let job = base();
		assert!(job.stop(&ctx()).is_ok());
		assert_eq!(job.status(), JobStatus::Stopped);
	}

	#[test]
	fn test_stop_token_follows_start_context() {
		let job = base();
		let ctx = ctx();
		job.start(&ctx).unwrap();
		ctx.cancellation_token.cancel();
		assert!(job.stop_token().is_cancelled());
	}

	#[test]
	fn test_restart_installs_fresh_stop_token() {
		let job = base();
		let ctx = ctx();
		job.start(&ctx).unwrap();
		job.stop(&ctx).unwrap();
		let old = job.stop_token();

		job.start(&ctx).unwrap();
		assert!(old.is_cancelled());
		assert!(!job.stop_token().is_cancelled());
		assert_eq!(job.status(), JobStatus::Running);
	}

	#[test]
	fn test_start_after_unfinished_shutdown_resumes() {
		let job = base();
		let first = ctx();
		job.start(&first).unwrap();
		first.cancellation_token.cancel();
		assert!(job.is_started());

		let second = ctx();
		job.start(&second).unwrap();
		assert_eq!(job.status(), JobStatus::Running);
		assert!(!job.stop_token().is_cancelled());
	}

	#[test]
	fn test_late_stop_from_previous_run_is_ignored() {
		let job = base();
		let first = ctx();
		job.start(&first).unwrap();
		first.cancellation_token.cancel();

		let second = ctx();
		job.start(&second).unwrap();
		job.stop(&first).unwrap();
		assert_eq!(job.status(), JobStatus::Running);
		assert!(!job.stop_token().is_cancelled());

		job.stop(&second).unwrap();
		assert_eq!(job.status(), JobStatus::Stopped);
		assert!(job.stop_token().is_cancelled());
	}

	#[test]
	fn test_error_status_and_last_error_move_together() {
		let job = std::sync::Arc::new(base());
		job.start(&ctx()).unwrap();

		let handles: Vec<_> = (0..4)
			.map(|i| {
				let job = std::sync::Arc::clone(&job);
				std::thread::spawn(move || {
					let ctx = ctx();
					for _ in 0..2000 {
						if i % 2 == 0 {
							job.on_success(&ctx, Duration::from_micros(1));
						} else {
							job.on_error(&ctx, &JobError::failed("boom"));
						}
					}
				})
			})
			.collect();
		for handle in handles {
			handle.join().unwrap();
		}

		let metrics = job.metrics();
		assert_eq!(
			metrics.status == JobStatus::Error,
			metrics.last_error.is_some()
		);
		assert_eq!(job.health().is_err(), metrics.last_error.is_some());
	}

	#[test]
	fn test_on_error_sets_error_state() {
		let job = base();
		let ctx = ctx();
		job.start(&ctx).unwrap();
		job.on_error(&ctx, &JobError::failed("media server unreachable"));

		assert_eq!(job.status(), JobStatus::Error);
		let err = job.health().unwrap_err();
		assert!(err.to_string().contains("media server unreachable"));

		let metrics = job.metrics();
		assert_eq!(metrics.error_count, 1);
		assert_eq!(metrics.consecutive_failures, 1);
		assert!(metrics.last_error_time.is_some());
		assert_eq!(
			metrics.last_error.as_deref(),
			Some("Job failed: media server unreachable")
		);
	}

	#[test]
	fn test_single_success_recovers_from_error() {
		let job = base();
		let ctx = ctx();
		job.start(&ctx).unwrap();
		for _ in 0..5 {
			job.on_error(&ctx, &JobError::failed("boom"));
		}
		job.on_success(&ctx, Duration::from_millis(20));

		assert_eq!(job.status(), JobStatus::Running);
		assert!(job.health().is_ok());
		let metrics = job.metrics();
		assert!(metrics.last_error.is_none());
		assert!(metrics.last_error_time.is_some());
		assert_eq!(metrics.error_count, 5);
		assert_eq!(metrics.consecutive_failures, 0);
		assert_eq!(metrics.run_count, 1);
	}

	#[test]
	fn test_success_on_stopped_job_does_not_mark_running() {
		let job = base();
		let ctx = ctx();
		job.on_error(&ctx, &JobError::failed("boom"));
		assert_eq!(job.status(), JobStatus::Error);

		job.on_success(&ctx, Duration::from_millis(1));
		assert_eq!(job.status(), JobStatus::Stopped);
	}

	#[test]
	fn test_cancelled_run_after_stop_keeps_stopped() {
		let job = base();
		let ctx = ctx();
		job.start(&ctx).unwrap();
		job.stop(&ctx).unwrap();

		job.on_error(&ctx, &JobError::Cancelled);
		assert_eq!(job.status(), JobStatus::Stopped);
		assert_eq!(job.metrics().error_count, 1);
	}

	#[test]
	fn test_cancelled_run_while_running_is_an_error() {
		let job = base();
		let ctx = ctx();
		job.start(&ctx).unwrap();
		job.on_error(&ctx, &JobError::Cancelled);
		assert_eq!(job.status(), JobStatus::Error);
	}

	#[test]
	fn test_metrics_before_first_run() {
		let metrics = base().metrics();
		assert_eq!(metrics.name, JobName::LIBRARY_SYNC);
		assert_eq!(metrics.status, JobStatus::Stopped);
		assert_eq!(metrics.run_count, 0);
		assert_eq!(metrics.average_run_time, Duration::ZERO);
		assert!(metrics.last_run.is_none());
		assert!(metrics.next_run.is_none());
		assert!(metrics.last_error.is_none());
	}

	#[test]
	fn test_next_run_follows_last_run_when_enabled() {
		let job = base();
		job.on_success(&ctx(), Duration::from_millis(5));
		let metrics = job.metrics();
		let last_run = metrics.last_run.unwrap();
		assert_eq!(
			metrics.next_run,
			Some(last_run + chrono::Duration::seconds(60))
		);
	}

	#[test]
	fn test_next_run_absent_when_disabled() {
		let job = BaseJob::new(
			JobName::LIBRARY_SYNC,
			JobConfig::every(Duration::from_secs(60)).enabled(false),
		);
		job.on_success(&ctx(), Duration::from_millis(5));
		let metrics = job.metrics();
		assert!(metrics.last_run.is_some());
		assert!(metrics.next_run.is_none());
	}

	#[test]
	fn test_set_config_rejects_invalid() {
		let job = base();
		let err = job
			.set_config(JobConfig::every(Duration::ZERO))
			.unwrap_err();
		assert!(matches!(err, JobError::InvalidConfig { .. }));
		assert_eq!(job.config().interval, Duration::from_secs(60));

		job.set_config(JobConfig::every(Duration::from_secs(5)))
			.unwrap();
		assert_eq!(job.config().interval, Duration::from_secs(5));
	}

	#[test]
	fn test_concurrent_successes_are_not_lost() {
		let job = std::sync::Arc::new(base());
		let handles: Vec<_> = (0..8)
			.map(|_| {
				let job = std::sync::Arc::clone(&job);
				std::thread::spawn(move || {
					let ctx = ctx();
					for _ in 0..1000 {
						job.on_success(&ctx, Duration::from_micros(1));
					}
				})
			})
			.collect();
		for handle in handles {
			handle.join().unwrap();
		}

		let metrics = job.metrics();
		assert_eq!(metrics.run_count, 8000);
		assert_eq!(metrics.average_run_time, Duration::from_micros(1));
	}

	proptest! {
		/// Average run time is the exact integer mean of the recorded durations.
		#[test]
		fn average_is_exact_mean(durations in prop::collection::vec(0u64..10_000_000_000, 1..50)) {
			let job = base();
			let ctx = ctx();
			for nanos in &durations {
				job.on_success(&ctx, Duration::from_nanos(*nanos));
			}
			let total: u64 = durations.iter().sum();
			let metrics = job.metrics();
			prop_assert_eq!(metrics.run_count, durations.len() as u64);
			prop_assert_eq!(metrics.average_run_time, Duration::from_nanos(total / durations.len() as u64));
		}

		/// Run and error counters never decrease.
		#[test]
		fn counters_are_monotonic(outcomes in prop::collection::vec(any::<bool>(), 1..100)) {
			let job = base();
			let ctx = ctx();
			let mut previous = job.metrics();
			for succeeded in outcomes {
				if succeeded {
					job.on_success(&ctx, Duration::from_millis(1));
				} else {
					job.on_error(&ctx, &JobError::failed("boom"));
				}
				let current = job.metrics();
				prop_assert!(current.run_count >= previous.run_count);
				prop_assert!(current.error_count >= previous.error_count);
				prop_assert_eq!(current.run_count + current.error_count, previous.run_count + previous.error_count + 1);
				previous = current;
			}
		}
	}
}

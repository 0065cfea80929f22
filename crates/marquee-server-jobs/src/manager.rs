// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::context::{CancellationToken, JobContext};
use crate::error::{JobError, Result};
use crate::factory::JobFactory;
use crate::health::{JobHealthStatus, JobsHealthStatus};
use crate::job::Job;
use crate::types::{saturating_millis, JobConfig, JobMetrics, JobName, TriggerSource};
use parking_lot::{Mutex, RwLock};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument, warn};

pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Owns the job registry and one scheduling loop per enabled job.
///
/// Jobs registered after [`Manager::start`] are not scheduled until the next start.
pub struct Manager {
	jobs: RwLock<HashMap<JobName, Arc<dyn Job>>>,
	running: AtomicBool,
	shutdown: Mutex<ShutdownSignal>,
	/// Scheduling loops and detached manual triggers still in flight.
	tasks: TaskTracker,
	shutdown_timeout: Duration,
}

/// Stop signal shared by every loop and manual run of one manager run.
struct ShutdownSignal {
	token: CancellationToken,
	/// Set while `stop` drains; a cancelled token is not replaced meanwhile.
	stopping: bool,
}

impl Default for Manager {
	fn default() -> Self {
		Self::new()
	}
}

impl Manager {
	pub fn new() -> Self {
		Self::with_shutdown_timeout(DEFAULT_SHUTDOWN_TIMEOUT)
	}

	pub fn with_shutdown_timeout(shutdown_timeout: Duration) -> Self {
		Self {
			jobs: RwLock::new(HashMap::new()),
			running: AtomicBool::new(false),
			shutdown: Mutex::new(ShutdownSignal {
				token: CancellationToken::new(),
				stopping: false,
			}),
			tasks: TaskTracker::new(),
			shutdown_timeout,
		}
	}

	pub fn register(&self, job: Arc<dyn Job>) -> Result<()> {
		let name = job.name();
		job.config()
			.validate()
			.map_err(|message| JobError::InvalidConfig {
				name: name.clone(),
				message,
			})?;

		match self.jobs.write().entry(name.clone()) {
			Entry::Occupied(_) => return Err(JobError::Duplicate(name)),
			Entry::Vacant(slot) => {
				slot.insert(job);
			}
		}

		info!(job = %name, "Registered job");
		Ok(())
	}

	/// Build each named job through `factory` and register it, stopping at the first failure.
	pub fn register_all(&self, factory: &JobFactory, names: &[JobName]) -> Result<()> {
		for name in names {
			let job = factory.build(name)?;
			self.register(job)?;
		}
		Ok(())
	}

	#[instrument(skip(self))]
	pub async fn start(&self) -> Result<()> {
		if self
			.running
			.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
			.is_err()
		{
			return Err(JobError::AlreadyRunning);
		}

		let shutdown = {
			let mut signal = self.shutdown.lock();
			signal.stopping = false;
			if signal.token.is_cancelled() {
				signal.token = CancellationToken::new();
			}
			signal.token.clone()
		};
		self.tasks.reopen();

		let jobs = self.list_jobs();
		let mut scheduled = 0usize;
		for job in &jobs {
			if !job.config().enabled {
				info!(job = %job.name(), "Job disabled, not scheduling");
				continue;
			}
			self.tasks
				.spawn(run_schedule_loop(Arc::clone(job), shutdown.clone()));
			scheduled += 1;
		}

		info!(registered = jobs.len(), scheduled, "Job manager started");
		Ok(())
	}

	/// Cancel every loop, stop every job and wait up to `deadline` for the loops to drain.
	///
	/// On timeout cancellation has still been requested everywhere; the loops
	/// finish on their own after this returns.
	#[instrument(skip(self))]
	pub async fn stop(&self, deadline: Duration) -> Result<()> {
		if self
			.running
			.compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
			.is_err()
		{
			debug!("Job manager not running");
			return Ok(());
		}

		let shutdown = {
			let mut signal = self.shutdown.lock();
			signal.stopping = true;
			signal.token.cancel();
			signal.token.clone()
		};
		info!("Stopping job manager");

		let result = self.drain(shutdown, deadline).await;
		self.shutdown.lock().stopping = false;
		result
	}

	async fn drain(&self, shutdown: CancellationToken, deadline: Duration) -> Result<()> {
		let started = Instant::now();
		let remaining = || deadline.saturating_sub(started.elapsed());

		let mut first_error = None;
		for job in self.list_jobs() {
			let name = job.name();
			let ctx = JobContext::new(name.clone(), TriggerSource::Shutdown, shutdown.clone());
			match tokio::time::timeout(remaining(), job.stop(&ctx)).await {
				Ok(Ok(())) => {}
				Ok(Err(e)) => {
					warn!(job = %name, error = %e, "Job failed to stop");
					first_error.get_or_insert(e);
				}
				Err(_) => warn!(job = %name, "Job stop exceeded shutdown deadline"),
			}
		}

		self.tasks.close();
		if tokio::time::timeout(remaining(), self.tasks.wait())
			.await
			.is_err()
		{
			warn!(
				in_flight = self.tasks.len(),
				deadline_ms = saturating_millis(deadline),
				"Job manager shutdown timed out"
			);
			return Err(JobError::ShutdownTimeout { waited: deadline });
		}

		info!("Job manager stopped");
		match first_error {
			Some(e) => Err(e),
			None => Ok(()),
		}
	}

	pub async fn stop_with_default_timeout(&self) -> Result<()> {
		self.stop(self.shutdown_timeout).await
	}

	pub fn is_running(&self) -> bool {
		self.running.load(Ordering::Acquire)
	}

	pub fn get_job(&self, name: &JobName) -> Option<Arc<dyn Job>> {
		self.jobs.read().get(name).cloned()
	}

	/// Registered jobs ordered by name.
	pub fn list_jobs(&self) -> Vec<Arc<dyn Job>> {
		let mut jobs: Vec<_> = self.jobs.read().values().cloned().collect();
		jobs.sort_by_key(|job| job.name());
		jobs
	}

	pub fn job_names(&self) -> Vec<JobName> {
		let mut names: Vec<_> = self.jobs.read().keys().cloned().collect();
		names.sort();
		names
	}

	pub fn get_metrics(&self) -> HashMap<JobName, JobMetrics> {
		self.list_jobs()
			.into_iter()
			.map(|job| (job.name(), job.metrics()))
			.collect()
	}

	/// `None` for healthy jobs, the recorded error otherwise.
	pub fn health_check(&self) -> HashMap<JobName, Option<JobError>> {
		self.list_jobs()
			.into_iter()
			.map(|job| (job.name(), job.health().err()))
			.collect()
	}

	pub fn health_status(&self) -> JobsHealthStatus {
		let jobs = self
			.list_jobs()
			.iter()
			.map(|job| JobHealthStatus::from(&job.metrics()))
			.collect();
		JobsHealthStatus::from_jobs(jobs)
	}

	/// Run one attempt sequence now, detached from the periodic schedule.
	///
	/// Not serialized against the job's own loop: a scheduled tick and a manual
	/// trigger may run concurrently. The run is cancelled by the manager's stop
	/// and, when the job is started, by the job's own stop. Requested while the
	/// manager is stopping, it is cancelled before its first attempt.
	#[instrument(skip(self))]
	pub async fn trigger_job(&self, name: &JobName) -> Result<()> {
		let job = self
			.get_job(name)
			.ok_or_else(|| JobError::NotFound(name.clone()))?;
		let cancel = self.shutdown_token().child_token();
		let job_stop = job.base().is_started().then(|| job.base().stop_token());

		self.tasks.spawn(async move {
			tokio::select! {
				_ = run_attempt_sequence(job.as_ref(), TriggerSource::Manual, &cancel) => {}
				_ = forward_cancellation(job_stop, cancel.clone()) => {}
			}
		});

		info!(job = %name, "Manual job run requested");
		Ok(())
	}

	/// Takes effect from the job's next tick; runs already in flight keep their config.
	#[instrument(skip(self))]
	pub fn update_job_config(&self, name: &JobName, config: JobConfig) -> Result<()> {
		let job = self
			.get_job(name)
			.ok_or_else(|| JobError::NotFound(name.clone()))?;
		job.set_config(config)?;
		info!(job = %name, "Job config updated");
		Ok(())
	}

	/// Current shutdown signal. One cancelled by a finished stop is replaced;
	/// during a stop the cancelled signal is handed out as is.
	fn shutdown_token(&self) -> CancellationToken {
		let mut signal = self.shutdown.lock();
		if signal.token.is_cancelled() && !signal.stopping {
			signal.token = CancellationToken::new();
		}
		signal.token.clone()
	}
}

/// Cancels `to` once `from` fires. Never completes, so it can sit beside the
/// run it guards in a `select!`.
async fn forward_cancellation(from: Option<CancellationToken>, to: CancellationToken) {
	if let Some(from) = from {
		from.cancelled().await;
		to.cancel();
	}
	std::future::pending::<()>().await
}

async fn run_schedule_loop(job: Arc<dyn Job>, shutdown: CancellationToken) {
	let name = job.name();
	let ctx = JobContext::new(name.clone(), TriggerSource::Startup, shutdown.child_token());

	if let Err(e) = job.start(&ctx).await {
		error!(job = %name, error = %e, "Job failed to start");
		job.on_error(&ctx, &e);
		return;
	}

	let stop = job.base().stop_token();
	info!(job = %name, "Job scheduling loop started");

	if job.config().run_on_startup && !stop.is_cancelled() {
		let _ = run_attempt_sequence(job.as_ref(), TriggerSource::Startup, &stop).await;
	}

	loop {
		let interval = job.config().interval;
		tokio::select! {
			biased;
			_ = stop.cancelled() => break,
			_ = tokio::time::sleep(interval) => {}
		}

		if !job.config().enabled {
			debug!(job = %name, "Job disabled, skipping tick");
			continue;
		}
		let _ = run_attempt_sequence(job.as_ref(), TriggerSource::Schedule, &stop).await;
	}

	if let Err(e) = job.stop(&ctx).await {
		warn!(job = %name, error = %e, "Job failed to stop");
	}
	debug!(job = %name, "Job scheduling loop exited");
}

/// Up to `max_retries + 1` attempts, each bounded by the config timeout.
///
/// Success reports the duration of the successful attempt through `on_success`.
/// Exhausting every attempt, or being cancelled, reports once through `on_error`.
async fn run_attempt_sequence(
	job: &dyn Job,
	triggered_by: TriggerSource,
	cancel: &CancellationToken,
) -> Result<()> {
	let config = job.config();
	let run_ctx = JobContext::new(job.name(), triggered_by, cancel.clone());
	let mut last_error = None;

	for attempt in 0..=config.max_retries {
		let ctx = run_ctx.for_attempt(attempt);

		if attempt > 0 {
			let waited = tokio::select! {
				biased;
				_ = cancel.cancelled() => Err(JobError::Cancelled),
				_ = tokio::time::sleep(config.retry_delay) => Ok(()),
			};
			if let Err(e) = waited {
				debug!(job = %ctx.job_name, run_id = %ctx.run_id, attempt, "Retry wait interrupted by shutdown");
				job.on_error(&ctx, &e);
				return Err(e);
			}
		}

		let attempt_started = Instant::now();
		let outcome = tokio::select! {
			biased;
			_ = cancel.cancelled() => Err(JobError::Cancelled),
			result = tokio::time::timeout(config.timeout, job.trigger(&ctx)) => {
				result.unwrap_or_else(|_| Err(JobError::Timeout { after: config.timeout }))
			}
		};

		match outcome {
			Ok(()) => {
				let elapsed = attempt_started.elapsed();
				job.on_success(&ctx, elapsed);
				info!(
					job = %ctx.job_name,
					run_id = %ctx.run_id,
					triggered_by = %run_ctx.triggered_by,
					attempt,
					duration_ms = saturating_millis(elapsed),
					"Job completed successfully"
				);
				return Ok(());
			}
			Err(e) if cancel.is_cancelled() => {
				debug!(job = %ctx.job_name, run_id = %ctx.run_id, attempt, error = %e, "Job run interrupted by shutdown");
				job.on_error(&ctx, &e);
				return Err(e);
			}
			Err(e) => {
				warn!(
					job = %ctx.job_name,
					run_id = %ctx.run_id,
					attempt,
					max_retries = config.max_retries,
					error = %e,
					"Job attempt failed"
				);
				last_error = Some(e);
			}
		}
	}

	let error = last_error.unwrap_or_else(|| JobError::failed("no attempt was made"));
	warn!(
		job = %run_ctx.job_name,
		run_id = %run_ctx.run_id,
		attempts = u64::from(config.max_retries) + 1,
		error = %error,
		"Job failed after exhausting retries"
	);
	job.on_error(&run_ctx, &error);
	Err(error)
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::types::{JobMetrics, JobName, JobStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Failed attempt sequences in a row before a job counts as unhealthy.
pub const UNHEALTHY_AFTER_FAILURES: u64 = 3;

#[derive(Debug, Clone, Serialize)]
pub struct JobHealthStatus {
	pub name: JobName,
	pub status: HealthState,
	pub job_status: JobStatus,
	pub last_run: Option<DateTime<Utc>>,
	pub last_error: Option<String>,
	pub consecutive_failures: u64,
}

impl From<&JobMetrics> for JobHealthStatus {
	fn from(metrics: &JobMetrics) -> Self {
		Self {
			name: metrics.name.clone(),
			status: determine_health_state(metrics.status, metrics.consecutive_failures),
			job_status: metrics.status,
			last_run: metrics.last_run,
			last_error: metrics.last_error.clone(),
			consecutive_failures: metrics.consecutive_failures,
		}
	}
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
	Healthy,
	Degraded,
	Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobsHealthStatus {
	pub status: HealthState,
	pub jobs: Vec<JobHealthStatus>,
}

impl JobsHealthStatus {
	/// Overall state is the worst state of any job.
	pub fn from_jobs(jobs: Vec<JobHealthStatus>) -> Self {
		let status = jobs
			.iter()
			.map(|job| job.status)
			.max()
			.unwrap_or(HealthState::Healthy);
		Self { status, jobs }
	}
}

pub(crate) fn determine_health_state(status: JobStatus, consecutive_failures: u64) -> HealthState {
	match status {
		JobStatus::Running | JobStatus::Stopped => HealthState::Healthy,
		JobStatus::Stopping => HealthState::Degraded,
		JobStatus::Error => {
			if consecutive_failures >= UNHEALTHY_AFTER_FAILURES {
				HealthState::Unhealthy
			} else {
				HealthState::Degraded
			}
		}
	}
}

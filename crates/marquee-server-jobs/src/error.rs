// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::types::JobName;
use std::time::Duration;

#[derive(Debug, Clone, thiserror::Error)]
pub enum JobError {
	#[error("Job failed: {0}")]
	Failed(String),

	#[error("Job timed out after {}ms", .after.as_millis())]
	Timeout { after: Duration },

	#[error("Job cancelled")]
	Cancelled,

	#[error("Job in error state: {0}")]
	Unhealthy(String),

	#[error("Job not found: {0}")]
	NotFound(JobName),

	#[error("Job already registered: {0}")]
	Duplicate(JobName),

	#[error("No constructor registered for job: {0}")]
	UnknownJob(JobName),

	#[error("Invalid config for job {name}: {message}")]
	InvalidConfig { name: JobName, message: String },

	#[error("Job manager is already running")]
	AlreadyRunning,

	#[error("Job manager shutdown timed out after {}ms", .waited.as_millis())]
	ShutdownTimeout { waited: Duration },
}

impl JobError {
	pub fn failed(message: impl Into<String>) -> Self {
		Self::Failed(message.into())
	}

	pub fn is_cancelled(&self) -> bool {
		matches!(self, Self::Cancelled)
	}

	pub fn is_timeout(&self) -> bool {
		matches!(self, Self::Timeout { .. })
	}
}

pub type Result<T> = std::result::Result<T, JobError>;

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::borrow::Cow;
use std::fmt;
use std::time::Duration;

/// Stable identifier of a job, unique within a [`Manager`](crate::Manager).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobName(Cow<'static, str>);

impl JobName {
	pub const DRIVE_MONITOR: JobName = JobName::from_static("drive-monitor");
	pub const LIBRARY_SYNC: JobName = JobName::from_static("library-sync");
	pub const REQUEST_STATUS_SYNC: JobName = JobName::from_static("request-status-sync");
	pub const NOTIFICATION_CLEANUP: JobName = JobName::from_static("notification-cleanup");
	pub const INVITATION_CLEANUP: JobName = JobName::from_static("invitation-cleanup");

	/// Every job known to the server, in registration order.
	pub const ALL: [JobName; 5] = [
		Self::DRIVE_MONITOR,
		Self::LIBRARY_SYNC,
		Self::REQUEST_STATUS_SYNC,
		Self::NOTIFICATION_CLEANUP,
		Self::INVITATION_CLEANUP,
	];

	pub const fn from_static(name: &'static str) -> Self {
		Self(Cow::Borrowed(name))
	}

	pub fn new(name: impl Into<String>) -> Self {
		Self(Cow::Owned(name.into()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for JobName {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&'static str> for JobName {
	fn from(name: &'static str) -> Self {
		Self::from_static(name)
	}
}

impl From<String> for JobName {
	fn from(name: String) -> Self {
		Self::new(name)
	}
}

/// How a job should be scheduled and retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobConfig {
	pub enabled: bool,
	pub interval: Duration,
	pub max_retries: u32,
	pub retry_delay: Duration,
	pub timeout: Duration,
	pub run_on_startup: bool,
}

impl Default for JobConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			interval: Duration::from_secs(60 * 60),
			max_retries: 3,
			retry_delay: Duration::from_secs(1),
			timeout: Duration::from_secs(5 * 60),
			run_on_startup: false,
		}
	}
}

impl JobConfig {
	/// Enabled config firing every `interval`, other fields at their defaults.
	pub fn every(interval: Duration) -> Self {
		Self {
			interval,
			..Default::default()
		}
	}

	pub fn enabled(mut self, enabled: bool) -> Self {
		self.enabled = enabled;
		self
	}

	pub fn max_retries(mut self, max_retries: u32) -> Self {
		self.max_retries = max_retries;
		self
	}

	pub fn retry_delay(mut self, retry_delay: Duration) -> Self {
		self.retry_delay = retry_delay;
		self
	}

	pub fn timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;
		self
	}

	pub fn run_on_startup(mut self, run_on_startup: bool) -> Self {
		self.run_on_startup = run_on_startup;
		self
	}

	/// Reason the config cannot be scheduled, if any.
	pub fn validate(&self) -> Result<(), String> {
		if self.interval.is_zero() {
			return Err("interval must be greater than zero".to_string());
		}
		if self.timeout.is_zero() {
			return Err("timeout must be greater than zero".to_string());
		}
		Ok(())
	}
}

/// Lifecycle state of a job.
///
/// The discriminants are the values stored in [`AtomicJobStatus`](crate::base::AtomicJobStatus).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum JobStatus {
	Stopped = 0,
	Running = 1,
	Error = 2,
	Stopping = 3,
}

impl JobStatus {
	const BY_ORDINAL: [JobStatus; 4] = [
		JobStatus::Stopped,
		JobStatus::Running,
		JobStatus::Error,
		JobStatus::Stopping,
	];

	pub const fn ordinal(self) -> u8 {
		self as u8
	}

	/// Unknown ordinals map to `Stopped`.
	pub fn from_ordinal(ordinal: u8) -> Self {
		Self::BY_ORDINAL
			.get(ordinal as usize)
			.copied()
			.unwrap_or(JobStatus::Stopped)
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			JobStatus::Stopped => "stopped",
			JobStatus::Running => "running",
			JobStatus::Error => "error",
			JobStatus::Stopping => "stopping",
		}
	}
}

impl fmt::Display for JobStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// What caused a job invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
	Startup,
	Schedule,
	Manual,
	Retry,
	Shutdown,
}

impl TriggerSource {
	pub fn as_str(&self) -> &'static str {
		match self {
			TriggerSource::Startup => "startup",
			TriggerSource::Schedule => "schedule",
			TriggerSource::Manual => "manual",
			TriggerSource::Retry => "retry",
			TriggerSource::Shutdown => "shutdown",
		}
	}
}

impl fmt::Display for TriggerSource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Point-in-time view of how a job has run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobMetrics {
	pub name: JobName,
	pub status: JobStatus,
	pub enabled: bool,
	#[serde(rename = "interval_ms", serialize_with = "serialize_millis")]
	pub interval: Duration,
	pub last_run: Option<DateTime<Utc>>,
	pub next_run: Option<DateTime<Utc>>,
	pub run_count: u64,
	pub error_count: u64,
	pub consecutive_failures: u64,
	#[serde(rename = "average_run_time_ms", serialize_with = "serialize_millis")]
	pub average_run_time: Duration,
	pub last_error: Option<String>,
	pub last_error_time: Option<DateTime<Utc>>,
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
	serializer.serialize_u64(saturating_millis(*duration))
}

/// Whole milliseconds, clamped to `u64::MAX`.
pub(crate) fn saturating_millis(duration: Duration) -> u64 {
	u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_status_ordinals_are_stable() {
		assert_eq!(JobStatus::Stopped.ordinal(), 0);
		assert_eq!(JobStatus::Running.ordinal(), 1);
		assert_eq!(JobStatus::Error.ordinal(), 2);
		assert_eq!(JobStatus::Stopping.ordinal(), 3);
	}

	#[test]
	fn test_status_from_ordinal() {
		for status in JobStatus::BY_ORDINAL {
			assert_eq!(JobStatus::from_ordinal(status.ordinal()), status);
		}
		assert_eq!(JobStatus::from_ordinal(42), JobStatus::Stopped);
	}

	#[test]
	fn test_job_name_equality_ignores_ownership() {
		assert_eq!(JobName::new("library-sync"), JobName::LIBRARY_SYNC);
		assert_eq!(JobName::from("drive-monitor"), JobName::DRIVE_MONITOR);
		assert_eq!(JobName::LIBRARY_SYNC.to_string(), "library-sync");
	}

	#[test]
	fn test_all_names_are_unique() {
		let all = JobName::ALL;
		let mut names: Vec<_> = all.iter().map(JobName::as_str).collect();
		names.sort_unstable();
		names.dedup();
		assert_eq!(names.len(), JobName::ALL.len());
	}

	#[test]
	fn test_config_validation() {
		assert!(JobConfig::default().validate().is_ok());
		assert!(JobConfig::every(Duration::ZERO).validate().is_err());
		assert!(JobConfig::default()
			.timeout(Duration::ZERO)
			.validate()
			.is_err());
	}

	#[test]
	fn test_config_builder() {
		let config = JobConfig::every(Duration::from_millis(50))
			.max_retries(2)
			.retry_delay(Duration::from_millis(10))
			.timeout(Duration::from_millis(100))
			.run_on_startup(true)
			.enabled(false);
		assert_eq!(config.interval, Duration::from_millis(50));
		assert_eq!(config.max_retries, 2);
		assert_eq!(config.retry_delay, Duration::from_millis(10));
		assert_eq!(config.timeout, Duration::from_millis(100));
		assert!(config.run_on_startup);
		assert!(!config.enabled);
	}

	#[test]
	fn test_saturating_millis_clamps() {
		assert_eq!(saturating_millis(Duration::from_micros(1_500_999)), 1500);
		assert_eq!(saturating_millis(Duration::MAX), u64::MAX);
	}

	#[test]
	fn test_metrics_serialize_durations_as_millis() {
		let metrics = JobMetrics {
			name: JobName::LIBRARY_SYNC,
			status: JobStatus::Running,
			enabled: true,
			interval: Duration::from_secs(2),
			last_run: None,
			next_run: None,
			run_count: 0,
			error_count: 0,
			consecutive_failures: 0,
			average_run_time: Duration::from_millis(1500),
			last_error: None,
			last_error_time: None,
		};
		let json = serde_json::to_value(&metrics).unwrap();
		assert_eq!(json["name"], "library-sync");
		assert_eq!(json["status"], "running");
		assert_eq!(json["interval_ms"], 2000);
		assert_eq!(json["average_run_time_ms"], 1500);
	}
}

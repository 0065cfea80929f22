// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Built-in schedule for every known job.

use crate::types::{JobConfig, JobName};
use std::time::Duration;

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(60 * 60);
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

fn defaults_table() -> [(JobName, JobConfig); 5] {
	[
		(
			JobName::DRIVE_MONITOR,
			JobConfig {
				enabled: true,
				interval: 5 * MINUTE,
				max_retries: 2,
				retry_delay: Duration::from_secs(30),
				timeout: MINUTE,
				run_on_startup: true,
			},
		),
		(
			JobName::LIBRARY_SYNC,
			JobConfig {
				enabled: true,
				interval: HOUR,
				max_retries: 3,
				retry_delay: MINUTE,
				timeout: 30 * MINUTE,
				run_on_startup: false,
			},
		),
		(
			JobName::REQUEST_STATUS_SYNC,
			JobConfig {
				enabled: true,
				interval: 10 * MINUTE,
				max_retries: 3,
				retry_delay: Duration::from_secs(30),
				timeout: 5 * MINUTE,
				run_on_startup: true,
			},
		),
		(
			JobName::NOTIFICATION_CLEANUP,
			JobConfig {
				enabled: true,
				interval: DAY,
				max_retries: 1,
				retry_delay: 5 * MINUTE,
				timeout: 10 * MINUTE,
				run_on_startup: false,
			},
		),
		(
			JobName::INVITATION_CLEANUP,
			JobConfig {
				enabled: true,
				interval: DAY,
				max_retries: 1,
				retry_delay: 5 * MINUTE,
				timeout: 10 * MINUTE,
				run_on_startup: false,
			},
		),
	]
}

/// Default config for `name`. Unknown names get a disabled config.
pub fn default_config(name: &JobName) -> JobConfig {
	defaults_table()
		.into_iter()
		.find(|(known, _)| known == name)
		.map(|(_, config)| config)
		.unwrap_or_else(|| JobConfig::default().enabled(false))
}

pub fn all_job_names() -> Vec<JobName> {
	JobName::ALL.to_vec()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_every_known_job_has_a_valid_default() {
		for name in all_job_names() {
			let config = default_config(&name);
			assert!(config.enabled, "{name} should be enabled by default");
			assert!(config.validate().is_ok(), "{name} default is invalid");
		}
	}

	#[test]
	fn test_table_covers_all_names() {
		let table: Vec<_> = defaults_table().into_iter().map(|(name, _)| name).collect();
		assert_eq!(table, all_job_names());
	}

	#[test]
	fn test_unknown_job_is_disabled() {
		let config = default_config(&JobName::new("nightly-backup"));
		assert!(!config.enabled);
	}

	#[test]
	fn test_drive_monitor_runs_on_startup() {
		let config = default_config(&JobName::DRIVE_MONITOR);
		assert!(config.run_on_startup);
		assert_eq!(config.interval, Duration::from_secs(300));
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Jobs configuration section.
//!
//! ```toml
//! [jobs]
//! shutdown_timeout_secs = 30
//!
//! [jobs.library-sync]
//! interval_secs = 1800
//! run_on_startup = true
//! ```

use marquee_server_jobs::{all_job_names, default_config, JobConfig, JobFactory, JobName};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Partial override of one job's [`JobConfig`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct JobOverrideLayer {
	pub enabled: Option<bool>,
	pub interval_secs: Option<u64>,
	pub max_retries: Option<u32>,
	pub retry_delay_secs: Option<u64>,
	pub timeout_secs: Option<u64>,
	pub run_on_startup: Option<bool>,
}

impl JobOverrideLayer {
	pub fn merge(&mut self, other: Self) {
		if other.enabled.is_some() {
			self.enabled = other.enabled;
		}
		if other.interval_secs.is_some() {
			self.interval_secs = other.interval_secs;
		}
		if other.max_retries.is_some() {
			self.max_retries = other.max_retries;
		}
		if other.retry_delay_secs.is_some() {
			self.retry_delay_secs = other.retry_delay_secs;
		}
		if other.timeout_secs.is_some() {
			self.timeout_secs = other.timeout_secs;
		}
		if other.run_on_startup.is_some() {
			self.run_on_startup = other.run_on_startup;
		}
	}

	pub fn is_empty(&self) -> bool {
		*self == Self::default()
	}

	pub fn apply(&self, mut config: JobConfig) -> JobConfig {
		if let Some(enabled) = self.enabled {
			config.enabled = enabled;
		}
		if let Some(secs) = self.interval_secs {
			config.interval = Duration::from_secs(secs);
		}
		if let Some(max_retries) = self.max_retries {
			config.max_retries = max_retries;
		}
		if let Some(secs) = self.retry_delay_secs {
			config.retry_delay = Duration::from_secs(secs);
		}
		if let Some(secs) = self.timeout_secs {
			config.timeout = Duration::from_secs(secs);
		}
		if let Some(run_on_startup) = self.run_on_startup {
			config.run_on_startup = run_on_startup;
		}
		config
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct JobsConfigLayer {
	pub shutdown_timeout_secs: Option<u64>,
	/// Keyed by job name, one `[jobs.<name>]` table each.
	#[serde(flatten)]
	pub overrides: HashMap<String, JobOverrideLayer>,
}

impl JobsConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.shutdown_timeout_secs.is_some() {
			self.shutdown_timeout_secs = other.shutdown_timeout_secs;
		}
		for (name, layer) in other.overrides {
			self.overrides.entry(name).or_default().merge(layer);
		}
	}

	pub fn finalize(self) -> JobsConfig {
		let mut jobs: BTreeMap<JobName, JobConfig> = all_job_names()
			.into_iter()
			.map(|name| {
				let config = default_config(&name);
				(name, config)
			})
			.collect();

		for (name, layer) in self.overrides {
			let name = JobName::new(name);
			let base = jobs
				.remove(&name)
				.unwrap_or_else(|| default_config(&name));
			jobs.insert(name, layer.apply(base));
		}

		JobsConfig {
			shutdown_timeout_secs: self
				.shutdown_timeout_secs
				.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
			jobs,
		}
	}
}

/// Resolved job settings: the built-in table with every override applied.
#[derive(Debug, Clone, PartialEq)]
pub struct JobsConfig {
	pub shutdown_timeout_secs: u64,
	pub jobs: BTreeMap<JobName, JobConfig>,
}

impl Default for JobsConfig {
	fn default() -> Self {
		JobsConfigLayer::default().finalize()
	}
}

impl JobsConfig {
	pub fn shutdown_timeout(&self) -> Duration {
		Duration::from_secs(self.shutdown_timeout_secs)
	}

	pub fn job_config(&self, name: &JobName) -> JobConfig {
		self.jobs
			.get(name)
			.cloned()
			.unwrap_or_else(|| default_config(name))
	}

	/// Hand every resolved config to `factory` so built jobs start from it.
	pub fn apply_to(&self, factory: &mut JobFactory) {
		for (name, config) in &self.jobs {
			factory.with_config(name.clone(), config.clone());
		}
	}
}

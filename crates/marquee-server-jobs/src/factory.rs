// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Name → constructor lookup used by [`Manager::register_all`](crate::Manager::register_all).

use crate::defaults::default_config;
use crate::error::{JobError, Result};
use crate::job::Job;
use crate::types::{JobConfig, JobName};
use std::collections::HashMap;
use std::sync::Arc;

pub type JobConstructor = Box<dyn Fn(JobConfig) -> Result<Arc<dyn Job>> + Send + Sync>;

#[derive(Default)]
pub struct JobFactory {
	constructors: HashMap<JobName, JobConstructor>,
	configs: HashMap<JobName, JobConfig>,
}

impl JobFactory {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register<F>(&mut self, name: JobName, constructor: F) -> &mut Self
	where
		F: Fn(JobConfig) -> Result<Arc<dyn Job>> + Send + Sync + 'static,
	{
		self.constructors.insert(name, Box::new(constructor));
		self
	}

	/// Config handed to the constructor instead of the built-in default.
	pub fn with_config(&mut self, name: JobName, config: JobConfig) -> &mut Self {
		self.configs.insert(name, config);
		self
	}

	pub fn contains(&self, name: &JobName) -> bool {
		self.constructors.contains_key(name)
	}

	pub fn names(&self) -> Vec<JobName> {
		let mut names: Vec<_> = self.constructors.keys().cloned().collect();
		names.sort();
		names
	}

	pub fn config_for(&self, name: &JobName) -> JobConfig {
		self.configs
			.get(name)
			.cloned()
			.unwrap_or_else(|| default_config(name))
	}

	pub fn build(&self, name: &JobName) -> Result<Arc<dyn Job>> {
		let constructor = self
			.constructors
			.get(name)
			.ok_or_else(|| JobError::UnknownJob(name.clone()))?;
		constructor(self.config_for(name))
	}
}

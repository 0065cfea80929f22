// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: built-in defaults, a TOML file and environment variables.

use std::collections::HashMap;
use std::path::PathBuf;

use marquee_server_jobs::{all_job_names, JobName};
use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{JobOverrideLayer, JobsConfigLayer, LoggingConfigLayer};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		Ok(ServerConfigLayer::default())
	}
}

/// TOML file source. A missing file contributes nothing.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/marquee/server.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ServerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: `MARQUEE_SERVER_<SECTION>_<FIELD>`, and
/// `MARQUEE_SERVER_JOB_<NAME>_<FIELD>` for per-job overrides.
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(ServerConfigLayer {
			jobs: Some(load_jobs_from_env()?),
			logging: Some(load_logging_from_env()),
		})
	}
}

/// Prefix of the per-job variables, e.g. `MARQUEE_SERVER_JOB_LIBRARY_SYNC`.
pub fn job_env_prefix(name: &JobName) -> String {
	format!(
		"MARQUEE_SERVER_JOB_{}",
		name.as_str().to_ascii_uppercase().replace('-', "_")
	)
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_bool(name: &str) -> Option<bool> {
	env_var(name).map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

fn env_u32(name: &str) -> Result<Option<u32>, ConfigError> {
	match env_var(name) {
		Some(v) => v
			.parse()
			.map(Some)
			.map_err(|_| ConfigError::invalid_value(name, format!("invalid u32 value '{v}'"))),
		None => Ok(None),
	}
}

fn env_u64(name: &str) -> Result<Option<u64>, ConfigError> {
	match env_var(name) {
		Some(v) => v
			.parse()
			.map(Some)
			.map_err(|_| ConfigError::invalid_value(name, format!("invalid u64 value '{v}'"))),
		None => Ok(None),
	}
}

fn load_jobs_from_env() -> Result<JobsConfigLayer, ConfigError> {
	let mut overrides = HashMap::new();
	for name in all_job_names() {
		let layer = load_job_override_from_env(&job_env_prefix(&name))?;
		if !layer.is_empty() {
			trace!(job = %name, "job override from environment");
			overrides.insert(name.to_string(), layer);
		}
	}

	Ok(JobsConfigLayer {
		shutdown_timeout_secs: env_u64("MARQUEE_SERVER_JOBS_SHUTDOWN_TIMEOUT_SECS")?,
		overrides,
	})
}

fn load_job_override_from_env(prefix: &str) -> Result<JobOverrideLayer, ConfigError> {
	Ok(JobOverrideLayer {
		enabled: env_bool(&format!("{prefix}_ENABLED")),
		interval_secs: env_u64(&format!("{prefix}_INTERVAL_SECS"))?,
		max_retries: env_u32(&format!("{prefix}_MAX_RETRIES"))?,
		retry_delay_secs: env_u64(&format!("{prefix}_RETRY_DELAY_SECS"))?,
		timeout_secs: env_u64(&format!("{prefix}_TIMEOUT_SECS"))?,
		run_on_startup: env_bool(&format!("{prefix}_RUN_ON_STARTUP")),
	})
}

fn load_logging_from_env() -> LoggingConfigLayer {
	LoggingConfigLayer {
		level: env_var("MARQUEE_SERVER_LOGGING_LEVEL"),
	}
}

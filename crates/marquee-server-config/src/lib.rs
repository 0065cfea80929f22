// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Layered configuration for Marquee server.
//!
//! Sources, lowest precedence first: built-in defaults, a TOML file
//! (`/etc/marquee/server.toml`), then `MARQUEE_SERVER_*` environment variables.
//!
//! # Usage
//!
//! ```ignore
//! use marquee_server_config::load_config;
//!
//! let config = load_config()?;
//! let manager = Manager::with_shutdown_timeout(config.jobs.shutdown_timeout());
//! config.jobs.apply_to(&mut factory);
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{job_env_prefix, ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerConfig {
	pub jobs: JobsConfig,
	pub logging: LoggingConfig,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`MARQUEE_SERVER_*`)
/// 2. Config file (`/etc/marquee/server.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_config_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration from environment only.
pub fn load_config_from_env() -> Result<ServerConfig, ConfigError> {
	load_config_from_sources(vec![Box::new(DefaultsSource), Box::new(EnvSource)])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ServerConfig, ConfigError> {
	load_config_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

/// Merge `sources` in precedence order and resolve the result.
pub fn load_config_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let jobs = layer.jobs.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();

	validate_config(&jobs, &logging)?;

	info!(
		shutdown_timeout_secs = jobs.shutdown_timeout_secs,
		jobs = jobs.jobs.len(),
		enabled_jobs = jobs.jobs.values().filter(|c| c.enabled).count(),
		log_level = %logging.level,
		"Server configuration loaded"
	);

	Ok(ServerConfig { jobs, logging })
}

fn validate_config(jobs: &JobsConfig, logging: &LoggingConfig) -> Result<(), ConfigError> {
	for (name, config) in &jobs.jobs {
		config
			.validate()
			.map_err(|message| ConfigError::validation(format!("job '{name}': {message}")))?;
	}

	if !logging.is_valid_level() {
		return Err(ConfigError::validation(format!(
			"unknown log level '{}', expected one of {}",
			logging.level,
			LOG_LEVELS.join(", ")
		)));
	}

	Ok(())
}

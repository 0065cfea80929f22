// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};

pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfigLayer {
	pub level: Option<String>,
}

impl LoggingConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.level.is_some() {
			self.level = other.level;
		}
	}

	pub fn finalize(self) -> LoggingConfig {
		LoggingConfig {
			level: self
				.level
				.map(|level| level.to_ascii_lowercase())
				.unwrap_or_else(|| "info".to_string()),
		}
	}
}

/// Log level for the embedding application's subscriber.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
	pub level: String,
}

impl Default for LoggingConfig {
	fn default() -> Self {
		LoggingConfigLayer::default().finalize()
	}
}

impl LoggingConfig {
	pub fn is_valid_level(&self) -> bool {
		LOG_LEVELS.contains(&self.level.as_str())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_level_is_info() {
		assert_eq!(LoggingConfig::default().level, "info");
	}

	#[test]
	fn test_level_is_lowercased() {
		let config = LoggingConfigLayer {
			level: Some("WARN".to_string()),
		}
		.finalize();
		assert_eq!(config.level, "warn");
		assert!(config.is_valid_level());
	}

	#[test]
	fn test_unknown_level_is_invalid() {
		let config = LoggingConfigLayer {
			level: Some("verbose".to_string()),
		}
		.finalize();
		assert!(!config.is_valid_level());
	}
}

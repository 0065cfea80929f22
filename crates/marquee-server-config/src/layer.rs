// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};

use crate::sections::{JobsConfigLayer, LoggingConfigLayer};

/// One source's view of the configuration; unset sections defer to lower layers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServerConfigLayer {
	pub jobs: Option<JobsConfigLayer>,
	pub logging: Option<LoggingConfigLayer>,
}

impl ServerConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if let Some(jobs) = other.jobs {
			self.jobs.get_or_insert_with(Default::default).merge(jobs);
		}
		if let Some(logging) = other.logging {
			self.logging
				.get_or_insert_with(Default::default)
				.merge(logging);
		}
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::types::{JobName, TriggerSource};
pub use tokio_util::sync::CancellationToken;

/// Per-invocation context handed to every [`Job`](crate::Job) call.
#[derive(Debug, Clone)]
pub struct JobContext {
	pub run_id: String,
	pub job_name: JobName,
	pub triggered_by: TriggerSource,
	/// Zero for the first attempt of an attempt sequence.
	pub attempt: u32,
	pub cancellation_token: CancellationToken,
}

impl JobContext {
	pub fn new(
		job_name: JobName,
		triggered_by: TriggerSource,
		cancellation_token: CancellationToken,
	) -> Self {
		Self {
			run_id: uuid::Uuid::new_v4().to_string(),
			job_name,
			triggered_by,
			attempt: 0,
			cancellation_token,
		}
	}

	/// Same run, next attempt. Attempts after the first are marked as retries.
	pub fn for_attempt(&self, attempt: u32) -> Self {
		Self {
			attempt,
			triggered_by: if attempt > 0 {
				TriggerSource::Retry
			} else {
				self.triggered_by
			},
			..self.clone()
		}
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancellation_token.is_cancelled()
	}
}

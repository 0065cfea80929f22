// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::base::BaseJob;
use crate::context::JobContext;
use crate::error::{JobError, Result};
use crate::types::{JobConfig, JobMetrics, JobName, JobStatus};
use async_trait::async_trait;
use std::time::Duration;

/// A recurring unit of work driven by the [`Manager`](crate::Manager).
///
/// Implementors embed a [`BaseJob`] and provide `trigger`; every other method
/// defaults to the base bookkeeping. Retry and timeout policy belong to the
/// manager, so `trigger` performs exactly one attempt.
#[async_trait]
pub trait Job: Send + Sync {
	fn base(&self) -> &BaseJob;

	async fn trigger(&self, ctx: &JobContext) -> Result<()>;

	fn description(&self) -> &str {
		""
	}

	fn name(&self) -> JobName {
		self.base().name().clone()
	}

	async fn start(&self, ctx: &JobContext) -> Result<()> {
		self.base().start(ctx)
	}

	async fn stop(&self, ctx: &JobContext) -> Result<()> {
		self.base().stop(ctx)
	}

	fn config(&self) -> JobConfig {
		self.base().config()
	}

	fn set_config(&self, config: JobConfig) -> Result<()> {
		self.base().set_config(config)
	}

	fn status(&self) -> JobStatus {
		self.base().status()
	}

	fn metrics(&self) -> JobMetrics {
		self.base().metrics()
	}

	fn health(&self) -> Result<()> {
		self.base().health()
	}

	fn on_success(&self, ctx: &JobContext, duration: Duration) {
		self.base().on_success(ctx, duration)
	}

	fn on_error(&self, ctx: &JobContext, error: &JobError) {
		self.base().on_error(ctx, error)
	}
}

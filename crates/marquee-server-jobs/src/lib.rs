// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Background job manager for Marquee server.
//!
//! Runs every registered job on its own fixed interval with per-attempt
//! timeouts, bounded retries, live metrics and a draining shutdown.

pub mod base;
pub mod context;
pub mod defaults;
pub mod error;
pub mod factory;
pub mod health;
pub mod job;
pub mod manager;
pub mod types;

pub use base::{AtomicJobStatus, BaseJob};
pub use context::{CancellationToken, JobContext};
pub use defaults::{all_job_names, default_config};
pub use error::{JobError, Result};
pub use factory::{JobConstructor, JobFactory};
pub use health::{HealthState, JobHealthStatus, JobsHealthStatus};
pub use job::Job;
pub use manager::{Manager, DEFAULT_SHUTDOWN_TIMEOUT};
pub use types::{JobConfig, JobMetrics, JobName, JobStatus, TriggerSource};

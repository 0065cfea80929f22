// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections.

mod jobs;
mod logging;

pub use jobs::{JobOverrideLayer, JobsConfig, JobsConfigLayer};
pub use logging::{LoggingConfig, LoggingConfigLayer, LOG_LEVELS};

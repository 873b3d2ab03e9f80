// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;

use crate::context::JobContext;
use crate::error::JobError;

/// A unit of work fired by the scheduler on every matching cron tick.
///
/// The scheduler awaits `run` before computing the job's next tick, so a job is never
/// re-fired while a previous invocation is still pending.
#[async_trait]
pub trait Job: Send + Sync {
	/// Human-readable name used in logs.
	fn name(&self) -> &str;

	async fn run(&self, ctx: &JobContext) -> Result<(), JobError>;
}

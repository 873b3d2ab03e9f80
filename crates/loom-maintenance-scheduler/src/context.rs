// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};

use crate::scheduler::JobHandle;

/// Per-invocation context handed to [`Job::run`](crate::Job::run).
#[derive(Debug, Clone)]
pub struct JobContext {
	pub run_id: String,
	pub fired_at: DateTime<Utc>,
	pub trigger: TriggerSource,
	pub handle: JobHandle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
	Schedule,
	Manual,
}

impl JobContext {
	pub(crate) fn new(handle: JobHandle, trigger: TriggerSource) -> Self {
		Self {
			run_id: uuid::Uuid::new_v4().to_string(),
			fired_at: handle.now(),
			trigger,
			handle,
		}
	}
}

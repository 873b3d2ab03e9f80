// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for scheduler operations.

use thiserror::Error;

/// Result type for scheduler operations.
pub type Result<T> = std::result::Result<T, SchedulerError>;

/// Errors that can occur while registering or driving scheduled jobs.
#[derive(Debug, Error)]
pub enum SchedulerError {
	#[error("invalid cron expression '{expression}': {reason}")]
	InvalidCronExpression { expression: String, reason: String },

	#[error("invalid timezone: {0}")]
	InvalidTimezone(String),

	#[error("job already registered: {0}")]
	DuplicateJob(String),

	#[error("job not found: {0}")]
	NotFound(String),

	#[error("scheduler already started")]
	AlreadyStarted,

	#[error("job failed: {0}")]
	Job(#[from] JobError),
}

/// Failure reported by a job body.
#[derive(Debug, Error)]
pub enum JobError {
	#[error("job panicked: {0}")]
	Panicked(String),

	#[error("job cancelled")]
	Cancelled,
}


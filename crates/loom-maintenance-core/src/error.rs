// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for maintenance window construction and metrics.

use loom_maintenance_scheduler::SchedulerError;
use thiserror::Error;

/// Result type for maintenance window operations.
pub type Result<T> = std::result::Result<T, MaintenanceError>;

/// Errors that can occur while constructing a window or exposing its gauge.
#[derive(Debug, Error)]
pub enum MaintenanceError {
	#[error("invalid duration '{value}': {reason}")]
	InvalidDuration { value: String, reason: String },

	#[error("invalid label name '{0}'")]
	InvalidLabelName(String),

	#[error("metric already registered: {0}")]
	DuplicateMetric(String),

	#[error("scheduling error: {0}")]
	Scheduling(#[from] SchedulerError),

	#[error("metrics error: {0}")]
	Metrics(#[from] prometheus::Error),

	#[error("metrics encoding error: {0}")]
	Encoding(#[from] std::string::FromUtf8Error),
}

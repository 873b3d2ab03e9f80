// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for Loom maintenance windows.
//!
//! A maintenance window is a recurring period, triggered by a cron expression and lasting
//! a fixed duration, during which the `maintenance_active` gauge for that window reads `1`.
//! Alerting pipelines use the gauge to suppress alerts while declared maintenance is in
//! effect.
//!
//! - [`MaintenanceWindow`]: the entity, constructed once per configured window
//! - [`LabelSet`] / [`MetricIdentity`]: label handling and gauge naming
//! - [`MetricRegistry`]: pull gauges read on every scrape

pub mod duration;
pub mod error;
pub mod labels;
pub mod metrics;
pub mod window;

pub use duration::parse_duration;
pub use error::{MaintenanceError, Result};
pub use labels::{
	is_valid_label_name, render_metric_identity, LabelSet, MetricIdentity, METRIC_NAME, NAME_LABEL,
};
pub use metrics::MetricRegistry;
pub use window::{ActiveGuard, MaintenanceWindow, WindowState, WindowTask};

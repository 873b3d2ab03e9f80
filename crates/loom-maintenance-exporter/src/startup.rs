// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Construction of the configured windows and the startup report.

use chrono_tz::Tz;
use loom_maintenance_config::MaintenanceConfig;
use loom_maintenance_core::{MaintenanceError, MaintenanceWindow, MetricRegistry};
use loom_maintenance_scheduler::{display_time, CronScheduler};
use tracing::{error, info};

const SEPARATOR: &str = "-----------------------------------------------";

/// A configured window that could not be constructed.
#[derive(Debug)]
pub struct WindowFailure {
	pub name: String,
	pub error: MaintenanceError,
}

/// Outcome of constructing every configured window.
#[derive(Debug, Default)]
pub struct Windows {
	pub loaded: Vec<MaintenanceWindow>,
	pub failed: Vec<WindowFailure>,
}

/// Construct one window per configured entry, in file order.
///
/// A malformed entry is logged and skipped; it never prevents the others from being
/// scheduled.
pub fn build_windows(
	config: &MaintenanceConfig,
	scheduler: &mut CronScheduler,
	registry: &MetricRegistry,
) -> Windows {
	let mut windows = Windows::default();

	for entry in &config.windows {
		match MaintenanceWindow::new(
			scheduler,
			registry,
			&entry.cron,
			&entry.duration,
			&entry.name,
			entry.labels.clone(),
		) {
			Ok(window) => {
				info!(window = %entry.name, "Loaded: {window}");
				windows.loaded.push(window);
			}
			Err(e) => {
				error!(window = %entry.name, error = %e, "Failed to parse maintenance window, skipping");
				windows.failed.push(WindowFailure {
					name: entry.name.clone(),
					error: e,
				});
			}
		}
	}

	windows
}

/// One `"name" Nextrun: <time>` line per window, times rendered in `timezone`.
pub fn next_run_report(windows: &[MaintenanceWindow], timezone: Tz) -> Vec<String> {
	windows
		.iter()
		.map(|window| {
			let next_run = window
				.next_run()
				.map(|at| display_time(at, timezone))
				.unwrap_or_else(|| "never".to_string());
			format!("\"{}\" Nextrun: {next_run}", window.name())
		})
		.collect()
}

/// Log the next run of every window between separator lines.
pub fn report_next_runs(windows: &[MaintenanceWindow], timezone: Tz) {
	info!("{SEPARATOR}");
	for line in next_run_report(windows, timezone) {
		info!("{line}");
	}
	info!("{SEPARATOR}");
}

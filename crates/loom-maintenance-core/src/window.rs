// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The maintenance window entity and its scheduled open/close task.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use loom_maintenance_scheduler::{CronScheduler, Job, JobContext, JobError, JobHandle};
use tracing::{debug, info, warn};

use crate::duration::parse_duration;
use crate::error::Result;
use crate::labels::{LabelSet, MetricIdentity, METRIC_NAME};
use crate::metrics::MetricRegistry;

const METRIC_HELP: &str = "Whether the maintenance window is currently active (1) or not (0)";

/// The only mutable runtime state of a window.
#[derive(Debug, Default)]
pub struct WindowState {
	active: AtomicBool,
}

impl WindowState {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn is_active(&self) -> bool {
		self.active.load(Ordering::Acquire)
	}

	pub fn gauge_value(&self) -> f64 {
		if self.is_active() {
			1.0
		} else {
			0.0
		}
	}

	/// Mark the window active until the returned guard is dropped.
	pub fn activate(self: &Arc<Self>) -> ActiveGuard {
		self.active.store(true, Ordering::Release);
		ActiveGuard {
			state: Arc::clone(self),
		}
	}
}

/// Resets the window to inactive on drop, including when the task is aborted or panics.
#[must_use = "the window closes as soon as the guard is dropped"]
pub struct ActiveGuard {
	state: Arc<WindowState>,
}

impl Drop for ActiveGuard {
	fn drop(&mut self) {
		self.state.active.store(false, Ordering::Release);
	}
}

/// Job fired on every cron match: open, wait for the duration, close.
pub struct WindowTask {
	name: String,
	duration: Duration,
	state: Arc<WindowState>,
}

#[async_trait]
impl Job for WindowTask {
	fn name(&self) -> &str {
		&self.name
	}

	async fn run(&self, ctx: &JobContext) -> std::result::Result<(), JobError> {
		let schedule = ctx.handle.schedule();
		let guard = self.state.activate();

		let closes_at = closing_time(ctx.fired_at, self.duration)
			.map(|at| schedule.display(at))
			.unwrap_or_else(|| "never".to_string());
		info!(
			window = %self.name,
			run_id = %ctx.run_id,
			trigger = ?ctx.trigger,
			fired_at = %schedule.display(ctx.fired_at),
			closes_at = %closes_at,
			"Maintenance window open"
		);

		tokio::time::sleep(self.duration).await;
		drop(guard);

		match ctx.handle.next_run() {
			Some(next) => info!(
				window = %self.name,
				run_id = %ctx.run_id,
				next_run = %schedule.display(next),
				"Maintenance window closed"
			),
			None => info!(
				window = %self.name,
				run_id = %ctx.run_id,
				"Maintenance window closed, no further runs scheduled"
			),
		}
		Ok(())
	}
}

fn closing_time(opened_at: DateTime<Utc>, duration: Duration) -> Option<DateTime<Utc>> {
	TimeDelta::from_std(duration)
		.ok()
		.and_then(|delta| opened_at.checked_add_signed(delta))
}

/// A declared recurring interval during which its `maintenance_active` gauge reads 1.
#[derive(Clone)]
pub struct MaintenanceWindow {
	name: String,
	labels: LabelSet,
	cron_expression: String,
	duration: Duration,
	identity: MetricIdentity,
	state: Arc<WindowState>,
	job: JobHandle,
}

impl MaintenanceWindow {
	/// Validate a window definition, then register its gauge and its scheduled job.
	///
	/// Nothing is registered unless every input is valid. If the scheduler refuses the
	/// job after the gauge was registered, the gauge is removed again.
	pub fn new(
		scheduler: &mut CronScheduler,
		registry: &MetricRegistry,
		cron_expression: &str,
		duration: &str,
		name: &str,
		labels: impl Into<LabelSet>,
	) -> Result<Self> {
		let duration = parse_duration(duration)?;

		let mut labels = labels.into();
		if let Some(previous) = labels.inject_name(name) {
			if previous != name {
				warn!(
					window = %name,
					overwritten = %previous,
					"Configured 'name' label replaced by the window name"
				);
			}
		}
		labels.validate()?;

		let identity = MetricIdentity::new(METRIC_NAME, &labels);
		let schedule = scheduler.parse(cron_expression)?;

		let state = Arc::new(WindowState::new());
		let reader = Arc::clone(&state);
		registry.register_gauge(&identity, METRIC_HELP, &labels, move || reader.gauge_value())?;

		let task = Arc::new(WindowTask {
			name: name.to_string(),
			duration,
			state: Arc::clone(&state),
		});
		let job = match scheduler.register_schedule(identity.to_string(), schedule, task) {
			Ok(job) => job,
			Err(e) => {
				registry.unregister_gauge(&identity);
				return Err(e.into());
			}
		};

		debug!(window = %name, metric = %identity, "Maintenance window constructed");

		Ok(Self {
			name: name.to_string(),
			labels,
			cron_expression: cron_expression.to_string(),
			duration,
			identity,
			state,
			job,
		})
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn labels(&self) -> &LabelSet {
		&self.labels
	}

	pub fn cron_expression(&self) -> &str {
		&self.cron_expression
	}

	pub fn duration(&self) -> Duration {
		self.duration
	}

	pub fn identity(&self) -> &MetricIdentity {
		&self.identity
	}

	pub fn is_active(&self) -> bool {
		self.state.is_active()
	}

	pub fn gauge_value(&self) -> f64 {
		self.state.gauge_value()
	}

	pub fn job(&self) -> &JobHandle {
		&self.job
	}

	pub fn next_run(&self) -> Option<DateTime<Utc>> {
		self.job.next_run()
	}
}

impl fmt::Display for MaintenanceWindow {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let labels = self
			.labels
			.iter()
			.map(|(k, v)| format!("{k}:\"{v}\""))
			.collect::<Vec<_>>()
			.join(",");
		write!(f, "\"{}\"({}) - {{{labels}}}", self.name, self.cron_expression)
	}
}

impl fmt::Debug for MaintenanceWindow {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("MaintenanceWindow")
			.field("name", &self.name)
			.field("identity", &self.identity.as_str())
			.field("cron_expression", &self.cron_expression)
			.field("duration", &self.duration)
			.field("active", &self.is_active())
			.finish()
	}
}

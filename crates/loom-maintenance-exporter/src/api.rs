// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use loom_maintenance_core::{MaintenanceWindow, MetricRegistry};

use crate::routes::{health, metrics};

/// Shared state for the HTTP handlers. Read-only once the server is running.
#[derive(Clone)]
pub struct AppState {
	pub registry: Arc<MetricRegistry>,
	pub windows: Arc<[MaintenanceWindow]>,
}

impl AppState {
	pub fn new(registry: Arc<MetricRegistry>, windows: Vec<MaintenanceWindow>) -> Self {
		Self {
			registry,
			windows: windows.into(),
		}
	}
}

pub fn create_router(state: AppState) -> Router {
	Router::new()
		.route("/metrics", get(metrics::prometheus_metrics))
		.route("/health", get(health::health_check))
		.with_state(state)
}

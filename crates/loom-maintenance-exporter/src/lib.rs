// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Loom maintenance window exporter.
//!
//! Builds one [`MaintenanceWindow`](loom_maintenance_core::MaintenanceWindow) per configured
//! entry, drives them from a cron scheduler and serves their `maintenance_active` gauges on
//! `GET /metrics`.

pub mod api;
pub mod error;
pub mod logging;
pub mod routes;
pub mod startup;

pub use api::{create_router, AppState};
pub use error::ServerError;
pub use logging::{init_tracing, with_bootstrap_logging};
pub use startup::{build_windows, next_run_report, report_next_runs, WindowFailure, Windows};

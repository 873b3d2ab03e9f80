// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Loom maintenance window exporter binary.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use loom_maintenance_config::MaintenanceConfig;
use loom_maintenance_core::MetricRegistry;
use loom_maintenance_exporter::{
	build_windows, create_router, init_tracing, next_run_report, report_next_runs,
	with_bootstrap_logging, AppState,
};
use loom_maintenance_scheduler::CronScheduler;
use tower_http::trace::TraceLayer;

/// Exposes declared maintenance windows as the `maintenance_active` gauge.
#[derive(Parser, Debug)]
#[command(
	name = "loom-maintenance-exporter",
	about = "Prometheus exporter for maintenance windows",
	version
)]
struct Args {
	/// Path to the TOML config file. Searched in the standard locations when omitted.
	#[arg(short, long, env = "LOOM_MAINTENANCE_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Validate every configured window and print its next run, then exit
	Check,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	let config =
		with_bootstrap_logging(|| loom_maintenance_config::load_config(args.config.as_deref()))?;
	init_tracing(&config.exporter);

	if let Some(Command::Check) = args.command {
		if !check(&config) {
			std::process::exit(1);
		}
		return Ok(());
	}

	tracing::info!(
		addr = %config.exporter.addr,
		timezone = %config.exporter.timezone.name(),
		execution = ?config.exporter.execution,
		windows = config.windows.len(),
		"starting loom-maintenance-exporter"
	);

	let registry = Arc::new(MetricRegistry::new());
	if config.exporter.expose_process_metrics {
		registry.register_process_collector()?;
	}

	let mut scheduler = CronScheduler::new(config.exporter.timezone, config.exporter.execution);
	let windows = build_windows(&config, &mut scheduler, &registry);
	if !windows.failed.is_empty() {
		tracing::warn!(
			skipped = windows.failed.len(),
			loaded = windows.loaded.len(),
			"Some maintenance windows were skipped"
		);
	}

	tracing::info!("Starting the scheduler...");
	let scheduler = Arc::new(scheduler);
	scheduler.start().await?;
	report_next_runs(&windows.loaded, config.exporter.timezone);

	let state = AppState::new(Arc::clone(&registry), windows.loaded);
	let app = create_router(state).layer(TraceLayer::new_for_http());

	let addr = config.exporter.socket_addr();
	tracing::info!("Start serving metrics on {}/metrics", config.exporter.addr);

	let listener = tokio::net::TcpListener::bind(&addr).await?;

	tokio::select! {
		result = axum::serve(listener, app) => {
			if let Err(e) = result {
				tracing::error!(error = %e, "Server error");
			}
		}
		_ = tokio::signal::ctrl_c() => {
			tracing::info!("Received shutdown signal");
		}
	}

	tracing::info!("Shutting down the scheduler...");
	scheduler.shutdown().await;

	tracing::info!("Exporter shutdown complete");
	Ok(())
}

/// Construct every window against a scratch scheduler and registry. Returns whether all
/// of them are valid.
fn check(config: &MaintenanceConfig) -> bool {
	let mut scheduler = CronScheduler::new(config.exporter.timezone, config.exporter.execution);
	let registry = MetricRegistry::new();
	let windows = build_windows(config, &mut scheduler, &registry);

	for line in next_run_report(&windows.loaded, config.exporter.timezone) {
		println!("ok     {line}");
	}
	for failure in &windows.failed {
		println!("failed \"{}\": {}", failure.name, failure.error);
	}

	windows.failed.is_empty()
}

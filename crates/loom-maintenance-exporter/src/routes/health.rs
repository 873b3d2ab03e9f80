// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use axum::{extract::State, response::IntoResponse, Json};
use serde::Serialize;

use crate::api::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
	Healthy,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
	pub status: HealthStatus,
	pub timestamp: String,
	pub windows_loaded: usize,
	pub windows_active: usize,
}

/// GET /health - Liveness plus a summary of the loaded windows.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
	let windows_active = state.windows.iter().filter(|w| w.is_active()).count();

	Json(HealthResponse {
		status: HealthStatus::Healthy,
		timestamp: chrono::Utc::now().to_rfc3339(),
		windows_loaded: state.windows.len(),
		windows_active,
	})
}

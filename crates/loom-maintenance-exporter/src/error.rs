// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use loom_maintenance_core::MaintenanceError;

/// Failures surfaced by HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
	#[error("failed to gather metrics: {0}")]
	Metrics(#[from] MaintenanceError),
}

impl IntoResponse for ServerError {
	fn into_response(self) -> Response {
		let body = Json(serde_json::json!({ "error": self.to_string() }));
		(StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
	}
}

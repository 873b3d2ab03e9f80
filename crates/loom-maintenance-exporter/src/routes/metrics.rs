// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use axum::{extract::State, http::StatusCode, response::IntoResponse};

use crate::{api::AppState, error::ServerError};

/// GET /metrics - Prometheus metrics export endpoint.
///
/// Every window gauge is read at request time, so the body reflects the window states as
/// they are while the request is served.
pub async fn prometheus_metrics(
	State(state): State<AppState>,
) -> Result<impl IntoResponse, ServerError> {
	tracing::debug!("prometheus_metrics: gathering metrics");
	let metrics = state.registry.encode().inspect_err(|e| {
		tracing::error!(error = %e, "prometheus_metrics: failed to gather metrics");
	})?;

	Ok((
		StatusCode::OK,
		[(
			axum::http::header::CONTENT_TYPE,
			"text/plain; version=0.0.4; charset=utf-8",
		)],
		metrics,
	))
}

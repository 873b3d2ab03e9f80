// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod exporter;
mod windows;

pub use exporter::{ExporterConfig, ExporterConfigLayer, LogFormat, DEFAULT_ADDR, DEFAULT_TIMEZONE};
pub use windows::WindowConfig;

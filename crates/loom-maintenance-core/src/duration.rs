// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::time::Duration;

use crate::error::{MaintenanceError, Result};

/// Parse a human-readable duration such as `30m`, `2h` or `1h 30m`.
///
/// Negative durations are not part of the grammar and are rejected.
pub fn parse_duration(value: &str) -> Result<Duration> {
	humantime::parse_duration(value.trim()).map_err(|e| MaintenanceError::InvalidDuration {
		value: value.to_string(),
		reason: e.to_string(),
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_common_durations() {
		assert_eq!(parse_duration("30m").unwrap(), Duration::from_secs(30 * 60));
		assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(2 * 60 * 60));
		assert_eq!(parse_duration("1h 30m").unwrap(), Duration::from_secs(90 * 60));
		assert_eq!(parse_duration("45s").unwrap(), Duration::from_secs(45));
		assert_eq!(parse_duration(" 10m ").unwrap(), Duration::from_secs(600));
	}

	#[test]
	fn test_parse_zero_duration() {
		assert_eq!(parse_duration("0s").unwrap(), Duration::ZERO);
	}

	#[test]
	fn test_parse_invalid_durations() {
		for value in ["notaduration", "", "-5m", "30", "m"] {
			match parse_duration(value) {
				Err(MaintenanceError::InvalidDuration { value: v, .. }) => assert_eq!(v, value),
				other => panic!("Expected InvalidDuration for {value:?}, got: {:?}", other),
			}
		}
	}
}

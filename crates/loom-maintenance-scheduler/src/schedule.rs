// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Cron expression parsing and next run calculation.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;

use crate::error::{Result, SchedulerError};

/// Format used for human-readable timestamps in logs and reports.
pub const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const DAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// A validated 5-field cron expression bound to the timezone it is evaluated in.
#[derive(Clone)]
pub struct CronSchedule {
	expression: String,
	schedules: Vec<Schedule>,
	timezone: Tz,
}

impl CronSchedule {
	/// Parse a standard 5-field Unix cron expression.
	///
	/// 5-field format: minute hour day-of-month month day-of-week
	///
	/// The `cron` crate expects `second minute hour day-of-month month day-of-week year`
	/// and numbers weekdays from 1 (Sunday), so the expression is rewritten before parsing:
	/// seconds are pinned to `0`, year becomes `*`, and the weekday field is expanded to
	/// day names using crontab numbering (0 and 7 are Sunday).
	///
	/// When both day-of-month and day-of-week are restricted, a day matching either field
	/// fires. The `cron` crate requires both to match, so each field gets its own schedule.
	pub fn parse(expression: &str, timezone: Tz) -> Result<Self> {
		let schedules = convert_to_cron_crate_format(expression)?
			.iter()
			.map(|cron_expr| {
				Schedule::from_str(cron_expr).map_err(|e| invalid(expression, e.to_string()))
			})
			.collect::<Result<Vec<_>>>()?;

		Ok(Self {
			expression: expression.trim().to_string(),
			schedules,
			timezone,
		})
	}

	pub fn expression(&self) -> &str {
		&self.expression
	}

	pub fn timezone(&self) -> Tz {
		self.timezone
	}

	/// Next occurrence strictly after `after`, in UTC.
	pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
		let local_after = after.with_timezone(&self.timezone);
		self
			.schedules
			.iter()
			.filter_map(|schedule| schedule.after(&local_after).next())
			.min()
			.map(|next| next.with_timezone(&Utc))
	}

	/// Render a UTC instant in this schedule's timezone.
	pub fn display(&self, at: DateTime<Utc>) -> String {
		display_time(at, self.timezone)
	}
}

impl fmt::Debug for CronSchedule {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("CronSchedule")
			.field("expression", &self.expression)
			.field("timezone", &self.timezone.name())
			.finish()
	}
}

/// Render a UTC instant in `timezone` using [`DISPLAY_FORMAT`].
pub fn display_time(at: DateTime<Utc>, timezone: Tz) -> String {
	at.with_timezone(&timezone).format(DISPLAY_FORMAT).to_string()
}

/// Parse an IANA timezone name.
pub fn parse_timezone(timezone: &str) -> Result<Tz> {
	timezone
		.parse()
		.map_err(|_| SchedulerError::InvalidTimezone(timezone.to_string()))
}

fn invalid(expression: &str, reason: impl Into<String>) -> SchedulerError {
	SchedulerError::InvalidCronExpression {
		expression: expression.to_string(),
		reason: reason.into(),
	}
}

fn convert_to_cron_crate_format(expression: &str) -> Result<Vec<String>> {
	let fields: Vec<&str> = expression.split_whitespace().collect();
	if fields.len() != 5 {
		return Err(invalid(
			expression,
			format!("expected 5 fields, found {}", fields.len()),
		));
	}

	let (minute, hour, day_of_month, month) = (fields[0], fields[1], fields[2], fields[3]);
	let day_of_week =
		normalize_day_of_week(fields[4]).map_err(|reason| invalid(expression, reason))?;

	if is_unrestricted(day_of_month) || is_unrestricted(fields[4]) {
		return Ok(vec![format!(
			"0 {minute} {hour} {day_of_month} {month} {day_of_week} *"
		)]);
	}

	Ok(vec![
		format!("0 {minute} {hour} {day_of_month} {month} * *"),
		format!("0 {minute} {hour} * {month} {day_of_week} *"),
	])
}

fn is_unrestricted(field: &str) -> bool {
	field == "*" || field == "?"
}

/// Expand a crontab day-of-week field into day names understood by the `cron` crate.
fn normalize_day_of_week(field: &str) -> std::result::Result<String, String> {
	if field == "*" || field == "?" {
		return Ok("*".to_string());
	}

	let mut days = BTreeSet::new();
	for part in field.split(',') {
		let (range, step) = match part.split_once('/') {
			Some((range, step)) => {
				let step: u8 = step
					.parse()
					.map_err(|_| format!("invalid day-of-week step '{step}'"))?;
				if step == 0 {
					return Err("day-of-week step must be at least 1".to_string());
				}
				(range, Some(step))
			}
			None => (part, None),
		};

		let (start, end) = match range {
			"*" => (0, 6),
			_ => match range.split_once('-') {
				Some((start, end)) => (parse_day(start)?, parse_day(end)?),
				None => {
					let day = parse_day(range)?;
					if step.is_some() {
						(day, 6)
					} else {
						(day, day)
					}
				}
			},
		};

		if start > end {
			return Err(format!("day-of-week range '{range}' runs backwards"));
		}

		for day in (start..=end).step_by(usize::from(step.unwrap_or(1))) {
			days.insert(day % 7);
		}
	}

	if days.len() == DAY_NAMES.len() {
		return Ok("*".to_string());
	}

	Ok(days
		.into_iter()
		.map(|day| DAY_NAMES[day as usize])
		.collect::<Vec<_>>()
		.join(","))
}

fn parse_day(value: &str) -> std::result::Result<u8, String> {
	if let Ok(day) = value.parse::<u8>() {
		return if day <= 7 {
			Ok(day)
		} else {
			Err(format!("day-of-week {day} out of range 0-7"))
		};
	}

	DAY_NAMES
		.iter()
		.position(|name| name.eq_ignore_ascii_case(value))
		.map(|day| day as u8)
		.ok_or_else(|| format!("unknown day-of-week '{value}'"))
}

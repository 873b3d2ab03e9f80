// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Cron job scheduler for Loom maintenance windows.
//!
//! This crate evaluates standard 5-field cron expressions against wall-clock time in a
//! configured timezone and invokes registered jobs once per matching tick. Each job runs
//! on its own tokio task; whether job bodies may overlap is an explicit
//! [`ExecutionMode`].

pub mod clock;
pub mod context;
pub mod error;
pub mod job;
pub mod schedule;
pub mod scheduler;

pub use clock::{Clock, SystemClock};
pub use context::{JobContext, TriggerSource};
pub use error::{JobError, Result, SchedulerError};
pub use job::Job;
pub use schedule::{display_time, parse_timezone, CronSchedule, DISPLAY_FORMAT};
pub use scheduler::{CronScheduler, ExecutionMode, JobHandle};

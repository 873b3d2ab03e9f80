// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::clock::{Clock, SystemClock};
use crate::context::{JobContext, TriggerSource};
use crate::error::{JobError, Result, SchedulerError};
use crate::job::Job;
use crate::schedule::CronSchedule;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::{AbortHandle, JoinError, JoinHandle};
use tracing::{debug, error, info, instrument, warn};

/// Whether job bodies may overlap in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
	/// Every job body runs on its own task, independent of all other jobs.
	#[default]
	Concurrent,
	/// At most one job body runs at a time across the whole scheduler. A long-running
	/// job delays the ticks of every other job until it returns.
	Serial,
}

/// Cloneable reference to a registered job, used to query its schedule.
#[derive(Debug, Clone)]
pub struct JobHandle {
	id: Arc<str>,
	schedule: Arc<CronSchedule>,
	clock: Arc<dyn Clock>,
}

impl JobHandle {
	pub fn id(&self) -> &str {
		&self.id
	}

	pub fn schedule(&self) -> &CronSchedule {
		&self.schedule
	}

	/// Current time on the scheduler's clock.
	pub fn now(&self) -> DateTime<Utc> {
		self.clock.now()
	}

	pub fn next_run(&self) -> Option<DateTime<Utc>> {
		self.schedule.next_after(self.now())
	}

	pub fn next_run_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
		self.schedule.next_after(after)
	}
}

struct RegisteredJob {
	job: Arc<dyn Job>,
	handle: JobHandle,
}

pub struct CronScheduler {
	timezone: Tz,
	mode: ExecutionMode,
	clock: Arc<dyn Clock>,
	jobs: Vec<RegisteredJob>,
	gate: Arc<Mutex<()>>,
	started: AtomicBool,
	shutdown_tx: broadcast::Sender<()>,
	handles: Mutex<Vec<JoinHandle<()>>>,
}

impl CronScheduler {
	pub fn new(timezone: Tz, mode: ExecutionMode) -> Self {
		Self::with_clock(timezone, mode, Arc::new(SystemClock))
	}

	/// Create a scheduler that computes ticks against `clock`.
	pub fn with_clock(timezone: Tz, mode: ExecutionMode, clock: Arc<dyn Clock>) -> Self {
		let (shutdown_tx, _) = broadcast::channel(1);
		Self {
			timezone,
			mode,
			clock,
			jobs: Vec::new(),
			gate: Arc::new(Mutex::new(())),
			started: AtomicBool::new(false),
			shutdown_tx,
			handles: Mutex::new(Vec::new()),
		}
	}

	pub fn timezone(&self) -> Tz {
		self.timezone
	}

	pub fn mode(&self) -> ExecutionMode {
		self.mode
	}

	/// Parse `expression` in this scheduler's timezone.
	pub fn parse(&self, expression: &str) -> Result<CronSchedule> {
		CronSchedule::parse(expression, self.timezone)
	}

	/// Validate `expression` and register `job` to fire on it.
	pub fn register(
		&mut self,
		id: impl Into<String>,
		expression: &str,
		job: Arc<dyn Job>,
	) -> Result<JobHandle> {
		let schedule = self.parse(expression)?;
		self.register_schedule(id, schedule, job)
	}

	/// Register `job` on an already parsed schedule.
	pub fn register_schedule(
		&mut self,
		id: impl Into<String>,
		schedule: CronSchedule,
		job: Arc<dyn Job>,
	) -> Result<JobHandle> {
		let id = id.into();
		if self.contains(&id) {
			return Err(SchedulerError::DuplicateJob(id));
		}

		let handle = JobHandle {
			id: Arc::from(id.as_str()),
			schedule: Arc::new(schedule),
			clock: Arc::clone(&self.clock),
		};
		debug!(
			job_id = %id,
			job_name = %job.name(),
			cron = %handle.schedule.expression(),
			"Registered cron job"
		);
		self.jobs.push(RegisteredJob {
			job,
			handle: handle.clone(),
		});
		Ok(handle)
	}

	pub fn contains(&self, job_id: &str) -> bool {
		self.jobs.iter().any(|r| r.handle.id() == job_id)
	}

	pub fn job_ids(&self) -> Vec<String> {
		self.jobs.iter().map(|r| r.handle.id().to_string()).collect()
	}

	/// Spawn one timing loop per registered job.
	#[instrument(skip(self))]
	pub async fn start(&self) -> Result<()> {
		if self.started.swap(true, Ordering::SeqCst) {
			return Err(SchedulerError::AlreadyStarted);
		}

		let mut handles = self.handles.lock().await;
		for registered in &self.jobs {
			let job = Arc::clone(&registered.job);
			let handle = registered.handle.clone();
			let gate = self.gate_for_mode();
			let shutdown_rx = self.shutdown_tx.subscribe();

			handles.push(tokio::spawn(run_schedule_loop(
				job,
				handle,
				gate,
				shutdown_rx,
			)));
		}

		info!(
			job_count = handles.len(),
			timezone = %self.timezone.name(),
			mode = ?self.mode,
			"Cron scheduler started"
		);
		Ok(())
	}

	/// Run a job once, outside of its schedule.
	#[instrument(skip(self))]
	pub async fn trigger(&self, job_id: &str) -> Result<()> {
		let registered = self
			.jobs
			.iter()
			.find(|r| r.handle.id() == job_id)
			.ok_or_else(|| SchedulerError::NotFound(job_id.to_string()))?;

		let ctx = JobContext::new(registered.handle.clone(), TriggerSource::Manual);
		invoke(&registered.job, ctx, self.gate_for_mode())
			.await
			.map_err(SchedulerError::from)
	}

	/// Stop every timing loop. In-flight job bodies are aborted.
	#[instrument(skip(self))]
	pub async fn shutdown(&self) {
		let _ = self.shutdown_tx.send(());

		let mut handles = self.handles.lock().await;
		for handle in handles.drain(..) {
			let _ = handle.await;
		}

		info!("Cron scheduler shut down");
	}

	fn gate_for_mode(&self) -> Option<Arc<Mutex<()>>> {
		match self.mode {
			ExecutionMode::Concurrent => None,
			ExecutionMode::Serial => Some(Arc::clone(&self.gate)),
		}
	}
}

async fn run_schedule_loop(
	job: Arc<dyn Job>,
	handle: JobHandle,
	gate: Option<Arc<Mutex<()>>>,
	mut shutdown_rx: broadcast::Receiver<()>,
) {
	let mut last_fired: Option<DateTime<Utc>> = None;

	loop {
		let now = handle.now();
		// Never fire the same tick twice if the wall clock lags the timer.
		let after = last_fired.map_or(now, |last| last.max(now));
		let Some(next) = handle.next_run_after(after) else {
			warn!(job_id = %handle.id(), "No upcoming run for cron schedule, stopping job");
			break;
		};
		let wait = (next - now).to_std().unwrap_or(Duration::ZERO);

		tokio::select! {
			_ = tokio::time::sleep(wait) => {}
			_ = shutdown_rx.recv() => {
				info!(job_id = %handle.id(), "Shutting down cron job");
				break;
			}
		}

		// The timer is monotonic; the wall clock may have been stepped back meanwhile.
		if handle.now() < next {
			debug!(job_id = %handle.id(), next = %next, "Woke before the scheduled tick, waiting again");
			continue;
		}

		last_fired = Some(next);
		let ctx = JobContext::new(handle.clone(), TriggerSource::Schedule);
		let run_id = ctx.run_id.clone();

		tokio::select! {
			result = invoke(&job, ctx, gate.clone()) => report(&handle, job.name(), &run_id, result),
			_ = shutdown_rx.recv() => {
				info!(job_id = %handle.id(), run_id = %run_id, "Shutting down cron job, abandoning in-flight run");
				break;
			}
		}
	}
}

struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
	fn drop(&mut self) {
		self.0.abort();
	}
}

async fn invoke(
	job: &Arc<dyn Job>,
	ctx: JobContext,
	gate: Option<Arc<Mutex<()>>>,
) -> std::result::Result<(), JobError> {
	let _permit = match gate {
		Some(gate) => Some(gate.lock_owned().await),
		None => None,
	};

	let job = Arc::clone(job);
	let task = tokio::spawn(async move { job.run(&ctx).await });
	let _abort = AbortOnDrop(task.abort_handle());

	match task.await {
		Ok(result) => result,
		Err(e) => Err(join_error(e)),
	}
}

fn join_error(e: JoinError) -> JobError {
	if !e.is_panic() {
		return JobError::Cancelled;
	}

	let payload = e.into_panic();
	let message = payload
		.downcast_ref::<&str>()
		.map(|s| s.to_string())
		.or_else(|| payload.downcast_ref::<String>().cloned())
		.unwrap_or_else(|| "unknown panic".to_string());
	JobError::Panicked(message)
}

fn report(
	handle: &JobHandle,
	job_name: &str,
	run_id: &str,
	result: std::result::Result<(), JobError>,
) {
	match result {
		Ok(()) => debug!(job_id = %handle.id(), job_name, run_id, "Job completed"),
		Err(JobError::Cancelled) => info!(job_id = %handle.id(), job_name, run_id, "Job cancelled"),
		Err(e) => error!(job_id = %handle.id(), job_name, run_id, error = %e, "Job failed"),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use std::sync::atomic::AtomicUsize;

	struct MockJob {
		name: String,
		hold: Duration,
		runs: Arc<AtomicUsize>,
		triggers: Arc<std::sync::Mutex<Vec<TriggerSource>>>,
	}

	impl MockJob {
		fn new(name: &str) -> Self {
			Self::holding(name, Duration::ZERO)
		}

		/// A job whose body stays running for `hold`.
		fn holding(name: &str, hold: Duration) -> Self {
			Self {
				name: name.to_string(),
				hold,
				runs: Arc::new(AtomicUsize::new(0)),
				triggers: Arc::new(std::sync::Mutex::new(Vec::new())),
			}
		}
	}

	#[async_trait]
	impl Job for MockJob {
		fn name(&self) -> &str {
			&self.name
		}

		async fn run(&self, ctx: &JobContext) -> std::result::Result<(), JobError> {
			self.runs.fetch_add(1, Ordering::SeqCst);
			self.triggers.lock().unwrap().push(ctx.trigger);
			tokio::time::sleep(self.hold).await;
			Ok(())
		}
	}

	/// Wall clock driven by tokio's (pausable) time, which tests can step backwards.
	#[derive(Debug)]
	struct TestClock {
		base: DateTime<Utc>,
		started: tokio::time::Instant,
		offset: std::sync::Mutex<chrono::TimeDelta>,
	}

	impl TestClock {
		fn starting_at(base: DateTime<Utc>) -> Arc<Self> {
			Arc::new(Self {
				base,
				started: tokio::time::Instant::now(),
				offset: std::sync::Mutex::new(chrono::TimeDelta::zero()),
			})
		}

		fn step_back(&self, secs: i64) {
			let mut offset = self.offset.lock().unwrap();
			*offset = *offset - chrono::TimeDelta::seconds(secs);
		}
	}

	impl Clock for TestClock {
		fn now(&self) -> DateTime<Utc> {
			let elapsed = chrono::TimeDelta::from_std(self.started.elapsed()).unwrap();
			self.base + elapsed + *self.offset.lock().unwrap()
		}
	}

	fn clocked_scheduler(clock: Arc<TestClock>) -> CronScheduler {
		CronScheduler::with_clock(Tz::UTC, ExecutionMode::Concurrent, clock)
	}

	fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
		use chrono::TimeZone;
		Utc.with_ymd_and_hms(2026, 1, 19, h, m, s).unwrap()
	}

	struct PanickingJob;

	#[async_trait]
	impl Job for PanickingJob {
		fn name(&self) -> &str {
			"Panicking job"
		}

		async fn run(&self, _ctx: &JobContext) -> std::result::Result<(), JobError> {
			panic!("boom");
		}
	}

	/// Tracks how many invocations overlap.
	struct SlowJob {
		running: Arc<AtomicUsize>,
		max_running: Arc<AtomicUsize>,
	}

	#[async_trait]
	impl Job for SlowJob {
		fn name(&self) -> &str {
			"Slow job"
		}

		async fn run(&self, _ctx: &JobContext) -> std::result::Result<(), JobError> {
			let now_running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
			self.max_running.fetch_max(now_running, Ordering::SeqCst);
			tokio::time::sleep(Duration::from_secs(10)).await;
			self.running.fetch_sub(1, Ordering::SeqCst);
			Ok(())
		}
	}

	async fn max_overlap(mode: ExecutionMode) -> usize {
		let running = Arc::new(AtomicUsize::new(0));
		let max_running = Arc::new(AtomicUsize::new(0));
		let mut scheduler = CronScheduler::new(Tz::UTC, mode);

		for id in ["a", "b"] {
			let job = Arc::new(SlowJob {
				running: Arc::clone(&running),
				max_running: Arc::clone(&max_running),
			});
			scheduler.register(id, "0 2 * * *", job).unwrap();
		}

		let (a, b) = tokio::join!(scheduler.trigger("a"), scheduler.trigger("b"));
		a.unwrap();
		b.unwrap();
		max_running.load(Ordering::SeqCst)
	}

	#[test]
	fn test_register_job() {
		let mut scheduler = CronScheduler::new(Tz::UTC, ExecutionMode::Concurrent);

		let handle = scheduler
			.register("job-1", "*/5 * * * *", Arc::new(MockJob::new("job-1")))
			.unwrap();

		assert_eq!(handle.id(), "job-1");
		assert_eq!(handle.schedule().expression(), "*/5 * * * *");
		assert!(scheduler.contains("job-1"));
		assert_eq!(scheduler.job_ids(), vec!["job-1".to_string()]);
	}

	#[test]
	fn test_register_duplicate_job_rejected() {
		let mut scheduler = CronScheduler::new(Tz::UTC, ExecutionMode::Concurrent);
		scheduler
			.register("job-1", "0 2 * * *", Arc::new(MockJob::new("job-1")))
			.unwrap();

		let result = scheduler.register("job-1", "0 3 * * *", Arc::new(MockJob::new("job-1")));

		match result.unwrap_err() {
			SchedulerError::DuplicateJob(id) => assert_eq!(id, "job-1"),
			e => panic!("Expected DuplicateJob error, got: {:?}", e),
		}
		assert_eq!(scheduler.job_ids().len(), 1);
	}

	#[test]
	fn test_register_invalid_cron_adds_no_job() {
		let mut scheduler = CronScheduler::new(Tz::UTC, ExecutionMode::Concurrent);

		let result = scheduler.register("job-1", "not a cron", Arc::new(MockJob::new("job-1")));

		assert!(matches!(
			result,
			Err(SchedulerError::InvalidCronExpression { .. })
		));
		assert!(scheduler.job_ids().is_empty());
	}

	#[test]
	fn test_handle_next_run_is_in_future() {
		let mut scheduler = CronScheduler::new(Tz::UTC, ExecutionMode::Concurrent);
		let handle = scheduler
			.register("job-1", "0 2 * * *", Arc::new(MockJob::new("job-1")))
			.unwrap();

		let next = handle.next_run().unwrap();

		assert!(next > Utc::now());
		assert_eq!(next.time().to_string(), "02:00:00");
	}

	#[tokio::test]
	async fn test_trigger_runs_job() {
		let mut scheduler = CronScheduler::new(Tz::UTC, ExecutionMode::Concurrent);
		let job = Arc::new(MockJob::new("job-1"));
		let runs = Arc::clone(&job.runs);
		scheduler.register("job-1", "0 2 * * *", job).unwrap();

		scheduler.trigger("job-1").await.unwrap();
		scheduler.trigger("job-1").await.unwrap();

		assert_eq!(runs.load(Ordering::SeqCst), 2);
	}

	#[tokio::test]
	async fn test_trigger_nonexistent_job_returns_not_found() {
		let scheduler = CronScheduler::new(Tz::UTC, ExecutionMode::Concurrent);

		let result = scheduler.trigger("nonexistent-job").await;

		match result.unwrap_err() {
			SchedulerError::NotFound(id) => assert_eq!(id, "nonexistent-job"),
			e => panic!("Expected NotFound error, got: {:?}", e),
		}
	}

	#[tokio::test]
	async fn test_panicking_job_is_reported_not_propagated() {
		let mut scheduler = CronScheduler::new(Tz::UTC, ExecutionMode::Concurrent);
		scheduler
			.register("panicking", "0 2 * * *", Arc::new(PanickingJob))
			.unwrap();

		let result = scheduler.trigger("panicking").await;

		match result.unwrap_err() {
			SchedulerError::Job(JobError::Panicked(message)) => assert_eq!(message, "boom"),
			e => panic!("Expected Panicked error, got: {:?}", e),
		}
	}

	#[tokio::test]
	async fn test_start_twice_fails() {
		let scheduler = CronScheduler::new(Tz::UTC, ExecutionMode::Concurrent);

		scheduler.start().await.unwrap();
		let result = scheduler.start().await;

		assert!(matches!(result, Err(SchedulerError::AlreadyStarted)));
		scheduler.shutdown().await;
	}

	#[tokio::test]
	async fn test_shutdown_stops_waiting_loops() {
		let mut scheduler = CronScheduler::new(Tz::UTC, ExecutionMode::Concurrent);
		let job = Arc::new(MockJob::new("job-1"));
		let runs = Arc::clone(&job.runs);
		scheduler.register("job-1", "0 2 1 1 *", job).unwrap();

		scheduler.start().await.unwrap();
		tokio::time::timeout(Duration::from_secs(5), scheduler.shutdown())
			.await
			.expect("shutdown should not wait for the next tick");

		assert_eq!(runs.load(Ordering::SeqCst), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn test_concurrent_mode_overlaps_jobs() {
		assert_eq!(max_overlap(ExecutionMode::Concurrent).await, 2);
	}

	#[tokio::test(start_paused = true)]
	async fn test_serial_mode_runs_one_job_at_a_time() {
		assert_eq!(max_overlap(ExecutionMode::Serial).await, 1);
	}

	#[tokio::test(start_paused = true)]
	async fn test_loop_fires_on_tick_exactly_once() {
		let clock = TestClock::starting_at(at(10, 4, 58));
		let mut scheduler = clocked_scheduler(Arc::clone(&clock));
		let job = Arc::new(MockJob::new("every-five"));
		let runs = Arc::clone(&job.runs);
		let triggers = Arc::clone(&job.triggers);
		scheduler.register("every-five", "*/5 * * * *", job).unwrap();

		scheduler.start().await.unwrap();

		tokio::time::sleep(Duration::from_secs(1)).await;
		assert_eq!(runs.load(Ordering::SeqCst), 0);

		// 10:05:00 passes; the next tick is 10:10:00.
		tokio::time::sleep(Duration::from_secs(60)).await;
		assert_eq!(runs.load(Ordering::SeqCst), 1);
		assert_eq!(*triggers.lock().unwrap(), vec![TriggerSource::Schedule]);

		scheduler.shutdown().await;
	}

	#[tokio::test(start_paused = true)]
	async fn test_clock_stepped_back_before_tick_does_not_fire_early() {
		let clock = TestClock::starting_at(at(10, 0, 59));
		let mut scheduler = clocked_scheduler(Arc::clone(&clock));
		let job = Arc::new(MockJob::new("minutely"));
		let runs = Arc::clone(&job.runs);
		scheduler.register("minutely", "* * * * *", job).unwrap();

		scheduler.start().await.unwrap();
		tokio::time::sleep(Duration::from_millis(500)).await;
		clock.step_back(30);

		// The timer for 10:01:00 elapses while the wall clock reads 10:00:30.
		tokio::time::sleep(Duration::from_millis(1500)).await;
		assert_eq!(runs.load(Ordering::SeqCst), 0);

		tokio::time::sleep(Duration::from_secs(30)).await;
		assert_eq!(runs.load(Ordering::SeqCst), 1);

		scheduler.shutdown().await;
	}

	#[tokio::test(start_paused = true)]
	async fn test_clock_stepped_back_during_run_does_not_refire_tick() {
		let clock = TestClock::starting_at(at(10, 0, 59));
		let mut scheduler = clocked_scheduler(Arc::clone(&clock));
		let job = Arc::new(MockJob::holding("minutely", Duration::from_secs(5)));
		let runs = Arc::clone(&job.runs);
		scheduler.register("minutely", "* * * * *", job).unwrap();

		scheduler.start().await.unwrap();
		tokio::time::sleep(Duration::from_secs(3)).await;
		assert_eq!(runs.load(Ordering::SeqCst), 1);

		// The run finishes with the wall clock at 10:00:35, before the tick it served.
		clock.step_back(30);
		tokio::time::sleep(Duration::from_secs(57)).await;
		assert_eq!(runs.load(Ordering::SeqCst), 1);

		// 10:02:00 on the stepped clock.
		tokio::time::sleep(Duration::from_secs(32)).await;
		assert_eq!(runs.load(Ordering::SeqCst), 2);

		scheduler.shutdown().await;
	}

	#[tokio::test(start_paused = true)]
	async fn test_handle_and_context_use_scheduler_clock() {
		let clock = TestClock::starting_at(at(1, 30, 0));
		let mut scheduler = clocked_scheduler(Arc::clone(&clock));
		let job = Arc::new(MockJob::new("nightly"));
		let triggers = Arc::clone(&job.triggers);
		let handle = scheduler.register("nightly", "0 2 * * *", job).unwrap();

		assert_eq!(handle.next_run(), Some(at(2, 0, 0)));

		scheduler.trigger("nightly").await.unwrap();
		assert_eq!(*triggers.lock().unwrap(), vec![TriggerSource::Manual]);
	}
}

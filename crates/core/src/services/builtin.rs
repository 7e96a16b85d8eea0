//! Services shipped with the engine.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use parking_lot::Mutex;
use pwio_protocol::{Capabilities, HookName, ResultDescriptor, TestDescriptor, TestInfo};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::Service;
use crate::config::RunnerConfig;
use crate::error::{Error, Result};
use crate::recording::{MAX_NAME_LEN, sanitize};
use crate::remote::RemoteSession;

/// Logs test and session boundaries through `tracing`.
///
/// Options: `{ "logSessions": bool }` (default `true`).
#[derive(Debug, Clone)]
pub struct LoggingService {
	log_sessions: bool,
}

impl LoggingService {
	pub const ID: &'static str = "logging";

	const HOOKS: &'static [HookName] = &[
		HookName::BeforeSession,
		HookName::BeforeTest,
		HookName::AfterTest,
		HookName::AfterSession,
	];

	pub fn from_options(options: &Value) -> Self {
		Self {
			log_sessions: options.get("logSessions").and_then(Value::as_bool).unwrap_or(true),
		}
	}
}

#[async_trait]
impl Service for LoggingService {
	fn name(&self) -> &str {
		Self::ID
	}

	fn hooks(&self) -> &[HookName] {
		Self::HOOKS
	}

	async fn before_session(
		&self,
		_config: &RunnerConfig,
		capabilities: &Capabilities,
		specs: &[String],
		cid: &str,
	) -> Result<()> {
		if self.log_sessions {
			info!(
				target = "pwio",
				cid,
				platform = capabilities.platform_name().unwrap_or("unknown"),
				specs = specs.len(),
				"session starting"
			);
		}
		Ok(())
	}

	async fn before_test(&self, test: &TestDescriptor, _context: &TestInfo) -> Result<()> {
		info!(target = "pwio", test = %test.full_title, "test started");
		Ok(())
	}

	async fn after_test(&self, test: &TestDescriptor, _context: &TestInfo, result: &ResultDescriptor) -> Result<()> {
		info!(
			target = "pwio",
			test = %test.full_title,
			passed = result.passed,
			status = %result.status,
			duration_ms = result.duration,
			"test finished"
		);
		Ok(())
	}

	async fn after_session(&self, _config: &RunnerConfig, _capabilities: &Capabilities, _specs: &[String]) -> Result<()> {
		if self.log_sessions {
			info!(target = "pwio", "session finished");
		}
		Ok(())
	}
}

/// Wall-clock timing of one test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestTiming {
	pub title: String,
	pub duration: Duration,
	pub passed: bool,
}

/// Timing summary produced by [`PerformanceService`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PerformanceReport {
	pub tests: Vec<TestTiming>,
	pub session_duration: Option<Duration>,
	pub average: Duration,
	/// Up to five slowest tests, slowest first.
	pub slowest: Vec<TestTiming>,
}

#[derive(Debug, Default)]
struct Metrics {
	session_start: Option<Instant>,
	session_duration: Option<Duration>,
	running: HashMap<String, Instant>,
	tests: Vec<TestTiming>,
}

/// Measures test and session durations and warns about slow tests.
///
/// Options: `{ "slowTestMs": number }` (default 2000).
#[derive(Debug)]
pub struct PerformanceService {
	slow_threshold: Duration,
	metrics: Mutex<Metrics>,
}

impl PerformanceService {
	pub const ID: &'static str = "performance";

	const HOOKS: &'static [HookName] = &[
		HookName::BeforeSession,
		HookName::BeforeTest,
		HookName::AfterTest,
		HookName::AfterSession,
	];

	const DEFAULT_SLOW_MS: u64 = 2000;

	pub fn from_options(options: &Value) -> Self {
		let slow_ms = options
			.get("slowTestMs")
			.and_then(Value::as_u64)
			.unwrap_or(Self::DEFAULT_SLOW_MS);
		Self {
			slow_threshold: Duration::from_millis(slow_ms),
			metrics: Mutex::new(Metrics::default()),
		}
	}

	pub fn report(&self) -> PerformanceReport {
		let metrics = self.metrics.lock();
		let total: Duration = metrics.tests.iter().map(|t| t.duration).sum();
		let average = match metrics.tests.len() {
			0 => Duration::ZERO,
			n => total / n as u32,
		};
		let mut slowest = metrics.tests.clone();
		slowest.sort_by(|a, b| b.duration.cmp(&a.duration));
		slowest.truncate(5);

		PerformanceReport {
			tests: metrics.tests.clone(),
			session_duration: metrics.session_duration,
			average,
			slowest,
		}
	}

	pub fn reset(&self) {
		*self.metrics.lock() = Metrics::default();
	}
}

#[async_trait]
impl Service for PerformanceService {
	fn name(&self) -> &str {
		Self::ID
	}

	fn hooks(&self) -> &[HookName] {
		Self::HOOKS
	}

	async fn before_session(
		&self,
		_config: &RunnerConfig,
		_capabilities: &Capabilities,
		_specs: &[String],
		_cid: &str,
	) -> Result<()> {
		self.metrics.lock().session_start = Some(Instant::now());
		Ok(())
	}

	async fn before_test(&self, test: &TestDescriptor, _context: &TestInfo) -> Result<()> {
		self.metrics.lock().running.insert(test.full_title.clone(), Instant::now());
		Ok(())
	}

	async fn after_test(&self, test: &TestDescriptor, _context: &TestInfo, result: &ResultDescriptor) -> Result<()> {
		let mut metrics = self.metrics.lock();
		let Some(started) = metrics.running.remove(&test.full_title) else {
			return Ok(());
		};
		let duration = started.elapsed();
		if duration > self.slow_threshold {
			warn!(
				target = "pwio",
				test = %test.full_title,
				duration_ms = duration.as_millis() as u64,
				"slow test"
			);
		}
		metrics.tests.push(TestTiming {
			title: test.title.clone(),
			duration,
			passed: result.passed,
		});
		Ok(())
	}

	async fn after_session(&self, _config: &RunnerConfig, _capabilities: &Capabilities, _specs: &[String]) -> Result<()> {
		{
			let mut metrics = self.metrics.lock();
			let Some(started) = metrics.session_start else {
				return Ok(());
			};
			metrics.session_duration = Some(started.elapsed());
		}

		let report = self.report();
		info!(
			target = "pwio",
			tests = report.tests.len(),
			average_ms = report.average.as_millis() as u64,
			session_ms = report.session_duration.unwrap_or_default().as_millis() as u64,
			"performance report"
		);
		Ok(())
	}
}

/// Saves a screenshot to disk when a test fails.
///
/// Options: `{ "screenshotPath": string, "screenshotOnFailure": bool }`
/// (defaults `./screenshots`, `true`). Files are named
/// `<n>-failed-<test>-<unix millis>.png`. Screenshot failures are logged,
/// never reported as hook failures.
pub struct ScreenshotService {
	dir: PathBuf,
	on_failure: bool,
	taken: AtomicU32,
	session: Mutex<Option<Arc<dyn RemoteSession>>>,
}

impl ScreenshotService {
	pub const ID: &'static str = "screenshot";

	const HOOKS: &'static [HookName] = &[
		HookName::Before,
		HookName::BeforeTest,
		HookName::AfterTest,
		HookName::AfterSession,
	];

	const DEFAULT_DIR: &'static str = "./screenshots";

	pub fn from_options(options: &Value) -> Self {
		let dir = options
			.get("screenshotPath")
			.and_then(Value::as_str)
			.unwrap_or(Self::DEFAULT_DIR);
		Self {
			dir: PathBuf::from(dir),
			on_failure: options.get("screenshotOnFailure").and_then(Value::as_bool).unwrap_or(true),
			taken: AtomicU32::new(0),
			session: Mutex::new(None),
		}
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	/// Screenshots saved so far.
	pub fn taken(&self) -> u32 {
		self.taken.load(Ordering::SeqCst)
	}

	async fn save(&self, name: &str) -> Result<PathBuf> {
		let session = self
			.session
			.lock()
			.clone()
			.ok_or_else(|| Error::service("no session to take a screenshot from"))?;
		let png = STANDARD.decode(session.take_screenshot().await?)?;

		tokio::fs::create_dir_all(&self.dir).await?;
		let index = self.taken.fetch_add(1, Ordering::SeqCst) + 1;
		let millis = SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.map(|elapsed| elapsed.as_millis())
			.unwrap_or_default();
		let path = self.dir.join(format!("{index}-{}-{millis}.png", sanitize(name, MAX_NAME_LEN)));
		tokio::fs::write(&path, png).await?;
		Ok(path)
	}
}

#[async_trait]
impl Service for ScreenshotService {
	fn name(&self) -> &str {
		Self::ID
	}

	fn hooks(&self) -> &[HookName] {
		Self::HOOKS
	}

	async fn before(&self, _capabilities: &Capabilities, _specs: &[String], session: &Arc<dyn RemoteSession>) -> Result<()> {
		*self.session.lock() = Some(Arc::clone(session));
		Ok(())
	}

	async fn before_test(&self, test: &TestDescriptor, _context: &TestInfo) -> Result<()> {
		debug!(target = "pwio", test = %test.title, "screenshot service armed");
		Ok(())
	}

	async fn after_test(&self, test: &TestDescriptor, _context: &TestInfo, result: &ResultDescriptor) -> Result<()> {
		if result.error.is_none() || !self.on_failure {
			return Ok(());
		}
		match self.save(&format!("failed-{}", test.title)).await {
			Ok(path) => info!(target = "pwio", path = %path.display(), "failure screenshot saved"),
			Err(err) => warn!(target = "pwio", test = %test.title, error = %err, "failure screenshot not taken"),
		}
		Ok(())
	}

	async fn after_session(&self, _config: &RunnerConfig, _capabilities: &Capabilities, _specs: &[String]) -> Result<()> {
		self.session.lock().take();
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use pwio_protocol::ErrorDescriptor;
	use serde_json::json;

	use super::*;
	use crate::testing::MockSession;

	fn test_named(title: &str) -> TestDescriptor {
		TestDescriptor {
			title: title.into(),
			full_title: format!("Suite - {title}"),
			..Default::default()
		}
	}

	#[test]
	fn options_are_read_with_defaults() {
		assert!(LoggingService::from_options(&json!({})).log_sessions);
		assert!(!LoggingService::from_options(&json!({"logSessions": false})).log_sessions);
		assert_eq!(
			PerformanceService::from_options(&json!({"slowTestMs": 10})).slow_threshold,
			Duration::from_millis(10)
		);
	}

	#[tokio::test]
	async fn performance_records_test_and_session_timings() {
		let service = PerformanceService::from_options(&json!({}));
		let config = RunnerConfig::default();
		let caps = Capabilities::new();
		let info = TestInfo::new("a");

		service.before_session(&config, &caps, &[], "0-0").await.unwrap();
		for title in ["a", "b"] {
			let test = test_named(title);
			service.before_test(&test, &info).await.unwrap();
			let result = ResultDescriptor {
				passed: title == "a",
				..Default::default()
			};
			service.after_test(&test, &info, &result).await.unwrap();
		}
		service.after_session(&config, &caps, &[]).await.unwrap();

		let report = service.report();
		assert_eq!(report.tests.len(), 2);
		assert!(report.tests[0].passed);
		assert!(!report.tests[1].passed);
		assert!(report.session_duration.is_some());
		assert_eq!(report.slowest.len(), 2);

		service.reset();
		assert_eq!(service.report(), PerformanceReport::default());
	}

	#[tokio::test]
	async fn after_test_without_start_is_ignored() {
		let service = PerformanceService::from_options(&json!({}));
		service
			.after_test(&test_named("x"), &TestInfo::new("x"), &ResultDescriptor::default())
			.await
			.unwrap();
		assert!(service.report().tests.is_empty());
	}

	fn failed_result() -> ResultDescriptor {
		ResultDescriptor {
			error: Some(ErrorDescriptor {
				name: "Error".into(),
				message: "boom".into(),
				stack: String::new(),
			}),
			..Default::default()
		}
	}

	fn saved_files(dir: &Path) -> Vec<String> {
		let mut names: Vec<String> = std::fs::read_dir(dir)
			.map(|entries| {
				entries
					.filter_map(|entry| entry.ok())
					.map(|entry| entry.file_name().to_string_lossy().into_owned())
					.collect()
			})
			.unwrap_or_default();
		names.sort();
		names
	}

	#[tokio::test]
	async fn screenshot_saved_only_for_failed_tests() {
		let dir = tempfile::TempDir::new().unwrap();
		let service = ScreenshotService::from_options(&json!({ "screenshotPath": dir.path().join("shots") }));
		let session: Arc<dyn RemoteSession> = Arc::new(MockSession::browser("s-1"));
		service.before(&Capabilities::new(), &[], &session).await.unwrap();

		let info = TestInfo::new("adds to cart");
		service
			.after_test(&test_named("adds to cart"), &info, &ResultDescriptor::default())
			.await
			.unwrap();
		assert_eq!(service.taken(), 0);

		service
			.after_test(&test_named("adds to cart"), &info, &failed_result())
			.await
			.unwrap();
		assert_eq!(service.taken(), 1);

		let files = saved_files(&dir.path().join("shots"));
		assert_eq!(files.len(), 1);
		assert!(files[0].starts_with("1-failed-adds-to-cart-"), "{}", files[0]);
		assert!(files[0].ends_with(".png"));
	}

	#[tokio::test]
	async fn screenshot_failures_are_not_hook_failures() {
		let dir = tempfile::TempDir::new().unwrap();
		let service = ScreenshotService::from_options(&json!({ "screenshotPath": dir.path() }));

		// No session captured yet.
		service.after_test(&test_named("x"), &TestInfo::new("x"), &failed_result()).await.unwrap();

		let session: Arc<dyn RemoteSession> = Arc::new(MockSession::browser("s-1").failing_screenshots());
		service.before(&Capabilities::new(), &[], &session).await.unwrap();
		service.after_test(&test_named("x"), &TestInfo::new("x"), &failed_result()).await.unwrap();

		assert_eq!(service.taken(), 0);
		assert!(saved_files(dir.path()).is_empty());
	}

	#[tokio::test]
	async fn screenshot_on_failure_can_be_disabled() {
		let dir = tempfile::TempDir::new().unwrap();
		let service = ScreenshotService::from_options(
			&json!({ "screenshotPath": dir.path(), "screenshotOnFailure": false }),
		);
		assert_eq!(service.dir(), dir.path());
		let session: Arc<dyn RemoteSession> = Arc::new(MockSession::browser("s-1"));
		service.before(&Capabilities::new(), &[], &session).await.unwrap();

		service.after_test(&test_named("x"), &TestInfo::new("x"), &failed_result()).await.unwrap();
		assert_eq!(service.taken(), 0);
	}
}

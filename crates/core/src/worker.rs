//! Worker-process orchestration.
//!
//! One [`Worker`] per host worker process. It owns the service registry,
//! runs the launcher hooks at start and end, and creates a fixture per test.

use std::future::Future;
use std::panic;
use std::path::Path;
use std::sync::Arc;

use pwio_protocol::{TestInfo, TestStatus};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{ProjectOptions, RunnerConfig, TestOptions, resolve};
use crate::error::{Error, Result};
use crate::fixture::{Fixture, TestContext};
use crate::hooks::Hooks;
use crate::network::HostNetwork;
use crate::recording::RecorderSettings;
use crate::remote::RemoteClient;
use crate::report::Reporter;
use crate::services::{ServiceCatalog, ServiceHookRegistry};
use crate::session::SessionManager;

/// Spec file patterns picked up by [`discover_specs`].
const SPEC_PATTERNS: &[&str] = &["**/*.spec.*", "**/*.test.*"];

/// Aggregated test outcomes of one or more worker processes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerResults {
	pub finished: u32,
	pub passed: u32,
	pub failed: u32,
	pub skipped: u32,
}

impl WorkerResults {
	pub fn record(&mut self, status: TestStatus) {
		self.finished += 1;
		match status {
			TestStatus::Passed => self.passed += 1,
			TestStatus::Skipped => self.skipped += 1,
			TestStatus::Failed | TestStatus::TimedOut | TestStatus::Interrupted => self.failed += 1,
		}
	}

	/// Adds another process's counts to these.
	pub fn merge(&mut self, other: &WorkerResults) {
		self.finished += other.finished;
		self.passed += other.passed;
		self.failed += other.failed;
		self.skipped += other.skipped;
	}

	pub fn exit_code(&self) -> i32 {
		i32::from(self.failed > 0)
	}
}

/// Capability id: `<parallelIndex>-<workerIndex>`.
pub fn worker_cid(parallel_index: u32, worker_index: u32) -> String {
	format!("{parallel_index}-{worker_index}")
}

/// Spec files under `dir`, relative to it, sorted.
pub fn discover_specs(dir: &Path) -> Result<Vec<String>> {
	let root = glob::Pattern::escape(&dir.to_string_lossy());
	let mut specs = Vec::new();
	for pattern in SPEC_PATTERNS {
		let paths = glob::glob(&format!("{root}/{pattern}"))
			.map_err(|e| Error::Config(format!("invalid spec pattern: {e}")))?;
		for path in paths.filter_map(|entry| entry.ok()) {
			let relative = path.strip_prefix(dir).unwrap_or(&path);
			specs.push(relative.to_string_lossy().replace('\\', "/"));
		}
	}
	specs.sort();
	specs.dedup();
	Ok(specs)
}

pub struct Worker {
	project: ProjectOptions,
	hooks: Hooks,
	client: Arc<dyn RemoteClient>,
	network: Option<Arc<dyn HostNetwork>>,
	settings: RecorderSettings,
	specs: Vec<String>,
	cid: String,
	config: RunnerConfig,
	results: WorkerResults,
}

impl Worker {
	pub fn new(project: ProjectOptions, catalog: ServiceCatalog, client: Arc<dyn RemoteClient>) -> Self {
		let config = RunnerConfig::for_project(&project, Vec::new());
		Self {
			project,
			hooks: Hooks::new(Arc::new(ServiceHookRegistry::new(catalog))),
			client,
			network: None,
			settings: RecorderSettings::default(),
			specs: Vec::new(),
			cid: worker_cid(0, 0),
			config,
			results: WorkerResults::default(),
		}
	}

	pub fn with_network(mut self, network: Arc<dyn HostNetwork>) -> Self {
		self.network = Some(network);
		self
	}

	pub fn with_recorder_settings(mut self, settings: RecorderSettings) -> Self {
		self.settings = settings;
		self
	}

	pub fn with_specs(mut self, specs: Vec<String>) -> Self {
		self.specs = specs;
		self
	}

	/// Uses the spec files found under `dir` as this worker's specs.
	///
	/// # Errors
	///
	/// Returns [`Error::Config`] if `dir` cannot be scanned.
	pub fn with_spec_dir(self, dir: impl AsRef<Path>) -> Result<Self> {
		let specs = discover_specs(dir.as_ref())?;
		debug!(target = "pwio", dir = %dir.as_ref().display(), specs = specs.len(), "discovered specs");
		Ok(self.with_specs(specs))
	}

	pub fn hooks(&self) -> &Hooks {
		&self.hooks
	}

	pub fn registry(&self) -> &Arc<ServiceHookRegistry> {
		self.hooks.registry()
	}

	pub fn cid(&self) -> &str {
		&self.cid
	}

	pub fn config(&self) -> &RunnerConfig {
		&self.config
	}

	pub fn results(&self) -> WorkerResults {
		self.results
	}

	/// Builds the worker config, constructs launcher services and runs
	/// `onPrepare` and `onWorkerStart`.
	///
	/// # Errors
	///
	/// Returns the registry's error when a configured service is unknown or
	/// cannot be constructed.
	pub async fn start(&mut self, parallel_index: u32, worker_index: u32) -> Result<()> {
		self.cid = worker_cid(parallel_index, worker_index);
		self.config = RunnerConfig::for_project(&self.project, self.specs.clone());

		self.hooks.registry().init_launcher(&self.config)?;
		self.hooks.on_prepare(&self.config).await;
		self.hooks
			.on_worker_start(&self.cid, &self.project.capabilities, &self.specs, &self.config)
			.await;

		info!(target = "pwio", cid = %self.cid, specs = self.specs.len(), "worker started");
		Ok(())
	}

	/// Runs `onWorkerEnd` and `onComplete`, then drops every service.
	///
	/// Returns the worker's exit code.
	pub async fn end(&mut self) -> i32 {
		let exit_code = self.results.exit_code();
		self.hooks.on_worker_end(&self.cid, exit_code, &self.specs, 0).await;
		self.hooks.on_complete(exit_code, &self.config, &self.results).await;
		self.hooks.registry().cleanup();

		info!(
			target = "pwio",
			cid = %self.cid,
			passed = self.results.passed,
			failed = self.results.failed,
			exit_code,
			"worker finished"
		);
		exit_code
	}

	/// Runs one test: resolves its options, opens the session, runs `body`,
	/// and always closes. The outcome is added to the worker's results.
	///
	/// # Errors
	///
	/// Returns session setup failures, which are also recorded as failed
	/// tests. Body failures are reported through the returned status and
	/// `info.error`. A panicking body is recorded as failed, torn down, and
	/// its panic resumed.
	pub async fn run_test<F, Fut>(
		&mut self,
		test: &TestOptions,
		info: &mut TestInfo,
		reporter: Arc<dyn Reporter>,
		body: F,
	) -> Result<TestStatus>
	where
		F: FnOnce(TestContext) -> Fut,
		Fut: Future<Output = Result<()>>,
	{
		let resolved = resolve(&self.project, test);
		let runner = self.config.with_test(&resolved);
		let manager = SessionManager::new(
			self.hooks.clone(),
			Arc::clone(&self.client),
			Arc::clone(&reporter),
			runner,
			resolved,
			self.cid.clone(),
		)
		.with_recorder_settings(self.settings.clone());

		let outcome = Fixture::new(manager, reporter, self.network.clone())
			.run_unwinding(info, body)
			.await;
		match outcome {
			Ok(result) => {
				self.results.record(*result.as_ref().unwrap_or(&TestStatus::Failed));
				result
			}
			Err(payload) => {
				self.results.record(TestStatus::Failed);
				panic::resume_unwind(payload)
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn results_count_timeouts_and_interrupts_as_failures() {
		let mut results = WorkerResults::default();
		for status in [
			TestStatus::Passed,
			TestStatus::Failed,
			TestStatus::TimedOut,
			TestStatus::Interrupted,
			TestStatus::Skipped,
		] {
			results.record(status);
		}
		assert_eq!(
			results,
			WorkerResults {
				finished: 5,
				passed: 1,
				failed: 3,
				skipped: 1,
			}
		);
		assert_eq!(results.exit_code(), 1);
	}

	#[test]
	fn merge_adds_counts() {
		let mut a = WorkerResults {
			finished: 2,
			passed: 2,
			..Default::default()
		};
		let b = WorkerResults {
			finished: 3,
			passed: 1,
			failed: 1,
			skipped: 1,
		};
		a.merge(&b);
		assert_eq!(a.finished, 5);
		assert_eq!(a.passed, 3);
		assert_eq!(a.exit_code(), 1);
		assert_eq!(WorkerResults::default().exit_code(), 0);
	}

	#[test]
	fn cid_joins_indices() {
		assert_eq!(worker_cid(1, 3), "1-3");
	}

	#[test]
	fn specs_are_discovered_relative_and_sorted() {
		let dir = tempfile::TempDir::new().unwrap();
		std::fs::create_dir_all(dir.path().join("auth")).unwrap();
		std::fs::write(dir.path().join("auth/login.spec.ts"), "").unwrap();
		std::fs::write(dir.path().join("cart.test.ts"), "").unwrap();
		std::fs::write(dir.path().join("helpers.ts"), "").unwrap();

		let specs = discover_specs(dir.path()).unwrap();
		assert_eq!(specs, vec!["auth/login.spec.ts", "cart.test.ts"]);
	}

	#[tokio::test]
	async fn spec_dir_feeds_worker_config() {
		let dir = tempfile::TempDir::new().unwrap();
		std::fs::write(dir.path().join("checkout.spec.ts"), "").unwrap();

		let mut worker = Worker::new(
			ProjectOptions::default(),
			ServiceCatalog::new(),
			Arc::new(crate::testing::MockClient::new()),
		)
		.with_spec_dir(dir.path())
		.unwrap();
		worker.start(0, 0).await.unwrap();

		assert_eq!(worker.config().specs, vec!["checkout.spec.ts"]);
	}
}

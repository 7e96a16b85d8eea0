//! Typed entry points for every lifecycle phase.
//!
//! Each method builds the hook's fixed argument tuple, adapts host test info
//! into plugin shapes, and dispatches through the registry. Plugin failures
//! are logged here and never abort orchestration.

use std::sync::Arc;

use pwio_protocol::{Capabilities, HookName, TestInfo};
use tracing::warn;

use crate::adapter;
use crate::config::RunnerConfig;
use crate::error::Result;
use crate::remote::RemoteSession;
use crate::services::{HookCall, ServiceHookRegistry};
use crate::worker::WorkerResults;

#[derive(Debug, Clone)]
pub struct Hooks {
	registry: Arc<ServiceHookRegistry>,
}

impl Hooks {
	pub fn new(registry: Arc<ServiceHookRegistry>) -> Self {
		Self { registry }
	}

	pub fn registry(&self) -> &Arc<ServiceHookRegistry> {
		&self.registry
	}

	async fn run(&self, call: HookCall<'_>) {
		let hook = call.name();
		let result: Result<()> = self.registry.exec(hook.scope(), &call).await;
		if let Err(err) = result {
			warn!(target = "pwio", hook = %hook, error = %err, "hook failed, continuing");
		}
	}

	pub async fn on_prepare(&self, config: &RunnerConfig) {
		self.run(HookCall::OnPrepare {
			config,
			capabilities: &config.capabilities,
		})
		.await;
	}

	pub async fn on_worker_start(&self, cid: &str, capabilities: &Capabilities, specs: &[String], config: &RunnerConfig) {
		self.run(HookCall::OnWorkerStart {
			cid,
			capabilities,
			specs,
			config,
			exec_argv: &[],
		})
		.await;
	}

	pub async fn before_session(&self, config: &RunnerConfig, capabilities: &Capabilities, specs: &[String], cid: &str) {
		self.run(HookCall::BeforeSession {
			config,
			capabilities,
			specs,
			cid,
		})
		.await;
	}

	pub async fn before(&self, capabilities: &Capabilities, specs: &[String], session: &Arc<dyn RemoteSession>) {
		self.run(HookCall::Before {
			capabilities,
			specs,
			session,
		})
		.await;
	}

	pub async fn before_suite(&self, info: &TestInfo) {
		let suite = adapter::suite(info);
		self.run(HookCall::BeforeSuite { suite: &suite }).await;
	}

	pub async fn before_test(&self, info: &TestInfo) {
		let test = adapter::test(info);
		self.run(HookCall::BeforeTest { test: &test, context: info }).await;
	}

	/// `hook_name` is the phase the hook wraps (`beforeTest`).
	pub async fn before_hook(&self, info: &TestInfo, hook_name: HookName) {
		let test = adapter::test(info);
		self.run(HookCall::BeforeHook {
			test: &test,
			context: info,
			hook_name: hook_name.as_str(),
		})
		.await;
	}

	pub async fn after_hook(&self, info: &TestInfo, hook_name: HookName) {
		let test = adapter::test(info);
		let result = adapter::result(info);
		self.run(HookCall::AfterHook {
			test: &test,
			context: info,
			result: &result,
			hook_name: hook_name.as_str(),
		})
		.await;
	}

	pub async fn after_test(&self, info: &TestInfo) {
		let test = adapter::test(info);
		let result = adapter::result(info);
		self.run(HookCall::AfterTest {
			test: &test,
			context: info,
			result: &result,
		})
		.await;
	}

	pub async fn after_suite(&self, info: &TestInfo) {
		let suite = adapter::suite(info);
		self.run(HookCall::AfterSuite { suite: &suite }).await;
	}

	pub async fn after(&self, exit_code: i32, capabilities: &Capabilities, specs: &[String]) {
		self.run(HookCall::After {
			exit_code,
			capabilities,
			specs,
		})
		.await;
	}

	pub async fn after_session(&self, config: &RunnerConfig, capabilities: &Capabilities, specs: &[String]) {
		self.run(HookCall::AfterSession {
			config,
			capabilities,
			specs,
		})
		.await;
	}

	pub async fn on_worker_end(&self, cid: &str, exit_code: i32, specs: &[String], retries: u32) {
		self.run(HookCall::OnWorkerEnd {
			cid,
			exit_code,
			specs,
			retries,
		})
		.await;
	}

	pub async fn on_complete(&self, exit_code: i32, config: &RunnerConfig, results: &WorkerResults) {
		self.run(HookCall::OnComplete {
			exit_code,
			config,
			capabilities: &config.capabilities,
			results,
		})
		.await;
	}
}

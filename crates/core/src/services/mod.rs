//! Service plugins and their hook dispatch.
//!
//! A service implements any subset of the fixed hook vocabulary. It declares
//! the subset through [`Service::hooks`]; the registry dispatches a hook only
//! to the services that declared it, in registration order.
//!
//! Services come in two scopes:
//! - **Launcher**: constructed once per worker process, receives the
//!   `onPrepare` / `onWorkerStart` / `onWorkerEnd` / `onComplete` hooks
//! - **Worker**: constructed once per test session, receives everything else
//!
//! A [`ServiceDefinition`] may provide either part or both. Identifiers with
//! only a launcher part are "consumed" by the launcher and never constructed
//! at worker scope.

mod builtin;
mod registry;

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use pwio_protocol::{
	Capabilities, HookName, ResultDescriptor, SuiteDescriptor, TestDescriptor, TestInfo,
};
use serde_json::Value;

pub use builtin::{LoggingService, PerformanceReport, PerformanceService, ScreenshotService, TestTiming};
pub use registry::{ServiceHookRegistry, ServiceInstance, ServiceStatus};

use crate::config::RunnerConfig;
use crate::error::Result;
use crate::remote::RemoteSession;
use crate::worker::WorkerResults;

/// A lifecycle plugin.
///
/// Every hook method defaults to a no-op. Implementors override the hooks
/// they care about and list them in [`hooks`](Service::hooks).
#[async_trait]
pub trait Service: Send + Sync {
	fn name(&self) -> &str;

	/// Hooks this service implements.
	fn hooks(&self) -> &[HookName];

	async fn on_prepare(&self, _config: &RunnerConfig, _capabilities: &[Capabilities]) -> Result<()> {
		Ok(())
	}

	async fn on_worker_start(
		&self,
		_cid: &str,
		_capabilities: &Capabilities,
		_specs: &[String],
		_config: &RunnerConfig,
		_exec_argv: &[String],
	) -> Result<()> {
		Ok(())
	}

	async fn before_session(
		&self,
		_config: &RunnerConfig,
		_capabilities: &Capabilities,
		_specs: &[String],
		_cid: &str,
	) -> Result<()> {
		Ok(())
	}

	async fn before(
		&self,
		_capabilities: &Capabilities,
		_specs: &[String],
		_session: &Arc<dyn RemoteSession>,
	) -> Result<()> {
		Ok(())
	}

	async fn before_suite(&self, _suite: &SuiteDescriptor) -> Result<()> {
		Ok(())
	}

	async fn before_test(&self, _test: &TestDescriptor, _context: &TestInfo) -> Result<()> {
		Ok(())
	}

	async fn before_hook(&self, _test: &TestDescriptor, _context: &TestInfo, _hook_name: &str) -> Result<()> {
		Ok(())
	}

	async fn after_hook(
		&self,
		_test: &TestDescriptor,
		_context: &TestInfo,
		_result: &ResultDescriptor,
		_hook_name: &str,
	) -> Result<()> {
		Ok(())
	}

	async fn after_test(&self, _test: &TestDescriptor, _context: &TestInfo, _result: &ResultDescriptor) -> Result<()> {
		Ok(())
	}

	async fn after_suite(&self, _suite: &SuiteDescriptor) -> Result<()> {
		Ok(())
	}

	async fn after(&self, _exit_code: i32, _capabilities: &Capabilities, _specs: &[String]) -> Result<()> {
		Ok(())
	}

	async fn after_session(&self, _config: &RunnerConfig, _capabilities: &Capabilities, _specs: &[String]) -> Result<()> {
		Ok(())
	}

	async fn on_worker_end(&self, _cid: &str, _exit_code: i32, _specs: &[String], _retries: u32) -> Result<()> {
		Ok(())
	}

	async fn on_complete(
		&self,
		_exit_code: i32,
		_config: &RunnerConfig,
		_capabilities: &[Capabilities],
		_results: &WorkerResults,
	) -> Result<()> {
		Ok(())
	}
}

/// One hook invocation with its fixed argument tuple.
pub enum HookCall<'a> {
	OnPrepare {
		config: &'a RunnerConfig,
		capabilities: &'a [Capabilities],
	},
	OnWorkerStart {
		cid: &'a str,
		capabilities: &'a Capabilities,
		specs: &'a [String],
		config: &'a RunnerConfig,
		exec_argv: &'a [String],
	},
	BeforeSession {
		config: &'a RunnerConfig,
		capabilities: &'a Capabilities,
		specs: &'a [String],
		cid: &'a str,
	},
	Before {
		capabilities: &'a Capabilities,
		specs: &'a [String],
		session: &'a Arc<dyn RemoteSession>,
	},
	BeforeSuite {
		suite: &'a SuiteDescriptor,
	},
	BeforeTest {
		test: &'a TestDescriptor,
		context: &'a TestInfo,
	},
	BeforeHook {
		test: &'a TestDescriptor,
		context: &'a TestInfo,
		hook_name: &'a str,
	},
	AfterHook {
		test: &'a TestDescriptor,
		context: &'a TestInfo,
		result: &'a ResultDescriptor,
		hook_name: &'a str,
	},
	AfterTest {
		test: &'a TestDescriptor,
		context: &'a TestInfo,
		result: &'a ResultDescriptor,
	},
	AfterSuite {
		suite: &'a SuiteDescriptor,
	},
	After {
		exit_code: i32,
		capabilities: &'a Capabilities,
		specs: &'a [String],
	},
	AfterSession {
		config: &'a RunnerConfig,
		capabilities: &'a Capabilities,
		specs: &'a [String],
	},
	OnWorkerEnd {
		cid: &'a str,
		exit_code: i32,
		specs: &'a [String],
		retries: u32,
	},
	OnComplete {
		exit_code: i32,
		config: &'a RunnerConfig,
		capabilities: &'a [Capabilities],
		results: &'a WorkerResults,
	},
}

impl HookCall<'_> {
	pub fn name(&self) -> HookName {
		match self {
			HookCall::OnPrepare { .. } => HookName::OnPrepare,
			HookCall::OnWorkerStart { .. } => HookName::OnWorkerStart,
			HookCall::BeforeSession { .. } => HookName::BeforeSession,
			HookCall::Before { .. } => HookName::Before,
			HookCall::BeforeSuite { .. } => HookName::BeforeSuite,
			HookCall::BeforeTest { .. } => HookName::BeforeTest,
			HookCall::BeforeHook { .. } => HookName::BeforeHook,
			HookCall::AfterHook { .. } => HookName::AfterHook,
			HookCall::AfterTest { .. } => HookName::AfterTest,
			HookCall::AfterSuite { .. } => HookName::AfterSuite,
			HookCall::After { .. } => HookName::After,
			HookCall::AfterSession { .. } => HookName::AfterSession,
			HookCall::OnWorkerEnd { .. } => HookName::OnWorkerEnd,
			HookCall::OnComplete { .. } => HookName::OnComplete,
		}
	}

	/// Invokes the matching method on `service`.
	pub async fn dispatch(&self, service: &dyn Service) -> Result<()> {
		match *self {
			HookCall::OnPrepare { config, capabilities } => service.on_prepare(config, capabilities).await,
			HookCall::OnWorkerStart {
				cid,
				capabilities,
				specs,
				config,
				exec_argv,
			} => service.on_worker_start(cid, capabilities, specs, config, exec_argv).await,
			HookCall::BeforeSession {
				config,
				capabilities,
				specs,
				cid,
			} => service.before_session(config, capabilities, specs, cid).await,
			HookCall::Before {
				capabilities,
				specs,
				session,
			} => service.before(capabilities, specs, session).await,
			HookCall::BeforeSuite { suite } => service.before_suite(suite).await,
			HookCall::BeforeTest { test, context } => service.before_test(test, context).await,
			HookCall::BeforeHook {
				test,
				context,
				hook_name,
			} => service.before_hook(test, context, hook_name).await,
			HookCall::AfterHook {
				test,
				context,
				result,
				hook_name,
			} => service.after_hook(test, context, result, hook_name).await,
			HookCall::AfterTest { test, context, result } => service.after_test(test, context, result).await,
			HookCall::AfterSuite { suite } => service.after_suite(suite).await,
			HookCall::After {
				exit_code,
				capabilities,
				specs,
			} => service.after(exit_code, capabilities, specs).await,
			HookCall::AfterSession {
				config,
				capabilities,
				specs,
			} => service.after_session(config, capabilities, specs).await,
			HookCall::OnWorkerEnd {
				cid,
				exit_code,
				specs,
				retries,
			} => service.on_worker_end(cid, exit_code, specs, retries).await,
			HookCall::OnComplete {
				exit_code,
				config,
				capabilities,
				results,
			} => service.on_complete(exit_code, config, capabilities, results).await,
		}
	}
}

/// Builds a service instance from its configured options.
pub type ServiceFactory = Arc<dyn Fn(&Value) -> Result<Arc<dyn Service>> + Send + Sync>;

/// Launcher and worker constructors registered under one identifier.
#[derive(Clone)]
pub struct ServiceDefinition {
	pub id: String,
	pub launcher: Option<ServiceFactory>,
	pub worker: Option<ServiceFactory>,
}

impl ServiceDefinition {
	pub fn new(id: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			launcher: None,
			worker: None,
		}
	}

	pub fn with_launcher<F>(mut self, factory: F) -> Self
	where
		F: Fn(&Value) -> Result<Arc<dyn Service>> + Send + Sync + 'static,
	{
		self.launcher = Some(Arc::new(factory));
		self
	}

	pub fn with_worker<F>(mut self, factory: F) -> Self
	where
		F: Fn(&Value) -> Result<Arc<dyn Service>> + Send + Sync + 'static,
	{
		self.worker = Some(Arc::new(factory));
		self
	}

	/// Launcher part without a worker part.
	pub fn is_launcher_only(&self) -> bool {
		self.launcher.is_some() && self.worker.is_none()
	}
}

impl std::fmt::Debug for ServiceDefinition {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ServiceDefinition")
			.field("id", &self.id)
			.field("launcher", &self.launcher.is_some())
			.field("worker", &self.worker.is_some())
			.finish()
	}
}

/// Known service identifiers, in registration order.
#[derive(Debug, Clone, Default)]
pub struct ServiceCatalog {
	definitions: IndexMap<String, ServiceDefinition>,
}

impl ServiceCatalog {
	/// Creates an empty catalog.
	pub fn new() -> Self {
		Self::default()
	}

	/// Catalog with the `logging`, `performance` and `screenshot` services
	/// registered.
	pub fn with_builtins() -> Self {
		let mut catalog = Self::new();
		catalog.register(ServiceDefinition::new(LoggingService::ID).with_worker(|options| {
			Ok(Arc::new(LoggingService::from_options(options)) as Arc<dyn Service>)
		}));
		catalog.register(ServiceDefinition::new(PerformanceService::ID).with_worker(|options| {
			Ok(Arc::new(PerformanceService::from_options(options)) as Arc<dyn Service>)
		}));
		catalog.register(ServiceDefinition::new(ScreenshotService::ID).with_worker(|options| {
			Ok(Arc::new(ScreenshotService::from_options(options)) as Arc<dyn Service>)
		}));
		catalog
	}

	/// Adds or replaces a definition.
	pub fn register(&mut self, definition: ServiceDefinition) -> &mut Self {
		self.definitions.insert(definition.id.clone(), definition);
		self
	}

	pub fn get(&self, id: &str) -> Option<&ServiceDefinition> {
		self.definitions.get(id)
	}

	pub fn ids(&self) -> impl Iterator<Item = &str> {
		self.definitions.keys().map(String::as_str)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn builtins_are_worker_scoped() {
		let catalog = ServiceCatalog::with_builtins();
		let ids: Vec<&str> = catalog.ids().collect();
		assert_eq!(ids, vec!["logging", "performance", "screenshot"]);

		let logging = catalog.get("logging").unwrap();
		assert!(logging.worker.is_some());
		assert!(!logging.is_launcher_only());
	}

	#[test]
	fn register_replaces_existing_definition() {
		let mut catalog = ServiceCatalog::with_builtins();
		catalog.register(ServiceDefinition::new("logging").with_launcher(|options| {
			Ok(Arc::new(LoggingService::from_options(options)) as Arc<dyn Service>)
		}));

		assert!(catalog.get("logging").unwrap().is_launcher_only());
		assert_eq!(catalog.ids().count(), 3);
	}
}

//! Plugin instances and the per-hook dispatch cache.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use pwio_protocol::{HookName, HookScope, ServiceEntry};
use tracing::{debug, info, warn};

use super::{HookCall, Service, ServiceCatalog, ServiceFactory};
use crate::config::RunnerConfig;
use crate::error::{Error, HookFailure, Result};

/// A constructed plugin and the identifier it was configured under.
#[derive(Clone)]
pub struct ServiceInstance {
	pub id: String,
	pub service: Arc<dyn Service>,
}

impl std::fmt::Debug for ServiceInstance {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ServiceInstance")
			.field("id", &self.id)
			.field("hooks", &self.service.hooks())
			.finish()
	}
}

/// Snapshot of the registry for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceStatus {
	pub initialized: bool,
	pub launcher_services: Vec<String>,
	pub worker_services: Vec<String>,
	/// Identifiers owned by the launcher and skipped at worker scope.
	pub consumed: Vec<String>,
	pub cached_hooks: usize,
	/// Times a hook's plugin list was built rather than read from the cache.
	pub cache_builds: u64,
}

#[derive(Default)]
struct RegistryState {
	initialized: bool,
	launcher: Vec<ServiceInstance>,
	worker: Vec<ServiceInstance>,
	consumed: BTreeSet<String>,
	cache: HashMap<(HookScope, HookName), Vec<ServiceInstance>>,
	cache_builds: u64,
}

/// Owns the plugin instances of one worker process.
///
/// Shared through `Arc` between the worker and the session managers it
/// creates. No lock is held while a hook runs.
pub struct ServiceHookRegistry {
	catalog: ServiceCatalog,
	state: Mutex<RegistryState>,
}

impl ServiceHookRegistry {
	pub fn new(catalog: ServiceCatalog) -> Self {
		Self {
			catalog,
			state: Mutex::new(RegistryState::default()),
		}
	}

	pub fn catalog(&self) -> &ServiceCatalog {
		&self.catalog
	}

	pub fn is_initialized(&self) -> bool {
		self.state.lock().initialized
	}

	/// Constructs launcher-scoped plugins for `config.services`.
	///
	/// No-op while already initialized or when no services are configured.
	///
	/// # Errors
	///
	/// Returns [`Error::UnknownService`] for identifiers missing from the
	/// catalog, or the factory's error if construction fails. On error the
	/// registry stays uninitialized.
	pub fn init_launcher(&self, config: &RunnerConfig) -> Result<()> {
		let mut state = self.state.lock();
		if state.initialized || config.services.is_empty() {
			return Ok(());
		}

		let mut launcher = Vec::new();
		let mut consumed = BTreeSet::new();
		for entry in &config.services {
			let definition = self.definition(entry)?;
			if let Some(factory) = &definition.launcher {
				launcher.push(construct(entry, factory)?);
				if definition.worker.is_none() {
					consumed.insert(entry.id.clone());
				}
			}
		}

		info!(
			target = "pwio",
			launcher = launcher.len(),
			consumed = consumed.len(),
			"launcher services initialized"
		);

		state.launcher = launcher;
		state.consumed = consumed;
		state.initialized = true;
		state.cache.retain(|(scope, _), _| *scope != HookScope::Launcher);
		Ok(())
	}

	/// Constructs worker-scoped plugins for `config.services`, replacing any
	/// previous set. Identifiers consumed by the launcher are skipped.
	///
	/// # Errors
	///
	/// Returns [`Error::UnknownService`] for identifiers missing from the
	/// catalog, or the factory's error if construction fails.
	pub fn init_worker(&self, config: &RunnerConfig) -> Result<()> {
		let mut state = self.state.lock();

		let mut worker = Vec::new();
		for entry in &config.services {
			let definition = self.definition(entry)?;
			if state.consumed.contains(&entry.id) {
				debug!(target = "pwio", service = %entry.id, "skipping launcher-owned service");
				continue;
			}
			if let Some(factory) = &definition.worker {
				worker.push(construct(entry, factory)?);
			}
		}

		debug!(target = "pwio", worker = worker.len(), "worker services initialized");
		state.worker = worker;
		state.cache.retain(|(scope, _), _| *scope != HookScope::Worker);
		Ok(())
	}

	/// Runs a launcher-scoped hook.
	pub async fn exec_launcher(&self, call: &HookCall<'_>) -> Result<()> {
		self.exec(HookScope::Launcher, call).await
	}

	/// Runs a worker-scoped hook.
	pub async fn exec_worker(&self, call: &HookCall<'_>) -> Result<()> {
		self.exec(HookScope::Worker, call).await
	}

	/// Runs `call` on every `scope` plugin implementing it, in registration
	/// order. Every plugin runs even if an earlier one fails.
	///
	/// # Errors
	///
	/// Returns [`Error::Hook`] listing each failing plugin.
	pub async fn exec(&self, scope: HookScope, call: &HookCall<'_>) -> Result<()> {
		let hook = call.name();
		let services = self.hooked(scope, hook);
		if services.is_empty() {
			return Ok(());
		}

		let mut failures = Vec::new();
		for instance in &services {
			if let Err(err) = call.dispatch(instance.service.as_ref()).await {
				warn!(target = "pwio", hook = %hook, service = %instance.id, error = %err, "service hook failed");
				failures.push(HookFailure {
					service: instance.id.clone(),
					message: err.to_string(),
				});
			}
		}

		if failures.is_empty() {
			Ok(())
		} else {
			Err(Error::Hook { hook, failures })
		}
	}

	/// Drops every instance, the consumed set, and the hook cache.
	pub fn cleanup(&self) {
		let mut state = self.state.lock();
		let was_initialized = state.initialized;
		state.initialized = false;
		state.launcher.clear();
		state.worker.clear();
		state.consumed.clear();
		state.cache.clear();
		if was_initialized {
			debug!(target = "pwio", "services cleaned up");
		}
	}

	pub fn status(&self) -> ServiceStatus {
		let state = self.state.lock();
		let status = ServiceStatus {
			initialized: state.initialized,
			launcher_services: state.launcher.iter().map(|i| i.id.clone()).collect(),
			worker_services: state.worker.iter().map(|i| i.id.clone()).collect(),
			consumed: state.consumed.iter().cloned().collect(),
			cached_hooks: state.cache.len(),
			cache_builds: state.cache_builds,
		};
		debug!(target = "pwio", ?status, "service status");
		status
	}

	fn definition(&self, entry: &ServiceEntry) -> Result<&super::ServiceDefinition> {
		self.catalog
			.get(&entry.id)
			.ok_or_else(|| Error::UnknownService(entry.id.clone()))
	}

	fn hooked(&self, scope: HookScope, hook: HookName) -> Vec<ServiceInstance> {
		let mut state = self.state.lock();
		if let Some(cached) = state.cache.get(&(scope, hook)) {
			return cached.clone();
		}

		let instances = match scope {
			HookScope::Launcher => &state.launcher,
			HookScope::Worker => &state.worker,
		};
		let hooked: Vec<ServiceInstance> = instances
			.iter()
			.filter(|i| i.service.hooks().contains(&hook))
			.cloned()
			.collect();

		state.cache_builds += 1;
		state.cache.insert((scope, hook), hooked.clone());
		hooked
	}
}

impl std::fmt::Debug for ServiceHookRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ServiceHookRegistry")
			.field("status", &self.status())
			.finish()
	}
}

fn construct(entry: &ServiceEntry, factory: &ServiceFactory) -> Result<ServiceInstance> {
	let service = factory(&entry.options)?;
	Ok(ServiceInstance {
		id: entry.id.clone(),
		service,
	})
}

use std::sync::Arc;

use pwio_protocol::{Capabilities, HookName, RemoteConfig, TestInfo};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::SessionState;
use super::mobile::configure_remote;
use crate::adapter;
use crate::config::{ResolvedOptions, RunnerConfig};
use crate::error::{Error, Result};
use crate::hooks::Hooks;
use crate::instrument::InstrumentedSession;
use crate::recording::{RecorderSettings, RecordingSession, capture_screenshot};
use crate::remote::{RemoteClient, RemoteSession};
use crate::report::{Annotation, Reporter};

/// Opens, instruments, records and closes one test's remote session.
pub struct SessionManager {
	state: SessionState,
	hooks: Hooks,
	client: Arc<dyn RemoteClient>,
	reporter: Arc<dyn Reporter>,
	settings: RecorderSettings,
	runner: RunnerConfig,
	options: ResolvedOptions,
	cid: String,
	remote: Option<RemoteConfig>,
	/// Handle as returned by the client; recording and close use it directly.
	raw: Option<Arc<dyn RemoteSession>>,
	session: Option<Arc<dyn RemoteSession>>,
	recording: Option<RecordingSession>,
}

impl SessionManager {
	/// `runner` is the worker config with this test's options spread over it.
	pub fn new(
		hooks: Hooks,
		client: Arc<dyn RemoteClient>,
		reporter: Arc<dyn Reporter>,
		runner: RunnerConfig,
		options: ResolvedOptions,
		cid: impl Into<String>,
	) -> Self {
		Self {
			state: SessionState::Idle,
			hooks,
			client,
			reporter,
			settings: RecorderSettings::default(),
			runner,
			options,
			cid: cid.into(),
			remote: None,
			raw: None,
			session: None,
			recording: None,
		}
	}

	pub fn with_recorder_settings(mut self, settings: RecorderSettings) -> Self {
		self.settings = settings;
		self
	}

	pub fn state(&self) -> SessionState {
		self.state
	}

	/// Instrumented session, while active.
	pub fn session(&self) -> Option<&Arc<dyn RemoteSession>> {
		self.session.as_ref()
	}

	/// Config handed to the client, once configured.
	pub fn remote_config(&self) -> Option<&RemoteConfig> {
		self.remote.as_ref()
	}

	pub fn is_recording(&self) -> bool {
		self.recording.is_some()
	}

	fn transition(&mut self, to: SessionState) -> Result<()> {
		if !self.state.can_transition(to) {
			return Err(Error::InvalidState { from: self.state, to });
		}
		debug!(target = "pwio", from = ?self.state, to = ?to, "session state");
		self.state = to;
		Ok(())
	}

	fn capabilities(&self) -> &Capabilities {
		&self.options.capabilities
	}

	/// Configures the session, or skips it when no capabilities are set.
	///
	/// Returns `false` when skipped.
	///
	/// # Errors
	///
	/// Returns [`Error::InvalidState`] unless the manager is idle.
	pub fn configure(&mut self, info: &TestInfo) -> Result<bool> {
		if self.capabilities().is_empty() {
			self.transition(SessionState::Skipped)?;
			info!(target = "pwio", test = %info.title, "skipping remote session: no capabilities provided");
			return Ok(false);
		}

		self.transition(SessionState::Configuring)?;
		let remote = configure_remote(self.options.remote_config(), info.worker_index, info.is_trace_enabled());
		self.remote = Some(remote);
		Ok(true)
	}

	/// Opens the remote session and runs the before-phase hooks.
	///
	/// # Errors
	///
	/// Returns [`Error::SessionOpen`] if the client fails, the worker services'
	/// construction error if they cannot be built, or [`Error::InvalidState`]
	/// unless configured. The manager is `Closed` after an open failure.
	pub async fn open(&mut self, info: &TestInfo) -> Result<Arc<dyn RemoteSession>> {
		self.transition(SessionState::Opening)?;
		let Some(remote) = self.remote.clone() else {
			self.state = SessionState::Closed;
			return Err(Error::SessionOpen("session was not configured".into()));
		};

		if let Err(err) = self.hooks.registry().init_worker(&self.runner) {
			self.state = SessionState::Closed;
			return Err(err);
		}
		let capabilities = self.capabilities().clone();
		self.hooks
			.before_session(&self.runner, &capabilities, &self.runner.specs, &self.cid)
			.await;

		let raw = match self.client.open(&remote).await {
			Ok(session) => session,
			Err(err) => {
				self.state = SessionState::Closed;
				return Err(Error::SessionOpen(err.to_string()));
			}
		};
		info!(
			target = "pwio",
			session = raw.session_id().as_deref().unwrap_or("unknown"),
			"remote session opened"
		);

		self.annotate(&remote.capabilities, raw.as_ref());
		self.start_recording(&raw, info).await;

		let session: Arc<dyn RemoteSession> =
			Arc::new(InstrumentedSession::new(Arc::clone(&raw), Arc::clone(&self.reporter)));
		self.raw = Some(raw);
		self.session = Some(Arc::clone(&session));
		self.transition(SessionState::Active)?;

		self.hooks.before(&capabilities, &self.runner.specs, &session).await;
		self.hooks.before_suite(info).await;
		self.hooks.before_test(info).await;
		self.hooks.before_hook(info, HookName::BeforeTest).await;
		Ok(session)
	}

	/// Configures and opens in one step. `None` when skipped.
	pub async fn start(&mut self, info: &TestInfo) -> Result<Option<Arc<dyn RemoteSession>>> {
		if !self.configure(info)? {
			return Ok(None);
		}
		self.open(info).await.map(Some)
	}

	/// Runs the after-phase hooks, then screenshot, recording stop, remote
	/// close and `afterSession`, in that order.
	///
	/// Individual teardown failures are logged and do not stop later steps.
	/// A skipped session closes as a no-op.
	///
	/// # Errors
	///
	/// Returns [`Error::InvalidState`] unless the session is active.
	pub async fn close(&mut self, info: &TestInfo) -> Result<()> {
		if self.state == SessionState::Skipped {
			return Ok(());
		}
		self.transition(SessionState::Closing)?;

		let capabilities = self.capabilities().clone();
		let specs = self.runner.specs.clone();
		self.hooks.after_hook(info, HookName::AfterTest).await;
		self.hooks.after_test(info).await;
		self.hooks.after_suite(info).await;
		let exit_code = if adapter::result(info).passed { 0 } else { 1 };
		self.hooks.after(exit_code, &capabilities, &specs).await;

		self.session = None;
		if let Some(raw) = self.raw.take() {
			if self.options.take_screenshot {
				if let Err(err) = capture_screenshot(raw.as_ref(), self.reporter.as_ref(), info.status).await {
					warn!(target = "pwio", error = %err, "final screenshot failed");
				}
			}

			if let Some(recording) = self.recording.take() {
				if let Err(err) = recording.stop().await {
					warn!(target = "pwio", error = %err, "stopping recording failed");
				}
			}

			match self.client.close(raw.as_ref()).await {
				Ok(()) => debug!(target = "pwio", "remote session closed"),
				Err(err) => warn!(target = "pwio", error = %err, "closing remote session failed"),
			}
		}

		self.hooks.after_session(&self.runner, &capabilities, &specs).await;
		self.transition(SessionState::Closed)
	}

	fn annotate(&self, capabilities: &Capabilities, session: &dyn RemoteSession) {
		for (key, value) in capabilities.iter() {
			self.reporter.annotate(Annotation {
				kind: key.clone(),
				description: describe(value),
			});
		}
		if let Some(id) = session.session_id() {
			self.reporter.annotate(Annotation {
				kind: "Session ID".to_string(),
				description: id,
			});
		}
	}

	async fn start_recording(&mut self, session: &Arc<dyn RemoteSession>, info: &TestInfo) {
		let Some(options) = self.options.recording.options() else {
			return;
		};
		match RecordingSession::start(
			Arc::clone(session),
			Arc::clone(&self.reporter),
			info,
			&options,
			&self.settings,
		)
		.await
		{
			Ok(recording) => self.recording = Some(recording),
			Err(err) => warn!(target = "pwio", error = %err, "recording could not start, continuing without video"),
		}
	}
}

fn describe(value: &Value) -> String {
	match value {
		Value::String(text) => text.clone(),
		other => other.to_string(),
	}
}

#[cfg(test)]
mod tests {
	use pwio_protocol::{RecordingMode, ServiceEntry, TestStatus};
	use serde_json::json;

	use super::*;
	use crate::report::MemoryReporter;
	use crate::services::{ServiceCatalog, ServiceHookRegistry};
	use crate::testing::MockClient;

	fn manager(capabilities: Capabilities, client: Arc<MockClient>, reporter: Arc<MemoryReporter>) -> SessionManager {
		let options = ResolvedOptions {
			capabilities,
			..Default::default()
		};
		let hooks = Hooks::new(Arc::new(ServiceHookRegistry::new(ServiceCatalog::with_builtins())));
		SessionManager::new(hooks, client, reporter, RunnerConfig::default(), options, "0-0")
	}

	#[tokio::test]
	async fn empty_capabilities_skip_the_session() {
		let client = Arc::new(MockClient::new());
		let mut manager = manager(Capabilities::new(), client.clone(), Arc::new(MemoryReporter::new()));

		let info = TestInfo::new("skipped");
		assert!(manager.start(&info).await.unwrap().is_none());
		assert_eq!(manager.state(), SessionState::Skipped);
		manager.close(&info).await.unwrap();
		assert!(client.opened().is_empty());
		assert_eq!(client.closed(), 0);
	}

	#[tokio::test]
	async fn open_and_close_walk_the_state_machine() {
		let client = Arc::new(MockClient::new());
		let reporter = Arc::new(MemoryReporter::new());
		let caps = Capabilities::new().with("browserName", "chrome").with("goog:chromeOptions", json!({"args": []}));
		let mut manager = manager(caps, client.clone(), reporter.clone());

		let info = TestInfo::new("opens");
		let session = manager.start(&info).await.unwrap().unwrap();
		assert_eq!(manager.state(), SessionState::Active);
		assert!(manager.session().is_some());

		session.get_title().await.unwrap();
		assert_eq!(reporter.steps(), vec!["driver.getTitle()"]);

		let annotations = reporter.annotations();
		assert_eq!(annotations[0].kind, "browserName");
		assert_eq!(annotations[0].description, "chrome");
		assert_eq!(annotations[1].description, "{\"args\":[]}");
		assert_eq!(annotations[2].kind, "Session ID");

		manager.close(&info).await.unwrap();
		assert_eq!(manager.state(), SessionState::Closed);
		assert!(manager.session().is_none());
		assert_eq!(client.closed(), 1);
	}

	#[tokio::test]
	async fn failed_open_propagates_and_skips_recording() {
		let client = Arc::new(MockClient::new().failing_open());
		let reporter = Arc::new(MemoryReporter::new());
		let mut manager = manager(
			Capabilities::new().with("platformName", "Android"),
			client.clone(),
			reporter.clone(),
		);
		manager.options.recording = RecordingMode::Default;

		let err = manager.start(&TestInfo::new("boom")).await.err().unwrap();
		assert!(matches!(err, Error::SessionOpen(_)));
		assert_eq!(manager.state(), SessionState::Closed);
		assert!(!manager.is_recording());
		assert!(reporter.annotations().is_empty());
	}

	#[tokio::test]
	async fn device_config_reaches_the_client() {
		let client = Arc::new(MockClient::new());
		let mut manager = manager(
			Capabilities::new().with("platformName", "Android"),
			client.clone(),
			Arc::new(MemoryReporter::new()),
		);
		let mut info = TestInfo::new("device");
		info.worker_index = 4;

		manager.start(&info).await.unwrap();
		let opened = client.opened();
		assert_eq!(opened[0].capabilities.get("appium:systemPort"), Some(&json!(8214)));
		assert_eq!(opened[0].connection.port, Some(4723));
	}

	#[tokio::test]
	async fn close_before_open_is_invalid() {
		let client = Arc::new(MockClient::new());
		let mut manager = manager(
			Capabilities::new().with("browserName", "chrome"),
			client,
			Arc::new(MemoryReporter::new()),
		);
		let err = manager.close(&TestInfo::new("x")).await.unwrap_err();
		assert!(matches!(
			err,
			Error::InvalidState {
				from: SessionState::Idle,
				to: SessionState::Closing
			}
		));
	}

	#[tokio::test]
	async fn unknown_worker_service_fails_open() {
		let client = Arc::new(MockClient::new());
		let mut manager = manager(
			Capabilities::new().with("browserName", "chrome"),
			client.clone(),
			Arc::new(MemoryReporter::new()),
		);
		manager.runner.services = vec![ServiceEntry::new("missing")];

		let err = manager.start(&TestInfo::new("x")).await.err().unwrap();
		assert!(matches!(err, Error::UnknownService(_)));
		assert!(client.opened().is_empty());
	}

	#[tokio::test]
	async fn screenshot_taken_at_close_when_enabled() {
		let client = Arc::new(MockClient::new());
		let reporter = Arc::new(MemoryReporter::new());
		let mut manager = manager(
			Capabilities::new().with("browserName", "chrome"),
			client,
			reporter.clone(),
		);
		manager.options.take_screenshot = true;

		let mut info = TestInfo::new("shot");
		manager.start(&info).await.unwrap();
		info.status = Some(TestStatus::Failed);
		manager.close(&info).await.unwrap();
		assert!(reporter.attachment("screenshot").is_some());
	}
}

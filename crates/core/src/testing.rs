//! In-memory remote client, session and services for tests.
//!
//! Used by this crate's own tests and available to hosts that want to
//! exercise their integration without a remote server.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use parking_lot::Mutex;
use pwio_protocol::{
	Capabilities, CommandEvent, HookName, RemoteConfig, ResultDescriptor, SuiteDescriptor, TestDescriptor, TestInfo,
};
use serde_json::{Value, json};
use tokio::sync::broadcast;

use crate::config::RunnerConfig;
use crate::error::{Error, Result};
use crate::recording::placeholder_frame;
use crate::remote::{NativeRecordingOptions, RemoteClient, RemoteElement, RemoteSession, Script};
use crate::services::Service;
use crate::worker::WorkerResults;

const EVENT_CAPACITY: usize = 256;

/// Client that hands out [`MockSession`]s.
#[derive(Default)]
pub struct MockClient {
	fail_open: bool,
	fail_screenshots: bool,
	fail_recording_stop: bool,
	opened: Mutex<Vec<RemoteConfig>>,
	sessions: Mutex<Vec<Arc<MockSession>>>,
	closed: AtomicUsize,
}

impl MockClient {
	pub fn new() -> Self {
		Self::default()
	}

	/// Every `open` fails.
	pub fn failing_open(mut self) -> Self {
		self.fail_open = true;
		self
	}

	/// Sessions it opens fail every screenshot.
	pub fn failing_screenshots(mut self) -> Self {
		self.fail_screenshots = true;
		self
	}

	/// Sessions it opens fail to stop native recordings.
	pub fn failing_recording_stop(mut self) -> Self {
		self.fail_recording_stop = true;
		self
	}

	/// Configs passed to `open`, including failed attempts.
	pub fn opened(&self) -> Vec<RemoteConfig> {
		self.opened.lock().clone()
	}

	pub fn sessions(&self) -> Vec<Arc<MockSession>> {
		self.sessions.lock().clone()
	}

	pub fn closed(&self) -> usize {
		self.closed.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl RemoteClient for MockClient {
	async fn open(&self, config: &RemoteConfig) -> Result<Arc<dyn RemoteSession>> {
		let count = {
			let mut opened = self.opened.lock();
			opened.push(config.clone());
			opened.len()
		};
		if self.fail_open {
			return Err(Error::Remote("connection refused".into()));
		}

		let mut session = MockSession::new(format!("mock-{count}"), config.capabilities.clone());
		session.fail_screenshots = self.fail_screenshots;
		session.fail_recording_stop = self.fail_recording_stop;
		let session = Arc::new(session);
		self.sessions.lock().push(Arc::clone(&session));
		Ok(session)
	}

	async fn close(&self, _session: &dyn RemoteSession) -> Result<()> {
		self.closed.fetch_add(1, Ordering::SeqCst);
		Ok(())
	}
}

/// Session that answers every command locally.
///
/// Each `execute` is recorded and, unless disabled, broadcast as a command
/// event on `/session/:sessionId/<command>`.
pub struct MockSession {
	id: String,
	capabilities: Capabilities,
	calls: Arc<Mutex<Vec<String>>>,
	url: Mutex<String>,
	events: Option<broadcast::Sender<CommandEvent>>,
	fail_screenshots: bool,
	fail_recording_stop: bool,
}

impl MockSession {
	/// Payload returned by `stop_recording_screen`, before base64.
	pub const NATIVE_VIDEO: &'static [u8] = b"native-video";

	pub fn new(id: impl Into<String>, capabilities: Capabilities) -> Self {
		let (events, _) = broadcast::channel(EVENT_CAPACITY);
		Self {
			id: id.into(),
			capabilities,
			calls: Arc::new(Mutex::new(Vec::new())),
			url: Mutex::new("about:blank".to_string()),
			events: Some(events),
			fail_screenshots: false,
			fail_recording_stop: false,
		}
	}

	pub fn browser(id: &str) -> Self {
		Self::new(id, Capabilities::new().with("browserName", "chrome"))
	}

	pub fn android(id: &str) -> Self {
		Self::new(id, Capabilities::new().with("platformName", "Android"))
	}

	pub fn ios(id: &str) -> Self {
		Self::new(id, Capabilities::new().with("platformName", "iOS"))
	}

	/// Reports no command events.
	pub fn without_events(mut self) -> Self {
		self.events = None;
		self
	}

	/// Every screenshot fails.
	pub fn failing_screenshots(mut self) -> Self {
		self.fail_screenshots = true;
		self
	}

	/// Stopping a native recording fails.
	pub fn failing_recording_stop(mut self) -> Self {
		self.fail_recording_stop = true;
		self
	}

	/// Commands received so far, element commands included.
	pub fn calls(&self) -> Vec<String> {
		self.calls.lock().clone()
	}

	pub fn emit(&self, event: CommandEvent) {
		if let Some(events) = &self.events {
			let _ = events.send(event);
		}
	}

	fn record(&self, call: &str) {
		self.calls.lock().push(call.to_string());
	}
}

#[async_trait]
impl RemoteSession for MockSession {
	fn session_id(&self) -> Option<String> {
		Some(self.id.clone())
	}

	fn capabilities(&self) -> &Capabilities {
		&self.capabilities
	}

	async fn execute(&self, command: &str, args: Vec<Value>) -> Result<Value> {
		self.record(command);
		let (method, result) = match command {
			"url" => {
				if let Some(url) = args.first().and_then(Value::as_str) {
					*self.url.lock() = url.to_string();
				}
				("POST", Value::Null)
			}
			"getUrl" => ("GET", json!(self.url.lock().clone())),
			"getTitle" => ("GET", json!("Mock Page")),
			_ => ("POST", Value::Null),
		};

		let mut event = CommandEvent::new(method, format!("/session/:sessionId/{command}")).with_command(command);
		if method == "POST" && !args.is_empty() {
			event = event.with_body(json!({ "args": args }));
		}
		if !result.is_null() {
			event = event.with_result(result.clone());
		}
		self.emit(event);
		Ok(result)
	}

	async fn execute_script(&self, _script: &Script, args: Vec<Value>) -> Result<Value> {
		self.record("execute");
		Ok(args.into_iter().next().unwrap_or(Value::Null))
	}

	async fn find_element(&self, selector: &str) -> Result<Arc<dyn RemoteElement>> {
		self.record("$");
		Ok(Arc::new(MockElement::new(selector, Arc::clone(&self.calls))))
	}

	async fn find_elements(&self, selector: &str) -> Result<Vec<Arc<dyn RemoteElement>>> {
		self.record("$$");
		Ok((0..2)
			.map(|_| Arc::new(MockElement::new(selector, Arc::clone(&self.calls))) as Arc<dyn RemoteElement>)
			.collect())
	}

	async fn take_screenshot(&self) -> Result<String> {
		self.record("takeScreenshot");
		if self.fail_screenshots {
			return Err(Error::Remote("screenshot unavailable".into()));
		}
		Ok(STANDARD.encode(placeholder_frame()))
	}

	async fn start_recording_screen(&self, _options: &NativeRecordingOptions) -> Result<()> {
		self.record("startRecordingScreen");
		Ok(())
	}

	async fn stop_recording_screen(&self) -> Result<String> {
		self.record("stopRecordingScreen");
		if self.fail_recording_stop {
			return Err(Error::Remote("recording was not started".into()));
		}
		Ok(STANDARD.encode(Self::NATIVE_VIDEO))
	}

	fn command_events(&self) -> Option<broadcast::Receiver<CommandEvent>> {
		self.events.as_ref().map(broadcast::Sender::subscribe)
	}
}

pub struct MockElement {
	selector: String,
	calls: Arc<Mutex<Vec<String>>>,
}

impl MockElement {
	fn new(selector: &str, calls: Arc<Mutex<Vec<String>>>) -> Self {
		Self {
			selector: selector.to_string(),
			calls,
		}
	}
}

#[async_trait]
impl RemoteElement for MockElement {
	fn selector(&self) -> &str {
		&self.selector
	}

	async fn execute(&self, command: &str, _args: Vec<Value>) -> Result<Value> {
		self.calls.lock().push(format!("element.{command}"));
		Ok(match command {
			"getText" => json!(format!("text of {}", self.selector)),
			"isDisplayed" => json!(true),
			_ => Value::Null,
		})
	}
}

/// Shared, ordered log of hook invocations.
#[derive(Debug, Clone, Default)]
pub struct HookLog(Arc<Mutex<Vec<String>>>);

impl HookLog {
	pub fn push(&self, entry: impl Into<String>) {
		self.0.lock().push(entry.into());
	}

	pub fn entries(&self) -> Vec<String> {
		self.0.lock().clone()
	}

	pub fn clear(&self) {
		self.0.lock().clear();
	}
}

/// Service implementing every hook, logging `<label>:<hook>` for each call.
pub struct RecordingService {
	label: String,
	log: HookLog,
	fail_on: Option<HookName>,
}

impl RecordingService {
	pub fn new(label: impl Into<String>, log: HookLog) -> Self {
		Self {
			label: label.into(),
			log,
			fail_on: None,
		}
	}

	/// Fails `hook` after logging it.
	pub fn failing_on(mut self, hook: HookName) -> Self {
		self.fail_on = Some(hook);
		self
	}

	fn hit(&self, hook: HookName) -> Result<()> {
		self.log.push(format!("{}:{hook}", self.label));
		if self.fail_on == Some(hook) {
			return Err(Error::service(format!("{} refused {hook}", self.label)));
		}
		Ok(())
	}
}

#[async_trait]
impl Service for RecordingService {
	fn name(&self) -> &str {
		&self.label
	}

	fn hooks(&self) -> &[HookName] {
		&HookName::ALL
	}

	async fn on_prepare(&self, _config: &RunnerConfig, _capabilities: &[Capabilities]) -> Result<()> {
		self.hit(HookName::OnPrepare)
	}

	async fn on_worker_start(
		&self,
		_cid: &str,
		_capabilities: &Capabilities,
		_specs: &[String],
		_config: &RunnerConfig,
		_exec_argv: &[String],
	) -> Result<()> {
		self.hit(HookName::OnWorkerStart)
	}

	async fn before_session(
		&self,
		_config: &RunnerConfig,
		_capabilities: &Capabilities,
		_specs: &[String],
		_cid: &str,
	) -> Result<()> {
		self.hit(HookName::BeforeSession)
	}

	async fn before(&self, _capabilities: &Capabilities, _specs: &[String], _session: &Arc<dyn RemoteSession>) -> Result<()> {
		self.hit(HookName::Before)
	}

	async fn before_suite(&self, _suite: &SuiteDescriptor) -> Result<()> {
		self.hit(HookName::BeforeSuite)
	}

	async fn before_test(&self, _test: &TestDescriptor, _context: &TestInfo) -> Result<()> {
		self.hit(HookName::BeforeTest)
	}

	async fn before_hook(&self, _test: &TestDescriptor, _context: &TestInfo, _hook_name: &str) -> Result<()> {
		self.hit(HookName::BeforeHook)
	}

	async fn after_hook(
		&self,
		_test: &TestDescriptor,
		_context: &TestInfo,
		_result: &ResultDescriptor,
		_hook_name: &str,
	) -> Result<()> {
		self.hit(HookName::AfterHook)
	}

	async fn after_test(&self, _test: &TestDescriptor, _context: &TestInfo, _result: &ResultDescriptor) -> Result<()> {
		self.hit(HookName::AfterTest)
	}

	async fn after_suite(&self, _suite: &SuiteDescriptor) -> Result<()> {
		self.hit(HookName::AfterSuite)
	}

	async fn after(&self, _exit_code: i32, _capabilities: &Capabilities, _specs: &[String]) -> Result<()> {
		self.hit(HookName::After)
	}

	async fn after_session(&self, _config: &RunnerConfig, _capabilities: &Capabilities, _specs: &[String]) -> Result<()> {
		self.hit(HookName::AfterSession)
	}

	async fn on_worker_end(&self, _cid: &str, _exit_code: i32, _specs: &[String], _retries: u32) -> Result<()> {
		self.hit(HookName::OnWorkerEnd)
	}

	async fn on_complete(
		&self,
		_exit_code: i32,
		_config: &RunnerConfig,
		_capabilities: &[Capabilities],
		_results: &WorkerResults,
	) -> Result<()> {
		self.hit(HookName::OnComplete)
	}
}

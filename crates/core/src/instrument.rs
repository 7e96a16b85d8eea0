//! Call-logging decorators for remote sessions and elements.
//!
//! Every call through an [`InstrumentedSession`] is reported as a step titled
//! `driver.<method>(<args>)`. Element lookups return [`InstrumentedElement`]s
//! whose calls are reported as `element.<method>(..)` (from `$`) or
//! `elements.<method>(..)` (from `$$`).

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use pwio_protocol::{Capabilities, CommandEvent};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::Result;
use crate::remote::{NativeRecordingOptions, RemoteElement, RemoteSession, Script};
use crate::report::Reporter;

/// Promise-chaining names never reported as element steps.
const UNLOGGED_ELEMENT_METHODS: &[&str] = &["then", "catch", "finally"];

/// One argument as it appears in a step title.
pub enum StepArg<'a> {
	Json(&'a Value),
	Script(&'a Script),
	Text(&'a str),
}

impl fmt::Display for StepArg<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			StepArg::Json(value) => match serde_json::to_string(value) {
				Ok(json) => f.write_str(&json),
				Err(_) => write!(f, "{value}"),
			},
			StepArg::Script(script) => write!(f, "{script}"),
			StepArg::Text(text) => f.write_str(text),
		}
	}
}

/// `<receiver>.<method>(<arg>, <arg>)`
pub fn step_title(receiver: &str, method: &str, args: &[StepArg<'_>]) -> String {
	let args = args.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
	format!("{receiver}.{method}({args})")
}

fn json_args(args: &[Value]) -> Vec<StepArg<'_>> {
	args.iter().map(StepArg::Json).collect()
}

/// Decorates a session so each call is reported as a step.
pub struct InstrumentedSession {
	inner: Arc<dyn RemoteSession>,
	reporter: Arc<dyn Reporter>,
}

impl InstrumentedSession {
	pub fn new(inner: Arc<dyn RemoteSession>, reporter: Arc<dyn Reporter>) -> Self {
		Self { inner, reporter }
	}

	/// Undecorated session.
	pub fn inner(&self) -> &Arc<dyn RemoteSession> {
		&self.inner
	}

	fn record(&self, method: &str, args: &[StepArg<'_>]) {
		let title = step_title("driver", method, args);
		debug!(target = "pwio", step = %title, "driver call");
		self.reporter.step(&title);
	}

	fn wrap(&self, element: Arc<dyn RemoteElement>, receiver: &'static str) -> Arc<dyn RemoteElement> {
		Arc::new(InstrumentedElement {
			inner: element,
			receiver,
			reporter: Arc::clone(&self.reporter),
		})
	}
}

#[async_trait]
impl RemoteSession for InstrumentedSession {
	fn session_id(&self) -> Option<String> {
		self.inner.session_id()
	}

	fn capabilities(&self) -> &Capabilities {
		self.inner.capabilities()
	}

	fn is_android(&self) -> bool {
		self.inner.is_android()
	}

	fn is_ios(&self) -> bool {
		self.inner.is_ios()
	}

	fn is_mobile(&self) -> bool {
		self.inner.is_mobile()
	}

	fn is_desktop_browser(&self) -> bool {
		self.inner.is_desktop_browser()
	}

	async fn execute(&self, command: &str, args: Vec<Value>) -> Result<Value> {
		self.record(command, &json_args(&args));
		self.inner.execute(command, args).await
	}

	async fn execute_script(&self, script: &Script, args: Vec<Value>) -> Result<Value> {
		let mut step_args = vec![StepArg::Script(script)];
		step_args.extend(json_args(&args));
		self.record("execute", &step_args);
		self.inner.execute_script(script, args).await
	}

	async fn find_element(&self, selector: &str) -> Result<Arc<dyn RemoteElement>> {
		let selector_value = Value::from(selector);
		self.record("$", &[StepArg::Json(&selector_value)]);
		let element = self.inner.find_element(selector).await?;
		Ok(self.wrap(element, "element"))
	}

	async fn find_elements(&self, selector: &str) -> Result<Vec<Arc<dyn RemoteElement>>> {
		let selector_value = Value::from(selector);
		self.record("$$", &[StepArg::Json(&selector_value)]);
		let elements = self.inner.find_elements(selector).await?;
		Ok(elements.into_iter().map(|e| self.wrap(e, "elements")).collect())
	}

	async fn take_screenshot(&self) -> Result<String> {
		self.record("takeScreenshot", &[]);
		self.inner.take_screenshot().await
	}

	async fn start_recording_screen(&self, options: &NativeRecordingOptions) -> Result<()> {
		let value = serde_json::to_value(options)?;
		self.record("startRecordingScreen", &[StepArg::Json(&value)]);
		self.inner.start_recording_screen(options).await
	}

	async fn stop_recording_screen(&self) -> Result<String> {
		self.record("stopRecordingScreen", &[]);
		self.inner.stop_recording_screen().await
	}

	fn command_events(&self) -> Option<broadcast::Receiver<CommandEvent>> {
		self.inner.command_events()
	}
}

/// Decorates an element handle so each call is reported as a step.
pub struct InstrumentedElement {
	inner: Arc<dyn RemoteElement>,
	receiver: &'static str,
	reporter: Arc<dyn Reporter>,
}

#[async_trait]
impl RemoteElement for InstrumentedElement {
	fn selector(&self) -> &str {
		self.inner.selector()
	}

	async fn execute(&self, command: &str, args: Vec<Value>) -> Result<Value> {
		if !UNLOGGED_ELEMENT_METHODS.contains(&command) {
			let title = step_title(self.receiver, command, &json_args(&args));
			debug!(target = "pwio", step = %title, "element call");
			self.reporter.step(&title);
		}
		self.inner.execute(command, args).await
	}
}

//! The host test framework's view of the running test.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Outcome reported by the host framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TestStatus {
	Passed,
	Failed,
	TimedOut,
	Skipped,
	Interrupted,
}

impl TestStatus {
	pub fn as_str(self) -> &'static str {
		match self {
			TestStatus::Passed => "passed",
			TestStatus::Failed => "failed",
			TestStatus::TimedOut => "timedOut",
			TestStatus::Skipped => "skipped",
			TestStatus::Interrupted => "interrupted",
		}
	}

	/// Statuses after which a final screenshot is meaningful.
	pub fn is_terminal(self) -> bool {
		!matches!(self, TestStatus::Skipped)
	}

	/// Whether the status counts as a failure in aggregated results.
	pub fn is_failure(self) -> bool {
		matches!(self, TestStatus::Failed | TestStatus::TimedOut | TestStatus::Interrupted)
	}
}

/// Error attached to a failed test.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestError {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub stack: Option<String>,
	/// Underlying cause, when the host framework tracks one.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub cause: Option<String>,
}

impl TestError {
	pub fn from_message(message: impl Into<String>) -> Self {
		Self {
			message: Some(message.into()),
			..Default::default()
		}
	}
}

/// Host trace setting; anything but `Off` enables the device live preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TraceMode {
	#[default]
	Off,
	On,
	RetainOnFailure,
	OnFirstRetry,
}

/// Test information supplied by the host framework.
///
/// Every field except `title` may be absent; consumers fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestInfo {
	pub title: String,
	/// Describe-block titles followed by the test title.
	#[serde(default)]
	pub title_path: Vec<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub file: Option<PathBuf>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub project_name: Option<String>,
	#[serde(default)]
	pub worker_index: u32,
	#[serde(default)]
	pub parallel_index: u32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub status: Option<TestStatus>,
	/// Current retry attempt, starting at 0.
	#[serde(default)]
	pub retry: u32,
	/// Configured retry limit.
	#[serde(default)]
	pub retries: u32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<TestError>,
	#[serde(default, with = "duration_ms")]
	pub duration: Duration,
	#[serde(default)]
	pub trace: TraceMode,
}

impl TestInfo {
	pub fn new(title: impl Into<String>) -> Self {
		let title = title.into();
		Self {
			title_path: vec![title.clone()],
			title,
			..Default::default()
		}
	}

	/// Parent segment of the title path, if the test sits inside a describe block.
	pub fn parent_title(&self) -> Option<&str> {
		let len = self.title_path.len();
		if len < 2 {
			return None;
		}
		let parent = self.title_path[len - 2].trim();
		(!parent.is_empty()).then_some(parent)
	}

	pub fn is_trace_enabled(&self) -> bool {
		self.trace != TraceMode::Off
	}
}

mod duration_ms {
	use std::time::Duration;

	use serde::{Deserialize, Deserializer, Serializer};

	pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_u64(duration.as_millis() as u64)
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
		u64::deserialize(deserializer).map(Duration::from_millis)
	}
}

//! Screen recording tied to a session's lifetime.
//!
//! Two strategies:
//! - [`NativeRecording`] asks the device to record itself (mobile sessions)
//! - [`FrameRecording`] polls screenshots into a temp directory and runs an
//!   external encoder on stop (desktop browser sessions)
//!
//! [`RecordingSession`] picks one from the session's capability flags.

mod encode;
mod frames;
mod naming;
mod native;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use pwio_protocol::{RecorderOptions, TestInfo, TestStatus};
use tracing::debug;

pub use encode::{QualityPreset, codec, encoder_args};
pub use frames::{FrameRecording, fill_frame_gaps, frame_file_name, list_frames, missing_frames, placeholder_frame};
pub use naming::{MAX_NAME_LEN, recording_name, sanitize};
pub use native::{MAX_TIME_LIMIT, NativeRecording, native_options};

use crate::error::Result;
use crate::remote::RemoteSession;
use crate::report::{Attachment, Reporter};

/// Where and how local recordings are produced.
#[derive(Debug, Clone)]
pub struct RecorderSettings {
	/// Parent of each recording's frame directory.
	pub output_root: PathBuf,
	/// Encoder binary; discovered on `PATH` when unset.
	pub encoder: Option<PathBuf>,
	pub frame_interval: Duration,
}

impl Default for RecorderSettings {
	fn default() -> Self {
		Self {
			output_root: std::env::temp_dir(),
			encoder: None,
			frame_interval: Duration::from_millis(500),
		}
	}
}

impl RecorderSettings {
	pub fn with_output_root(mut self, root: impl Into<PathBuf>) -> Self {
		self.output_root = root.into();
		self
	}

	pub fn with_encoder(mut self, encoder: impl Into<PathBuf>) -> Self {
		self.encoder = Some(encoder.into());
		self
	}

	pub fn with_frame_interval(mut self, interval: Duration) -> Self {
		self.frame_interval = interval;
		self
	}
}

/// A running recording of either kind.
pub enum RecordingSession {
	Native(NativeRecording),
	Local(FrameRecording),
}

impl RecordingSession {
	/// Starts recording `session`: natively on devices, by frame capture on
	/// desktop browsers.
	///
	/// # Errors
	///
	/// Returns [`Error::Recording`](crate::Error::Recording) if the device
	/// refuses to record, or an I/O error if the frame directory cannot be
	/// created.
	pub async fn start(
		session: Arc<dyn RemoteSession>,
		reporter: Arc<dyn Reporter>,
		info: &TestInfo,
		options: &RecorderOptions,
		settings: &RecorderSettings,
	) -> Result<Self> {
		let options = options.resolve();
		if session.is_desktop_browser() {
			let name = recording_name(info);
			FrameRecording::start(session, reporter, &name, options, settings)
				.await
				.map(RecordingSession::Local)
		} else {
			NativeRecording::start(session, reporter, options)
				.await
				.map(RecordingSession::Native)
		}
	}

	pub fn is_native(&self) -> bool {
		matches!(self, RecordingSession::Native(_))
	}

	/// Stops recording and attaches the video.
	pub async fn stop(self) -> Result<()> {
		match self {
			RecordingSession::Native(recording) => recording.stop().await,
			RecordingSession::Local(recording) => recording.stop().await,
		}
	}
}

/// Attaches a final screenshot when `status` is terminal.
///
/// Returns whether a screenshot was taken.
pub async fn capture_screenshot(
	session: &dyn RemoteSession,
	reporter: &dyn Reporter,
	status: Option<TestStatus>,
) -> Result<bool> {
	let Some(status) = status.filter(|s| s.is_terminal()) else {
		return Ok(false);
	};

	let payload = session.take_screenshot().await?;
	let body = STANDARD.decode(payload.trim())?;
	reporter.attach("screenshot", Attachment::new(body, "image/png"));
	debug!(target = "pwio", status = status.as_str(), "final screenshot attached");
	Ok(true)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::report::MemoryReporter;
	use crate::testing::MockSession;

	#[tokio::test]
	async fn screenshot_only_for_terminal_statuses() {
		let session = MockSession::browser("s-1");
		let reporter = MemoryReporter::new();

		assert!(!capture_screenshot(&session, &reporter, None).await.unwrap());
		assert!(!capture_screenshot(&session, &reporter, Some(TestStatus::Skipped)).await.unwrap());
		assert!(reporter.attachments().is_empty());

		assert!(capture_screenshot(&session, &reporter, Some(TestStatus::TimedOut)).await.unwrap());
		let shot = reporter.attachment("screenshot").unwrap();
		assert_eq!(shot.content_type, "image/png");
		assert_eq!(shot.body, placeholder_frame());
	}

	#[tokio::test]
	async fn device_sessions_record_natively() {
		let session = Arc::new(MockSession::ios("i-1"));
		let reporter = Arc::new(MemoryReporter::new());
		let recording = RecordingSession::start(
			session,
			reporter,
			&TestInfo::new("t"),
			&RecorderOptions::default(),
			&RecorderSettings::default(),
		)
		.await
		.unwrap();
		assert!(recording.is_native());
	}
}

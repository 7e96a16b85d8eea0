//! On-device recording for mobile sessions.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use pwio_protocol::ResolvedRecorderOptions;
use tracing::debug;

use crate::error::{Error, Result};
use crate::remote::{NativeRecordingOptions, RemoteSession};
use crate::report::{Attachment, Reporter};

/// Longest native recording the device side accepts, in seconds.
pub const MAX_TIME_LIMIT: u32 = 1800;

pub fn native_options(options: &ResolvedRecorderOptions) -> NativeRecordingOptions {
	NativeRecordingOptions {
		video_type: options.video_type.extension().to_string(),
		video_quality: options.quality.label(),
		time_limit: options.max_duration_secs().clamp(1, MAX_TIME_LIMIT),
	}
}

/// A recording running on the device.
pub struct NativeRecording {
	session: Arc<dyn RemoteSession>,
	reporter: Arc<dyn Reporter>,
	options: ResolvedRecorderOptions,
}

impl NativeRecording {
	pub async fn start(
		session: Arc<dyn RemoteSession>,
		reporter: Arc<dyn Reporter>,
		options: ResolvedRecorderOptions,
	) -> Result<Self> {
		let native = native_options(&options);
		session
			.start_recording_screen(&native)
			.await
			.map_err(|e| Error::Recording(format!("failed to start device recording: {e}")))?;
		debug!(target = "pwio", time_limit = native.time_limit, "device recording started");
		Ok(Self {
			session,
			reporter,
			options,
		})
	}

	/// Stops the device recording and attaches the decoded video.
	pub async fn stop(self) -> Result<()> {
		let payload = self
			.session
			.stop_recording_screen()
			.await
			.map_err(|e| Error::Recording(format!("failed to stop device recording: {e}")))?;
		let body = STANDARD.decode(payload.trim())?;
		if body.is_empty() {
			return Err(Error::Recording("device returned an empty video".into()));
		}

		let content_type = format!("video/{}", self.options.video_type.extension());
		debug!(target = "pwio", bytes = body.len(), "device recording attached");
		self.reporter.attach("video", Attachment::new(body, content_type));
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use pwio_protocol::{Quality, VideoType};

	use super::*;
	use crate::report::MemoryReporter;
	use crate::testing::MockSession;

	#[test]
	fn time_limit_is_clamped() {
		let mut options = ResolvedRecorderOptions::default();
		assert_eq!(native_options(&options).time_limit, 180);

		options.max_duration = 0;
		assert_eq!(native_options(&options).time_limit, 180);

		options.max_duration = 7200;
		assert_eq!(native_options(&options).time_limit, MAX_TIME_LIMIT);
	}

	#[test]
	fn quality_is_sent_as_label() {
		let options = ResolvedRecorderOptions {
			video_type: VideoType::Webm,
			quality: Quality::Crf(28),
			max_duration: 60,
		};
		let native = native_options(&options);
		assert_eq!(native.video_type, "webm");
		assert_eq!(native.video_quality, "28");
	}

	#[tokio::test]
	async fn stop_attaches_decoded_video() {
		let session = Arc::new(MockSession::android("a-1"));
		let reporter = Arc::new(MemoryReporter::new());

		let recording = NativeRecording::start(session.clone(), reporter.clone(), ResolvedRecorderOptions::default())
			.await
			.unwrap();
		assert_eq!(session.calls(), vec!["startRecordingScreen"]);

		recording.stop().await.unwrap();
		let video = reporter.attachment("video").unwrap();
		assert_eq!(video.content_type, "video/mp4");
		assert_eq!(video.body, MockSession::NATIVE_VIDEO);
	}
}

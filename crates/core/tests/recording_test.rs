// Integration tests for frame-capture and native recording
//
// The encoder is a shell script standing in for ffmpeg, so these run on unix only.
//
// Tests cover:
// - frames captured during a test are encoded and attached as video
// - frame directory removed after success, failure, and timeout
// - failed screenshots written as placeholder frames
// - zero max duration falling back to the default encoder budget
// - native recording for device sessions

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use pwio::recording::{FrameRecording, list_frames, placeholder_frame};
use pwio::testing::{MockClient, MockSession};
use pwio::{
	Capabilities, MemoryReporter, ProjectOptions, RecorderSettings, RecordingMode, ServiceCatalog, TestContext,
	TestInfo, TestOptions, TestStatus, Worker,
};
use pwio_protocol::ResolvedRecorderOptions;
use tempfile::TempDir;

const ENCODER_OK: &str = r#"#!/bin/sh
for last; do :; done
ls "$(dirname "$last")"/0000.png >/dev/null || exit 3
printf 'encoded-video' > "$last"
"#;

const ENCODER_SLOW_OK: &str = r#"#!/bin/sh
for last; do :; done
sleep 0.3
printf 'encoded-video' > "$last"
"#;

const ENCODER_FAILS: &str = "#!/bin/sh\necho 'Unknown encoder libx264' >&2\nexit 1\n";

const ENCODER_HANGS: &str = "#!/bin/sh\nexec sleep 30\n";

fn write_encoder(dir: &TempDir, script: &str) -> PathBuf {
	let path = dir.path().join("fake-ffmpeg");
	std::fs::write(&path, script).expect("Failed to write encoder script");
	std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("Failed to chmod encoder script");
	path
}

fn settings(output: &TempDir, encoder: PathBuf) -> RecorderSettings {
	RecorderSettings::default()
		.with_output_root(output.path())
		.with_encoder(encoder)
		.with_frame_interval(Duration::from_millis(20))
}

fn is_empty_dir(path: &Path) -> bool {
	std::fs::read_dir(path).map(|mut entries| entries.next().is_none()).unwrap_or(false)
}

#[tokio::test]
async fn test_browser_test_is_recorded_and_attached() {
	let tools = TempDir::new().unwrap();
	let output = TempDir::new().unwrap();
	let project = ProjectOptions {
		capabilities: Capabilities::new().with("browserName", "chrome"),
		recording_screen: Some(RecordingMode::Default),
		..Default::default()
	};
	let client = Arc::new(MockClient::new());
	let mut worker = Worker::new(project, ServiceCatalog::with_builtins(), client.clone())
		.with_recorder_settings(settings(&output, write_encoder(&tools, ENCODER_OK)));
	worker.start(0, 0).await.expect("Failed to start worker");

	let reporter = Arc::new(MemoryReporter::new());
	let mut info = TestInfo::new("checkout flow");
	let status = worker
		.run_test(&TestOptions::default(), &mut info, reporter.clone(), |_ctx: TestContext| async move {
			tokio::time::sleep(Duration::from_millis(120)).await;
			Ok::<(), pwio::Error>(())
		})
		.await
		.expect("Failed to run test");

	assert_eq!(status, TestStatus::Passed);
	let video = reporter.attachment("video").expect("video should be attached");
	assert_eq!(video.content_type, "video/mp4");
	assert_eq!(video.body, b"encoded-video");
	assert!(is_empty_dir(output.path()), "frame directory should be removed");

	let calls = client.sessions()[0].calls();
	assert!(calls.iter().any(|c| c == "takeScreenshot"));
}

#[tokio::test]
async fn test_failed_screenshots_become_placeholder_frames() {
	let tools = TempDir::new().unwrap();
	let output = TempDir::new().unwrap();
	let session = Arc::new(MockSession::browser("s-1").failing_screenshots());
	let reporter = Arc::new(MemoryReporter::new());

	let recording = FrameRecording::start(
		session,
		reporter.clone(),
		"placeholder-test",
		ResolvedRecorderOptions::default(),
		&settings(&output, write_encoder(&tools, ENCODER_OK)),
	)
	.await
	.expect("Failed to start recording");
	tokio::time::sleep(Duration::from_millis(80)).await;

	let frames = list_frames(recording.frame_dir()).unwrap();
	assert!(!frames.is_empty());
	let first = std::fs::read(recording.frame_dir().join("0000.png")).unwrap();
	assert_eq!(first, placeholder_frame());

	recording.stop().await.expect("Failed to stop recording");
	assert!(reporter.attachment("video").is_some());
}

#[tokio::test]
async fn test_encoder_failure_still_cleans_up() {
	let tools = TempDir::new().unwrap();
	let output = TempDir::new().unwrap();
	let reporter = Arc::new(MemoryReporter::new());

	let recording = FrameRecording::start(
		Arc::new(MockSession::browser("s-1")),
		reporter.clone(),
		"broken-encoder",
		ResolvedRecorderOptions::default(),
		&settings(&output, write_encoder(&tools, ENCODER_FAILS)),
	)
	.await
	.unwrap();
	tokio::time::sleep(Duration::from_millis(50)).await;

	let err = recording.stop().await.unwrap_err();
	assert!(matches!(err, pwio::Error::Recording(ref msg) if msg.contains("Unknown encoder")));
	assert!(reporter.attachments().is_empty());
	assert!(is_empty_dir(output.path()));
}

#[tokio::test]
async fn test_encoder_timeout_kills_process() {
	let tools = TempDir::new().unwrap();
	let output = TempDir::new().unwrap();
	let options = ResolvedRecorderOptions {
		max_duration: 1,
		..Default::default()
	};

	let recording = FrameRecording::start(
		Arc::new(MockSession::browser("s-1")),
		Arc::new(MemoryReporter::new()),
		"slow-encoder",
		options,
		&settings(&output, write_encoder(&tools, ENCODER_HANGS)),
	)
	.await
	.unwrap();
	tokio::time::sleep(Duration::from_millis(50)).await;

	let started = std::time::Instant::now();
	let err = recording.stop().await.unwrap_err();
	assert!(matches!(err, pwio::Error::EncodeTimeout { secs: 1 }));
	assert!(started.elapsed() < Duration::from_secs(10));
	assert!(is_empty_dir(output.path()));
}

#[tokio::test]
async fn test_zero_max_duration_uses_default_budget() {
	let tools = TempDir::new().unwrap();
	let output = TempDir::new().unwrap();
	let reporter = Arc::new(MemoryReporter::new());
	let options = ResolvedRecorderOptions {
		max_duration: 0,
		..Default::default()
	};

	let recording = FrameRecording::start(
		Arc::new(MockSession::browser("s-1")),
		reporter.clone(),
		"unbounded",
		options,
		&settings(&output, write_encoder(&tools, ENCODER_SLOW_OK)),
	)
	.await
	.expect("Failed to start recording");
	tokio::time::sleep(Duration::from_millis(50)).await;

	recording.stop().await.expect("Failed to encode with default budget");
	let video = reporter.attachment("video").expect("video should be attached");
	assert_eq!(video.body, b"encoded-video");
	assert!(is_empty_dir(output.path()));
}

#[tokio::test]
async fn test_device_sessions_use_native_recording() {
	let output = TempDir::new().unwrap();
	let project = ProjectOptions {
		capabilities: Capabilities::new().with("platformName", "Android"),
		recording_screen: Some(RecordingMode::Default),
		..Default::default()
	};
	let client = Arc::new(MockClient::new());
	let mut worker = Worker::new(project, ServiceCatalog::with_builtins(), client.clone())
		.with_recorder_settings(RecorderSettings::default().with_output_root(output.path()));
	worker.start(0, 0).await.unwrap();

	let reporter = Arc::new(MemoryReporter::new());
	let mut info = TestInfo::new("device video");
	worker
		.run_test(&TestOptions::default(), &mut info, reporter.clone(), |_ctx: TestContext| async move {
			Ok::<(), pwio::Error>(())
		})
		.await
		.unwrap();

	let video = reporter.attachment("video").expect("native video should be attached");
	assert_eq!(video.content_type, "video/mp4");
	assert_eq!(video.body, MockSession::NATIVE_VIDEO);
	assert_eq!(
		client.sessions()[0].calls(),
		vec!["startRecordingScreen", "stopRecordingScreen"]
	);
	assert!(is_empty_dir(output.path()));
}

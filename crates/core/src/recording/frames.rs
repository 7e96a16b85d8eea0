//! Local frame-capture recording for desktop browser sessions.
//!
//! Screenshots are polled into `<root>/<name>/NNNN.png` while the test runs.
//! On stop, gaps in the numbering are filled with the nearest preceding
//! frame, the encoder turns the sequence into `<root>/<name>/<name>.<ext>`,
//! and the video is attached. The frame directory is always removed.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use pwio_protocol::ResolvedRecorderOptions;
use pwio_runtime::EncoderProcess;
use regex::Regex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use super::RecorderSettings;
use super::encode::encoder_args;
use crate::error::{Error, Result};
use crate::remote::RemoteSession;
use crate::report::{Attachment, Reporter};

/// 1x1 transparent PNG written when a screenshot fails.
const PLACEHOLDER_PNG: &str =
	"iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

/// How long stop waits for an in-flight screenshot before aborting the poller.
const CAPTURE_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

static FRAME_FILE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{4,})\.png$").expect("static regex"));

pub fn frame_file_name(index: u32) -> String {
	format!("{index:04}.png")
}

pub fn placeholder_frame() -> Vec<u8> {
	STANDARD.decode(PLACEHOLDER_PNG).unwrap_or_default()
}

/// Sorted frame indices present in `dir`.
pub fn list_frames(dir: &Path) -> Result<Vec<u32>> {
	let pattern = format!("{}/*.png", glob::Pattern::escape(&dir.to_string_lossy()));
	let paths = glob::glob(&pattern).map_err(|e| Error::Recording(format!("bad frame pattern: {e}")))?;

	let mut frames: Vec<u32> = paths
		.filter_map(|entry| entry.ok())
		.filter_map(|path| {
			let name = path.file_name()?.to_str()?.to_string();
			FRAME_FILE.captures(&name)?.get(1)?.as_str().parse().ok()
		})
		.collect();
	frames.sort_unstable();
	frames.dedup();
	Ok(frames)
}

/// `(missing, previous)` pairs for every index absent between the first and
/// last of `frames`, which must be sorted.
pub fn missing_frames(frames: &[u32]) -> Vec<(u32, u32)> {
	let (Some(&first), Some(&last)) = (frames.first(), frames.last()) else {
		return Vec::new();
	};

	let mut missing = Vec::new();
	let mut present = frames.iter().peekable();
	let mut previous = first;
	for index in first..=last {
		if present.peek() == Some(&&index) {
			present.next();
			previous = index;
		} else {
			missing.push((index, previous));
		}
	}
	missing
}

/// Copies the nearest preceding frame into every gap. Returns the filled indices.
pub fn fill_frame_gaps(dir: &Path, frames: &[u32]) -> Result<Vec<u32>> {
	let missing = missing_frames(frames);
	for (index, previous) in &missing {
		std::fs::copy(dir.join(frame_file_name(*previous)), dir.join(frame_file_name(*index)))?;
	}
	if !missing.is_empty() {
		debug!(target = "pwio", filled = missing.len(), "interpolated missing frames");
	}
	Ok(missing.into_iter().map(|(index, _)| index).collect())
}

/// An in-progress frame-capture recording.
pub struct FrameRecording {
	dir: PathBuf,
	video_path: PathBuf,
	options: ResolvedRecorderOptions,
	encoder: Option<PathBuf>,
	reporter: Arc<dyn Reporter>,
	frames: Arc<AtomicU32>,
	stop: Option<oneshot::Sender<()>>,
	task: Option<JoinHandle<()>>,
}

impl FrameRecording {
	/// Creates the frame directory and starts polling screenshots.
	pub async fn start(
		session: Arc<dyn RemoteSession>,
		reporter: Arc<dyn Reporter>,
		name: &str,
		options: ResolvedRecorderOptions,
		settings: &RecorderSettings,
	) -> Result<Self> {
		let dir = settings.output_root.join(name);
		tokio::fs::create_dir_all(&dir).await?;
		let video_path = dir.join(format!("{name}.{}", options.video_type.extension()));

		let frames = Arc::new(AtomicU32::new(0));
		let (stop_tx, stop_rx) = oneshot::channel();
		let task = tokio::spawn(capture_frames(
			session,
			dir.clone(),
			Arc::clone(&frames),
			settings.frame_interval,
			stop_rx,
		));

		debug!(target = "pwio", dir = %dir.display(), "frame capture started");
		Ok(Self {
			dir,
			video_path,
			options,
			encoder: settings.encoder.clone(),
			reporter,
			frames,
			stop: Some(stop_tx),
			task: Some(task),
		})
	}

	pub fn frame_dir(&self) -> &Path {
		&self.dir
	}

	/// Frames requested so far.
	pub fn frame_count(&self) -> u32 {
		self.frames.load(Ordering::SeqCst)
	}

	/// Stops polling, encodes and attaches the video, then removes the frame
	/// directory whatever the outcome.
	pub async fn stop(mut self) -> Result<()> {
		self.halt_capture().await;
		let result = self.encode_and_attach().await;
		self.cleanup().await;
		result
	}

	async fn halt_capture(&mut self) {
		if let Some(stop) = self.stop.take() {
			let _ = stop.send(());
		}
		if let Some(mut task) = self.task.take() {
			if tokio::time::timeout(CAPTURE_SHUTDOWN_GRACE, &mut task).await.is_err() {
				warn!(target = "pwio", "screenshot poller did not stop in time, aborting");
				task.abort();
			}
		}
	}

	async fn encode_and_attach(&self) -> Result<()> {
		let frames = list_frames(&self.dir)?;
		if frames.is_empty() {
			debug!(target = "pwio", "no frames captured, skipping encode");
			return Ok(());
		}
		fill_frame_gaps(&self.dir, &frames)?;

		let secs = u64::from(self.options.max_duration_secs());
		let timeout = Duration::from_secs(secs);
		let process = match &self.encoder {
			Some(program) => EncoderProcess::new(program, timeout),
			None => EncoderProcess::discover(timeout)?,
		};

		match process
			.args(encoder_args(&self.dir, &self.video_path, &self.options))
			.run()
			.await
		{
			Ok(_) => {}
			Err(err) if err.is_timeout() => return Err(Error::EncodeTimeout { secs }),
			Err(err) => return Err(Error::Recording(format!("encoder failed: {err}"))),
		}

		let body = read_video(&self.video_path).await?;
		debug!(target = "pwio", bytes = body.len(), "video encoded");
		self.reporter
			.attach("video", Attachment::new(body, self.options.video_type.content_type()));
		Ok(())
	}

	async fn cleanup(&mut self) {
		self.frames.store(0, Ordering::SeqCst);
		if let Err(err) = tokio::fs::remove_dir_all(&self.dir).await {
			if err.kind() != std::io::ErrorKind::NotFound {
				warn!(target = "pwio", dir = %self.dir.display(), error = %err, "failed to remove frame directory");
			}
		}
	}
}

impl Drop for FrameRecording {
	fn drop(&mut self) {
		if let Some(task) = self.task.take() {
			task.abort();
			let _ = std::fs::remove_dir_all(&self.dir);
		}
	}
}

async fn read_video(path: &Path) -> Result<Vec<u8>> {
	let body = match tokio::fs::read(path).await {
		Ok(body) => body,
		Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
			return Err(Error::Recording("video file was not created".into()));
		}
		Err(err) => return Err(err.into()),
	};
	if body.is_empty() {
		return Err(Error::Recording("video file is empty".into()));
	}
	Ok(body)
}

async fn capture_frames(
	session: Arc<dyn RemoteSession>,
	dir: PathBuf,
	frames: Arc<AtomicU32>,
	interval: Duration,
	mut stop: oneshot::Receiver<()>,
) {
	let mut ticker = tokio::time::interval(interval);
	ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

	loop {
		tokio::select! {
			biased;
			_ = &mut stop => break,
			_ = ticker.tick() => {
				let index = frames.fetch_add(1, Ordering::SeqCst);
				let bytes = match session.take_screenshot().await {
					Ok(b64) => STANDARD.decode(b64.trim()).unwrap_or_else(|err| {
						debug!(target = "pwio", frame = index, error = %err, "undecodable screenshot, using placeholder");
						placeholder_frame()
					}),
					Err(err) => {
						debug!(target = "pwio", frame = index, error = %err, "screenshot failed, using placeholder");
						placeholder_frame()
					}
				};
				if let Err(err) = tokio::fs::write(dir.join(frame_file_name(index)), bytes).await {
					warn!(target = "pwio", frame = index, error = %err, "failed to write frame");
				}
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use tempfile::TempDir;

	use super::*;

	#[test]
	fn gaps_are_paired_with_nearest_previous_frame() {
		assert_eq!(missing_frames(&[0, 1, 3, 4, 7]), vec![(2, 1), (5, 4), (6, 4)]);
		assert!(missing_frames(&[]).is_empty());
		assert!(missing_frames(&[5]).is_empty());
		assert!(missing_frames(&[2, 3, 4]).is_empty());
	}

	#[test]
	fn fill_copies_previous_frames() {
		let temp = TempDir::new().unwrap();
		for index in [0u32, 1, 3, 4, 7] {
			std::fs::write(temp.path().join(frame_file_name(index)), format!("frame-{index}")).unwrap();
		}
		std::fs::write(temp.path().join("notes.txt"), "ignored").unwrap();

		let frames = list_frames(temp.path()).unwrap();
		assert_eq!(frames, vec![0, 1, 3, 4, 7]);

		let filled = fill_frame_gaps(temp.path(), &frames).unwrap();
		assert_eq!(filled, vec![2, 5, 6]);
		assert_eq!(list_frames(temp.path()).unwrap(), (0..=7).collect::<Vec<_>>());

		let read = |i: u32| std::fs::read_to_string(temp.path().join(frame_file_name(i))).unwrap();
		assert_eq!(read(2), "frame-1");
		assert_eq!(read(5), "frame-4");
		assert_eq!(read(6), "frame-4");
	}

	#[test]
	fn frame_names_are_zero_padded() {
		assert_eq!(frame_file_name(7), "0007.png");
		assert_eq!(frame_file_name(12345), "12345.png");
	}

	#[test]
	fn placeholder_is_png() {
		assert!(placeholder_frame().starts_with(&[0x89, b'P', b'N', b'G']));
	}
}

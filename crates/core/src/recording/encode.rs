//! Encoder argument construction.

use std::ffi::OsString;
use std::path::Path;

use pwio_protocol::{Quality, ResolvedRecorderOptions, VideoType};

/// Input frame rate; frames are captured every 500 ms and slowed down on output.
const INPUT_FPS: &str = "10";

/// Constant-rate factor and output scale for a quality setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityPreset {
	pub crf: u8,
	/// Output width; height follows the aspect ratio, rounded to even.
	pub width: u32,
}

impl QualityPreset {
	pub fn for_quality(quality: Quality) -> Self {
		let (crf, width) = match quality {
			Quality::High => (18, 1920),
			Quality::Medium => (23, 1280),
			Quality::Low => (32, 800),
			Quality::Lossless => (0, 1920),
			Quality::Crf(crf) => (crf, 1280),
		};
		Self { crf, width }
	}

	/// Value for the `scale` video filter.
	pub fn scale(&self) -> String {
		format!("{}:trunc(ow/a/2)*2", self.width)
	}
}

pub fn codec(video_type: VideoType) -> &'static str {
	match video_type {
		VideoType::Mp4 | VideoType::Mov => "libx264",
		VideoType::Webm => "libvpx-vp9",
	}
}

/// Arguments turning `<frame_dir>/%04d.png` into `output`.
pub fn encoder_args(frame_dir: &Path, output: &Path, options: &ResolvedRecorderOptions) -> Vec<OsString> {
	let preset = QualityPreset::for_quality(options.quality);
	let mut args: Vec<OsString> = vec!["-y".into(), "-r".into(), INPUT_FPS.into(), "-i".into()];
	args.push(frame_dir.join("%04d.png").into_os_string());
	args.extend(
		[
			"-vcodec".to_string(),
			codec(options.video_type).to_string(),
			"-crf".to_string(),
			preset.crf.to_string(),
			"-pix_fmt".to_string(),
			"yuv420p".to_string(),
			"-vf".to_string(),
			format!("scale={},setpts=3.0*PTS", preset.scale()),
			"-movflags".to_string(),
			"+faststart".to_string(),
		]
		.into_iter()
		.map(OsString::from),
	);
	args.push(output.as_os_str().to_owned());
	args
}

#[cfg(test)]
mod tests {
	use std::path::PathBuf;

	use super::*;

	#[test]
	fn presets_match_quality_names() {
		assert_eq!(QualityPreset::for_quality(Quality::High).crf, 18);
		assert_eq!(QualityPreset::for_quality(Quality::Low).scale(), "800:trunc(ow/a/2)*2");
		assert_eq!(QualityPreset::for_quality(Quality::Lossless), QualityPreset { crf: 0, width: 1920 });
		assert_eq!(QualityPreset::for_quality(Quality::Crf(40)), QualityPreset { crf: 40, width: 1280 });
	}

	#[cfg(unix)]
	#[test]
	fn args_for_webm_medium() {
		let options = ResolvedRecorderOptions {
			video_type: VideoType::Webm,
			..Default::default()
		};
		let dir = PathBuf::from("/tmp/rec");
		let args: Vec<String> = encoder_args(&dir, &dir.join("rec.webm"), &options)
			.into_iter()
			.map(|a| a.to_string_lossy().into_owned())
			.collect();

		assert_eq!(
			args,
			vec![
				"-y",
				"-r",
				"10",
				"-i",
				"/tmp/rec/%04d.png",
				"-vcodec",
				"libvpx-vp9",
				"-crf",
				"23",
				"-pix_fmt",
				"yuv420p",
				"-vf",
				"scale=1280:trunc(ow/a/2)*2,setpts=3.0*PTS",
				"-movflags",
				"+faststart",
				"/tmp/rec/rec.webm",
			]
		);
	}

	#[test]
	fn mov_uses_h264() {
		assert_eq!(codec(VideoType::Mov), "libx264");
	}
}

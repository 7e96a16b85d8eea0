//! Screen recording options.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Container/codec family of the recorded video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoType {
	#[default]
	Mp4,
	Mov,
	Webm,
}

impl VideoType {
	pub fn extension(self) -> &'static str {
		match self {
			VideoType::Mp4 => "mp4",
			VideoType::Mov => "mov",
			VideoType::Webm => "webm",
		}
	}

	/// MIME type of an encoded local recording.
	pub fn content_type(self) -> &'static str {
		match self {
			VideoType::Mp4 => "video/mp4",
			VideoType::Mov => "video/quicktime",
			VideoType::Webm => "video/webm",
		}
	}
}

/// Encoding quality: a named preset or a raw constant-rate factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quality {
	Low,
	#[default]
	Medium,
	High,
	Lossless,
	Crf(u8),
}

impl Quality {
	/// Parses a preset name; unknown names fall back to [`Quality::Medium`].
	pub fn from_name(name: &str) -> Quality {
		match name.to_ascii_lowercase().as_str() {
			"low" => Quality::Low,
			"high" => Quality::High,
			"lossless" => Quality::Lossless,
			_ => Quality::Medium,
		}
	}

	/// Name sent to native recorders; raw factors are sent as their number.
	pub fn label(self) -> String {
		match self {
			Quality::Low => "low".to_string(),
			Quality::Medium => "medium".to_string(),
			Quality::High => "high".to_string(),
			Quality::Lossless => "lossless".to_string(),
			Quality::Crf(crf) => crf.to_string(),
		}
	}
}

impl Serialize for Quality {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		match self {
			Quality::Crf(crf) => serializer.serialize_u8(*crf),
			other => serializer.serialize_str(&other.label()),
		}
	}
}

impl<'de> Deserialize<'de> for Quality {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		#[derive(Deserialize)]
		#[serde(untagged)]
		enum Raw {
			Crf(u8),
			Name(String),
		}

		Ok(match Raw::deserialize(deserializer)? {
			Raw::Crf(crf) => Quality::Crf(crf),
			Raw::Name(name) => Quality::from_name(&name),
		})
	}
}

/// Partially specified recorder options, as written in project or test scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecorderOptions {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub video_type: Option<VideoType>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub quality: Option<Quality>,
	/// Seconds
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub max_duration: Option<u32>,
}

impl RecorderOptions {
	/// Returns `self` with every field set in `overrides` replaced.
	pub fn merged(&self, overrides: &RecorderOptions) -> RecorderOptions {
		RecorderOptions {
			video_type: overrides.video_type.or(self.video_type),
			quality: overrides.quality.or(self.quality),
			max_duration: overrides.max_duration.or(self.max_duration),
		}
	}

	/// Fills unset fields from the recorder defaults. A zero
	/// `max_duration` counts as unset.
	pub fn resolve(&self) -> ResolvedRecorderOptions {
		let defaults = ResolvedRecorderOptions::default();
		ResolvedRecorderOptions {
			video_type: self.video_type.unwrap_or(defaults.video_type),
			quality: self.quality.unwrap_or(defaults.quality),
			max_duration: self.max_duration.filter(|&secs| secs > 0).unwrap_or(defaults.max_duration),
		}
	}
}

/// Recording length limit used when none is configured, in seconds.
pub const DEFAULT_MAX_DURATION: u32 = 180;

/// Recorder options with every field decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRecorderOptions {
	pub video_type: VideoType,
	pub quality: Quality,
	/// Seconds; 0 means [`DEFAULT_MAX_DURATION`]
	pub max_duration: u32,
}

impl ResolvedRecorderOptions {
	/// `max_duration` with 0 read as [`DEFAULT_MAX_DURATION`].
	pub fn max_duration_secs(&self) -> u32 {
		match self.max_duration {
			0 => DEFAULT_MAX_DURATION,
			secs => secs,
		}
	}
}

impl Default for ResolvedRecorderOptions {
	fn default() -> Self {
		Self {
			video_type: VideoType::Mp4,
			quality: Quality::Medium,
			max_duration: DEFAULT_MAX_DURATION,
		}
	}
}

/// Recording setting: disabled, enabled with defaults, or enabled with options.
///
/// Written as `false`, `true`, or an options object.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RecordingMode {
	#[default]
	Off,
	Default,
	Custom(RecorderOptions),
}

impl RecordingMode {
	pub fn is_enabled(&self) -> bool {
		!matches!(self, RecordingMode::Off)
	}

	/// Options to record with, or `None` when recording is off.
	pub fn options(&self) -> Option<RecorderOptions> {
		match self {
			RecordingMode::Off => None,
			RecordingMode::Default => Some(RecorderOptions::default()),
			RecordingMode::Custom(options) => Some(options.clone()),
		}
	}
}

impl Serialize for RecordingMode {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		match self {
			RecordingMode::Off => serializer.serialize_bool(false),
			RecordingMode::Default => serializer.serialize_bool(true),
			RecordingMode::Custom(options) => options.serialize(serializer),
		}
	}
}

impl<'de> Deserialize<'de> for RecordingMode {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		#[derive(Deserialize)]
		#[serde(untagged)]
		enum Raw {
			Flag(bool),
			Options(RecorderOptions),
		}

		Ok(match Raw::deserialize(deserializer)? {
			Raw::Flag(false) => RecordingMode::Off,
			Raw::Flag(true) => RecordingMode::Default,
			Raw::Options(options) => RecordingMode::Custom(options),
		})
	}
}

//! Encoder binary discovery.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};

/// Environment variable naming an explicit encoder binary.
pub const ENCODER_PATH_ENV: &str = "PWIO_FFMPEG_PATH";

const ENCODER_BINARY: &str = "ffmpeg";

/// Returns the path of the encoder binary.
///
/// Checks in order:
/// 1. `PWIO_FFMPEG_PATH` env var
/// 2. `ffmpeg` on `PATH`
/// 3. Common install locations
///
/// # Errors
///
/// Returns [`Error::EncoderNotFound`] if none of the candidates exist.
pub fn get_encoder_executable() -> Result<PathBuf> {
	resolve_encoder(std::env::var_os(ENCODER_PATH_ENV).map(PathBuf::from))
}

fn resolve_encoder(explicit: Option<PathBuf>) -> Result<PathBuf> {
	if let Some(path) = explicit {
		if path.is_file() {
			debug!(target = "pwio", path = %path.display(), "encoder from env");
			return Ok(path);
		}
		debug!(target = "pwio", path = %path.display(), "ignoring missing encoder override");
	}

	if let Ok(path) = which::which(ENCODER_BINARY) {
		return Ok(path);
	}

	find_in_common_locations(&common_locations()).ok_or(Error::EncoderNotFound)
}

fn common_locations() -> Vec<PathBuf> {
	#[cfg(not(windows))]
	let locations = [
		"/usr/local/bin/ffmpeg",
		"/usr/bin/ffmpeg",
		"/opt/homebrew/bin/ffmpeg",
		"/opt/local/bin/ffmpeg",
	];

	#[cfg(windows)]
	let locations = [
		"C:\\ffmpeg\\bin\\ffmpeg.exe",
		"C:\\Program Files\\ffmpeg\\bin\\ffmpeg.exe",
	];

	locations.iter().map(PathBuf::from).collect()
}

fn find_in_common_locations(candidates: &[PathBuf]) -> Option<PathBuf> {
	candidates.iter().find(|p| is_file(p)).cloned()
}

fn is_file(path: &Path) -> bool {
	path.metadata().map(|m| m.is_file()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
	use std::fs;

	use tempfile::TempDir;

	use super::*;

	#[test]
	fn explicit_path_wins_when_present() {
		let temp = TempDir::new().unwrap();
		let encoder = temp.path().join("my-ffmpeg");
		fs::write(&encoder, "").unwrap();

		let resolved = resolve_encoder(Some(encoder.clone())).unwrap();
		assert_eq!(resolved, encoder);
	}

	#[test]
	fn missing_explicit_path_falls_through() {
		let temp = TempDir::new().unwrap();
		let result = resolve_encoder(Some(temp.path().join("absent")));
		match result {
			Ok(path) => assert!(path.exists()),
			Err(e) => assert!(matches!(e, Error::EncoderNotFound)),
		}
	}

	#[test]
	fn common_locations_skip_directories_and_missing_files() {
		let temp = TempDir::new().unwrap();
		let dir = temp.path().join("ffmpeg-dir");
		fs::create_dir(&dir).unwrap();
		let binary = temp.path().join("ffmpeg");
		fs::write(&binary, "").unwrap();

		let candidates = vec![temp.path().join("nope"), dir, binary.clone()];
		assert_eq!(find_in_common_locations(&candidates), Some(binary));
	}
}

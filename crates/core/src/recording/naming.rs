//! File-system safe names for recording artifacts.

use std::sync::LazyLock;

use pwio_protocol::TestInfo;
use regex::Regex;

/// Longest name produced by [`sanitize`].
pub const MAX_NAME_LEN: usize = 250;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));

/// `<project>-worker-<index>-<title>`, sanitized.
pub fn recording_name(info: &TestInfo) -> String {
	let project = info
		.project_name
		.as_deref()
		.filter(|p| !p.is_empty())
		.unwrap_or("default");
	sanitize(&format!("{project}-worker-{}-{}", info.worker_index, info.title), MAX_NAME_LEN)
}

/// Reduces `raw` to `[A-Za-z0-9_!~-]`.
///
/// Whitespace runs become `-`, dots become `-`, everything else outside the
/// set is dropped. Names longer than `max` keep their head and tail halves
/// joined by `_`.
pub fn sanitize(raw: &str, max: usize) -> String {
	let dashed = WHITESPACE.replace_all(raw, "-");
	let name: String = dashed
		.chars()
		.filter_map(|c| match c {
			'.' => Some('-'),
			c if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '!' | '~') => Some(c),
			_ => None,
		})
		.collect();

	if name.len() <= max {
		return name;
	}

	let half = (max - 1) / 2;
	format!("{}_{}", &name[..half], &name[name.len() - half..])
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn keeps_only_safe_characters() {
		assert_eq!(sanitize("should log in: user/admin (v2.1)", 250), "should-log-in-useradmin-v2-1");
		assert_eq!(sanitize("café  déjà\tvu!~", 250), "caf-dj-vu!~");
		assert_eq!(sanitize("a*b'c|d\"e<f>g?h%i\\j", 250), "abcdefghij");
	}

	#[test]
	fn long_names_keep_head_and_tail() {
		let raw = format!("{}{}", "a".repeat(200), "b".repeat(200));
		let name = sanitize(&raw, 250);
		assert_eq!(name.len(), 249);
		assert!(name.starts_with(&"a".repeat(124)));
		assert_eq!(&name[124..125], "_");
		assert!(name.ends_with(&"b".repeat(124)));
	}

	#[test]
	fn recording_name_includes_project_and_worker() {
		let mut info = TestInfo::new("opens the cart");
		info.worker_index = 3;
		assert_eq!(recording_name(&info), "default-worker-3-opens-the-cart");

		info.project_name = Some("Mobile Chrome".into());
		assert_eq!(recording_name(&info), "Mobile-Chrome-worker-3-opens-the-cart");
	}
}

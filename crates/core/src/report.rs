//! Host test-report surface: attachments, annotations, and steps.

use parking_lot::Mutex;

/// Binary payload attached to the test report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
	pub body: Vec<u8>,
	pub content_type: String,
}

impl Attachment {
	pub fn new(body: Vec<u8>, content_type: impl Into<String>) -> Self {
		Self {
			body,
			content_type: content_type.into(),
		}
	}
}

/// Key/description pair shown alongside the test result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
	pub kind: String,
	pub description: String,
}

/// Sink for everything the engine reports about a test.
///
/// Implemented by the host framework adapter. Calls must not fail; a
/// reporter that cannot record something drops it.
pub trait Reporter: Send + Sync {
	fn attach(&self, name: &str, attachment: Attachment);

	fn annotate(&self, annotation: Annotation);

	/// Records a completed, zero-duration step.
	fn step(&self, title: &str);
}

/// In-memory reporter, for hosts without a report and for tests.
#[derive(Debug, Default)]
pub struct MemoryReporter {
	attachments: Mutex<Vec<(String, Attachment)>>,
	annotations: Mutex<Vec<Annotation>>,
	steps: Mutex<Vec<String>>,
}

impl MemoryReporter {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn attachments(&self) -> Vec<(String, Attachment)> {
		self.attachments.lock().clone()
	}

	/// First attachment recorded under `name`.
	pub fn attachment(&self, name: &str) -> Option<Attachment> {
		self.attachments
			.lock()
			.iter()
			.find(|(n, _)| n == name)
			.map(|(_, a)| a.clone())
	}

	pub fn annotations(&self) -> Vec<Annotation> {
		self.annotations.lock().clone()
	}

	pub fn steps(&self) -> Vec<String> {
		self.steps.lock().clone()
	}
}

impl Reporter for MemoryReporter {
	fn attach(&self, name: &str, attachment: Attachment) {
		self.attachments.lock().push((name.to_string(), attachment));
	}

	fn annotate(&self, annotation: Annotation) {
		self.annotations.lock().push(annotation);
	}

	fn step(&self, title: &str) {
		self.steps.lock().push(title.to_string());
	}
}

use std::sync::{
	atomic::{AtomicBool, Ordering},
	Mutex,
};

use crate::misc::SourceFile;

/// Shared failure state for one generation pass. Created once per build
/// invocation and handed to every emission call; emissions running on
/// parallel threads share a reference. The flag is set once and observed
/// many times, and only the first recorded error is kept.
#[derive(Debug, Default)]
pub struct Diagnostics {
	failed: AtomicBool,
	first_error: Mutex<Option<String>>,
}

impl Diagnostics {
	pub fn new() -> Diagnostics {
		Diagnostics::default()
	}

	/// Two sources of one target mapped to the same object file. The first
	/// mapping stays in effect; emission continues.
	pub fn report_duplicate_output(&self, output: &str, existing: &SourceFile, duplicate: &SourceFile) {
		let message = format!(
			"Two sources produce the same object file \"{}\": \"{}\" and \"{}\"",
			output, existing, duplicate
		);
		log::error!("{}", message);
		self.failed.store(true, Ordering::SeqCst);
		let mut slot = match self.first_error.lock() {
			Ok(x) => x,
			Err(poisoned) => poisoned.into_inner(),
		};
		if slot.is_none() {
			*slot = Some(message);
		}
	}

	pub fn is_failed(&self) -> bool {
		self.failed.load(Ordering::SeqCst)
	}

	pub fn first_error(&self) -> Option<String> {
		match self.first_error.lock() {
			Ok(x) => x.clone(),
			Err(poisoned) => poisoned.into_inner().clone(),
		}
	}

	pub fn reset(&self) {
		self.failed.store(false, Ordering::SeqCst);
		let mut slot = match self.first_error.lock() {
			Ok(x) => x,
			Err(poisoned) => poisoned.into_inner(),
		};
		*slot = None;
	}
}

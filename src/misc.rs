use core::fmt;

use serde::Deserialize;

/// A file inside the source tree, absolute from the source root,
/// e.g. "//foo/bar.cc". Never a filesystem path; rule generation only
/// manipulates these as strings.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct SourceFile(String);

impl SourceFile {
	pub fn new(path: impl Into<String>) -> SourceFile {
		SourceFile(path.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	pub fn file_name(&self) -> &str {
		match self.0.rfind('/') {
			Some(pos) => &self.0[pos + 1..],
			None => &self.0,
		}
	}

	/// File name without its final extension: "bar" for "//foo/bar.cc".
	pub fn stem(&self) -> &str {
		let name = self.file_name();
		match name.rfind('.') {
			Some(pos) => &name[..pos],
			None => name,
		}
	}

	pub fn extension(&self) -> &str {
		let name = self.file_name();
		match name.rfind('.') {
			Some(pos) => &name[pos + 1..],
			None => "",
		}
	}
}

impl fmt::Display for SourceFile {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceType {
	C,
	Cpp,
	Asm,
	/// Already compiled; passed through to the link step verbatim.
	Object,
	/// Windows module-definition file; linker directives, never compiled.
	ModuleDef,
	/// No registered tool. Neither compiled nor linked.
	Unknown,
}

/// Extension matching is case-sensitive: a bare ".S" has no registered
/// tool and is ignored.
pub fn source_type(file: &SourceFile) -> SourceType {
	match file.extension() {
		"c" => SourceType::C,
		"cc" | "cpp" | "cxx" => SourceType::Cpp,
		"s" | "asm" | "arm" => SourceType::Asm,
		"o" | "obj" => SourceType::Object,
		"def" => SourceType::ModuleDef,
		_ => SourceType::Unknown,
	}
}

/// Where generated files go. All emitted paths are relative to the build
/// directory, so source-absolute inputs are rebased against it.
#[derive(Clone, Debug)]
pub struct BuildSettings {
	build_dir: String,
	depth: usize,
}

impl BuildSettings {
	pub fn new(build_dir: &str) -> BuildSettings {
		let depth = build_dir.trim_matches('/').split('/').filter(|c| !c.is_empty()).count();
		BuildSettings { build_dir: build_dir.to_owned(), depth }
	}

	pub fn build_dir(&self) -> &str {
		&self.build_dir
	}

	/// "//foo/bar.cc" under "//out/Debug/" renders as "../../foo/bar.cc".
	pub fn rebase(&self, path: &str) -> String {
		let mut out = "../".repeat(self.depth);
		out += path.trim_start_matches('/');
		out
	}

	pub fn rebase_file(&self, file: &SourceFile) -> String {
		self.rebase(file.as_str())
	}

	pub fn rebase_dir(&self, dir: &str) -> String {
		self.rebase(dir).trim_end_matches('/').to_owned()
	}
}

use core::fmt;
use std::sync::Arc;

use serde::Deserialize;

use crate::misc::SourceFile;

/// Identity of a target: the directory of its defining scope plus its name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Label {
	pub dir: String,
	pub name: String,
}

impl Label {
	pub fn new(dir: &str, name: &str) -> Label {
		Label { dir: dir.to_owned(), name: name.to_owned() }
	}
}

impl fmt::Display for Label {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.dir.trim_end_matches('/'), self.name)
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
	SourceSet,
	StaticLibrary,
	CompleteStaticLibrary,
	SharedLibrary,
	LoadableModule,
	Executable,
	/// Opaque step owned by another writer. Only its stamp participates here.
	Action,
}

/// Output-extension override. Unset and explicitly-empty are distinct
/// states even though both currently resolve to the tool default.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputExtension {
	#[default]
	Unset,
	Explicit(String),
}

impl OutputExtension {
	/// An explicitly empty override falls back to the default, same as
	/// unset. Only a non-empty override replaces it.
	pub fn resolve(&self, default_extension: &str) -> String {
		match self {
			OutputExtension::Unset => default_extension.to_owned(),
			OutputExtension::Explicit(ext) if ext.is_empty() => default_extension.to_owned(),
			OutputExtension::Explicit(ext) if ext.starts_with('.') => ext.clone(),
			OutputExtension::Explicit(ext) => format!(".{}", ext),
		}
	}
}

/// One entry of `libs`: a file in the source tree (passed to the linker by
/// path and tracked as a hard dependency) or a bare name (-lfoo).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LibFile {
	Path(SourceFile),
	Name(String),
}

impl LibFile {
	pub fn from_value(value: &str) -> LibFile {
		if value.starts_with("//") {
			LibFile::Path(SourceFile::new(value))
		} else {
			LibFile::Name(value.to_owned())
		}
	}
}

/// A fully resolved build target as handed over by the front end. Read-only
/// for the duration of an emission pass; dependency edges point at other
/// resolved targets.
#[derive(Debug)]
pub struct Target {
	pub label: Label,
	pub kind: TargetKind,
	/// Order matters: compile edges and link inputs keep declaration order.
	pub sources: Vec<SourceFile>,
	/// Deps whose link contributions and further public deps are visible to
	/// consumers. Must be declared acyclic by the resolver.
	pub public_deps: Vec<Arc<Target>>,
	/// Runtime-only deps. Never linked, never hard.
	pub data_deps: Vec<Arc<Target>>,
	pub defines: Vec<String>,
	pub include_dirs: Vec<String>,
	pub asmflags: Vec<String>,
	pub cflags: Vec<String>,
	pub cflags_c: Vec<String>,
	pub cflags_cc: Vec<String>,
	pub ldflags: Vec<String>,
	pub libs: Vec<LibFile>,
	pub lib_dirs: Vec<String>,
	pub output_extension: OutputExtension,
	pub precompiled_header: Option<String>,
	pub precompiled_source: Option<SourceFile>,
}

impl Target {
	pub fn new(label: Label, kind: TargetKind) -> Target {
		Target {
			label,
			kind,
			sources: Vec::new(),
			public_deps: Vec::new(),
			data_deps: Vec::new(),
			defines: Vec::new(),
			include_dirs: Vec::new(),
			asmflags: Vec::new(),
			cflags: Vec::new(),
			cflags_c: Vec::new(),
			cflags_cc: Vec::new(),
			ldflags: Vec::new(),
			libs: Vec::new(),
			lib_dirs: Vec::new(),
			output_extension: OutputExtension::Unset,
			precompiled_header: None,
			precompiled_source: None,
		}
	}

	/// The planner only activates when both halves of the request are set.
	pub fn precompiled_header_pair(&self) -> Option<(&str, &SourceFile)> {
		match (&self.precompiled_header, &self.precompiled_source) {
			(Some(header), Some(source)) => Some((header.as_str(), source)),
			_ => None,
		}
	}

	pub fn set_complete_static_lib(&mut self, complete: bool) {
		self.kind = match (self.kind, complete) {
			(TargetKind::StaticLibrary, true) => TargetKind::CompleteStaticLibrary,
			(TargetKind::CompleteStaticLibrary, false) => TargetKind::StaticLibrary,
			(kind, _) => kind,
		};
	}

	/// Targets whose terminal edge passes dependency artifacts to a linker.
	pub fn links_dependencies(&self) -> bool {
		matches!(
			self.kind,
			TargetKind::SharedLibrary | TargetKind::LoadableModule | TargetKind::Executable
		)
	}
}

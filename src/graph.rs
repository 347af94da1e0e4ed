use std::{collections::HashMap, fs, path::Path, sync::Arc};

use serde::Deserialize;

use crate::{
	misc::{BuildSettings, SourceFile},
	target::{Label, LibFile, OutputExtension, Target, TargetKind},
};

// The hand-off format of the external resolver: a flat list of fully
// resolved targets. Dependencies are declared before their consumers, the
// same way the front end finishes a dependency before its dependent.

#[derive(Debug, Deserialize)]
struct GraphFile {
	build_dir: String,
	#[serde(default, rename = "target")]
	targets: Vec<TargetEntry>,
}

#[derive(Debug, Deserialize)]
struct TargetEntry {
	name: String,
	dir: String,
	kind: TargetKind,
	#[serde(default)]
	sources: Vec<String>,
	#[serde(default)]
	public_deps: Vec<String>,
	#[serde(default)]
	data_deps: Vec<String>,
	#[serde(default)]
	defines: Vec<String>,
	#[serde(default)]
	include_dirs: Vec<String>,
	#[serde(default)]
	asmflags: Vec<String>,
	#[serde(default)]
	cflags: Vec<String>,
	#[serde(default)]
	cflags_c: Vec<String>,
	#[serde(default)]
	cflags_cc: Vec<String>,
	#[serde(default)]
	ldflags: Vec<String>,
	#[serde(default)]
	libs: Vec<String>,
	#[serde(default)]
	lib_dirs: Vec<String>,
	/// Absent means unset; "" is an explicit (empty) override.
	output_extension: Option<String>,
	precompiled_header: Option<String>,
	precompiled_source: Option<String>,
	#[serde(default)]
	complete_static_lib: bool,
}

#[derive(Debug)]
pub struct BuildGraph {
	pub settings: BuildSettings,
	pub targets: Vec<Arc<Target>>,
}

pub fn read_graph(graph_path: &Path) -> Result<BuildGraph, String> {
	let graph_toml = match fs::read_to_string(graph_path) {
		Ok(x) => x,
		Err(e) => return Err(format!("Error opening graph file \"{}\": {}", graph_path.display(), e)),
	};
	parse_graph(&graph_toml)
}

pub fn parse_graph(graph_toml: &str) -> Result<BuildGraph, String> {
	let graph_file = match toml::from_str::<GraphFile>(graph_toml) {
		Ok(x) => x,
		Err(e) => return Err(format!("Error reading graph description: {}", e)),
	};

	let settings = BuildSettings::new(&graph_file.build_dir);
	let mut by_label = HashMap::<String, Arc<Target>>::new();
	let mut targets = Vec::with_capacity(graph_file.targets.len());
	for entry in graph_file.targets {
		let label = Label::new(&entry.dir, &entry.name);
		let key = label.to_string();
		if by_label.contains_key(&key) {
			return Err(format!("Duplicate target \"{}\"", key));
		}
		let mut target = Target::new(label, entry.kind);
		target.set_complete_static_lib(entry.complete_static_lib);
		target.sources = entry.sources.into_iter().map(SourceFile::new).collect();
		target.public_deps = resolve_deps(&by_label, &entry.public_deps, &key)?;
		target.data_deps = resolve_deps(&by_label, &entry.data_deps, &key)?;
		target.defines = entry.defines;
		target.include_dirs = entry.include_dirs;
		target.asmflags = entry.asmflags;
		target.cflags = entry.cflags;
		target.cflags_c = entry.cflags_c;
		target.cflags_cc = entry.cflags_cc;
		target.ldflags = entry.ldflags;
		target.libs = entry.libs.iter().map(|x| LibFile::from_value(x)).collect();
		target.lib_dirs = entry.lib_dirs;
		target.output_extension = match entry.output_extension {
			None => OutputExtension::Unset,
			Some(ext) => OutputExtension::Explicit(ext),
		};
		target.precompiled_header = entry.precompiled_header;
		target.precompiled_source = entry.precompiled_source.map(SourceFile::new);

		let target = Arc::new(target);
		by_label.insert(key, target.clone());
		targets.push(target);
	}
	Ok(BuildGraph { settings, targets })
}

fn resolve_deps(
	by_label: &HashMap<String, Arc<Target>>,
	references: &[String],
	consumer: &str,
) -> Result<Vec<Arc<Target>>, String> {
	references
		.iter()
		.map(|reference| {
			by_label.get(reference).cloned().ok_or_else(|| {
				format!(
					"Unknown dependency \"{}\" of \"{}\". Dependencies must be declared before their consumers.",
					reference, consumer
				)
			})
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	const GRAPH: &str = r#"
build_dir = "//out/Debug/"

[[target]]
name = "base"
dir = "//base/"
kind = "source_set"
sources = ["//base/a.cc", "//base/b.cc"]

[[target]]
name = "shlib"
dir = "//foo/"
kind = "shared_library"
public_deps = ["//base:base"]
libs = ["//foo/lib1.a", "foo"]
lib_dirs = ["//foo/bar/"]
output_extension = ""
"#;

	#[test]
	fn parses_targets_and_links_deps() {
		let graph = parse_graph(GRAPH).unwrap();
		assert_eq!(graph.targets.len(), 2);
		assert_eq!(graph.settings.build_dir(), "//out/Debug/");

		let shlib = &graph.targets[1];
		assert_eq!(shlib.kind, TargetKind::SharedLibrary);
		assert_eq!(shlib.public_deps.len(), 1);
		assert_eq!(shlib.public_deps[0].label.to_string(), "//base:base");
		assert_eq!(shlib.output_extension, OutputExtension::Explicit(String::new()));
		assert_eq!(shlib.libs[0], LibFile::Path(SourceFile::new("//foo/lib1.a")));
		assert_eq!(shlib.libs[1], LibFile::Name("foo".to_owned()));

		let base = &graph.targets[0];
		assert_eq!(base.output_extension, OutputExtension::Unset);
	}

	#[test]
	fn unknown_dependency_is_an_error() {
		let graph_toml = r#"
build_dir = "//out/"

[[target]]
name = "exe"
dir = "//foo/"
kind = "executable"
public_deps = ["//missing:dep"]
"#;
		let err = parse_graph(graph_toml).unwrap_err();
		assert!(err.contains("//missing:dep"), "{}", err);
	}

	#[test]
	fn duplicate_target_is_an_error() {
		let graph_toml = r#"
build_dir = "//out/"

[[target]]
name = "a"
dir = "//foo/"
kind = "source_set"

[[target]]
name = "a"
dir = "//foo/"
kind = "source_set"
"#;
		let err = parse_graph(graph_toml).unwrap_err();
		assert!(err.contains("Duplicate target"), "{}", err);
	}

	#[test]
	fn complete_static_lib_flag_upgrades_kind() {
		let graph_toml = r#"
build_dir = "//out/"

[[target]]
name = "stlib"
dir = "//foo/"
kind = "static_library"
complete_static_lib = true
"#;
		let graph = parse_graph(graph_toml).unwrap();
		assert_eq!(graph.targets[0].kind, TargetKind::CompleteStaticLibrary);
	}
}

use std::{fs, path::Path};

use serde::Deserialize;

use crate::{misc::SourceType, target::TargetKind};

/// How a compiler tool produces and consumes precompiled headers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PchMode {
	#[default]
	None,
	Msvc,
	Gcc,
}

/// One build-graph tool: the rule it is invoked through and the naming
/// conventions for its outputs. Compilers use `object_extension` and `pch`;
/// linkers use `output_prefix` and `default_output_extension`.
#[derive(Clone, Debug, Deserialize)]
pub struct Tool {
	pub rule: String,
	#[serde(default)]
	pub command: Option<String>,
	#[serde(default)]
	pub description: Option<String>,
	#[serde(default)]
	pub depfile: Option<String>,
	#[serde(default)]
	pub deps: Option<String>,
	#[serde(default)]
	pub output_prefix: String,
	#[serde(default)]
	pub default_output_extension: String,
	#[serde(default = "default_object_extension")]
	pub object_extension: String,
	#[serde(default)]
	pub pch: PchMode,
}

fn default_object_extension() -> String {
	".o".to_owned()
}

impl Tool {
	pub fn new(rule: &str) -> Tool {
		Tool {
			rule: rule.to_owned(),
			command: None,
			description: None,
			depfile: None,
			deps: None,
			output_prefix: String::new(),
			default_output_extension: String::new(),
			object_extension: default_object_extension(),
			pch: PchMode::None,
		}
	}
}

/// The active toolchain's tool table. Read-only during emission.
#[derive(Debug, Default)]
pub struct Toolchain {
	/// Output prefix for secondary toolchains (e.g. "withpch/"); artifacts
	/// land under `<subdir>obj/...`. Empty for the default toolchain.
	pub subdir: String,
	pub cc: Option<Tool>,
	pub cxx: Option<Tool>,
	pub asm: Option<Tool>,
	pub alink: Option<Tool>,
	pub solink: Option<Tool>,
	pub solink_module: Option<Tool>,
	pub link: Option<Tool>,
	pub stamp: Option<Tool>,
}

impl Toolchain {
	/// The common POSIX-shaped tool set used when no toolchain file is given.
	pub fn host_defaults() -> Toolchain {
		let mut cc = Tool::new("cc");
		cc.command =
			Some("gcc -MMD -MF $out.d $defines $include_dirs $cflags $cflags_c -c $in -o $out".to_owned());
		cc.description = Some("CC $out".to_owned());
		cc.depfile = Some("$out.d".to_owned());
		cc.deps = Some("gcc".to_owned());

		let mut cxx = Tool::new("cxx");
		cxx.command =
			Some("g++ -MMD -MF $out.d $defines $include_dirs $cflags $cflags_cc -c $in -o $out".to_owned());
		cxx.description = Some("CXX $out".to_owned());
		cxx.depfile = Some("$out.d".to_owned());
		cxx.deps = Some("gcc".to_owned());

		let mut asm = Tool::new("asm");
		asm.command = Some("gcc -MMD -MF $out.d $defines $include_dirs $asmflags -c $in -o $out".to_owned());
		asm.description = Some("ASM $out".to_owned());
		asm.depfile = Some("$out.d".to_owned());
		asm.deps = Some("gcc".to_owned());

		let mut alink = Tool::new("alink");
		alink.command = Some("rm -f $out && ar rcs $out $in".to_owned());
		alink.description = Some("AR $out".to_owned());
		alink.output_prefix = "lib".to_owned();
		alink.default_output_extension = ".a".to_owned();

		let mut solink = Tool::new("solink");
		solink.command = Some("g++ -shared $ldflags -o $out $in $libs".to_owned());
		solink.description = Some("SOLINK $out".to_owned());
		solink.output_prefix = "lib".to_owned();
		solink.default_output_extension = ".so".to_owned();

		let mut solink_module = Tool::new("solink_module");
		solink_module.command = Some("g++ -shared $ldflags -o $out $in $libs".to_owned());
		solink_module.description = Some("SOLINK_MODULE $out".to_owned());
		solink_module.output_prefix = "lib".to_owned();
		solink_module.default_output_extension = ".so".to_owned();

		let mut link = Tool::new("link");
		link.command = Some("g++ $ldflags -o $out $in $libs".to_owned());
		link.description = Some("LINK $out".to_owned());

		let mut stamp = Tool::new("stamp");
		stamp.command = Some("touch $out".to_owned());
		stamp.description = Some("STAMP $out".to_owned());

		Toolchain {
			subdir: String::new(),
			cc: Some(cc),
			cxx: Some(cxx),
			asm: Some(asm),
			alink: Some(alink),
			solink: Some(solink),
			solink_module: Some(solink_module),
			link: Some(link),
			stamp: Some(stamp),
		}
	}

	pub fn compiler_for(&self, ty: SourceType) -> Option<&Tool> {
		match ty {
			SourceType::C => self.cc.as_ref(),
			SourceType::Cpp => self.cxx.as_ref(),
			SourceType::Asm => self.asm.as_ref(),
			SourceType::Object | SourceType::ModuleDef | SourceType::Unknown => None,
		}
	}

	/// The tool driving a target's terminal edge.
	pub fn linker_for(&self, kind: TargetKind) -> Option<&Tool> {
		match kind {
			TargetKind::SourceSet | TargetKind::Action => self.stamp.as_ref(),
			TargetKind::StaticLibrary | TargetKind::CompleteStaticLibrary => self.alink.as_ref(),
			TargetKind::SharedLibrary => self.solink.as_ref(),
			TargetKind::LoadableModule => self.solink_module.as_ref(),
			TargetKind::Executable => self.link.as_ref(),
		}
	}

	pub fn target_out_dir(&self, dir: &str) -> String {
		let trimmed = dir.trim_matches('/');
		if trimmed.is_empty() {
			format!("{}obj", self.subdir)
		} else {
			format!("{}obj/{}", self.subdir, trimmed)
		}
	}

	pub fn root_out_dir(&self) -> String {
		if self.subdir.is_empty() {
			".".to_owned()
		} else {
			self.subdir.trim_end_matches('/').to_owned()
		}
	}
}

#[derive(Debug, Deserialize)]
pub struct ToolchainFile {
	subdir: Option<String>,
	cc: Option<Tool>,
	cxx: Option<Tool>,
	asm: Option<Tool>,
	alink: Option<Tool>,
	solink: Option<Tool>,
	solink_module: Option<Tool>,
	link: Option<Tool>,
	stamp: Option<Tool>,
}

pub fn read_toolchain(toolchain_path: &Path) -> Result<Toolchain, String> {
	let toolchain_toml = match fs::read_to_string(toolchain_path) {
		Ok(x) => x,
		Err(e) => return Err(format!("Error opening toolchain file \"{}\": {}", toolchain_path.display(), e)),
	};

	let toolchain_file = match toml::from_str::<ToolchainFile>(&toolchain_toml) {
		Ok(x) => x,
		Err(e) => return Err(format!("Error reading toolchain file \"{}\": {}", toolchain_path.display(), e)),
	};

	let toolchain = Toolchain {
		subdir: toolchain_file.subdir.unwrap_or_default(),
		cc: toolchain_file.cc,
		cxx: toolchain_file.cxx,
		asm: toolchain_file.asm,
		alink: toolchain_file.alink,
		solink: toolchain_file.solink,
		solink_module: toolchain_file.solink_module,
		link: toolchain_file.link,
		stamp: toolchain_file.stamp,
	};

	// Sanity checks
	if toolchain.stamp.is_none() {
		log::info!("Toolchain has no stamp tool; source sets and actions cannot be emitted");
	}

	Ok(toolchain)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn out_dirs() {
		let default = Toolchain::host_defaults();
		assert_eq!(default.target_out_dir("//foo/"), "obj/foo");
		assert_eq!(default.target_out_dir("//"), "obj");
		assert_eq!(default.root_out_dir(), ".");

		let secondary = Toolchain { subdir: "withpch/".to_owned(), ..Toolchain::host_defaults() };
		assert_eq!(secondary.target_out_dir("//foo/"), "withpch/obj/foo");
		assert_eq!(secondary.root_out_dir(), "withpch");
	}

	#[test]
	fn toolchain_file_parsing() {
		let toolchain_toml = r#"
subdir = "withpch/"

[cxx]
rule = "withpch_cxx"
pch = "msvc"

[stamp]
rule = "withpch_stamp"

[solink]
rule = "withpch_solink"
output_prefix = "lib"
default_output_extension = ".so"
"#;
		let file = toml::from_str::<ToolchainFile>(toolchain_toml).unwrap();
		assert_eq!(file.subdir.as_deref(), Some("withpch/"));
		let cxx = file.cxx.unwrap();
		assert_eq!(cxx.rule, "withpch_cxx");
		assert_eq!(cxx.pch, PchMode::Msvc);
		assert_eq!(cxx.object_extension, ".o");
		assert!(file.cc.is_none());
		let solink = file.solink.unwrap();
		assert_eq!(solink.default_output_extension, ".so");
	}
}

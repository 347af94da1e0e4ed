use std::collections::HashMap;

use crate::{
	diagnostics::Diagnostics,
	misc::{source_type, BuildSettings, SourceFile, SourceType},
	target::{Target, TargetKind},
	toolchain::{Tool, Toolchain},
};

use super::EmitError;

/// One source file that gets its own compile edge.
#[derive(Debug)]
pub(crate) struct CompileInput {
	pub source: SourceFile,
	pub ty: SourceType,
	pub rule: String,
	pub object: String,
}

/// The object-file plan for one target, rebuilt per emission.
#[derive(Debug, Default)]
pub(crate) struct TargetOutputs {
	pub compiles: Vec<CompileInput>,
	/// Compiled and passthrough objects interleaved in source order.
	pub objects: Vec<String>,
	pub module_def: Option<SourceFile>,
}

impl TargetOutputs {
	pub fn has_lang(&self, ty: SourceType) -> bool {
		self.compiles.iter().any(|c| c.ty == ty)
	}
}

fn tool_label(ty: SourceType) -> &'static str {
	match ty {
		SourceType::C => "C compiler",
		SourceType::Cpp => "C++ compiler",
		SourceType::Asm => "assembler",
		SourceType::Object | SourceType::ModuleDef | SourceType::Unknown => "tool",
	}
}

pub(crate) fn compiler_or_err<'a>(
	toolchain: &'a Toolchain,
	ty: SourceType,
	target: &Target,
) -> Result<&'a Tool, EmitError> {
	toolchain
		.compiler_for(ty)
		.ok_or_else(|| EmitError::MissingTool { tool: tool_label(ty), target: target.label.to_string() })
}

pub(crate) fn linker_or_err<'a>(toolchain: &'a Toolchain, target: &Target) -> Result<&'a Tool, EmitError> {
	let tool = match target.kind {
		TargetKind::SourceSet | TargetKind::Action => "stamp tool",
		TargetKind::StaticLibrary | TargetKind::CompleteStaticLibrary => "static linker",
		TargetKind::SharedLibrary | TargetKind::LoadableModule | TargetKind::Executable => "linker",
	};
	toolchain
		.linker_for(target.kind)
		.ok_or_else(|| EmitError::MissingTool { tool, target: target.label.to_string() })
}

/// Maps each source to its intermediate output. Compiled languages get an
/// object under the target's out dir, already-compiled objects pass through
/// verbatim, module-definition files are set aside for the link step, and
/// unrecognized extensions are dropped. A second source mapping to an
/// already-taken object path is reported and loses to the first.
pub(crate) fn plan_compiles(
	target: &Target,
	toolchain: &Toolchain,
	build: &BuildSettings,
	diagnostics: Option<&Diagnostics>,
) -> Result<TargetOutputs, EmitError> {
	let out_dir = toolchain.target_out_dir(&target.label.dir);
	let mut outputs = TargetOutputs::default();
	let mut seen = HashMap::<String, SourceFile>::new();
	for source in &target.sources {
		match source_type(source) {
			SourceType::Object => outputs.objects.push(build.rebase_file(source)),
			SourceType::ModuleDef => {
				if outputs.module_def.is_none() {
					outputs.module_def = Some(source.clone());
				}
			}
			SourceType::Unknown => {}
			ty => {
				let tool = compiler_or_err(toolchain, ty, target)?;
				let object =
					format!("{}/{}.{}{}", out_dir, target.label.name, source.stem(), tool.object_extension);
				if let Some(existing) = seen.get(&object) {
					if let Some(diagnostics) = diagnostics {
						diagnostics.report_duplicate_output(&object, existing, source);
					}
					continue;
				}
				seen.insert(object.clone(), source.clone());
				outputs.objects.push(object.clone());
				outputs.compiles.push(CompileInput {
					source: source.clone(),
					ty,
					rule: tool.rule.clone(),
					object,
				});
			}
		}
	}
	Ok(outputs)
}

/// "libshlib": the terminal tool's prefix plus the target name.
pub(crate) fn output_name(target: &Target, tool: &Tool) -> String {
	format!("{}{}", tool.output_prefix, target.label.name)
}

pub(crate) fn stamp_file(target: &Target, toolchain: &Toolchain) -> String {
	format!("{}/{}.stamp", toolchain.target_out_dir(&target.label.dir), target.label.name)
}

/// The file a consumer waits on or links against. Archives live under the
/// target's out dir; linked artifacts at the root of the build directory.
pub(crate) fn output_file(target: &Target, toolchain: &Toolchain) -> Result<String, EmitError> {
	match target.kind {
		TargetKind::SourceSet | TargetKind::Action => Ok(stamp_file(target, toolchain)),
		kind => {
			let tool = linker_or_err(toolchain, target)?;
			let extension = target.output_extension.resolve(&tool.default_output_extension);
			let dir = match kind {
				TargetKind::StaticLibrary | TargetKind::CompleteStaticLibrary => {
					toolchain.target_out_dir(&target.label.dir)
				}
				_ => toolchain.root_out_dir(),
			};
			Ok(format!("{}/{}{}", dir, output_name(target, tool), extension))
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::target::Label;

	fn build() -> BuildSettings {
		BuildSettings::new("//out/Debug/")
	}

	fn source_set(sources: &[&str]) -> Target {
		let mut target = Target::new(Label::new("//foo/", "bar"), TargetKind::SourceSet);
		target.sources = sources.iter().map(|s| SourceFile::new(*s)).collect();
		target
	}

	#[test]
	fn objects_interleave_in_source_order() {
		let target = source_set(&["//foo/a.cc", "//foo/b.o", "//foo/c.c", "//foo/d.S"]);
		let outputs = plan_compiles(&target, &Toolchain::host_defaults(), &build(), None).unwrap();
		assert_eq!(outputs.objects, vec!["obj/foo/bar.a.o", "../../foo/b.o", "obj/foo/bar.c.o"]);
		assert_eq!(outputs.compiles.len(), 2);
		assert_eq!(outputs.compiles[0].rule, "cxx");
		assert_eq!(outputs.compiles[1].rule, "cc");
	}

	#[test]
	fn duplicate_keeps_first_mapping() {
		let target = source_set(&["//foo/a.cc", "//foo/a.cc"]);
		let diagnostics = Diagnostics::new();
		let outputs =
			plan_compiles(&target, &Toolchain::host_defaults(), &build(), Some(&diagnostics)).unwrap();
		assert_eq!(outputs.compiles.len(), 1);
		assert_eq!(outputs.objects, vec!["obj/foo/bar.a.o"]);
		assert!(diagnostics.is_failed());
	}

	#[test]
	fn missing_compiler_is_fatal() {
		let target = source_set(&["//foo/a.c"]);
		let toolchain = Toolchain { cc: None, ..Toolchain::host_defaults() };
		let err = plan_compiles(&target, &toolchain, &build(), None).unwrap_err();
		let message = err.to_string();
		assert!(message.contains("C compiler"), "{}", message);
		assert!(message.contains("//foo:bar"), "{}", message);
	}

	#[test]
	fn module_def_is_set_aside() {
		let target = source_set(&["//foo/a.cc", "//foo/bar.def"]);
		let outputs = plan_compiles(&target, &Toolchain::host_defaults(), &build(), None).unwrap();
		assert_eq!(outputs.module_def, Some(SourceFile::new("//foo/bar.def")));
		assert_eq!(outputs.compiles.len(), 1);
	}

	#[test]
	fn artifact_naming() {
		let toolchain = Toolchain::host_defaults();
		let shlib = Target::new(Label::new("//foo/", "shlib"), TargetKind::SharedLibrary);
		assert_eq!(output_file(&shlib, &toolchain).unwrap(), "./libshlib.so");

		let stlib = Target::new(Label::new("//foo/", "stlib"), TargetKind::StaticLibrary);
		assert_eq!(output_file(&stlib, &toolchain).unwrap(), "obj/foo/libstlib.a");

		let exe = Target::new(Label::new("//foo/", "exe"), TargetKind::Executable);
		assert_eq!(output_file(&exe, &toolchain).unwrap(), "./exe");

		let source_set = Target::new(Label::new("//foo/", "bar"), TargetKind::SourceSet);
		assert_eq!(output_file(&source_set, &toolchain).unwrap(), "obj/foo/bar.stamp");
	}
}

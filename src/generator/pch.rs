use crate::{
	misc::{SourceFile, SourceType},
	target::Target,
	toolchain::{PchMode, Toolchain},
};

use super::outputs::TargetOutputs;

/// One synthesized generator edge: compiles the precompiled source into the
/// per-language artifact every ordinary compile of that language waits on.
#[derive(Debug)]
pub(crate) struct PchEdge {
	pub ty: SourceType,
	pub rule: String,
	pub input: SourceFile,
	pub output: String,
	pub flag_key: &'static str,
	pub flag_value: String,
}

#[derive(Debug, Default)]
pub(crate) struct PchPlan {
	pub edges: Vec<PchEdge>,
	/// Consumption flags appended to the target-level flag lines.
	pub cflags_c: Vec<String>,
	pub cflags_cc: Vec<String>,
	/// Hard dependency of ordinary compiles, per language.
	pub compile_dep_c: Option<String>,
	pub compile_dep_cc: Option<String>,
	/// MSVC-style precompiled objects are real link inputs.
	pub link_objects: Vec<String>,
}

impl PchPlan {
	pub fn compile_dep(&self, ty: SourceType) -> Option<&str> {
		match ty {
			SourceType::C => self.compile_dep_c.as_deref(),
			SourceType::Cpp => self.compile_dep_cc.as_deref(),
			_ => None,
		}
	}

	pub fn forces_flags(&self, ty: SourceType) -> bool {
		match ty {
			SourceType::C => !self.cflags_c.is_empty(),
			SourceType::Cpp => !self.cflags_cc.is_empty(),
			_ => false,
		}
	}

	fn lang_flags_mut(&mut self, ty: SourceType) -> &mut Vec<String> {
		match ty {
			SourceType::C => &mut self.cflags_c,
			_ => &mut self.cflags_cc,
		}
	}

	fn set_compile_dep(&mut self, ty: SourceType, dep: String) {
		match ty {
			SourceType::C => self.compile_dep_c = Some(dep),
			_ => self.compile_dep_cc = Some(dep),
		}
	}
}

const PCH_LANGS: [(SourceType, &str, &str); 2] =
	[(SourceType::C, "c", "cflags_c"), (SourceType::Cpp, "cc", "cflags_cc")];

/// Decides whether to synthesize per-language precompile edges. A no-op
/// unless the target requests a header and source pair and the language's
/// tool advertises a PCH mode. Only languages actually present among the
/// target's compiles get an edge.
pub(crate) fn plan_pch(target: &Target, toolchain: &Toolchain, outputs: &TargetOutputs) -> PchPlan {
	let mut plan = PchPlan::default();
	let (header, pch_source) = match target.precompiled_header_pair() {
		Some(pair) => pair,
		None => return plan,
	};
	let out_dir = toolchain.target_out_dir(&target.label.dir);
	for (ty, tag, flag_key) in PCH_LANGS {
		if !outputs.has_lang(ty) {
			continue;
		}
		let tool = match toolchain.compiler_for(ty) {
			Some(tool) => tool,
			None => continue,
		};
		let base = format!("{}/{}.{}", out_dir, target.label.name, pch_source.stem());
		match tool.pch {
			PchMode::None => {}
			PchMode::Msvc => {
				// One object per language, compiled with /Yc and linked like
				// any other object. Ordinary compiles share the .pch via
				// /Fp + /Yu.
				let pch_file = format!("{}/{}_{}.pch", out_dir, target.label.name, tag);
				let object = format!("{}.{}{}", base, tag, tool.object_extension);
				plan.lang_flags_mut(ty)
					.extend([format!("/Fp{}", pch_file), format!("/Yu{}", header)]);
				plan.edges.push(PchEdge {
					ty,
					rule: tool.rule.clone(),
					input: pch_source.clone(),
					output: object.clone(),
					flag_key,
					flag_value: format!("${{{}}} /Yc{}", flag_key, header),
				});
				plan.set_compile_dep(ty, object.clone());
				plan.link_objects.push(object);
			}
			PchMode::Gcc => {
				// The header itself is compiled with a language-forcing
				// flag; consumers -include the artifact path minus .gch.
				let artifact = format!("{}.h-{}", base, tag);
				let user_flags = match ty {
					SourceType::C => &target.cflags_c,
					_ => &target.cflags_cc,
				};
				let force = match ty {
					SourceType::C => "-x c-header",
					_ => "-x c++-header",
				};
				let mut flag_value = user_flags.join(" ");
				if !flag_value.is_empty() {
					flag_value.push(' ');
				}
				flag_value.push_str(force);
				plan.lang_flags_mut(ty).push(format!("-include {}", artifact));
				plan.edges.push(PchEdge {
					ty,
					rule: tool.rule.clone(),
					input: pch_source.clone(),
					output: format!("{}.gch", artifact),
					flag_key,
					flag_value,
				});
				plan.set_compile_dep(ty, format!("{}.gch", artifact));
			}
		}
	}
	plan
}

use std::{fs::File, io::Write, path::Path, sync::Arc};

use crate::{
	diagnostics::Diagnostics,
	misc::{BuildSettings, SourceType},
	target::{LibFile, Target, TargetKind},
	toolchain::{Tool, Toolchain},
};

use super::{
	classify::{classify_deps, ClassifiedDeps},
	outputs::{linker_or_err, output_file, output_name, plan_compiles, CompileInput, TargetOutputs},
	pch::{plan_pch, PchEdge, PchPlan},
	EmitError,
};

/// Escape a path for a ninja build statement line.
fn ninja_escape(path: &str) -> String {
	let mut out = String::with_capacity(path.len());
	for ch in path.chars() {
		match ch {
			'$' => out.push_str("$$"),
			' ' => out.push_str("$ "),
			':' => out.push_str("$:"),
			_ => out.push(ch),
		}
	}
	out
}

fn transform_defines(defines: &[String]) -> Vec<String> {
	defines
		.iter()
		.map(|x| {
			let mut s = x.split('=');
			let def_name = s.next().unwrap(); // MY_DEFINE; split always yields one item
			let def_value = s.collect::<Vec<_>>();
			let def = if def_value.is_empty() {
				x.clone()
			} else {
				let def_value = def_value.join("=").replace('"', r#"\""#);
				if def_value.contains(char::is_whitespace) {
					def_name.to_owned() + r#"=""# + &def_value + r#"""#
				} else {
					def_name.to_owned() + "=" + &def_value
				}
			};
			"-D".to_string() + &def
		})
		.collect()
}

/// Writes the variable block, compile edges and terminal edge for one
/// target. Stateless across targets; the only shared state is Diagnostics.
pub struct NinjaTargetWriter<'a> {
	target: &'a Target,
	toolchain: &'a Toolchain,
	build: &'a BuildSettings,
	diagnostics: &'a Diagnostics,
	out: String,
}

/// Emit the build statements for one target.
pub fn write_target(
	target: &Target,
	toolchain: &Toolchain,
	build: &BuildSettings,
	diagnostics: &Diagnostics,
) -> Result<String, EmitError> {
	NinjaTargetWriter::new(target, toolchain, build, diagnostics).run()
}

impl<'a> NinjaTargetWriter<'a> {
	pub fn new(
		target: &'a Target,
		toolchain: &'a Toolchain,
		build: &'a BuildSettings,
		diagnostics: &'a Diagnostics,
	) -> NinjaTargetWriter<'a> {
		NinjaTargetWriter { target, toolchain, build, diagnostics, out: String::new() }
	}

	pub fn run(mut self) -> Result<String, EmitError> {
		log::debug!("   target: {}", self.target.label);
		let deps = classify_deps(self.target, self.toolchain, self.build)?;
		if self.target.kind == TargetKind::Action {
			// The action itself belongs to another writer; only the stamp
			// consumers wait on is emitted here.
			self.write_terminal_edge(&TargetOutputs::default(), &deps, &PchPlan::default())?;
			return Ok(self.out);
		}
		let outputs = plan_compiles(self.target, self.toolchain, self.build, Some(self.diagnostics))?;
		let pch = plan_pch(self.target, self.toolchain, &outputs);
		self.write_vars(&outputs, &pch)?;
		self.out.push('\n');
		for edge in &pch.edges {
			self.write_pch_edge(edge, &deps);
			self.out.push('\n');
		}
		for compile in &outputs.compiles {
			self.write_compile_edge(compile, &pch, &deps);
		}
		self.out.push('\n');
		self.write_terminal_edge(&outputs, &deps, &pch)?;
		Ok(self.out)
	}

	fn write_var(&mut self, key: &str, values: &[String]) {
		if values.is_empty() {
			self.out.push_str(key);
			self.out.push_str(" =\n");
		} else {
			self.out.push_str(&format!("{} = {}\n", key, values.join(" ")));
		}
	}

	fn write_edge_var(&mut self, key: &str, value: &str) {
		if value.is_empty() {
			self.out.push_str(&format!("  {} =\n", key));
		} else {
			self.out.push_str(&format!("  {} = {}\n", key, value));
		}
	}

	/// Fixed category order: defines, include dirs, per-language flags for
	/// the languages actually present, output dirs, output name.
	fn write_vars(&mut self, outputs: &TargetOutputs, pch: &PchPlan) -> Result<(), EmitError> {
		self.write_var("defines", &transform_defines(&self.target.defines));
		let include_dirs = self
			.target
			.include_dirs
			.iter()
			.map(|dir| format!("-I{}", self.build.rebase_dir(dir)))
			.collect::<Vec<_>>();
		self.write_var("include_dirs", &include_dirs);

		if outputs.has_lang(SourceType::Asm) {
			self.write_var("asmflags", &self.target.asmflags);
		}
		if !outputs.compiles.is_empty() {
			self.write_var("cflags", &self.target.cflags);
		}
		if outputs.has_lang(SourceType::C) || pch.forces_flags(SourceType::C) {
			let mut cflags_c = self.target.cflags_c.clone();
			cflags_c.extend(pch.cflags_c.iter().cloned());
			self.write_var("cflags_c", &cflags_c);
		}
		if outputs.has_lang(SourceType::Cpp) || pch.forces_flags(SourceType::Cpp) {
			let mut cflags_cc = self.target.cflags_cc.clone();
			cflags_cc.extend(pch.cflags_cc.iter().cloned());
			self.write_var("cflags_cc", &cflags_cc);
		}

		let tool = linker_or_err(self.toolchain, self.target)?;
		self.write_var("root_out_dir", &[self.toolchain.root_out_dir()]);
		self.write_var("target_out_dir", &[self.toolchain.target_out_dir(&self.target.label.dir)]);
		self.write_var("target_output_name", &[output_name(self.target, tool)]);
		Ok(())
	}

	fn write_build_line(&mut self, output: &str, rule: &str, inputs: &[String], hard: &[String], order: &[String]) {
		let mut line = format!("build {}: {}", ninja_escape(output), rule);
		for input in inputs {
			line.push(' ');
			line.push_str(&ninja_escape(input));
		}
		if !hard.is_empty() {
			line.push_str(" |");
			for dep in hard {
				line.push(' ');
				line.push_str(&ninja_escape(dep));
			}
		}
		if !order.is_empty() {
			line.push_str(" ||");
			for dep in order {
				line.push(' ');
				line.push_str(&ninja_escape(dep));
			}
		}
		self.out.push_str(&line);
		self.out.push('\n');
	}

	fn write_compile_edge(&mut self, compile: &CompileInput, pch: &PchPlan, deps: &ClassifiedDeps) {
		let hard = match pch.compile_dep(compile.ty) {
			Some(dep) => vec![dep.to_owned()],
			None => Vec::new(),
		};
		self.write_build_line(
			&compile.object,
			&compile.rule,
			&[self.build.rebase_file(&compile.source)],
			&hard,
			&deps.compile_order_deps,
		);
		self.write_edge_var("source_name_part", compile.source.stem());
		self.write_edge_var("source_out_dir", &self.toolchain.target_out_dir(&self.target.label.dir));
	}

	fn write_pch_edge(&mut self, edge: &PchEdge, deps: &ClassifiedDeps) {
		self.write_build_line(
			&edge.output,
			&edge.rule,
			&[self.build.rebase_file(&edge.input)],
			&[],
			&deps.compile_order_deps,
		);
		self.write_edge_var("source_name_part", edge.input.stem());
		self.write_edge_var("source_out_dir", &self.toolchain.target_out_dir(&self.target.label.dir));
		self.write_edge_var(edge.flag_key, &edge.flag_value);
	}

	fn write_terminal_edge(
		&mut self,
		outputs: &TargetOutputs,
		deps: &ClassifiedDeps,
		pch: &PchPlan,
	) -> Result<(), EmitError> {
		let tool = linker_or_err(self.toolchain, self.target)?;
		let output = output_file(self.target, self.toolchain)?;

		let mut objects = outputs.objects.clone();
		for object in &pch.link_objects {
			if !objects.contains(object) {
				objects.push(object.clone());
			}
		}
		let mut hard_deps = Vec::new();
		match self.target.kind {
			TargetKind::SourceSet | TargetKind::Action | TargetKind::StaticLibrary => {
				// Own objects only. Source-set deps re-emit through their
				// stamps; archive deps surface at the consumer that links.
			}
			TargetKind::CompleteStaticLibrary => {
				for object in &deps.link_objects {
					if !objects.contains(object) {
						objects.push(object.clone());
					}
				}
			}
			TargetKind::SharedLibrary | TargetKind::LoadableModule | TargetKind::Executable => {
				for object in &deps.link_objects {
					if !objects.contains(object) {
						objects.push(object.clone());
					}
				}
				hard_deps.extend(deps.hard_deps.iter().cloned());
				for lib in &self.target.libs {
					if let LibFile::Path(path) = lib {
						let rebased = self.build.rebase_file(path);
						if !hard_deps.contains(&rebased) {
							hard_deps.push(rebased);
						}
					}
				}
				if let Some(def) = &outputs.module_def {
					let rebased = self.build.rebase_file(def);
					if !hard_deps.contains(&rebased) {
						hard_deps.push(rebased);
					}
				}
			}
		}

		self.write_build_line(&output, &tool.rule, &objects, &hard_deps, &deps.order_only_deps);

		match self.target.kind {
			TargetKind::SourceSet | TargetKind::Action => {}
			TargetKind::StaticLibrary | TargetKind::CompleteStaticLibrary => {
				self.write_edge_var(
					"output_extension",
					&self.target.output_extension.resolve(&tool.default_output_extension),
				);
			}
			TargetKind::SharedLibrary | TargetKind::LoadableModule | TargetKind::Executable => {
				let mut ldflags = self.target.ldflags.clone();
				for dir in &self.target.lib_dirs {
					ldflags.push(format!("-L{}", self.build.rebase_dir(dir)));
				}
				if let Some(def) = &outputs.module_def {
					ldflags.push(format!("/DEF:{}", self.build.rebase_file(def)));
				}
				let mut libs = Vec::new();
				for lib in &self.target.libs {
					match lib {
						LibFile::Path(path) => libs.push(self.build.rebase_file(path)),
						LibFile::Name(name) => libs.push(format!("-l{}", name)),
					}
				}
				self.write_edge_var("ldflags", &ldflags.join(" "));
				self.write_edge_var("libs", &libs.join(" "));
				self.write_edge_var(
					"output_extension",
					&self.target.output_extension.resolve(&tool.default_output_extension),
				);
			}
		}
		Ok(())
	}
}

fn rule_block(tool: &Tool) -> Option<String> {
	let command = tool.command.as_ref()?;
	let mut out = format!("rule {}\n  command = {}\n", tool.rule, command);
	if let Some(description) = &tool.description {
		out += &format!("  description = {}\n", description);
	}
	if let Some(depfile) = &tool.depfile {
		out += &format!("  depfile = {}\n", depfile);
	}
	if let Some(deps) = &tool.deps {
		out += &format!("  deps = {}\n", deps);
	}
	out.push('\n');
	Some(out)
}

/// Rule declarations for every tool carrying a command template.
pub fn write_rules(toolchain: &Toolchain) -> String {
	let mut out = String::new();
	let tools = [
		&toolchain.cc,
		&toolchain.cxx,
		&toolchain.asm,
		&toolchain.alink,
		&toolchain.solink,
		&toolchain.solink_module,
		&toolchain.link,
		&toolchain.stamp,
	];
	for tool in tools.into_iter().flatten() {
		if let Some(block) = rule_block(tool) {
			out += &block;
		}
	}
	out
}

/// Emit a complete ninja file: rule blocks first, then every target's
/// statements in graph order.
pub fn generate(
	targets: &[Arc<Target>],
	toolchain: &Toolchain,
	build: &BuildSettings,
	diagnostics: &Diagnostics,
	ninja_path: &Path,
) -> Result<(), String> {
	let mut blocks = Vec::with_capacity(targets.len());
	for target in targets {
		match write_target(target, toolchain, build, diagnostics) {
			Ok(text) => blocks.push(text),
			Err(e) => return Err(format!("Error generating rules for \"{}\": {}", target.label, e)),
		}
	}
	let mut f = match File::create(ninja_path) {
		Ok(x) => x,
		Err(e) => return Err(format!("Error creating {}: {}", ninja_path.display(), e)),
	};
	if let Err(e) = f.write_all(write_rules(toolchain).as_bytes()) {
		return Err(format!("Error writing to {}: {}", ninja_path.display(), e));
	}
	if let Err(e) = f.write_all(blocks.join("\n").as_bytes()) {
		return Err(format!("Error writing to {}: {}", ninja_path.display(), e));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn escaping() {
		assert_eq!(ninja_escape("obj/foo/bar.o"), "obj/foo/bar.o");
		assert_eq!(ninja_escape("c:/odd path/$x"), "c$:/odd$ path/$$x");
	}

	#[test]
	fn define_transformation() {
		let defines = vec![
			"NDEBUG".to_owned(),
			"VERSION=3".to_owned(),
			r#"NAME="abc def""#.to_owned(),
		];
		assert_eq!(
			transform_defines(&defines),
			vec!["-DNDEBUG".to_owned(), "-DVERSION=3".to_owned(), r#"-DNAME="\"abc def\"""#.to_owned()]
		);
	}

	#[test]
	fn rule_blocks_only_for_tools_with_commands() {
		let mut toolchain = Toolchain::default();
		let mut stamp = Tool::new("stamp");
		stamp.command = Some("touch $out".to_owned());
		stamp.description = Some("STAMP $out".to_owned());
		toolchain.stamp = Some(stamp);
		toolchain.link = Some(Tool::new("link")); // no command, no block

		assert_eq!(write_rules(&toolchain), "rule stamp\n  command = touch $out\n  description = STAMP $out\n\n");
	}
}

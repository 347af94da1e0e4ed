use std::collections::HashSet;

use crate::{
	misc::BuildSettings,
	target::{Label, Target, TargetKind},
	toolchain::Toolchain,
};

use super::{
	outputs::{output_file, plan_compiles, stamp_file},
	EmitError,
};

/// Dependency contributions to one target's edges, in declaration order.
/// Built fresh per emission and discarded once the edges are written.
#[derive(Debug, Default)]
pub(crate) struct ClassifiedDeps {
	/// Object files contributed by public source-set deps, flattened.
	pub link_objects: Vec<String>,
	/// Terminal-edge inputs that are also linker arguments.
	pub hard_deps: Vec<String>,
	/// Terminal-edge inputs that only gate ordering.
	pub order_only_deps: Vec<String>,
	/// Stamps of direct action deps; every compile edge waits on these so
	/// generated inputs exist before compilation.
	pub compile_order_deps: Vec<String>,
}

fn push_unique(list: &mut Vec<String>, value: String) {
	if !list.contains(&value) {
		list.push(value);
	}
}

/// Whether a source set's stamp carries an ordering obligation consumers
/// must preserve: a data dep of its own, or one further down its public
/// source-set chain.
pub(crate) fn has_data_dep_chain(target: &Target) -> bool {
	fn walk(target: &Target, visited: &mut HashSet<Label>) -> bool {
		if !target.data_deps.is_empty() {
			return true;
		}
		target
			.public_deps
			.iter()
			.any(|dep| dep.kind == TargetKind::SourceSet && visited.insert(dep.label.clone()) && walk(dep, visited))
	}
	walk(target, &mut HashSet::new())
}

/// Walks the target's public deps and partitions their contributions.
/// Source sets hand their objects to the walk and recurse; static libraries
/// stay opaque archives but keep their subtree visible; everything else is
/// a finished artifact the walk stops at.
pub(crate) fn classify_deps(
	target: &Target,
	toolchain: &Toolchain,
	build: &BuildSettings,
) -> Result<ClassifiedDeps, EmitError> {
	let mut deps = ClassifiedDeps::default();
	let mut visited = HashSet::new();
	let mut stack = Vec::new();
	for dep in &target.public_deps {
		visit(dep, target, toolchain, build, &mut deps, &mut visited, &mut stack)?;
	}
	// Runtime-only deps of this target: never linked, never hard.
	for data_dep in &target.data_deps {
		push_unique(&mut deps.order_only_deps, output_file(data_dep, toolchain)?);
	}
	for dep in &target.public_deps {
		if dep.kind == TargetKind::Action {
			push_unique(&mut deps.compile_order_deps, stamp_file(dep, toolchain));
		}
	}
	Ok(deps)
}

fn visit(
	dep: &Target,
	consumer: &Target,
	toolchain: &Toolchain,
	build: &BuildSettings,
	deps: &mut ClassifiedDeps,
	visited: &mut HashSet<Label>,
	stack: &mut Vec<Label>,
) -> Result<(), EmitError> {
	if stack.contains(&dep.label) {
		// The resolver guarantees acyclicity; fail fast rather than recurse.
		return Err(EmitError::DependencyCycle(dep.label.to_string()));
	}
	if !visited.insert(dep.label.clone()) {
		return Ok(());
	}
	match dep.kind {
		TargetKind::Action => {
			push_unique(&mut deps.order_only_deps, stamp_file(dep, toolchain));
		}
		TargetKind::SourceSet => {
			let outputs = plan_compiles(dep, toolchain, build, None)?;
			for object in outputs.objects {
				push_unique(&mut deps.link_objects, object);
			}
			// Consumers that absorb these objects into their own edge only
			// need the stamp when a data-dep chain hangs off it; the others
			// have no edge to the objects except the stamp itself.
			let absorbs = matches!(
				consumer.kind,
				TargetKind::CompleteStaticLibrary
					| TargetKind::SharedLibrary
					| TargetKind::LoadableModule
					| TargetKind::Executable
			);
			if !absorbs || has_data_dep_chain(dep) {
				push_unique(&mut deps.order_only_deps, stamp_file(dep, toolchain));
			}
			stack.push(dep.label.clone());
			for next in &dep.public_deps {
				visit(next, consumer, toolchain, build, deps, visited, stack)?;
			}
			stack.pop();
		}
		TargetKind::StaticLibrary => {
			if consumer.links_dependencies() {
				push_unique(&mut deps.hard_deps, output_file(dep, toolchain)?);
			}
			// A non-complete archive holds only its own objects, so the
			// contributions below it stay visible to this consumer.
			stack.push(dep.label.clone());
			for next in &dep.public_deps {
				visit(next, consumer, toolchain, build, deps, visited, stack)?;
			}
			stack.pop();
		}
		TargetKind::CompleteStaticLibrary | TargetKind::SharedLibrary => {
			// Self-contained artifacts; nothing beneath them propagates.
			if consumer.links_dependencies() {
				push_unique(&mut deps.hard_deps, output_file(dep, toolchain)?);
			}
		}
		TargetKind::LoadableModule | TargetKind::Executable => {
			// Consumed at runtime, never a linker argument.
			push_unique(&mut deps.order_only_deps, output_file(dep, toolchain)?);
		}
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use super::*;
	use crate::misc::SourceFile;

	fn build() -> BuildSettings {
		BuildSettings::new("//out/Debug/")
	}

	fn target_with_sources(name: &str, kind: TargetKind, sources: &[&str]) -> Target {
		let mut target = Target::new(Label::new("//foo/", name), kind);
		target.sources = sources.iter().map(|s| SourceFile::new(*s)).collect();
		target
	}

	#[test]
	fn source_set_objects_flatten_in_declaration_order() {
		let inner = Arc::new(target_with_sources("inner", TargetKind::SourceSet, &["//foo/i.cc"]));
		let mut outer = target_with_sources("outer", TargetKind::SourceSet, &["//foo/o.cc"]);
		outer.public_deps.push(inner);
		let outer = Arc::new(outer);

		let mut exe = Target::new(Label::new("//foo/", "exe"), TargetKind::Executable);
		exe.public_deps.push(outer);

		let deps = classify_deps(&exe, &Toolchain::host_defaults(), &build()).unwrap();
		assert_eq!(deps.link_objects, vec!["obj/foo/outer.o.o", "obj/foo/inner.i.o"]);
		// No data deps anywhere: an absorbing consumer has no use for stamps.
		assert!(deps.order_only_deps.is_empty());
	}

	#[test]
	fn diamond_contributes_once() {
		let shared = Arc::new(target_with_sources("shared", TargetKind::SourceSet, &["//foo/s.cc"]));
		let mut left = target_with_sources("left", TargetKind::SourceSet, &["//foo/l.cc"]);
		left.public_deps.push(shared.clone());
		let mut right = target_with_sources("right", TargetKind::SourceSet, &["//foo/r.cc"]);
		right.public_deps.push(shared);

		let mut exe = Target::new(Label::new("//foo/", "exe"), TargetKind::Executable);
		exe.public_deps.push(Arc::new(left));
		exe.public_deps.push(Arc::new(right));

		let deps = classify_deps(&exe, &Toolchain::host_defaults(), &build()).unwrap();
		assert_eq!(
			deps.link_objects,
			vec!["obj/foo/left.l.o", "obj/foo/shared.s.o", "obj/foo/right.r.o"]
		);
	}

	#[test]
	fn data_deps_are_order_only_everywhere() {
		let runtime = Arc::new(Target::new(Label::new("//foo/", "helper"), TargetKind::Executable));
		let mut target = target_with_sources("bar", TargetKind::SharedLibrary, &["//foo/a.cc"]);
		target.data_deps.push(runtime);

		let deps = classify_deps(&target, &Toolchain::host_defaults(), &build()).unwrap();
		assert!(deps.link_objects.is_empty());
		assert!(deps.hard_deps.is_empty());
		assert_eq!(deps.order_only_deps, vec!["./helper"]);
	}

	#[test]
	fn data_dep_chain_forces_stamp_on_absorbing_consumer() {
		let runtime = Arc::new(Target::new(Label::new("//foo/", "helper"), TargetKind::Executable));
		let mut inner = target_with_sources("inner", TargetKind::SourceSet, &["//foo/i.cc"]);
		inner.data_deps.push(runtime);
		let mut outer = target_with_sources("outer", TargetKind::SourceSet, &["//foo/o.cc"]);
		outer.public_deps.push(Arc::new(inner));
		assert!(has_data_dep_chain(&outer));

		let mut exe = Target::new(Label::new("//foo/", "exe"), TargetKind::Executable);
		exe.public_deps.push(Arc::new(outer));
		let deps = classify_deps(&exe, &Toolchain::host_defaults(), &build()).unwrap();
		assert!(deps.order_only_deps.contains(&"obj/foo/outer.stamp".to_owned()));
	}

	#[test]
	fn libraries_stay_opaque_but_keep_their_subtree_visible() {
		let nested = Arc::new(target_with_sources("nested", TargetKind::SourceSet, &["//foo/n.cc"]));
		let mut archive = Target::new(Label::new("//foo/", "archive"), TargetKind::StaticLibrary);
		archive.public_deps.push(nested);

		let mut exe = Target::new(Label::new("//foo/", "exe"), TargetKind::Executable);
		exe.public_deps.push(Arc::new(archive));

		let deps = classify_deps(&exe, &Toolchain::host_defaults(), &build()).unwrap();
		assert_eq!(deps.hard_deps, vec!["obj/foo/libarchive.a"]);
		// The archive holds only its own objects; the nested source set's
		// objects surface at this link.
		assert_eq!(deps.link_objects, vec!["obj/foo/nested.n.o"]);
	}

	#[test]
	fn modules_and_executables_are_never_linked() {
		let module = Arc::new(Target::new(Label::new("//foo/", "plugin"), TargetKind::LoadableModule));
		let mut exe = target_with_sources("exe", TargetKind::Executable, &["//foo/main.cc"]);
		exe.public_deps.push(module);

		let deps = classify_deps(&exe, &Toolchain::host_defaults(), &build()).unwrap();
		assert!(deps.hard_deps.is_empty());
		assert_eq!(deps.order_only_deps, vec!["./libplugin.so"]);
	}

	#[test]
	fn action_deps_gate_compiles_and_terminal_edge() {
		let action = Arc::new(Target::new(Label::new("//foo/", "gen"), TargetKind::Action));
		let mut target = target_with_sources("bar", TargetKind::SharedLibrary, &["//foo/a.cc"]);
		target.public_deps.push(action);

		let deps = classify_deps(&target, &Toolchain::host_defaults(), &build()).unwrap();
		assert_eq!(deps.order_only_deps, vec!["obj/foo/gen.stamp"]);
		assert_eq!(deps.compile_order_deps, vec!["obj/foo/gen.stamp"]);
	}
}

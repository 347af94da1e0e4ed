pub(crate) mod classify;
pub mod ninja;
pub(crate) mod outputs;
pub(crate) mod pch;

use thiserror::Error;

/// Fatal per-target emission failures. A duplicate object file is not one
/// of these: it is recorded in Diagnostics and emission continues.
#[derive(Debug, Error)]
pub enum EmitError {
	#[error("No {tool} specified in toolchain. A {tool} is required to build \"{target}\".")]
	MissingTool { tool: &'static str, target: String },
	#[error("Dependency cycle through \"{0}\"")]
	DependencyCycle(String),
}

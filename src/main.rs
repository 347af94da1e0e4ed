use std::{
	path::{Path, PathBuf},
	process::ExitCode,
};

use clap::{Arg, Command};

use ballista::{
	diagnostics::Diagnostics,
	generator::ninja,
	graph,
	toolchain::{self, Toolchain},
};

fn main() -> ExitCode {
	env_logger::Builder::from_env(env_logger::Env::default().filter_or("BALLISTA_LOG", "off"))
		.format_timestamp(None)
		.init();

	let matches = Command::new("ballista")
		.about("Generates ninja build statements from a resolved target graph")
		.arg(
			Arg::new("graph")
				.short('G')
				.long("graph")
				.required(true)
				.value_name("path-to-graph-toml")
				.help("Resolved target graph description"),
		)
		.arg(
			Arg::new("toolchain")
				.short('T')
				.long("toolchain")
				.value_name("path-to-toolchain-toml")
				.help("Toolchain description; defaults to the host tool set"),
		)
		.arg(
			Arg::new("out")
				.short('o')
				.long("out")
				.default_value("build.ninja")
				.value_name("path")
				.help("Output ninja file"),
		)
		.get_matches();

	let graph_path = match matches.get_one::<String>("graph") {
		Some(x) => PathBuf::from(x),
		None => {
			println!("Error: Required option '--graph' missing");
			return ExitCode::FAILURE;
		}
	};
	let out_path = match matches.get_one::<String>("out") {
		Some(x) => PathBuf::from(x),
		None => PathBuf::from("build.ninja"),
	};

	let graph = match graph::read_graph(&graph_path) {
		Ok(x) => x,
		Err(e) => {
			println!("{}", e);
			return ExitCode::FAILURE;
		}
	};

	let toolchain = match matches.get_one::<String>("toolchain") {
		Some(path) => match toolchain::read_toolchain(Path::new(path)) {
			Ok(x) => x,
			Err(e) => {
				println!("{}", e);
				return ExitCode::FAILURE;
			}
		},
		None => Toolchain::host_defaults(),
	};

	log::info!("Generating {} for {} targets", out_path.display(), graph.targets.len());

	let diagnostics = Diagnostics::new();
	if let Err(e) = ninja::generate(&graph.targets, &toolchain, &graph.settings, &diagnostics, &out_path) {
		println!("{}", e);
		return ExitCode::FAILURE;
	}
	if diagnostics.is_failed() {
		if let Some(message) = diagnostics.first_error() {
			println!("{}", message);
		}
		return ExitCode::FAILURE;
	}

	ExitCode::SUCCESS
}

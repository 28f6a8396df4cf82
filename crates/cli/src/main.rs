//! `asnrd` binary.
//!
//! - `read`: enable a reader service, print every record as a JSON line
//! - `compile`: build schemas into a directory of units
//! - `check`: validate a reader configuration file

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, bail};
use asnrd_compiler::Classpath;
use asnrd_schema::split_file_list;
use asnrd_service::{Pipeline, ReaderConfig, ReaderService, Variables};
use clap::{Parser, Subcommand};
use tracing::info;

/// Command line arguments.
#[derive(Parser, Debug)]
#[command(name = "asnrd")]
#[command(about = "Compile ASN.1 schemas and read BER encoded records")]
struct Args {
	/// Verbose logging
	#[arg(short, long, global = true)]
	verbose: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Decode records from a file and print them as JSON lines
	Read(ReadArgs),

	/// Compile schema files into units under a directory
	Compile {
		/// Comma-separated schema files
		#[arg(long, value_name = "FILES")]
		schema: String,

		/// Output directory, created if missing
		#[arg(long, value_name = "DIR")]
		out: PathBuf,

		/// Directory of precompiled units to resolve references against
		#[arg(long = "classpath", value_name = "DIR")]
		classpath: Vec<PathBuf>,
	},

	/// Validate a reader configuration and list every problem
	Check {
		#[arg(value_name = "CONFIG")]
		config: PathBuf,
	},
}

#[derive(clap::Args, Debug)]
struct ReadArgs {
	/// TOML reader configuration; flags override its values
	#[arg(long, value_name = "FILE")]
	config: Option<PathBuf>,

	/// Comma-separated schema files
	#[arg(long, value_name = "FILES")]
	schema: Option<String>,

	/// Root type as MODULE-NAME.Type
	#[arg(long, value_name = "NAME", conflicts_with = "root_class_name")]
	root_model_name: Option<String>,

	/// Root type as a canonical name
	#[arg(long, value_name = "NAME")]
	root_class_name: Option<String>,

	/// Field of each root value whose elements are the records
	#[arg(long, value_name = "FIELD")]
	record_field: Option<String>,

	/// Variable for `${name}` placeholders
	#[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_var)]
	vars: Vec<(String, String)>,

	/// Input file, `-` for stdin
	#[arg(value_name = "INPUT")]
	input: PathBuf,
}

fn parse_var(arg: &str) -> Result<(String, String), String> {
	let (name, value) = arg.split_once('=').ok_or_else(|| format!("expected NAME=VALUE, got `{arg}`"))?;
	if name.trim().is_empty() {
		return Err(format!("empty variable name in `{arg}`"));
	}
	Ok((name.trim().to_string(), value.to_string()))
}

fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	setup_tracing(args.verbose);

	match args.command {
		Command::Read(read) => run_read(read),
		Command::Compile { schema, out, classpath } => run_compile(&schema, out, classpath),
		Command::Check { config } => run_check(config),
	}
}

fn run_read(args: ReadArgs) -> anyhow::Result<()> {
	let mut config = match &args.config {
		Some(path) => ReaderConfig::load(path)?,
		None => ReaderConfig::default(),
	};
	if args.schema.is_some() {
		config.schema_files = args.schema;
	}
	if let Some(name) = args.root_model_name {
		config.root_model_name = Some(name);
		config.root_class_name = None;
	}
	if let Some(name) = args.root_class_name {
		config.root_class_name = Some(name);
		config.root_model_name = None;
	}
	if args.record_field.is_some() {
		config.record_field = args.record_field;
	}
	let vars: Variables = args.vars.into_iter().collect();

	let input: Box<dyn Read> = if args.input.as_os_str() == "-" {
		Box::new(io::stdin().lock())
	} else {
		Box::new(File::open(&args.input).with_context(|| format!("cannot open {}", args.input.display()))?)
	};

	let service = ReaderService::default();
	service.enable(&config, &vars)?;
	let printed = print_records(&service, &vars, input);
	service.disable()?;

	let count = printed?;
	info!(records = count, "Finished reading");
	Ok(())
}

fn print_records(service: &ReaderService, vars: &Variables, input: impl Read) -> anyhow::Result<usize> {
	let reader = service.create_record_reader(vars, input)?;
	let mut out = BufWriter::new(io::stdout().lock());
	let mut count = 0;
	for record in reader {
		serde_json::to_writer(&mut out, &record?)?;
		writeln!(out)?;
		count += 1;
	}
	out.flush()?;
	Ok(count)
}

fn run_compile(schema: &str, out: PathBuf, entries: Vec<PathBuf>) -> anyhow::Result<()> {
	let files = split_file_list(schema);
	if files.is_empty() {
		bail!("no schema files given");
	}
	std::fs::create_dir_all(&out).with_context(|| format!("cannot create {}", out.display()))?;

	let classpath = entries.into_iter().fold(Classpath::runtime(), |classpath, dir| classpath.with_entry(dir));
	let report = Pipeline::default().compile(&files, &out, &classpath)?;
	println!("compiled {} types into {}", report.units.len(), out.display());
	Ok(())
}

fn run_check(path: PathBuf) -> anyhow::Result<()> {
	let config = ReaderConfig::load(&path)?;
	let issues = config.issues();
	if issues.is_empty() {
		println!("{}: ok", path.display());
		return Ok(());
	}
	for issue in &issues {
		println!("{}: {issue}", path.display());
	}
	bail!("{} configuration issue(s) in {}", issues.len(), path.display());
}

fn setup_tracing(verbose: bool) {
	use tracing_subscriber::EnvFilter;

	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
		let level = if verbose { "debug" } else { "info" };
		EnvFilter::new(
			["asnrd", "asnrd_schema", "asnrd_compiler", "asnrd_decoder", "asnrd_service"]
				.map(|target| format!("{target}={level}"))
				.join(","),
		)
	});

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(io::stderr)
		.with_target(verbose)
		.init();
}

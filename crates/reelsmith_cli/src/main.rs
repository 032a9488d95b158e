//! Reelsmith command-line front end.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use toml::{Table, Value};

use reelsmith_core::config::{
    deep_merge, load_overrides, ConfigManager, ConfigSection, EnvironmentProfile, PipelineConfig,
};
use reelsmith_core::logging::{init_tracing, JobLogger, LogConfig, LogLevel};
use reelsmith_core::orchestrator::{default_output_dir, Orchestrator, PipelineError};
use reelsmith_core::tool::ProcessTool;

#[derive(Parser, Debug)]
#[command(author, version, about = "Batch post-production for a single media file", long_about = None)]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run every stage over one input
    Process(ProcessArgs),
    /// Check configuration, input and tools without processing
    DryRun(DryRunArgs),
    /// Write a commented default configuration file
    InitConfig(InitConfigArgs),
}

#[derive(Args, Debug)]
struct ProcessArgs {
    /// Input video or audio file
    input: PathBuf,
    /// Output directory (default: <input stem>_output next to the input)
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Override one value, e.g. `--set audio.target_loudness_lufs=-14`
    #[arg(long = "set", value_name = "SECTION.KEY=VALUE")]
    set: Vec<String>,
    /// TOML file of overrides, applied before `--set`
    #[arg(long)]
    overrides: Option<PathBuf>,
    /// Stop after the first failed stage
    #[arg(long)]
    fail_fast: bool,
}

#[derive(Args, Debug)]
struct DryRunArgs {
    /// Input video or audio file
    input: PathBuf,
    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct InitConfigArgs {
    /// Where to write the file
    path: PathBuf,
    /// Replace an existing file
    #[arg(long)]
    force: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    });

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::from(2)
        }
    }
}

/// Returns whether the command completed without reported errors.
fn run(cli: Cli) -> Result<bool> {
    match cli.command {
        Commands::Process(args) => process(args, cli.verbose),
        Commands::DryRun(args) => dry_run(args),
        Commands::InitConfig(args) => init_config(args),
    }
}

fn process(args: ProcessArgs, verbose: bool) -> Result<bool> {
    // checked before the console logger creates anything under the output dir
    if !args.input.is_file() {
        return Err(PipelineError::input_not_found(&args.input).into());
    }
    let base = load_base_config(args.config.as_deref())?;
    let profile = EnvironmentProfile::detect();
    if profile.is_ci() {
        tracing::info!("CI environment detected; using safe settings");
    }

    let mut overrides = Table::new();
    if let Some(ref path) = args.overrides {
        let file = load_overrides(path)
            .with_context(|| format!("loading overrides from {}", path.display()))?;
        overrides = deep_merge(&overrides, &file);
    }
    for assignment in &args.set {
        let (section, key, value) = parse_assignment(assignment)?;
        insert_override(&mut overrides, &section, &key, value);
    }
    if args.fail_fast {
        insert_override(&mut overrides, "pipeline", "fail_fast", Value::Boolean(true));
    }

    let output_dir = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_dir(&args.input));
    let effective = profile.apply(&base.merged(&overrides));
    let logger = Arc::new(console_logger(&args.input, &output_dir, &effective, verbose)?);

    let tool = Arc::new(ProcessTool::new().context("starting process runner")?);
    let mut builder = Orchestrator::builder(tool)
        .config(base)
        .profile(profile)
        .logger(logger);
    if let Some(ref path) = args.config {
        builder = builder.config_path(path);
    }
    let orchestrator = builder.build();

    let report = orchestrator
        .process(&args.input, Some(&output_dir), &overrides)
        .with_context(|| format!("processing {}", args.input.display()))?;

    print_json(&report)?;
    Ok(report.is_success())
}

fn dry_run(args: DryRunArgs) -> Result<bool> {
    let base = load_base_config(args.config.as_deref())?;
    let tool = Arc::new(ProcessTool::new().context("starting process runner")?);
    let orchestrator = Orchestrator::builder(tool)
        .config(base)
        .profile(EnvironmentProfile::detect())
        .build();

    let report = orchestrator.dry_run(&args.input);
    print_json(&report)?;
    Ok(report.all_passed)
}

fn init_config(args: InitConfigArgs) -> Result<bool> {
    if args.path.exists() && !args.force {
        bail!(
            "{} already exists (use --force to replace it)",
            args.path.display()
        );
    }
    ConfigManager::new(&args.path)
        .save()
        .with_context(|| format!("writing {}", args.path.display()))?;
    println!("Wrote {}", args.path.display());
    Ok(true)
}

fn load_base_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => {
            let mut manager = ConfigManager::new(path);
            manager
                .load()
                .with_context(|| format!("loading config from {}", path.display()))?;
            Ok(manager.config().clone())
        }
        None => Ok(PipelineConfig::default()),
    }
}

/// Run logger that also echoes to stderr.
fn console_logger(
    input: &Path,
    output_dir: &Path,
    config: &PipelineConfig,
    verbose: bool,
) -> Result<JobLogger> {
    let section = config.get_section(ConfigSection::Logging);
    let log_dir = output_dir.join(section.string("output_dir", "logs"));
    let log_config = if verbose {
        LogConfig::debug()
    } else {
        LogConfig::from_section(&section)
    };
    let job_name = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "job".to_string());

    JobLogger::new(
        job_name,
        &log_dir,
        log_config,
        Some(Box::new(|line: &str| eprintln!("{}", line))),
    )
    .with_context(|| format!("creating log directory {}", log_dir.display()))
}

/// Split `section.key=value`. The value is read as a TOML value when it
/// parses as one, otherwise kept as a plain string.
fn parse_assignment(assignment: &str) -> Result<(String, String, Value)> {
    let Some((path, raw)) = assignment.split_once('=') else {
        bail!("expected SECTION.KEY=VALUE, got '{}'", assignment);
    };
    let Some((section, key)) = path.trim().split_once('.') else {
        bail!("expected SECTION.KEY=VALUE, got '{}'", assignment);
    };
    let (section, key) = (section.trim(), key.trim());
    if section.is_empty() || key.is_empty() {
        bail!("expected SECTION.KEY=VALUE, got '{}'", assignment);
    }
    Ok((section.to_string(), key.to_string(), parse_value(raw.trim())))
}

fn parse_value(raw: &str) -> Value {
    format!("value = {}", raw)
        .parse::<Table>()
        .ok()
        .and_then(|mut table| table.remove("value"))
        .unwrap_or_else(|| Value::String(raw.to_string()))
}

fn insert_override(overrides: &mut Table, section: &str, key: &str, value: Value) {
    let entry = overrides
        .entry(section.to_string())
        .or_insert_with(|| Value::Table(Table::new()));
    if !entry.is_table() {
        *entry = Value::Table(Table::new());
    }
    if let Value::Table(table) = entry {
        table.insert(key.to_string(), value);
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

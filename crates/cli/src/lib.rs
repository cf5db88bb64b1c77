use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use formfill_engine::{FillPlanner, DEFAULT_MIN_PROPAGATION_CONFIDENCE};
use formfill_semantics::{
    FieldAnalyzer, RuleSet, SemanticGrouper, DEFAULT_MIN_GROUP_CONFIDENCE,
};

mod commands;
mod response;

pub use response::{CommandResponse, CommandStatus};

const DEFAULT_HOME: &str = ".formfill";

fn print_stdout(text: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

#[derive(Parser)]
#[command(name = "formfill")]
#[command(about = "Discover, map and fill form templates", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Workspace directory holding templates, mappings, records and outputs
    #[arg(long, global = true, env = "FORMFILL_HOME", default_value = DEFAULT_HOME)]
    home: PathBuf,

    /// Rule overrides (JSON or TOML) layered over the bundled rules
    #[arg(long, global = true, env = "FORMFILL_RULES")]
    rules: Option<PathBuf>,

    /// Fingerprint confidence a field needs to join a semantic group
    #[arg(
        long,
        global = true,
        value_parser = parse_confidence,
        default_value_t = DEFAULT_MIN_GROUP_CONFIDENCE
    )]
    min_group_confidence: f32,

    /// Fingerprint confidence a group member needs to receive a propagated value
    #[arg(
        long,
        global = true,
        value_parser = parse_confidence,
        default_value_t = DEFAULT_MIN_PROPAGATION_CONFIDENCE
    )]
    min_propagation_confidence: f32,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a PDF template in the workspace
    Upload(UploadArgs),

    /// List stored templates
    List,

    /// Show a template's fields, categories, groups and mapping progress
    Fields(TemplateArgs),

    /// Fingerprint field names without a template
    Fingerprint(FingerprintArgs),

    /// Edit a template's stored field mapping
    Map(MapArgs),

    /// Store a record (flat JSON object) for later fills
    Record(RecordArgs),

    /// Fill a template from a record
    Fill(FillArgs),

    /// Remove a stored template and its mapping
    Delete(TemplateArgs),
}

#[derive(Args)]
struct UploadArgs {
    /// Template file (.pdf)
    file: PathBuf,

    /// Stored file name (defaults to the source file name)
    #[arg(long)]
    name: Option<String>,
}

#[derive(Args)]
struct TemplateArgs {
    /// Stored template id, or a path to a template file
    template: String,
}

#[derive(Args)]
struct FingerprintArgs {
    /// Raw field identifiers
    #[arg(required = true)]
    names: Vec<String>,

    /// Declared field type hint (e.g. Tx)
    #[arg(long = "type")]
    declared_type: Option<String>,

    /// Declared value format hint (e.g. string)
    #[arg(long = "format")]
    declared_format: Option<String>,
}

#[derive(Args)]
struct MapArgs {
    /// Stored template id
    template: String,

    /// Map one field: FIELD=ATTRIBUTE
    #[arg(long = "set", value_name = "FIELD=ATTRIBUTE")]
    set: Vec<String>,

    /// Map every member of a semantic group: TYPE=ATTRIBUTE
    #[arg(long = "group", value_name = "TYPE=ATTRIBUTE")]
    group: Vec<String>,

    /// Map every field of a category: CATEGORY=ATTRIBUTE
    #[arg(long = "category", value_name = "CATEGORY=ATTRIBUTE")]
    category: Vec<String>,

    /// Remove a field's mapping
    #[arg(long = "unset", value_name = "FIELD")]
    unset: Vec<String>,

    /// Start from an empty mapping
    #[arg(long)]
    clear: bool,
}

#[derive(Args)]
struct RecordArgs {
    /// Record id
    id: String,

    /// JSON file with the record's attributes
    file: PathBuf,
}

#[derive(Args)]
struct FillArgs {
    /// Stored template id, or a path to a template file
    template: String,

    /// Stored record id, or a path to a JSON record
    #[arg(long)]
    record: String,

    /// JSON mapping file used instead of the stored mapping
    #[arg(long)]
    mapping: Option<PathBuf>,

    /// Output path (defaults to a fresh file under <home>/outputs)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

pub fn main_entry() -> ExitCode {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let response = match run(&cli) {
        Ok(response) => response,
        Err(err) => {
            log::error!("{err:#}");
            CommandResponse::error(format!("{err:#}"))
        }
    };
    let failed = response.is_error();
    let printed = serde_json::to_string_pretty(&response)
        .map_err(anyhow::Error::from)
        .and_then(|text| print_stdout(&text));
    if let Err(err) = printed {
        eprintln!("failed to write response: {err:#}");
        return ExitCode::FAILURE;
    }
    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn run(cli: &Cli) -> Result<CommandResponse> {
    let analyzer = load_analyzer(cli.rules.as_deref())?
        .with_grouper(SemanticGrouper::new(cli.min_group_confidence));
    let planner = FillPlanner::new(cli.min_propagation_confidence);
    let ctx = commands::Context::open(&cli.home, analyzer, planner)?;
    match &cli.command {
        Commands::Upload(args) => ctx.upload(&args.file, args.name.as_deref()),
        Commands::List => ctx.list(),
        Commands::Fields(args) => ctx.fields(&args.template),
        Commands::Fingerprint(args) => ctx.fingerprint(
            &args.names,
            args.declared_type.clone(),
            args.declared_format.clone(),
        ),
        Commands::Map(args) => ctx.map(
            &args.template,
            &commands::MapEdits {
                clear: args.clear,
                set: parse_pairs(&args.set, "--set")?,
                group: parse_pairs(&args.group, "--group")?,
                category: parse_pairs(&args.category, "--category")?,
                unset: args.unset.clone(),
            },
        ),
        Commands::Record(args) => ctx.record(&args.id, &args.file),
        Commands::Fill(args) => ctx.fill(
            &args.template,
            &args.record,
            args.mapping.as_deref(),
            args.output.as_deref(),
        ),
        Commands::Delete(args) => ctx.delete(&args.template),
    }
}

fn load_analyzer(rules: Option<&std::path::Path>) -> Result<FieldAnalyzer> {
    let rules = match rules {
        Some(path) => RuleSet::from_file(path)
            .with_context(|| format!("Failed to load rules from {}", path.display()))?,
        None => RuleSet::builtin(),
    };
    log::debug!("using rule set '{}'", rules.name());
    Ok(FieldAnalyzer::new(&rules))
}

fn parse_confidence(raw: &str) -> std::result::Result<f32, String> {
    let value: f32 = raw.parse().map_err(|err| format!("{err}"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{value} is outside 0.0..=1.0"))
    }
}

fn parse_pairs(raw: &[String], flag: &str) -> Result<Vec<(String, String)>> {
    raw.iter()
        .map(|pair| {
            let (key, value) = pair
                .split_once('=')
                .with_context(|| format!("{flag} expects KEY=VALUE, got '{pair}'"))?;
            let (key, value) = (key.trim(), value.trim());
            anyhow::ensure!(!key.is_empty(), "{flag} has an empty key in '{pair}'");
            Ok((key.to_string(), value.to_string()))
        })
        .collect()
}

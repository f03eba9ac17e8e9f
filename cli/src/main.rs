use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use argschema::{Cli as SchemaCli, CliError, LoweredSummary, SchemaDocument, to_yaml, validate_document};
use clap::{Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Output format for parsed values.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum ValueFormat {
    Json,
    Yaml,
    Debug,
}

/// Output format for lowered argument trees.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum SummaryFormat {
    Json,
    Yaml,
    Table,
}

#[derive(Debug, Parser)]
#[command(name = "argschema")]
#[command(version, about = "Run, inspect and validate YAML schema documents")]
struct Cli {
    /// Enable debug logging.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Parse arguments against a schema document and print the value.
    Run(RunArgs),
    /// Print the lowered arguments of a schema document.
    Lower(LowerArgs),
    /// Validate one or more schema documents.
    Validate(ValidateArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Schema document (YAML).
    schema: PathBuf,
    /// Output format.
    #[arg(long, default_value = "json")]
    format: ValueFormat,
    /// Arguments for the schema's parser, after `--`.
    #[arg(last = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

#[derive(Debug, Args)]
struct LowerArgs {
    /// Schema document (YAML).
    schema: PathBuf,
    /// Output format.
    #[arg(long, default_value = "table")]
    format: SummaryFormat,
}

#[derive(Debug, Args)]
struct ValidateArgs {
    /// Schema documents to check.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Run(args) => run_run(args),
        Command::Lower(args) => run_lower(args),
        Command::Validate(args) => run_validate(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

/// Logs go to stderr so values printed on stdout stay machine-readable.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_parser(path: &Path) -> Result<SchemaCli, String> {
    let document = SchemaDocument::load(path)
        .map_err(|err| format!("Failed to read '{}': {err}", path.display()))?;
    let compiled = document
        .compile()
        .map_err(|err| format!("Invalid schema '{}': {err}", path.display()))?;
    SchemaCli::from_schema(compiled)
        .map_err(|err| format!("Cannot build a parser from '{}': {err}", path.display()))
}

fn run_run(args: RunArgs) -> Result<(), String> {
    let parser = load_parser(&args.schema)?;
    debug!(schema = %args.schema.display(), args = args.args.len(), "running schema");

    let value = match parser.parse_from(args.args) {
        Ok(value) => value,
        Err(err @ CliError::Usage(_)) => err.exit(),
        Err(err) => return Err(err.to_string()),
    };

    let rendered = match args.format {
        ValueFormat::Json => serde_json::to_string_pretty(&value.to_json())
            .map_err(|err| format!("Failed to serialize value: {err}"))?,
        ValueFormat::Yaml => to_yaml(&value).map_err(|err| err.to_string())?,
        ValueFormat::Debug => value.to_string(),
    };
    println!("{}", rendered.trim_end());
    Ok(())
}

fn run_lower(args: LowerArgs) -> Result<(), String> {
    let parser = load_parser(&args.schema)?;
    let summary = parser.lowered();

    let rendered = match args.format {
        SummaryFormat::Json => serde_json::to_string_pretty(&summary)
            .map_err(|err| format!("Failed to serialize lowered arguments: {err}"))?,
        SummaryFormat::Yaml => serde_yaml::to_string(&summary)
            .map_err(|err| format!("Failed to serialize lowered arguments: {err}"))?,
        SummaryFormat::Table => {
            let mut out = String::new();
            write_table(&mut out, &summary, 0);
            out
        }
    };
    println!("{}", rendered.trim_end());
    Ok(())
}

fn run_validate(args: ValidateArgs) -> Result<(), String> {
    let mut failed = 0usize;
    for path in &args.inputs {
        let errors = validate_file(path);
        if errors.is_empty() {
            println!("{}: ok", path.display());
        } else {
            failed += 1;
            for err in errors {
                println!("{}: {err}", path.display());
            }
        }
    }

    if failed > 0 {
        return Err(format!(
            "{failed} of {} schema document(s) failed validation",
            args.inputs.len()
        ));
    }
    Ok(())
}

/// Structural problems first; a structurally valid document must also compile.
fn validate_file(path: &Path) -> Vec<String> {
    let document = match SchemaDocument::load(path) {
        Ok(document) => document,
        Err(err) => return vec![err.to_string()],
    };
    let errors: Vec<String> = validate_document(&document)
        .iter()
        .map(ToString::to_string)
        .collect();
    if !errors.is_empty() {
        return errors;
    }
    match document.compile().map_err(CliError::from).and_then(SchemaCli::from_schema) {
        Ok(_) => Vec::new(),
        Err(err) => vec![err.to_string()],
    }
}

fn write_table(out: &mut String, summary: &LoweredSummary, depth: usize) {
    let indent = "  ".repeat(depth);
    let _ = match &summary.description {
        Some(description) => writeln!(out, "{indent}{}  {description}", summary.command),
        None => writeln!(out, "{indent}{}", summary.command),
    };

    for arg in &summary.arguments {
        let status = if arg.fixed {
            "fixed"
        } else if arg.required {
            "required"
        } else {
            "optional"
        };
        let _ = writeln!(
            out,
            "{indent}  {:<28} {:<12} {:<3} {:<8} {}{}",
            arg.name_or_flag,
            arg.metavar.as_deref().unwrap_or("-"),
            arg.nargs.as_deref().unwrap_or("-"),
            status,
            if arg.hidden { "(hidden) " } else { "" },
            arg.help.as_deref().unwrap_or(""),
        );
    }

    if !summary.subcommands.is_empty() {
        let requirement = if summary.subcommand_required {
            "required"
        } else {
            "optional"
        };
        let _ = writeln!(out, "{indent}  subcommands ({requirement}):");
        for sub in &summary.subcommands {
            write_table(out, sub, depth + 2);
        }
    }
}

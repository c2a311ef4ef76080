//! Document Schema CLI
//!
//! Command-line interface for describing and checking document models.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use doc_schema::{
    check, load_config, load_models, Config, DescribeRequest, PopulationSpec, Query,
    RedactionRule, Registry, SchemaError, Selection, Severity, TypeStatus,
};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "doc-schema")]
#[command(about = "Compile document models into JSON Schemas")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the JSON Schema of a document type
    Describe {
        /// Model description file
        models: PathBuf,

        /// Document type to describe
        #[arg(value_name = "TYPE")]
        type_name: String,

        /// Field selection: "a -b +c", or a JSON array/object
        #[arg(long)]
        select: Option<String>,

        /// References to populate: "a b", or a JSON object/array of specs
        #[arg(long)]
        populate: Option<String>,

        /// Remove fields whose dotted path matches this regex (repeatable)
        #[arg(long, value_name = "REGEX")]
        readonly: Vec<String>,

        /// Describe the result of a multi-document query
        #[arg(long)]
        list: bool,

        /// Maximum number of documents returned by the query (with --list)
        #[arg(long, requires = "list")]
        limit: Option<u64>,

        /// Configuration file (fieldOptionsMapping, forceRebuild)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Rebuild schemas instead of using cached ones
        #[arg(long)]
        force_rebuild: bool,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Compile every type of a model description and report problems
    Check {
        /// Model description file
        models: PathBuf,

        /// Output format: text (default) or json
        #[arg(long, default_value = "text")]
        format: String,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,

        /// Only show types with problems
        #[arg(long, short)]
        quiet: bool,
    },
}

struct DescribeArgs {
    models: PathBuf,
    type_name: String,
    select: Option<String>,
    populate: Option<String>,
    readonly: Vec<String>,
    list: bool,
    limit: Option<u64>,
    config: Option<PathBuf>,
    force_rebuild: bool,
    output: Option<PathBuf>,
    pretty: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Describe {
            models,
            type_name,
            select,
            populate,
            readonly,
            list,
            limit,
            config,
            force_rebuild,
            output,
            pretty,
        } => run_describe(DescribeArgs {
            models,
            type_name,
            select,
            populate,
            readonly,
            list,
            limit,
            config,
            force_rebuild,
            output,
            pretty,
        }),

        Commands::Check {
            models,
            format,
            strict,
            quiet,
        } => run_check(&models, &format, strict, quiet),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn run_describe(args: DescribeArgs) -> Result<(), u8> {
    let mut registry = load_models(&args.models).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    let mut config = match &args.config {
        Some(path) => load_config(path).map_err(|e| {
            eprintln!("Error: {}", e);
            e.exit_code() as u8
        })?,
        None => Config::default(),
    };
    if args.force_rebuild {
        config = config.force_rebuild(true);
    }
    registry.set_config(config);

    let request = build_request(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    let schema = describe(&mut registry, &args, request).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    let json_output = if args.pretty {
        serde_json::to_string_pretty(&schema)
    } else {
        serde_json::to_string(&schema)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, &json_output).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            println!("{}", json_output);
        }
    }

    Ok(())
}

fn describe(
    registry: &mut Registry,
    args: &DescribeArgs,
    request: DescribeRequest,
) -> Result<Value, SchemaError> {
    if !args.list {
        return registry.describe(&args.type_name, &request);
    }
    let mut query = Query::find(args.type_name.as_str()).request(request);
    if let Some(limit) = args.limit {
        query = query.limit(limit);
    }
    query.schema(registry)
}

fn build_request(args: &DescribeArgs) -> Result<DescribeRequest, SchemaError> {
    let mut request = DescribeRequest::new();

    if let Some(select) = &args.select {
        let selection = match parse_json_arg(select)? {
            Some(value) => Selection::from_value(&value)?,
            None => Selection::parse(select),
        };
        request = request.select(selection);
    }

    if let Some(populate) = &args.populate {
        let specs = match parse_json_arg(populate)? {
            Some(value) => PopulationSpec::from_value(&value)?,
            None => PopulationSpec::parse(populate),
        };
        request = request.populate(specs);
    }

    let rules = args
        .readonly
        .iter()
        .map(|pattern| RedactionRule::new(pattern))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(request.redact(rules))
}

/// Arguments starting with `{` or `[` are JSON; anything else is the string form.
fn parse_json_arg(arg: &str) -> Result<Option<Value>, SchemaError> {
    let trimmed = arg.trim_start();
    if !trimmed.starts_with('{') && !trimmed.starts_with('[') {
        return Ok(None);
    }
    serde_json::from_str(trimmed)
        .map(Some)
        .map_err(|e| SchemaError::InvalidModel {
            message: format!("argument is not valid JSON: {}", e),
        })
}

fn run_check(models: &Path, format: &str, strict: bool, quiet: bool) -> Result<(), u8> {
    let mut registry = load_models(models).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    let result = check(&mut registry, strict);

    if format == "json" {
        let output = serde_json::to_string_pretty(&result).map_err(|e| {
            eprintln!("Error serializing output: {}", e);
            2u8
        })?;
        println!("{}", output);
    } else {
        if !quiet {
            println!("Checking {} ...\n", models.display());
        }

        for type_result in &result.results {
            let status_icon = match type_result.status {
                TypeStatus::Ok => "\x1b[32m✓\x1b[0m",
                TypeStatus::Warning => "\x1b[33m⚠\x1b[0m",
                TypeStatus::Error => "\x1b[31m✗\x1b[0m",
            };

            if !quiet || type_result.status != TypeStatus::Ok {
                println!("  {} {}", status_icon, type_result.name);
            }

            for diag in &type_result.diagnostics {
                let (color, label) = match diag.severity {
                    Severity::Error => ("\x1b[31m", "error"),
                    Severity::Warning => ("\x1b[33m", "warning"),
                };
                if !quiet || diag.severity == Severity::Error {
                    let path = if diag.path.is_empty() { "/" } else { &diag.path };
                    println!(
                        "    {}{}[{}]\x1b[0m: {} - {}",
                        color, label, diag.code, path, diag.message
                    );
                }
            }
        }

        println!();
        if result.failed == 0 {
            println!(
                "\x1b[32m✓ {} types checked, all passed\x1b[0m",
                result.types_checked
            );
        } else {
            println!(
                "\x1b[31m✗ {} types checked: {} passed, {} failed ({} errors, {} warnings)\x1b[0m",
                result.types_checked, result.passed, result.failed, result.errors, result.warnings
            );
        }
    }

    if result.failed == 0 {
        Ok(())
    } else {
        Err(1)
    }
}

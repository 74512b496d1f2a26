//! Command-line front end (spec 6.2): `binfmt <schema-file> <binary-file>
//! [flags]`. Thin over the `binfmt` facade crate — all the actual work
//! (loading, validating, interpreting, rendering) happens there; this
//! binary's job is flags, exit codes, and where bytes go.
//!
//! Exit codes follow spec 6.2's own taxonomy (0 success, 1 general error,
//! 2 usage error, 3 schema validation error), not the `exitcode` crate's
//! sysexits numbering — we still take the dependency for the success code
//! and because a UNIX-style tool reaching for named exit constants rather
//! than bare integers is the convention this workspace otherwise follows.

mod args;

use std::fs;
use std::path::Path;
use std::process;

use clap::Parser;

use args::{Cli, Format};
use binfmt::{Error, ErrorKind, Obj, Options, Value};

const EXIT_GENERAL: i32 = 1;
const EXIT_USAGE: i32 = 2;
const EXIT_VALIDATION: i32 = 3;

enum CliError {
    General(String),
    Usage(String),
    Validation(String),
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    match run(&cli) {
        Ok(()) => process::exit(exitcode::OK),
        Err(CliError::General(msg)) => {
            eprintln!("error: {msg}");
            process::exit(EXIT_GENERAL);
        }
        Err(CliError::Usage(msg)) => {
            eprintln!("error: {msg}");
            process::exit(EXIT_USAGE);
        }
        Err(CliError::Validation(msg)) => {
            eprintln!("schema validation failed: {msg}");
            process::exit(EXIT_VALIDATION);
        }
    }
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let schema_src = read_to_string(&cli.schema_file)?;
    let bytes = read_bytes(&cli.binary_file)?;

    let options = Options { validate: !cli.no_validate, strict: cli.strict };

    tracing::info!(schema = %cli.schema_file.display(), binary = %cli.binary_file.display(), "parsing");
    let obj = binfmt::parse(&schema_src, bytes, options).map_err(classify)?;

    let value = match &cli.field {
        Some(path) => extract_field(&obj, path)?,
        None => Value::Obj(obj),
    };

    let pretty = cli.effective_pretty();
    let rendered = match cli.format {
        Format::Json => {
            let json = binfmt::render::to_json(&value).map_err(classify)?;
            if pretty {
                serde_json::to_string_pretty(&json)
            } else {
                serde_json::to_string(&json)
            }
            .map_err(|e| CliError::General(e.to_string()))?
        }
        Format::Yaml => {
            let yaml = binfmt::render::to_yaml(&value).map_err(classify)?;
            serde_yaml::to_string(&yaml).map_err(|e| CliError::General(e.to_string()))?
        }
    };

    write_output(cli.output.as_deref(), &rendered)
}

/// Turns a failure from the interpreter into the CLI's error taxonomy.
/// Only a schema-validation failure maps to exit 3; every other
/// `binfmt::Error` kind (end-of-stream, parse, not-implemented, or a bare
/// base error) is a general runtime failure (spec 6.2: "runtime parse
/// error" is exit 1, distinct from "schema validation error").
fn classify(e: Error) -> CliError {
    match e.kind() {
        ErrorKind::Validation => CliError::Validation(e.to_string()),
        _ => CliError::General(e.to_string()),
    }
}

/// Walks a dotted path (`header.checksum`) through the result tree,
/// descending into nested objects one component at a time (spec 6.2's
/// `--field` flag).
fn extract_field(root: &Obj, path: &str) -> Result<Value, CliError> {
    let mut components = path.split('.');
    let first = components.next().unwrap_or("");
    let mut value = root
        .get(first)
        .ok_or_else(|| CliError::General(format!("no field named {first:?}")))?
        .map_err(classify)?;

    for component in components {
        value = match value {
            Value::Obj(obj) => obj
                .get(component)
                .ok_or_else(|| CliError::General(format!("no field named {component:?} in path {path:?}")))?
                .map_err(classify)?,
            other => {
                return Err(CliError::General(format!(
                    "cannot descend into {component:?}: {path:?} reached a {}",
                    other_type_name(&other)
                )))
            }
        };
    }
    Ok(value)
}

fn other_type_name(v: &Value) -> &'static str {
    match v {
        Value::Int(_) => "int",
        Value::BigInt(_) => "int",
        Value::Float(_) => "float",
        Value::Bool(_) => "bool",
        Value::Bytes(_) => "byte array",
        Value::Str(_) => "string",
        Value::Seq(_) => "array",
        Value::Obj(_) => "object",
        Value::Io(_) => "stream handle",
        Value::Null => "null",
    }
}

fn read_to_string(path: &Path) -> Result<String, CliError> {
    fs::read_to_string(path)
        .map_err(|e| CliError::General(format!("reading schema file {}: {e}", path.display())))
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, CliError> {
    fs::read(path).map_err(|e| CliError::General(format!("reading binary file {}: {e}", path.display())))
}

fn write_output(output: Option<&Path>, text: &str) -> Result<(), CliError> {
    match output {
        Some(path) => fs::write(path, format!("{text}\n"))
            .map_err(|e| CliError::General(format!("writing output file {}: {e}", path.display()))),
        None => {
            println!("{text}");
            Ok(())
        }
    }
}

/// Progress and diagnostics go to stderr (spec 6.2's "I/O streams" rule);
/// `-q` silences them entirely, `-v` (repeatable) raises the level above
/// the default `warn`.
fn init_tracing(cli: &Cli) {
    use tracing_subscriber::EnvFilter;

    let default_directive = if cli.quiet {
        "off"
    } else {
        match cli.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .try_init();
}

//! Flag surface (spec 6.2). Laid out the way `GamesmanNova`'s terminal
//! interface separates the parser definition from its execution.

use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};

/// Interpret a binary file against a declarative format schema and print
/// the resulting value tree.
#[derive(Parser)]
#[command(name = "binfmt", author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the YAML schema describing the binary format.
    pub schema_file: PathBuf,

    /// Path to the binary file to parse.
    pub binary_file: PathBuf,

    /// Write output to this file instead of stdout.
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Pretty-print the output (default when writing to stdout).
    #[arg(long, overrides_with = "no_pretty")]
    pub pretty: bool,

    /// Emit compact output (default when writing to a file).
    #[arg(long, overrides_with = "pretty")]
    pub no_pretty: bool,

    /// Output encoding for the value tree.
    #[arg(short = 'f', long, value_enum, default_value_t = Format::Json)]
    pub format: Format,

    /// Extract a single subtree by dotted path (e.g. `header.checksum`)
    /// instead of the whole value tree.
    #[arg(long)]
    pub field: Option<String>,

    /// Skip schema validation before parsing.
    #[arg(long)]
    pub no_validate: bool,

    /// Treat validation warnings as errors.
    #[arg(long)]
    pub strict: bool,

    /// Suppress progress and diagnostic output on stderr.
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Increase logging verbosity; repeat for more detail.
    #[arg(short = 'v', long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Resolves the `--pretty`/`--no-pretty` pair against the "pretty when
    /// writing to stdout" default (spec 6.2).
    pub fn effective_pretty(&self) -> bool {
        if self.pretty {
            true
        } else if self.no_pretty {
            false
        } else {
            self.output.is_none()
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Json,
    Yaml,
}

use clap::{Parser, Subcommand, ValueEnum};
use formatscript::cli::{self, Input, OutputFormat};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fscript")]
#[command(about = "Translate FormatScript formulas to and from canonical operator trees")]
#[command(long_about = "fscript - FormatScript transpiler

Converts friendly formula text such as
  IF(@currentField > 10, \"big\", \"small\")
into the canonical JSON operator tree stored by column-formatting
documents, and renders such trees back into formula text.

COMMANDS:
  translate - Formula text → canonical JSON tree
  render    - Canonical JSON tree → formula text
  check     - Validate one or more formulas, reporting every problem
  roundtrip - Translate, render and translate again; verify the tree is stable

INPUT:
  Each command takes its input as an argument, from --file, or on stdin.

EXAMPLES:
  fscript translate 'CONCATENATE(\"Hi \", @me)'
  fscript render '{\"operator\":\"+\",\"operands\":[1,2]}'
  fscript check --file a.fs --file b.fs
  echo '@currentField.title' | fscript translate --format json")]
#[command(version)]
struct Cli {
    /// Output format
    #[arg(long, value_enum, global = true, env = "FSCRIPT_FORMAT", default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// When to colour output
    #[arg(long, value_enum, global = true, env = "FSCRIPT_COLOR", default_value_t = ColorChoice::Auto)]
    color: ColorChoice,

    /// Log translation steps to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

#[derive(Subcommand)]
enum Commands {
    #[command(long_about = "Translate formula text into the canonical JSON operator tree.

Multi-argument IF and SWITCH calls become right-nested ternaries:
  SWITCH(@currentField, \"a\", 1, \"b\", 2, 0)
  → ?(@currentField == \"a\", 1, ?(@currentField == \"b\", 2, 0))

Every problem in the formula is reported with its line and column.
Exits non-zero when any diagnostic is produced.")]
    /// Translate formula text to a canonical JSON tree
    Translate {
        /// Formula text (reads stdin when omitted)
        formula: Option<String>,

        /// Read the formula from a file
        #[arg(short, long, conflicts_with = "formula")]
        file: Option<PathBuf>,

        /// Pretty-print the JSON output
        #[arg(short, long)]
        pretty: bool,
    },

    #[command(long_about = "Render a canonical JSON operator tree as formula text.

Ternary chains collapse back into a single IF or SWITCH call and
parentheses are only added where the grouping needs them.
Rendering never fails on a well-formed tree: operations with too few
operands render as empty text and surplus operands are dropped.")]
    /// Render a canonical JSON tree as formula text
    Render {
        /// Tree as JSON (reads stdin when omitted)
        json: Option<String>,

        /// Read the tree from a file
        #[arg(short, long, conflicts_with = "json")]
        file: Option<PathBuf>,

        /// Prefix the formula with '='
        #[arg(short, long)]
        equals: bool,
    },

    #[command(long_about = "Validate formulas without producing output trees.

BATCH VALIDATION:
  fscript check 'IF(true, 1)' 'FOO(2)'
  fscript check --file a.fs --file b.fs
  Checks every formula, reporting all errors before exiting.")]
    /// Validate one or more formulas
    Check {
        /// Formulas to check
        formulas: Vec<String>,

        /// Files each holding one formula
        #[arg(short, long)]
        file: Vec<PathBuf>,
    },

    /// Translate, render and translate again, checking the tree is stable
    Roundtrip {
        /// Formula text (reads stdin when omitted)
        formula: Option<String>,

        /// Read the formula from a file
        #[arg(short, long, conflicts_with = "formula")]
        file: Option<PathBuf>,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "formatscript=debug"
    } else {
        "formatscript=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);
    match cli.color {
        ColorChoice::Always => colored::control::set_override(true),
        ColorChoice::Never => colored::control::set_override(false),
        ColorChoice::Auto => {}
    }

    let format = cli.format;
    match cli.command {
        Commands::Translate {
            formula,
            file,
            pretty,
        } => cli::translate(Input::from_args(formula, file), format, pretty)?,

        Commands::Render { json, file, equals } => {
            cli::render(Input::from_args(json, file), format, equals)?
        }

        Commands::Check { formulas, file } => cli::check(formulas, file, format)?,

        Commands::Roundtrip { formula, file } => {
            cli::roundtrip(Input::from_args(formula, file), format)?
        }
    }

    Ok(())
}

//! Command-line front end for the xpivet validation engine.
//!
//! Validates a packaged extension (or a standalone OpenSearch document)
//! and prints either a human-readable summary or a JSON report. The exit
//! code is 0 when validation passed, 1 when it failed, and 2 when the run
//! could not be carried out at all.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::{Parser, ValueEnum};
use xpivet::checks::LIBRARY_DIGESTS_RESOURCE;
use xpivet::error::Result;
use xpivet::{CheckRegistry, ErrorBundle, PackageType, Report, Validator};

/// Validate a packaged browser extension.
#[derive(Parser, Debug)]
#[command(name = "xpivet")]
#[command(version, about)]
#[command(long_about = concat!(
    "Validate a packaged browser extension.\n\n",
    "The package is opened, its type is established from install.rdf and ",
    "its layout, and the built-in checks run tier by tier: chrome manifest ",
    "registration, blacklisted files, dictionary layout, and nested ",
    "sub-packages. Findings are printed as a summary or, with ",
    "--output json, as a structured report.",
))]
struct Cli {
    /// Path to the package (.xpi, .jar, or an OpenSearch .xml document).
    #[arg(value_name = "PACKAGE")]
    package: Utf8PathBuf,

    /// Expected package type; a mismatch rejects the package.
    #[arg(short = 't', long = "type", value_name = "TYPE")]
    expected_type: Option<ExpectedType>,

    /// Keep running later tiers even after a tier records errors.
    #[arg(long)]
    determined: bool,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    /// File of known JS-library SHA-256 digests, one per line.
    #[arg(long, value_name = "FILE")]
    library_digests: Option<Utf8PathBuf>,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,
}

/// Package types a caller can require on the command line.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum ExpectedType {
    /// A regular extension.
    Extension,
    /// A theme package.
    Theme,
    /// A spell-checking dictionary.
    Dictionary,
    /// A language pack.
    Langpack,
    /// An OpenSearch search provider.
    Search,
    /// A container of multiple extensions.
    Multi,
}

impl From<ExpectedType> for PackageType {
    fn from(expected: ExpectedType) -> Self {
        match expected {
            ExpectedType::Extension => Self::Extension,
            ExpectedType::Theme => Self::Theme,
            ExpectedType::Dictionary => Self::Dictionary,
            ExpectedType::Langpack => Self::Langpack,
            ExpectedType::Search => Self::Search,
            ExpectedType::Multi => Self::Multi,
        }
    }
}

/// Report output formats.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    /// Human-readable summary.
    Text,
    /// Pretty-printed JSON report.
    Json,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let exit_code = match run(&cli, &mut stdout) {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(err) => {
            write_stderr_line(&mut stderr, err);
            2
        }
    };
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}

/// Runs a validation pass and prints the report. Returns whether the
/// package passed; a rejected package never passes, even when its
/// messages alone would not fail the run.
fn run(cli: &Cli, out: &mut dyn Write) -> Result<bool> {
    let mut bundle = ErrorBundle::new(cli.determined);
    if let Some(path) = &cli.library_digests {
        let digests = load_digests(path)?;
        bundle.save_resource(LIBRARY_DIGESTS_RESOURCE, digests, true);
    }

    let mut validator = Validator::new(CheckRegistry::with_builtin_checks());
    if let Some(expected) = cli.expected_type {
        validator = validator.expecting(expected.into());
    }
    validator.validate_path(&mut bundle, cli.package.as_std_path());

    let report = Report::from_bundle(&bundle, true);
    match cli.output {
        OutputFormat::Text => write!(out, "{}", report.render_summary())?,
        OutputFormat::Json => writeln!(out, "{}", report.to_json()?)?,
    }
    Ok(report.success && !report.rejected)
}

/// Loads a digest list: one lower-case hex SHA-256 per line, blank lines
/// and `#` comments skipped.
fn load_digests(path: &Utf8PathBuf) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_owned)
        .collect())
}

fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort reporting; ignore write failures.
    }
}

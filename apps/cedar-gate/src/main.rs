//! # cedar-gate
//!
//! CI gate for AI-BOM scan results.
//!
//! ```text
//! cedar-gate <scan-results.json> <policy.cedar>
//!     [--summary <path>] [--fail-on-severity <sev>] [--annotations] [--entities <path>]
//! ```
//!
//! Exit codes: 0 = passed, 1 = violations found, 2 = input/parse error.
//! The report goes to stdout; logs go to stderr.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use trusera_gate::{
    annotations, append_summary, extract_components, format_report, read_json, run, EntityStore,
    GateOutcome,
};
use trusera_policy::Evaluator;

/// Cedar-like policy gate for AI-BOM scan results.
#[derive(Parser, Debug)]
#[command(name = "cedar-gate", version, about)]
struct Cli {
    /// Path to scan results JSON file.
    results: PathBuf,

    /// Path to Cedar policy file.
    policy: PathBuf,

    /// Append the violation report to this file (CI job summary).
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Only fail on violations at or above this severity.
    #[arg(long, value_parser = ["critical", "high", "medium", "low"])]
    fail_on_severity: Option<String>,

    /// Emit ::error / ::warning workflow annotations.
    #[arg(long)]
    annotations: bool,

    /// Cedar entities JSON file with extra attributes per component.
    #[arg(long)]
    entities: Option<PathBuf>,
}

fn main() -> ExitCode {
    if let Err(e) = init_logging() {
        eprintln!("Warning: failed to initialise logging: {e}");
    }

    let cli = Cli::parse();
    let mut stdout = std::io::stdout().lock();
    match execute(&cli, &mut stdout) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn init_logging() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("cedar_gate=info".parse()?))
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
}

/// Run the gate, writing the report to `out`. Returns the exit code; `Err`
/// means an input error (exit code 2).
fn execute(cli: &Cli, out: &mut impl Write) -> anyhow::Result<u8> {
    let scan = read_json(&cli.results).context("loading scan results")?;

    if !cli.policy.exists() {
        anyhow::bail!("policy file not found: {}", cli.policy.display());
    }
    let evaluator = Evaluator::from_file(&cli.policy).context("loading policy")?;

    let entities = cli.entities.as_deref().and_then(|path| match EntityStore::load(path) {
        Ok(store) => Some(store),
        Err(e) => {
            eprintln!("Warning: ignoring entities file: {e}");
            None
        }
    });

    if evaluator.is_empty() {
        eprintln!("Warning: no rules found in policy file");
        writeln!(out, "Cedar policy gate: PASSED (no rules to evaluate)")?;
        return Ok(0);
    }

    let components = extract_components(&scan);
    if components.is_empty() {
        writeln!(out, "Cedar policy gate: PASSED (no components found in scan results)")?;
        return Ok(0);
    }

    writeln!(
        out,
        "Evaluating {} rule(s) against {} component(s)...",
        evaluator.len(),
        components.len()
    )?;
    tracing::info!(
        rules = evaluator.len(),
        components = components.len(),
        entities = entities.as_ref().map_or(0, EntityStore::len),
        "evaluating"
    );

    let outcome = run(
        &evaluator,
        &components,
        entities.as_ref(),
        cli.fail_on_severity.as_deref(),
    );

    match &outcome {
        GateOutcome::Failed { violations } => {
            // Output failures are warnings here; the exit code stays 1.
            let report = format_report(violations);
            let lines = cli.annotations.then(|| annotations(violations));
            if let Err(e) = write_failure(out, &report, lines.as_deref()) {
                eprintln!("Warning: failed to write report: {e}");
            }
            if let Some(path) = &cli.summary {
                if let Err(e) = append_summary(path, &report) {
                    eprintln!("Warning: {e}");
                }
            }
        }
        GateOutcome::Passed { rules, components } => {
            writeln!(
                out,
                "Cedar policy gate: PASSED ({} rules, {} components)",
                rules, components
            )?;
        }
        GateOutcome::NoRules | GateOutcome::NoComponents => {}
    }

    Ok(outcome.exit_code())
}

fn write_failure(
    out: &mut impl Write,
    report: &str,
    annotations: Option<&[String]>,
) -> std::io::Result<()> {
    writeln!(out, "{}", report)?;
    for line in annotations.unwrap_or_default() {
        writeln!(out, "{}", line)?;
    }
    Ok(())
}

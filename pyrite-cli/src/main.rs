use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use pyrite_compiler::{
    Analysis, AnalysisOptions, Analyzer, Diagnostic, DiagnosticLevel, Diagnostics, Module,
};
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Parser)]
#[command(
    name = "pyrite",
    version,
    about = "Infer and check types of a parsed module.",
    long_about = "Load a JSON-serialized syntax tree, run type inference over every function \
                  body and report diagnostics."
)]
struct Cli {
    /// Path to the JSON syntax tree produced by the parser.
    input: PathBuf,

    /// File name reported in diagnostics (defaults to the input path).
    #[arg(long, value_name = "NAME")]
    file: Option<String>,

    /// Original source file, used to quote offending lines.
    #[arg(long, value_name = "PATH")]
    source: Option<PathBuf>,

    /// Skip arity and return checks of dunder methods.
    #[arg(long)]
    no_dunder_checks: bool,

    /// Print the inferred kind and canonical key of every expression node.
    #[arg(long)]
    dump_types: bool,

    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let contents = fs::read_to_string(&cli.input)
        .with_context(|| format!("Failed to read {:?}", cli.input))?;
    let module = Module::from_json(&contents)
        .with_context(|| format!("Failed to load syntax tree from {:?}", cli.input))?;
    tracing::debug!(input = ?cli.input, statements = module.body.len(), "loaded syntax tree");
    let source = match &cli.source {
        Some(path) => Some(
            fs::read_to_string(path).with_context(|| format!("Failed to read {path:?}"))?,
        ),
        None => None,
    };

    let mut analyzer = Analyzer::new(AnalysisOptions {
        file: cli
            .file
            .clone()
            .unwrap_or_else(|| display_name(&cli.input)),
        validate_dunders: !cli.no_dunder_checks,
    });
    let result = analyzer.analyze(&module);
    let diagnostics = analyzer.diagnostics();

    match cli.format {
        Format::Text => {
            let lines: Vec<&str> = source
                .as_deref()
                .map(|text| text.lines().collect())
                .unwrap_or_default();
            for diagnostic in diagnostics.entries() {
                print_diagnostic(&lines, diagnostic);
            }
            if let (Ok(analysis), true) = (&result, cli.dump_types) {
                print_types(analysis);
            }
        }
        Format::Json => {
            let types = match (&result, cli.dump_types) {
                (Ok(analysis), true) => Some(types_json(analysis)),
                _ => None,
            };
            println!("{}", report_json(diagnostics, types)?);
        }
    }

    if let Err(err) = result {
        return Err(err.context("Analysis failed"));
    }
    let warnings = diagnostics.len() - diagnostics.error_count();
    if warnings > 0 && cli.format == Format::Text {
        eprintln!("{warnings} warning(s)");
    }
    Ok(())
}

/// Enable with `RUST_LOG=pyrite_compiler=debug`.
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            )
            .with(EnvFilter::from_default_env())
            .init();
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn print_diagnostic(lines: &[&str], diagnostic: &Diagnostic) {
    let (label, marker) = match diagnostic.level {
        DiagnosticLevel::Error => ("error", "  -"),
        DiagnosticLevel::Warning => ("warning", "  ~"),
    };
    eprintln!("{marker} {label}: {}", diagnostic.message);
    eprintln!(
        "     --> {}:{}:{}",
        diagnostic.file, diagnostic.line, diagnostic.col
    );

    if diagnostic.line == 0 {
        return;
    }
    let Some(raw_line) = lines.get(diagnostic.line - 1) else {
        return;
    };
    eprintln!("      {}", raw_line.replace('\t', "    "));

    let mut caret_line = String::from("      ");
    for ch in raw_line.chars().take(diagnostic.col.saturating_sub(1)) {
        match ch {
            '\t' => caret_line.push_str("    "),
            _ => caret_line.push(' '),
        }
    }
    caret_line.push('^');
    eprintln!("{caret_line}");
}

fn sorted_types(analysis: &Analysis) -> Vec<(u32, String, Option<String>)> {
    let mut entries: Vec<_> = analysis
        .types
        .iter()
        .map(|(id, node)| (id.0, node.kind.describe().to_string(), node.key.clone()))
        .collect();
    entries.sort();
    entries
}

fn print_types(analysis: &Analysis) {
    for (id, kind, key) in sorted_types(analysis) {
        match key {
            Some(key) => println!("{id}\t{kind}\t{key}"),
            None => println!("{id}\t{kind}"),
        }
    }
}

fn types_json(analysis: &Analysis) -> serde_json::Value {
    sorted_types(analysis)
        .into_iter()
        .map(|(id, kind, key)| json!({ "id": id, "kind": kind, "key": key }))
        .collect()
}

fn report_json(diagnostics: &Diagnostics, types: Option<serde_json::Value>) -> Result<String> {
    let mut report = json!({
        "success": !diagnostics.has_errors(),
        "diagnostics": diagnostics.entries(),
    });
    if let Some(types) = types {
        report["types"] = types;
    }
    serde_json::to_string_pretty(&report).context("Failed to serialize report")
}

use crate::diagnostics::{Diagnostic, Location};
use crate::error::{FormatScriptError, FormatScriptResult};
use crate::transpile::{FormulaTranslator, ReverseFormulaTranslator, Translation};
use crate::types::Node;
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable, coloured output
    #[default]
    Text,
    /// Machine-readable JSON
    Json,
}

/// Where a command reads its input from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Inline(String),
    File(PathBuf),
    Stdin,
}

impl Input {
    /// Inline text wins over a file; with neither, read stdin
    pub fn from_args(inline: Option<String>, file: Option<PathBuf>) -> Self {
        match (inline, file) {
            (Some(text), _) => Input::Inline(text),
            (None, Some(path)) => Input::File(path),
            (None, None) => Input::Stdin,
        }
    }

    pub fn read(&self) -> FormatScriptResult<String> {
        match self {
            Input::Inline(text) => Ok(text.clone()),
            Input::File(path) => read_file(path),
            Input::Stdin => {
                let mut buf = String::new();
                io::stdin().read_to_string(&mut buf)?;
                Ok(buf)
            }
        }
    }
}

fn read_file(path: &Path) -> FormatScriptResult<String> {
    debug!(path = %path.display(), "reading input file");
    Ok(fs::read_to_string(path)?)
}

/// Formula text without the trailing newline files and pipes usually carry
fn trim_input(text: &str) -> &str {
    text.trim_end_matches(['\n', '\r'])
}

/// Execute the translate command
pub fn translate(input: Input, format: OutputFormat, pretty: bool) -> FormatScriptResult<()> {
    let text = input.read()?;
    let formula = trim_input(&text);
    let translation = FormulaTranslator::new().translate(formula);

    match format {
        OutputFormat::Json => println!("{}", to_json(&translation, pretty)?),
        OutputFormat::Text => {
            if translation.is_ok() {
                if let Some(tree) = &translation.tree {
                    println!("{}", to_json(tree, pretty)?);
                }
            } else {
                print_diagnostics(formula, &translation.diagnostics);
            }
        }
    }

    translation.into_result().map(|_| ())
}

/// Execute the render command
pub fn render(input: Input, format: OutputFormat, leading_equals: bool) -> FormatScriptResult<()> {
    let json = input.read()?;
    let tree = Node::from_json(&json)?;
    let text = ReverseFormulaTranslator::new()
        .with_leading_equals(leading_equals)
        .render(&tree);

    match format {
        OutputFormat::Text => println!("{}", text),
        OutputFormat::Json => println!("{}", to_json(&RenderReport { formula: &text }, false)?),
    }
    Ok(())
}

#[derive(Serialize)]
struct RenderReport<'a> {
    formula: &'a str,
}

#[derive(Serialize)]
struct CheckReport<'a> {
    source: String,
    formula: &'a str,
    ok: bool,
    diagnostics: &'a [Diagnostic],
}

/// Execute the check command: validate every formula, reporting all failures
pub fn check(formulas: Vec<String>, files: Vec<PathBuf>, format: OutputFormat) -> FormatScriptResult<()> {
    let mut sources: Vec<(String, String)> = formulas
        .into_iter()
        .enumerate()
        .map(|(i, f)| (format!("argument {}", i + 1), f))
        .collect();
    for path in &files {
        sources.push((path.display().to_string(), read_file(path)?));
    }
    if sources.is_empty() {
        sources.push(("stdin".to_string(), Input::Stdin.read()?));
    }

    if format == OutputFormat::Text {
        println!("{}", "🔍 Checking formulas".bold().green());
        println!();
    }

    let translator = FormulaTranslator::new();
    let results: Vec<(String, String, Translation)> = sources
        .into_iter()
        .map(|(source, text)| {
            let translation = translator.translate(trim_input(&text));
            (source, text, translation)
        })
        .collect();

    let mut reports = Vec::with_capacity(results.len());
    let mut failed = 0;
    for (source, text, translation) in &results {
        let formula = trim_input(text);
        let ok = translation.is_ok();
        if !ok {
            failed += 1;
        }

        match format {
            OutputFormat::Text if ok => {
                println!("{} {}", "✅".green(), source.bold());
            }
            OutputFormat::Text => {
                println!("{} {}", "❌".red(), source.bold());
                print_diagnostics(formula, &translation.diagnostics);
            }
            OutputFormat::Json => reports.push(CheckReport {
                source: source.clone(),
                formula,
                ok,
                diagnostics: &translation.diagnostics,
            }),
        }
    }

    let total = results.len();
    match format {
        OutputFormat::Json => println!("{}", to_json(&reports, true)?),
        OutputFormat::Text if failed == 0 => {
            println!();
            println!(
                "{}",
                format!("✅ All {} formula(s) are valid!", total).bold().green()
            );
        }
        OutputFormat::Text => {
            println!();
            println!(
                "{}",
                format!("❌ {} of {} formula(s) failed", failed, total)
                    .bold()
                    .red()
            );
        }
    }

    if failed > 0 {
        return Err(FormatScriptError::Validation(format!(
            "{} of {} formula(s) failed",
            failed, total
        )));
    }
    Ok(())
}

#[derive(Serialize)]
struct RoundtripReport<'a> {
    formula: &'a str,
    rendered: &'a str,
    stable: bool,
}

/// Execute the roundtrip command: translate, render, translate again and compare trees
pub fn roundtrip(input: Input, format: OutputFormat) -> FormatScriptResult<()> {
    let text = input.read()?;
    let formula = trim_input(&text);
    let translator = FormulaTranslator::new();

    let first = translator.translate(formula);
    if !first.is_ok() {
        match format {
            OutputFormat::Text => print_diagnostics(formula, &first.diagnostics),
            OutputFormat::Json => println!("{}", to_json(&first, true)?),
        }
        return first.into_result().map(|_| ());
    }
    let tree = first.into_result()?;

    let rendered = ReverseFormulaTranslator::new().render(&tree);
    let second = translator.translate(&rendered);
    let stable = second.tree.as_ref() == Some(&tree) && second.diagnostics.is_empty();

    match format {
        OutputFormat::Json => println!(
            "{}",
            to_json(
                &RoundtripReport {
                    formula,
                    rendered: &rendered,
                    stable,
                },
                true
            )?
        ),
        OutputFormat::Text => {
            println!("{}", rendered);
            if stable {
                println!("{}", "✅ Round-trip stable".green());
            } else {
                println!("{}", "❌ Round-trip changed the tree".bold().red());
            }
        }
    }

    if !stable {
        return Err(FormatScriptError::Validation(format!(
            "round-trip of '{}' produced a different tree",
            formula
        )));
    }
    Ok(())
}

fn to_json<T: Serialize>(value: &T, pretty: bool) -> FormatScriptResult<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(json)
}

fn print_diagnostics(formula: &str, diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        println!("{}", format_diagnostic(formula, diagnostic));
    }
}

/// One diagnostic with its source excerpt, e.g.
///
/// ```text
/// error[unknown_function]: Unknown Function: FOO
///   --> 1:0
///    |
///  1 | FOO(1)
///    | ^^^
/// ```
fn format_diagnostic(formula: &str, diagnostic: &Diagnostic) -> String {
    let kind = serde_json::to_value(diagnostic.kind)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    let mut out = format!(
        "{}: {}",
        format!("error[{}]", kind).bold().red(),
        diagnostic.message.bold()
    );

    if let Some(location) = diagnostic.location {
        out.push_str(&format!("\n  {} {}", "-->".blue(), location.start));
        if let Some(excerpt) = excerpt(formula, location) {
            out.push('\n');
            out.push_str(&excerpt);
        }
    }
    out
}

/// Source line of `location.start` with carets under the located span
fn excerpt(formula: &str, location: Location) -> Option<String> {
    let line_no = location.start.line as usize;
    let line = formula.lines().nth(line_no.checked_sub(1)?)?;
    let width = line.chars().count();

    let start = (location.start.column as usize).min(width);
    let end = if location.end.line == location.start.line {
        (location.end.column as usize).min(width)
    } else {
        width
    };
    let carets = end.saturating_sub(start).max(1);

    let gutter = " ".repeat(line_no.to_string().len());
    Some(format!(
        "{g} {bar}\n{n} {bar} {line}\n{g} {bar} {pad}{carets}",
        g = gutter,
        bar = "|".blue(),
        n = line_no.to_string().blue(),
        line = line,
        pad = " ".repeat(start),
        carets = "^".repeat(carets).red(),
    ))
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;

//! CLI output formatting.
//!
//! # Information-First Display
//!
//! Output is **information-centric, not file-centric**. Each page leads with
//! its positional index and title; its source path and any problems are
//! indented context lines below it.
//!
//! # Output Format
//!
//! ## Check / Build
//!
//! ```text
//! en
//! 001 Primary colors
//!     Source: content/en/primary_colors.mdoc
//! 002 Sloppy markup
//!     Source: content/en/sloppy.mdoc
//!     Error: line 6: Unexpected closing tag `tip`
//!     Filter: Unknown options source `size_options` for filter `size`
//!
//! Failed
//!     content/en/broken_partial.mdoc
//!         failed to resolve partials of content/en/broken_partial.mdoc
//!         failed to read partial partials/does_not_exist.mdoc
//!
//! Compiled 3 pages (1 with errors), 1 failed
//! ```
//!
//! ## Manifest
//!
//! ```text
//! Decorative painting tips (en)
//! 001 color → color_options
//!     Values: red, blue
//!     Default: red
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::compile::{CompileReport, PageInspection};
use std::error::Error;
use std::path::Path;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Path relative to the site root when possible.
fn display_path(path: &Path, site_dir: &Path) -> String {
    path.strip_prefix(site_dir)
        .unwrap_or(path)
        .display()
        .to_string()
}

/// An error followed by each of its sources, one message per entry.
fn error_chain(error: &dyn Error) -> Vec<String> {
    let mut messages = vec![error.to_string()];
    let mut source = error.source();
    while let Some(cause) = source {
        messages.push(cause.to_string());
        source = cause.source();
    }
    messages
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

// ============================================================================
// Check / Build
// ============================================================================

/// Format compile results, grouped by language.
pub fn format_compile_output(report: &CompileReport, site_dir: &Path) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current_lang: Option<&str> = None;
    let mut position = 0;

    for page in &report.pages {
        if current_lang != Some(page.lang.as_str()) {
            if current_lang.is_some() {
                lines.push(String::new());
            }
            lines.push(page.lang.clone());
            current_lang = Some(page.lang.as_str());
            position = 0;
        }
        position += 1;

        lines.push(format!("{} {}", format_index(position), page.page.title));
        lines.push(format!(
            "{}Source: {}",
            indent(1),
            display_path(&page.source, site_dir)
        ));
        for error in &page.parse_errors {
            lines.push(format!("{}Error: {}", indent(1), error));
        }
        for error in &page.manifest_errors {
            lines.push(format!("{}Filter: {}", indent(1), error));
        }
    }

    if !report.failures.is_empty() {
        lines.push(String::new());
        lines.push("Failed".to_string());
        for failure in &report.failures {
            lines.push(format!(
                "{}{}",
                indent(1),
                display_path(&failure.source, site_dir)
            ));
            for message in error_chain(&failure.error) {
                lines.push(format!("{}{}", indent(2), message));
            }
        }
    }

    lines.push(String::new());
    let with_errors = report.pages_with_errors().count();
    let mut summary = format!("Compiled {}", plural(report.pages.len(), "page"));
    if with_errors > 0 {
        summary.push_str(&format!(" ({with_errors} with errors)"));
    }
    if !report.failures.is_empty() {
        summary.push_str(&format!(", {} failed", report.failures.len()));
    }
    lines.push(summary);

    lines
}

/// Print compile output to stdout.
pub fn print_compile_output(report: &CompileReport, site_dir: &Path) {
    for line in format_compile_output(report, site_dir) {
        println!("{}", line);
    }
}

/// Format the list of written output files.
pub fn format_write_output(written: &[impl AsRef<Path>], output_dir: &Path) -> Vec<String> {
    let mut lines: Vec<String> = written
        .iter()
        .enumerate()
        .map(|(i, path)| {
            format!(
                "{} {}",
                format_index(i + 1),
                display_path(path.as_ref(), output_dir)
            )
        })
        .collect();
    lines.push(format!(
        "Wrote {} to {}",
        plural(written.len(), "page"),
        output_dir.display()
    ));
    lines
}

/// Print written output files to stdout.
pub fn print_write_output(written: &[impl AsRef<Path>], output_dir: &Path) {
    for line in format_write_output(written, output_dir) {
        println!("{}", line);
    }
}

// ============================================================================
// Manifest
// ============================================================================

/// Format a page's filter manifest.
pub fn format_manifest_output(inspection: &PageInspection) -> Vec<String> {
    let mut lines = vec![format!(
        "{} ({})",
        inspection.parsed.frontmatter.title, inspection.lang
    )];

    if inspection.manifest.is_empty() {
        lines.push(format!("{}No page filters", indent(1)));
    }
    for (i, (id, filter)) in inspection.manifest.filters.iter().enumerate() {
        lines.push(format!(
            "{} {} → {}",
            format_index(i + 1),
            id,
            filter.config.options_source
        ));
        lines.push(format!(
            "{}Values: {}",
            indent(1),
            filter.possible_values.join(", ")
        ));
        if let Some(default) = &filter.default_value {
            lines.push(format!("{}Default: {}", indent(1), default));
        }
    }

    for error in &inspection.parsed.errors {
        lines.push(format!("{}Error: {}", indent(1), error));
    }
    for error in &inspection.manifest.errors {
        lines.push(format!("{}Filter: {}", indent(1), error));
    }

    lines
}

/// Print a page's filter manifest to stdout.
pub fn print_manifest_output(inspection: &PageInspection) {
    for line in format_manifest_output(inspection) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================

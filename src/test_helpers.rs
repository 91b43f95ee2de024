//! Shared test utilities for the mdoc-hugo test suite.
//!
//! Provides fixture setup and lookup helpers over compile results.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = setup_fixtures();
//! let config = load_config(tmp.path()).unwrap();
//! let report = compile_site(tmp.path(), &config).unwrap();
//!
//! let page = find_page(&report, "en", "primary_colors.md");
//! assert_eq!(page.page.title, "Primary colors");
//! ```

use std::path::Path;
use tempfile::TempDir;

use crate::compile::{CompileFailure, CompileReport, CompiledPage};

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/site/` to a temp directory and return it.
///
/// Tests get an isolated copy they can mutate without affecting other tests
/// or the source fixtures.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/site");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            std::fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

// =========================================================================
// Report lookups: panic with a clear message on miss
// =========================================================================

/// Find a compiled page by language and output path. Panics if not found.
pub fn find_page<'a>(report: &'a CompileReport, lang: &str, relative: &str) -> &'a CompiledPage {
    report
        .pages
        .iter()
        .find(|p| p.lang == lang && p.relative == Path::new(relative))
        .unwrap_or_else(|| {
            let available: Vec<String> = report
                .pages
                .iter()
                .map(|p| format!("{}/{}", p.lang, p.relative.display()))
                .collect();
            panic!("page '{lang}/{relative}' not found. Available: {available:?}")
        })
}

/// Find a failed page by language and source file name. Panics if not found.
pub fn find_failure<'a>(
    report: &'a CompileReport,
    lang: &str,
    file_name: &str,
) -> &'a CompileFailure {
    report
        .failures
        .iter()
        .find(|f| f.lang == lang && f.source.file_name().is_some_and(|n| n == file_name))
        .unwrap_or_else(|| {
            let available: Vec<String> = report
                .failures
                .iter()
                .map(|f| format!("{}: {}", f.lang, f.source.display()))
                .collect();
            panic!("failure '{lang}/{file_name}' not found. Available: {available:?}")
        })
}

//! Site compilation.
//!
//! Runs the whole pipeline for every configured language:
//!
//! 1. Load the language's allow-list and option catalog. A broken catalog
//!    fails the language and stops the build.
//! 2. Discover `<content>/<lang>/**/*.mdoc`, sorted.
//! 3. Parse, join and render each page in parallel. Pages are independent:
//!    a hard error in one page is recorded as a failure and the rest carry on.
//!
//! [`write_pages`] then writes each page to `<output>/<lang>/<relative>.md`.

use crate::config::SiteConfig;
use crate::diagnostics::ParsingError;
use crate::document::{ParseError, ParsedFile, parse_file};
use crate::filters::{
    Allowlist, CatalogError, OptionCatalog, PageFiltersManifest, build_manifest, load_allowlist,
    load_filter_options, options_for_page,
};
use crate::page::{BuiltPage, PageError, PageInputs, build_page};
use log::{debug, info};
use rayon::prelude::*;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Extension of Markdoc source files.
pub const SOURCE_EXTENSION: &str = "mdoc";

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("option catalog for language {lang:?} is invalid")]
    Catalog {
        lang: String,
        #[source]
        source: CatalogError,
    },
    #[error("content directory for language {lang:?} not found: {}", path.display())]
    MissingContent { lang: String, path: PathBuf },
    #[error("failed to list content files: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("{} is not inside any configured language content directory", path.display())]
    UnknownLanguage { path: PathBuf },
    #[error("failed to write {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Page(#[from] PageCompileError),
}

/// Hard error for a single page.
#[derive(Error, Debug)]
pub enum PageCompileError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Render(#[from] PageError),
}

/// A successfully rendered page.
#[derive(Debug)]
pub struct CompiledPage {
    pub lang: String,
    pub source: PathBuf,
    /// Output path relative to the language directory, `.md` extension.
    pub relative: PathBuf,
    pub page: BuiltPage,
    /// Markup problems in the page and its partials.
    pub parse_errors: Vec<ParsingError>,
    /// Filter problems found joining the page with the catalog.
    pub manifest_errors: Vec<String>,
}

impl CompiledPage {
    pub fn has_errors(&self) -> bool {
        !self.parse_errors.is_empty() || !self.manifest_errors.is_empty()
    }
}

/// A page that could not be compiled.
#[derive(Debug)]
pub struct CompileFailure {
    pub lang: String,
    pub source: PathBuf,
    pub error: PageCompileError,
}

#[derive(Debug, Default)]
pub struct CompileReport {
    pub pages: Vec<CompiledPage>,
    pub failures: Vec<CompileFailure>,
}

impl CompileReport {
    /// Pages carrying soft errors.
    pub fn pages_with_errors(&self) -> impl Iterator<Item = &CompiledPage> {
        self.pages.iter().filter(|p| p.has_errors())
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.pages_with_errors().next().is_none()
    }
}

/// One page's parse result joined with its language's catalog.
#[derive(Debug)]
pub struct PageInspection {
    pub lang: String,
    pub parsed: ParsedFile,
    pub manifest: PageFiltersManifest,
}

/// Per-language inputs shared by every page of that language.
struct LanguageContext<'a> {
    lang: &'a str,
    content_dir: PathBuf,
    partials_dir: PathBuf,
    allowlist: Allowlist,
    catalog: OptionCatalog,
    config: &'a SiteConfig,
}

impl<'a> LanguageContext<'a> {
    fn load(site_dir: &Path, lang: &'a str, config: &'a SiteConfig) -> Result<Self, CompileError> {
        let options_dir = config.options_dir(site_dir, lang);
        let catalog_error = |source| CompileError::Catalog {
            lang: lang.to_string(),
            source,
        };
        let allowlist = load_allowlist(&options_dir).map_err(catalog_error)?;
        let catalog = load_filter_options(&options_dir, &allowlist).map_err(catalog_error)?;
        debug!(lang, option_sets = catalog.len(); "Loaded option catalog");

        Ok(Self {
            lang,
            content_dir: config.content_dir(site_dir, lang),
            partials_dir: config.partials_dir(site_dir),
            allowlist,
            catalog,
            config,
        })
    }

    fn compile_page(&self, source: &Path) -> Result<CompiledPage, PageCompileError> {
        let parsed = parse_file(source, &self.partials_dir)?;
        let manifest = build_manifest(&parsed.frontmatter, &self.catalog, &self.allowlist);
        let filter_options = options_for_page(&parsed.frontmatter, &self.catalog);
        let page = build_page(&PageInputs {
            parsed: &parsed,
            manifest: &manifest,
            filter_options: &filter_options,
            config: self.config,
        })?;

        let relative = source
            .strip_prefix(&self.content_dir)
            .unwrap_or(source)
            .with_extension("md");

        Ok(CompiledPage {
            lang: self.lang.to_string(),
            source: source.to_path_buf(),
            relative,
            page,
            parse_errors: parsed.errors,
            manifest_errors: manifest.errors,
        })
    }
}

/// Compile every page of every configured language.
pub fn compile_site(site_dir: &Path, config: &SiteConfig) -> Result<CompileReport, CompileError> {
    let mut report = CompileReport::default();

    for lang in &config.languages {
        let ctx = LanguageContext::load(site_dir, lang, config)?;
        let sources = discover_pages(&ctx.content_dir, lang)?;
        info!(lang, pages = sources.len(); "Compiling language");

        let results: Vec<_> = sources
            .par_iter()
            .map(|source| (source, ctx.compile_page(source)))
            .collect();

        for (source, result) in results {
            match result {
                Ok(page) => report.pages.push(page),
                Err(error) => report.failures.push(CompileFailure {
                    lang: lang.clone(),
                    source: source.clone(),
                    error,
                }),
            }
        }
    }

    Ok(report)
}

/// Parse one content file and build its manifest, without rendering.
///
/// The language is taken from the content directory the file lives in.
pub fn inspect_page(
    site_dir: &Path,
    config: &SiteConfig,
    file: &Path,
) -> Result<PageInspection, CompileError> {
    let canonical = |path: &Path| {
        path.canonicalize().map_err(|source| CompileError::Io {
            path: path.to_path_buf(),
            source,
        })
    };
    let file = canonical(file)?;

    let lang = config
        .languages
        .iter()
        .find(|lang| {
            config
                .content_dir(site_dir, lang)
                .canonicalize()
                .is_ok_and(|dir| file.starts_with(dir))
        })
        .ok_or_else(|| CompileError::UnknownLanguage { path: file.clone() })?;

    let ctx = LanguageContext::load(site_dir, lang, config)?;
    let parsed = parse_file(&file, &ctx.partials_dir).map_err(PageCompileError::from)?;
    let manifest = build_manifest(&parsed.frontmatter, &ctx.catalog, &ctx.allowlist);

    Ok(PageInspection {
        lang: lang.clone(),
        parsed,
        manifest,
    })
}

/// Write every compiled page under `output_dir`. Returns the written paths.
pub fn write_pages(report: &CompileReport, output_dir: &Path) -> Result<Vec<PathBuf>, CompileError> {
    let mut written = Vec::with_capacity(report.pages.len());
    for compiled in &report.pages {
        let path = output_dir.join(&compiled.lang).join(&compiled.relative);
        let io_error = |source| CompileError::Io {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        std::fs::write(&path, compiled.page.to_hugo_markdown()).map_err(io_error)?;
        debug!(path:?; "Wrote page");
        written.push(path);
    }
    Ok(written)
}

/// All `.mdoc` files under a language's content directory, sorted by path.
fn discover_pages(content_dir: &Path, lang: &str) -> Result<Vec<PathBuf>, CompileError> {
    if !content_dir.is_dir() {
        return Err(CompileError::MissingContent {
            lang: lang.to_string(),
            path: content_dir.to_path_buf(),
        });
    }
    let mut pages = Vec::new();
    for entry in WalkDir::new(content_dir).sort_by_file_name() {
        let entry = entry?;
        let is_source = entry
            .path()
            .extension()
            .is_some_and(|ext| ext == SOURCE_EXTENSION);
        if entry.file_type().is_file() && is_source {
            pages.push(entry.into_path());
        }
    }
    Ok(pages)
}

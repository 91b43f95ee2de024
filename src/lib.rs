//! # mdoc-hugo
//!
//! Compiles a Markdoc content tree into Markdown files a Hugo site can serve.
//! Pages are written in Markdoc, share fragments through partials, and declare
//! page filters in their front matter that readers use to switch between
//! content variants.
//!
//! # Pipeline
//!
//! ```text
//! 1. Parse      page.mdoc        →  AST + raw front matter      (markup)
//! 2. Validate   front matter     →  Frontmatter                 (frontmatter)
//! 3. Resolve    partial tags     →  partial ASTs + soft errors  (partials)
//! 4. Join       page filters     →  PageFiltersManifest         (filters)
//! 5. Render     AST + manifest   →  Hugo Markdown               (page)
//! ```
//!
//! Steps 1-3 form [`document::parse_file`], which returns a
//! [`document::ParsedFile`]. [`compile::compile_site`] runs the whole pipeline
//! for every language of a site.
//!
//! # Errors
//!
//! Two kinds of problems are kept apart:
//!
//! - **Hard errors** (malformed partial tags, unreadable files, invalid front
//!   matter) abort the current page and come back as `Err`.
//! - **Soft errors** (markup the parser could not make sense of) are attached
//!   to tree nodes, flattened by [`diagnostics::collect_errors`] and returned
//!   with an otherwise usable result. The caller decides whether they fail the
//!   build.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`ast`] | Document tree types |
//! | [`markup`] | Markup text to tree |
//! | [`frontmatter`] | Front matter decoding, page filter validation, minified filter format |
//! | [`partials`] | Recursive partial resolution |
//! | [`diagnostics`] | Pre-order flattening of node errors |
//! | [`document`] | Per-file parse producing a `ParsedFile` |
//! | [`filters`] | Allow-lists, option catalogs and per-page filter manifests |
//! | [`page`] | HTML rendering with Maud |
//! | [`compile`] | Site-wide compilation and output writing |
//! | [`config`] | `markdoc.toml` loading, merging and validation |
//! | [`output`] | CLI output formatting |

pub mod ast;
pub mod compile;
pub mod config;
pub mod diagnostics;
pub mod document;
pub mod filters;
pub mod frontmatter;
pub mod markup;
pub mod output;
pub mod page;
pub mod partials;

#[cfg(test)]
pub(crate) mod test_helpers;

//! Top-level parse of a content file into a [`ParsedFile`].
//!
//! Steps, in order: parse the markup, decode and validate the front matter,
//! resolve partials, then flatten soft errors as
//! `errors(root) ++ errors(partials…)`. Front matter problems and partial
//! problems are hard errors and abort the parse; markup problems are soft and
//! travel with the result.

use crate::ast::Node;
use crate::diagnostics::{ParsingError, collect_errors};
use crate::frontmatter::{Frontmatter, FrontmatterError, parse_frontmatter};
use crate::markup;
use crate::partials::{PartialError, resolve_partials};
use indexmap::IndexMap;
use log::debug;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid front matter in {}", path.display())]
    Frontmatter {
        path: PathBuf,
        #[source]
        source: FrontmatterError,
    },
    #[error("failed to resolve partials of {}", path.display())]
    Partial {
        path: PathBuf,
        #[source]
        source: PartialError,
    },
}

/// Everything the page builder needs from one content file.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub ast: Node,
    pub frontmatter: Frontmatter,
    /// Raw `file` value to parsed partial tree, in discovery order.
    pub partials: IndexMap<String, Node>,
    /// Soft errors of the document and every included partial.
    pub errors: Vec<ParsingError>,
}

impl ParsedFile {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Read and parse the file at `path`.
pub fn parse_file(path: &Path, partials_dir: &Path) -> Result<ParsedFile, ParseError> {
    debug!(path:?; "Parsing content file");
    let source = std::fs::read_to_string(path).map_err(|source| ParseError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_source(&source, path, partials_dir)
}

/// Parse already-loaded source. `origin` only labels errors.
pub fn parse_source(
    source: &str,
    origin: &Path,
    partials_dir: &Path,
) -> Result<ParsedFile, ParseError> {
    let ast = markup::parse(source);

    let frontmatter = ast
        .frontmatter()
        .ok_or(FrontmatterError::Missing)
        .and_then(parse_frontmatter)
        .map_err(|source| ParseError::Frontmatter {
            path: origin.to_path_buf(),
            source,
        })?;

    let resolved = resolve_partials(&ast, partials_dir).map_err(|source| ParseError::Partial {
        path: origin.to_path_buf(),
        source,
    })?;

    let mut errors = collect_errors(&ast);
    errors.extend(resolved.errors);

    Ok(ParsedFile {
        ast,
        frontmatter,
        partials: resolved.partials,
        errors,
    })
}

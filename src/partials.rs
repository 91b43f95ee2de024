//! Partial resolution.
//!
//! A partial is a markup fragment stored under the partials directory and
//! pulled into a document with `{% partial file="path/to/file.mdoc" /%}`.
//! Partials may include other partials; resolution is depth-first.
//!
//! For each tree the resolver first validates every partial tag it contains,
//! so a malformed tag fails the whole call before any file is touched. Then,
//! for each partial in document order, it reads and parses the file, records
//! its tree under the raw `file` value, and recurses into it.
//!
//! The result is an aggregate returned by value: the partial map and the
//! soft errors of every included tree, ordered as
//! `errors(P1) ++ nested(P1) ++ errors(P2) ++ nested(P2) ++ ...`.
//!
//! When the same path is reached twice, the map keeps its first position and
//! the tree from the last read. Its errors are reported once per inclusion.
//! A partial that includes one of its own ancestors is rejected.

use crate::ast::{LineRange, Node};
use crate::diagnostics::{ParsingError, collect_errors};
use crate::markup;
use indexmap::IndexMap;
use log::{debug, trace};
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Attribute naming the included file.
pub const FILE_ATTRIBUTE: &str = "file";

#[derive(Error, Debug)]
pub enum PartialError {
    #[error("partial tag at {lines} has no `file` attribute")]
    MissingFile { lines: LineRange },
    #[error("partial tag at {lines} has {count} `file` attributes, expected exactly one")]
    MultipleFiles { lines: LineRange, count: usize },
    #[error("partial tag at {lines} has an empty `file` attribute")]
    EmptyFile { lines: LineRange },
    #[error("partial path {file:?} points outside the partials directory")]
    OutsideDir { file: String },
    #[error("failed to read partial {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cyclic partial reference: {}", chain.join(" -> "))]
    Cycle { chain: Vec<String> },
}

/// Partials reachable from one tree, with their collected soft errors.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ResolvedPartials {
    /// Raw `file` value to parsed tree, in discovery order.
    pub partials: IndexMap<String, Node>,
    pub errors: Vec<ParsingError>,
}

impl ResolvedPartials {
    fn merge(&mut self, other: ResolvedPartials) {
        for (file, tree) in other.partials {
            self.partials.insert(file, tree);
        }
        self.errors.extend(other.errors);
    }
}

/// Resolve every partial reachable from `ast`, reading files under `partials_dir`.
pub fn resolve_partials(ast: &Node, partials_dir: &Path) -> Result<ResolvedPartials, PartialError> {
    resolve_within(ast, partials_dir, &[])
}

fn resolve_within(
    ast: &Node,
    partials_dir: &Path,
    ancestors: &[String],
) -> Result<ResolvedPartials, PartialError> {
    let references = partial_references(ast)?;
    let mut resolved = ResolvedPartials::default();

    for reference in references {
        if ancestors.contains(&reference.key) {
            let mut chain = ancestors.to_vec();
            chain.push(reference.key);
            return Err(PartialError::Cycle { chain });
        }

        let path = partials_dir.join(reference.file);
        debug!(path:?; "Reading partial");
        let source = std::fs::read_to_string(&path)
            .map_err(|source| PartialError::Read { path, source })?;
        let tree = markup::parse(&source);

        let (index, _) = resolved.partials.insert_full(reference.file.to_string(), tree);
        let tree = &resolved.partials[index];
        let own_errors = collect_errors(tree);
        trace!(file = reference.file, errors = own_errors.len(); "Parsed partial");

        let mut chain = ancestors.to_vec();
        chain.push(reference.key);
        let nested = resolve_within(tree, partials_dir, &chain)?;

        resolved.errors.extend(own_errors);
        resolved.merge(nested);
    }

    Ok(resolved)
}

struct PartialReference<'a> {
    /// Value exactly as written in the tag.
    file: &'a str,
    /// Normalized relative path, used to detect cycles.
    key: String,
}

/// Validate every partial tag in the tree, in pre-order.
fn partial_references(ast: &Node) -> Result<Vec<PartialReference<'_>>, PartialError> {
    let mut references = Vec::new();
    collect_references(ast, &mut references)?;
    Ok(references)
}

fn collect_references<'a>(
    node: &'a Node,
    references: &mut Vec<PartialReference<'a>>,
) -> Result<(), PartialError> {
    if node.is_partial() {
        references.push(validate_partial_tag(node)?);
    }
    for child in &node.children {
        collect_references(child, references)?;
    }
    Ok(())
}

fn validate_partial_tag(node: &Node) -> Result<PartialReference<'_>, PartialError> {
    let lines = node.lines;
    let files: Vec<_> = node.attribute_annotations(FILE_ATTRIBUTE).collect();
    let file = match files.as_slice() {
        [] => return Err(PartialError::MissingFile { lines }),
        [single] => single.value.as_deref().unwrap_or_default(),
        many => {
            return Err(PartialError::MultipleFiles {
                lines,
                count: many.len(),
            });
        }
    };
    if file.trim().is_empty() {
        return Err(PartialError::EmptyFile { lines });
    }
    let key = contained_key(file).ok_or_else(|| PartialError::OutsideDir {
        file: file.to_string(),
    })?;
    Ok(PartialReference { file, key })
}

/// `a/./b.mdoc` → `a/b.mdoc`; `None` for absolute paths and `..` segments.
fn contained_key(file: &str) -> Option<String> {
    let mut parts = Vec::new();
    for component in Path::new(file).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

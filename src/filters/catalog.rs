//! Allow-list and option-set catalog for one language directory.
//!
//! ```text
//! <site>/preferences_config/options/en/
//! ├── allowlist.yaml        # filter_ids: [...], option_ids: [...]
//! ├── color_options.yaml    # color_options: [{id, display_name, default?}, ...]
//! └── paint_options.yaml    # any number of option sets per file
//! ```
//!
//! The allow-list bounds which filter ids pages may declare and which option
//! ids catalogs may offer. Every other YAML file in the directory contributes
//! option sets keyed by snake_case id. Each set needs exactly one default.

use crate::frontmatter::SNAKE_CASE_REGEX;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

pub const ALLOWLIST_FILE: &str = "allowlist.yaml";

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid YAML in {}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("failed to list option files: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("option set id {set_id:?} in {} must be snake_case", path.display())]
    InvalidSetId { path: PathBuf, set_id: String },
    #[error("option set {set_id:?} offers {option_id:?}, which is not in the allow-list")]
    OptionNotAllowed { set_id: String, option_id: String },
    #[error("option set {set_id:?} lists {option_id:?} more than once")]
    DuplicateOption { set_id: String, option_id: String },
    #[error("option set {set_id:?} must mark exactly one default option, found {count}")]
    DefaultCount { set_id: String, count: usize },
    #[error("option set {set_id:?} is defined again in {}", path.display())]
    DuplicateSet { set_id: String, path: PathBuf },
}

/// Filter and option ids permitted for one language.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Allowlist {
    pub filter_ids: BTreeSet<String>,
    pub option_ids: BTreeSet<String>,
}

impl Allowlist {
    pub fn allows_filter(&self, id: &str) -> bool {
        self.filter_ids.contains(id)
    }

    pub fn allows_option(&self, id: &str) -> bool {
        self.option_ids.contains(id)
    }
}

/// One selectable value of an option set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterOption {
    pub id: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub default: bool,
}

/// Option sets by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct OptionCatalog {
    sets: BTreeMap<String, Vec<FilterOption>>,
}

impl OptionCatalog {
    pub fn get(&self, set_id: &str) -> Option<&[FilterOption]> {
        self.sets.get(set_id).map(Vec::as_slice)
    }

    /// The option marked `default` in the set.
    pub fn default_option(&self, set_id: &str) -> Option<&FilterOption> {
        self.get(set_id)?.iter().find(|o| o.default)
    }

    pub fn contains(&self, set_id: &str) -> bool {
        self.sets.contains_key(set_id)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn set_ids(&self) -> impl Iterator<Item = &str> {
        self.sets.keys().map(String::as_str)
    }

    pub(crate) fn insert(&mut self, set_id: String, options: Vec<FilterOption>) {
        self.sets.insert(set_id, options);
    }
}

/// Read `allowlist.yaml` from a language directory.
pub fn load_allowlist(lang_dir: &Path) -> Result<Allowlist, CatalogError> {
    read_yaml(&lang_dir.join(ALLOWLIST_FILE))
}

/// Read every option file in a language directory and validate it.
pub fn load_filter_options(
    lang_dir: &Path,
    allowlist: &Allowlist,
) -> Result<OptionCatalog, CatalogError> {
    let mut catalog = OptionCatalog::default();

    for entry in WalkDir::new(lang_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file() || !is_option_file(path) {
            continue;
        }

        let sets: BTreeMap<String, Vec<FilterOption>> = read_yaml(path)?;
        debug!(path:?, sets = sets.len(); "Loaded option file");

        for (set_id, options) in sets {
            if !SNAKE_CASE_REGEX.is_match(&set_id) {
                return Err(CatalogError::InvalidSetId {
                    path: path.to_path_buf(),
                    set_id,
                });
            }
            if catalog.contains(&set_id) {
                return Err(CatalogError::DuplicateSet {
                    set_id,
                    path: path.to_path_buf(),
                });
            }
            validate_option_set(&set_id, &options, allowlist)?;
            catalog.insert(set_id, options);
        }
    }

    Ok(catalog)
}

fn is_option_file(path: &Path) -> bool {
    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));
    is_yaml && path.file_name().and_then(|n| n.to_str()) != Some(ALLOWLIST_FILE)
}

fn validate_option_set(
    set_id: &str,
    options: &[FilterOption],
    allowlist: &Allowlist,
) -> Result<(), CatalogError> {
    let mut seen = HashSet::new();
    for option in options {
        if !allowlist.allows_option(&option.id) {
            return Err(CatalogError::OptionNotAllowed {
                set_id: set_id.to_string(),
                option_id: option.id.clone(),
            });
        }
        if !seen.insert(option.id.as_str()) {
            return Err(CatalogError::DuplicateOption {
                set_id: set_id.to_string(),
                option_id: option.id.clone(),
            });
        }
    }
    let count = options.iter().filter(|o| o.default).count();
    if count != 1 {
        return Err(CatalogError::DefaultCount {
            set_id: set_id.to_string(),
            count,
        });
    }
    Ok(())
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, CatalogError> {
    let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&content).map_err(|source| CatalogError::Yaml {
        path: path.to_path_buf(),
        source,
    })
}

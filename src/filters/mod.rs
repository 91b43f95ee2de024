//! Page filter catalogs and manifests.
//!
//! [`catalog`] loads what a language offers; [`manifest`] joins a page's
//! declared filters against it.

pub mod catalog;
pub mod manifest;

pub use catalog::{
    Allowlist, CatalogError, FilterOption, OptionCatalog, load_allowlist, load_filter_options,
};
pub use manifest::{ManifestFilter, PageFiltersManifest, build_manifest, options_for_page};

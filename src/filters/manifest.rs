//! Per-page filter manifest: a page's declared filters joined against the
//! language catalog.
//!
//! Options sources may be templated on earlier filters. With `color` offering
//! `red | blue` and `finish` offering `matte | gloss`, the source
//! `<FINISH>_<COLOR>_paint_options` expands to
//!
//! ```text
//! matte_red_paint_options   matte_blue_paint_options
//! gloss_red_paint_options   gloss_blue_paint_options
//! ```
//!
//! and the filter's possible values are the union of those sets' options.
//! Problems found here are soft: they are listed in
//! [`PageFiltersManifest::errors`] and the offending filter is left out.

use super::catalog::{Allowlist, OptionCatalog};
use crate::frontmatter::{Frontmatter, MinifiedPageFilterConfig, PageFilterConfig};
use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// `<FILTER_ID>` inside an options source.
static OPTIONS_SOURCE_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([A-Z0-9_]+)>").unwrap());

/// A declared filter after joining with the catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManifestFilter {
    pub config: PageFilterConfig,
    /// Selected when the reader has not chosen a value.
    pub default_value: Option<String>,
    /// Option ids across every set the options source can expand to.
    pub possible_values: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PageFiltersManifest {
    /// Filters by id, in declaration order.
    pub filters: IndexMap<String, ManifestFilter>,
    /// Every option set the page can reach.
    pub option_sets: OptionCatalog,
    pub errors: Vec<String>,
}

impl PageFiltersManifest {
    /// Short-key projection embedded in generated pages.
    pub fn minified(&self) -> Vec<MinifiedPageFilterConfig> {
        self.filters
            .values()
            .map(|filter| MinifiedPageFilterConfig::from(&filter.config))
            .collect()
    }

    pub fn default_values(&self) -> BTreeMap<&str, &str> {
        self.filters
            .iter()
            .filter_map(|(id, filter)| Some((id.as_str(), filter.default_value.as_deref()?)))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

/// Join a page's filters with the catalog, checking ids against the allow-list.
pub fn build_manifest(
    frontmatter: &Frontmatter,
    catalog: &OptionCatalog,
    allowlist: &Allowlist,
) -> PageFiltersManifest {
    join_filters(frontmatter, catalog, Some(allowlist))
}

/// The subset of the catalog a page's filters can reach.
pub fn options_for_page(frontmatter: &Frontmatter, catalog: &OptionCatalog) -> OptionCatalog {
    join_filters(frontmatter, catalog, None).option_sets
}

fn join_filters(
    frontmatter: &Frontmatter,
    catalog: &OptionCatalog,
    allowlist: Option<&Allowlist>,
) -> PageFiltersManifest {
    let mut manifest = PageFiltersManifest::default();

    for config in frontmatter.filters() {
        let id = &config.id;
        if let Some(allowlist) = allowlist
            && !allowlist.allows_filter(id)
        {
            manifest
                .errors
                .push(format!("Unrecognized filter id `{id}`: not in the allow-list"));
            continue;
        }

        let set_ids = match expand_options_source(&config.options_source, &manifest.filters, |f| {
            &f.possible_values
        }) {
            Ok(set_ids) => set_ids,
            Err(placeholder) => {
                manifest.errors.push(format!(
                    "Options source `{}` of filter `{id}` references `<{placeholder}>`, which does not match an earlier filter",
                    config.options_source
                ));
                continue;
            }
        };

        let mut possible_values: Vec<String> = Vec::new();
        let mut resolved_any = false;
        for set_id in &set_ids {
            let Some(options) = catalog.get(set_id) else {
                manifest
                    .errors
                    .push(format!("Unknown options source `{set_id}` for filter `{id}`"));
                continue;
            };
            resolved_any = true;
            manifest.option_sets.insert(set_id.clone(), options.to_vec());
            for option in options {
                if !possible_values.contains(&option.id) {
                    possible_values.push(option.id.clone());
                }
            }
        }
        if !resolved_any {
            continue;
        }

        let default_value = match &config.default_value {
            Some(explicit) if possible_values.contains(explicit) => Some(explicit.clone()),
            Some(explicit) => {
                manifest.errors.push(format!(
                    "Default value `{explicit}` of filter `{id}` is not one of its options"
                ));
                catalog_default(&config.options_source, &manifest.filters, catalog)
            }
            None => catalog_default(&config.options_source, &manifest.filters, catalog),
        };

        manifest.filters.insert(
            id.clone(),
            ManifestFilter {
                config: config.clone(),
                default_value,
                possible_values,
            },
        );
    }

    manifest
}

/// Default option of the set reached by substituting earlier filters' defaults.
fn catalog_default(
    options_source: &str,
    filters: &IndexMap<String, ManifestFilter>,
    catalog: &OptionCatalog,
) -> Option<String> {
    let defaults: IndexMap<String, Vec<String>> = filters
        .iter()
        .filter_map(|(id, f)| Some((id.clone(), vec![f.default_value.clone()?])))
        .collect();
    let set_id = expand_options_source(options_source, &defaults, |values| values)
        .ok()?
        .into_iter()
        .next()?;
    catalog.default_option(&set_id).map(|o| o.id.clone())
}

/// Expand `<FILTER_ID>` placeholders over each referenced filter's values,
/// left to right. Returns the unmatched placeholder on failure.
fn expand_options_source<T>(
    source: &str,
    filters: &IndexMap<String, T>,
    values_of: impl Fn(&T) -> &Vec<String>,
) -> Result<Vec<String>, String> {
    let mut expanded = vec![String::new()];
    let mut last = 0;

    for caps in OPTIONS_SOURCE_PLACEHOLDER.captures_iter(source) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let literal = &source[last..whole.start()];
        let values = filters
            .get(&name.as_str().to_lowercase())
            .map(&values_of)
            .ok_or_else(|| name.as_str().to_string())?;

        expanded = expanded
            .iter()
            .flat_map(|prefix| values.iter().map(move |v| format!("{prefix}{literal}{v}")))
            .collect();
        last = whole.end();
    }

    let tail = &source[last..];
    Ok(expanded.into_iter().map(|s| s + tail).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::catalog::FilterOption;
    use crate::frontmatter::parse_frontmatter;

    fn option(id: &str, default: bool) -> FilterOption {
        FilterOption {
            id: id.to_string(),
            display_name: id.to_uppercase(),
            default,
        }
    }

    fn catalog() -> OptionCatalog {
        let mut catalog = OptionCatalog::default();
        catalog.insert(
            "color_options".into(),
            vec![option("red", true), option("blue", false)],
        );
        catalog.insert(
            "finish_options".into(),
            vec![option("matte", false), option("gloss", true)],
        );
        for (finish, color) in [
            ("matte", "red"),
            ("matte", "blue"),
            ("gloss", "red"),
            ("gloss", "blue"),
        ] {
            catalog.insert(
                format!("{finish}_{color}_paint_options"),
                vec![
                    option(&format!("{color}_{finish}_a"), true),
                    option(&format!("{color}_{finish}_b"), false),
                ],
            );
        }
        catalog
    }

    fn allowlist(filter_ids: &[&str]) -> Allowlist {
        Allowlist {
            filter_ids: filter_ids.iter().map(|s| s.to_string()).collect(),
            option_ids: Default::default(),
        }
    }

    fn page(filters: &str) -> Frontmatter {
        parse_frontmatter(&format!("title: Paint\npage_filters:\n{filters}")).unwrap()
    }

    const PAINT_FILTERS: &str = "  - display_name: color
    id: color
    options_source: color_options
  - display_name: finish
    id: finish
    options_source: finish_options
  - display_name: paint
    id: paint
    options_source: <FINISH>_<COLOR>_paint_options
";

    #[test]
    fn simple_filters_join_catalog() {
        let fm = page(PAINT_FILTERS);
        let manifest = build_manifest(&fm, &catalog(), &allowlist(&["color", "finish", "paint"]));

        assert!(manifest.errors.is_empty(), "{:?}", manifest.errors);
        let color = &manifest.filters["color"];
        assert_eq!(color.possible_values, vec!["red", "blue"]);
        assert_eq!(color.default_value.as_deref(), Some("red"));
        assert_eq!(
            manifest.filters["finish"].default_value.as_deref(),
            Some("gloss")
        );
    }

    #[test]
    fn placeholders_expand_left_to_right() {
        let fm = page(PAINT_FILTERS);
        let manifest = build_manifest(&fm, &catalog(), &allowlist(&["color", "finish", "paint"]));

        let paint = &manifest.filters["paint"];
        assert_eq!(
            paint.possible_values,
            vec![
                "red_matte_a",
                "red_matte_b",
                "blue_matte_a",
                "blue_matte_b",
                "red_gloss_a",
                "red_gloss_b",
                "blue_gloss_a",
                "blue_gloss_b",
            ]
        );
        // finish=gloss, color=red → gloss_red_paint_options
        assert_eq!(paint.default_value.as_deref(), Some("red_gloss_a"));
        assert_eq!(manifest.option_sets.len(), 6);
    }

    #[test]
    fn explicit_default_wins_when_valid() {
        let fm = page(
            "  - display_name: color\n    id: color\n    options_source: color_options\n    default_value: blue\n",
        );
        let manifest = build_manifest(&fm, &catalog(), &allowlist(&["color"]));
        assert_eq!(
            manifest.default_values(),
            BTreeMap::from([("color", "blue")])
        );
    }

    #[test]
    fn invalid_default_reported_and_replaced() {
        let fm = page(
            "  - display_name: color\n    id: color\n    options_source: color_options\n    default_value: green\n",
        );
        let manifest = build_manifest(&fm, &catalog(), &allowlist(&["color"]));
        assert_eq!(manifest.errors.len(), 1);
        assert!(manifest.errors[0].contains("green"));
        assert_eq!(
            manifest.filters["color"].default_value.as_deref(),
            Some("red")
        );
    }

    #[test]
    fn filter_outside_allowlist_skipped() {
        let fm = page(PAINT_FILTERS);
        let manifest = build_manifest(&fm, &catalog(), &allowlist(&["color", "paint"]));
        assert!(!manifest.filters.contains_key("finish"));
        assert!(manifest.errors[0].contains("finish"));
        // paint now references a filter that was dropped
        assert!(!manifest.filters.contains_key("paint"));
        assert_eq!(manifest.errors.len(), 2);
    }

    #[test]
    fn unknown_options_source_reported() {
        let fm = page("  - display_name: size\n    id: size\n    options_source: size_options\n");
        let manifest = build_manifest(&fm, &catalog(), &allowlist(&["size"]));
        assert!(manifest.is_empty());
        assert_eq!(
            manifest.errors,
            vec!["Unknown options source `size_options` for filter `size`"]
        );
    }

    #[test]
    fn unresolvable_expansion_drops_filter() {
        let mut catalog = catalog();
        catalog.insert("extra_options".into(), vec![option("solo", true)]);
        let fm = page(
            "  - display_name: extra\n    id: extra\n    options_source: extra_options\n  - display_name: derived\n    id: derived\n    options_source: <EXTRA>_x\n",
        );
        let manifest = build_manifest(&fm, &catalog, &allowlist(&["extra", "derived"]));
        assert!(!manifest.filters.contains_key("derived"));
        assert_eq!(manifest.errors.len(), 1);
        assert!(manifest.errors[0].contains("solo_x"));
    }

    #[test]
    fn minified_follows_declaration_order() {
        let fm = page(PAINT_FILTERS);
        let manifest = build_manifest(&fm, &catalog(), &allowlist(&["color", "finish", "paint"]));
        let ids: Vec<String> = manifest.minified().into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["color", "finish", "paint"]);
    }

    #[test]
    fn options_for_page_ignores_allowlist() {
        let fm = page(PAINT_FILTERS);
        let options = options_for_page(&fm, &catalog());
        assert_eq!(options.len(), 6);
        assert!(options.contains("color_options"));
        assert!(options.contains("gloss_blue_paint_options"));
    }

    #[test]
    fn page_without_filters_has_empty_manifest() {
        let fm = parse_frontmatter("title: Plain").unwrap();
        let manifest = build_manifest(&fm, &catalog(), &allowlist(&[]));
        assert!(manifest.is_empty());
        assert!(manifest.minified().is_empty());
        assert!(manifest.errors.is_empty());
    }

    #[test]
    fn expansion_without_placeholders_is_identity() {
        let filters: IndexMap<String, Vec<String>> = IndexMap::new();
        assert_eq!(
            expand_options_source("color_options", &filters, |v| v),
            Ok(vec!["color_options".to_string()])
        );
        assert_eq!(
            expand_options_source("<COLOR>_options", &filters, |v| v),
            Err("COLOR".to_string())
        );
    }
}

//! Front matter decoding and validation.
//!
//! Each document starts with a YAML block. Only three keys matter here; any
//! other top-level key is accepted and ignored so authors can keep metadata
//! the static site generator uses directly.
//!
//! ```yaml
//! title: Decorative Painting Tips
//! page_filters:
//!   - display_name: color
//!     id: color
//!     options_source: color_options
//!   - display_name: finish
//!     id: finish
//!     options_source: paint_finish_options
//!   - display_name: <color> paint
//!     id: paint_color
//!     options_source: <FINISH>_<COLOR>_paint_options
//!     default_value: eggshell_white
//! further_reading:
//!   - link: https://example.com/blog
//!     text: Example blog post
//!     tag: blog
//! ```
//!
//! ## Validation phases
//!
//! 1. **Shape**: serde decoding. `title` is required; filter and reading-link
//!    objects reject unknown keys. Text fields must be YAML strings: `title: 123`
//!    or `title: ~` is rejected rather than read as `"123"` or `"~"`. Then each filter's identifier fields are
//!    checked against their formats.
//! 2. **Whole list** (`page_filters` only), first failure wins:
//!    - display names are unique within the page;
//!    - a `<name>` placeholder inside a display name refers to the display
//!      name of a filter defined *earlier* in the list.
//!
//! `further_reading`, when present, must hold at least one link.

use regex::Regex;
use serde::de::{Error as _, Unexpected};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;
use thiserror::Error;

/// `database`, `paint_color`, `v2_options`
pub static SNAKE_CASE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(_[a-z0-9]+)*$").unwrap());

/// Option set ids, optionally templated on other filters: `<FINISH>_<COLOR>_paint_options`.
pub static FILTER_OPTIONS_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-z0-9_]|<[A-Z0-9_]+>)+$").unwrap());

/// Placeholder inside a display name: `<color> paint`.
static DISPLAY_NAME_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([a-z0-9_]+)>").unwrap());

#[derive(Error, Debug)]
pub enum FrontmatterError {
    #[error("document has no front matter block")]
    Missing,
    #[error("front matter does not match the expected shape: {0}")]
    Shape(#[from] serde_yaml::Error),
    #[error("invalid {field} {value:?}: must be {expected}")]
    InvalidField {
        field: String,
        value: String,
        expected: &'static str,
    },
    #[error("duplicate page filter display names: {}", names.join(", "))]
    DuplicateFilterNames { names: Vec<String> },
    #[error("page filter {display_name:?} references <{placeholder}>, which is not defined by an earlier filter")]
    UndefinedPlaceholder {
        display_name: String,
        placeholder: String,
    },
    #[error("further_reading must contain at least one link")]
    EmptyFurtherReading,
}

/// Validated front matter of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frontmatter {
    #[serde(deserialize_with = "yaml_string")]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_filters: Option<Vec<PageFilterConfig>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub further_reading: Option<Vec<FurtherReadingLink>>,
}

/// A page filter as declared in front matter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PageFilterConfig {
    /// Label shown to readers; may embed `<name>` placeholders.
    #[serde(deserialize_with = "yaml_string")]
    pub display_name: String,
    #[serde(deserialize_with = "yaml_string")]
    pub id: String,
    /// Option set providing the choices; may embed `<FILTER_ID>` placeholders.
    #[serde(deserialize_with = "yaml_string")]
    pub options_source: String,
    #[serde(
        default,
        deserialize_with = "optional_yaml_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub default_value: Option<String>,
}

/// Short-key projection of [`PageFilterConfig`] embedded in generated pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MinifiedPageFilterConfig {
    #[serde(rename = "n")]
    pub display_name: String,
    #[serde(rename = "i")]
    pub id: String,
    #[serde(rename = "o")]
    pub options_source: String,
    #[serde(rename = "d", default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

/// An entry of the further reading list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FurtherReadingLink {
    #[serde(deserialize_with = "yaml_string")]
    pub link: String,
    #[serde(deserialize_with = "yaml_string")]
    pub text: String,
    #[serde(
        default,
        deserialize_with = "optional_yaml_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub tag: Option<String>,
}

/// A YAML string scalar only. `serde_yaml` would otherwise hand numbers,
/// booleans and `~` to a `String` field as their source text.
fn yaml_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_yaml::Value::deserialize(deserializer)? {
        serde_yaml::Value::String(s) => Ok(s),
        other => Err(D::Error::invalid_type(unexpected(&other), &"a string")),
    }
}

/// Like [`yaml_string`], with an explicit null read as absent.
fn optional_yaml_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_yaml::Value::deserialize(deserializer)? {
        serde_yaml::Value::Null => Ok(None),
        serde_yaml::Value::String(s) => Ok(Some(s)),
        other => Err(D::Error::invalid_type(unexpected(&other), &"a string")),
    }
}

fn unexpected(value: &serde_yaml::Value) -> Unexpected<'_> {
    match value {
        serde_yaml::Value::Null => Unexpected::Unit,
        serde_yaml::Value::Bool(b) => Unexpected::Bool(*b),
        serde_yaml::Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Unexpected::Signed(i),
            (None, Some(f)) => Unexpected::Float(f),
            (None, None) => Unexpected::Other("number"),
        },
        serde_yaml::Value::String(s) => Unexpected::Str(s),
        serde_yaml::Value::Sequence(_) => Unexpected::Seq,
        serde_yaml::Value::Mapping(_) => Unexpected::Map,
        serde_yaml::Value::Tagged(_) => Unexpected::Other("tagged value"),
    }
}

impl From<&PageFilterConfig> for MinifiedPageFilterConfig {
    fn from(config: &PageFilterConfig) -> Self {
        Self {
            display_name: config.display_name.clone(),
            id: config.id.clone(),
            options_source: config.options_source.clone(),
            default_value: config.default_value.clone(),
        }
    }
}

impl From<MinifiedPageFilterConfig> for PageFilterConfig {
    fn from(minified: MinifiedPageFilterConfig) -> Self {
        Self {
            display_name: minified.display_name,
            id: minified.id,
            options_source: minified.options_source,
            default_value: minified.default_value,
        }
    }
}

/// Decode and validate a raw front matter block.
pub fn parse_frontmatter(yaml: &str) -> Result<Frontmatter, FrontmatterError> {
    let frontmatter: Frontmatter = serde_yaml::from_str(yaml)?;
    frontmatter.validate()?;
    Ok(frontmatter)
}

impl Frontmatter {
    pub fn validate(&self) -> Result<(), FrontmatterError> {
        if let Some(filters) = &self.page_filters {
            validate_page_filters(filters)?;
        }
        if let Some(links) = &self.further_reading
            && links.is_empty()
        {
            return Err(FrontmatterError::EmptyFurtherReading);
        }
        Ok(())
    }

    /// Page filters in declaration order; empty when none are declared.
    pub fn filters(&self) -> &[PageFilterConfig] {
        self.page_filters.as_deref().unwrap_or_default()
    }
}

/// Validate a page filter list: per-item formats, then whole-list invariants.
pub fn validate_page_filters(filters: &[PageFilterConfig]) -> Result<(), FrontmatterError> {
    for (idx, filter) in filters.iter().enumerate() {
        check_filter_fields(
            &FilterFields {
                id: &filter.id,
                options_source: &filter.options_source,
                default_value: filter.default_value.as_deref(),
            },
            &|name: &str| format!("page_filters[{idx}].{name}"),
        )?;
    }
    check_unique_display_names(filters)?;
    check_placeholder_order(filters)
}

/// Validate the formats of a minified filter list.
pub fn validate_minified_filters(
    filters: &[MinifiedPageFilterConfig],
) -> Result<(), FrontmatterError> {
    for (idx, filter) in filters.iter().enumerate() {
        check_filter_fields(
            &FilterFields {
                id: &filter.id,
                options_source: &filter.options_source,
                default_value: filter.default_value.as_deref(),
            },
            &|name: &str| {
                let short = match name {
                    "id" => "i",
                    "options_source" => "o",
                    _ => "d",
                };
                format!("[{idx}].{short}")
            },
        )?;
    }
    Ok(())
}

struct FilterFields<'a> {
    id: &'a str,
    options_source: &'a str,
    default_value: Option<&'a str>,
}

fn check_filter_fields(
    fields: &FilterFields<'_>,
    field_path: &dyn Fn(&str) -> String,
) -> Result<(), FrontmatterError> {
    check_format(fields.id, &SNAKE_CASE_REGEX, "snake_case", || field_path("id"))?;
    check_format(
        fields.options_source,
        &FILTER_OPTIONS_ID_REGEX,
        "a lowercase options id with optional <FILTER_ID> placeholders",
        || field_path("options_source"),
    )?;
    if let Some(default_value) = fields.default_value {
        check_format(default_value, &SNAKE_CASE_REGEX, "snake_case", || {
            field_path("default_value")
        })?;
    }
    Ok(())
}

fn check_format(
    value: &str,
    regex: &Regex,
    expected: &'static str,
    field: impl FnOnce() -> String,
) -> Result<(), FrontmatterError> {
    if regex.is_match(value) {
        Ok(())
    } else {
        Err(FrontmatterError::InvalidField {
            field: field(),
            value: value.to_string(),
            expected,
        })
    }
}

fn check_unique_display_names(filters: &[PageFilterConfig]) -> Result<(), FrontmatterError> {
    let mut seen = HashSet::new();
    let mut duplicates: Vec<String> = Vec::new();
    for filter in filters {
        if !seen.insert(filter.display_name.as_str()) && !duplicates.contains(&filter.display_name)
        {
            duplicates.push(filter.display_name.clone());
        }
    }
    if duplicates.is_empty() {
        return Ok(());
    }
    let names: Vec<&str> = filters.iter().map(|f| f.display_name.as_str()).collect();
    log::error!(names:?; "Duplicate page filter display names found in list");
    Err(FrontmatterError::DuplicateFilterNames { names: duplicates })
}

fn check_placeholder_order(filters: &[PageFilterConfig]) -> Result<(), FrontmatterError> {
    let mut defined: HashSet<&str> = HashSet::new();
    for filter in filters {
        defined.insert(filter.display_name.as_str());
        for caps in DISPLAY_NAME_PLACEHOLDER.captures_iter(&filter.display_name) {
            let placeholder = caps.get(1).map_or("", |m| m.as_str());
            if !defined.contains(placeholder) {
                log::error!(placeholder; "Invalid placeholder reference found");
                return Err(FrontmatterError::UndefinedPlaceholder {
                    display_name: filter.display_name.clone(),
                    placeholder: placeholder.to_string(),
                });
            }
        }
    }
    Ok(())
}

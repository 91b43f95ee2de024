//! HTML page rendering.
//!
//! Turns a [`ParsedFile`] and its filter manifest into the Markdown file
//! Hugo consumes: the original front matter followed by a pre-rendered HTML
//! body.
//!
//! ## Node rendering
//!
//! - **text**: Markdown through `pulldown-cmark`
//! - **`partial` tags**: the resolved partial's tree, inlined
//! - **`img` tags**: `src` prefixed with `site_params.img_url`
//! - **other tags**: `div.mdoc-tag.mdoc-<name>` with the tag's classes and id
//! - **error nodes**: nothing
//!
//! ## Page layout
//!
//! ```text
//! article.mdoc-page
//! ├── h1                                  title
//! ├── script#mdoc-page-filters            minified manifest (JSON)
//! ├── script#mdoc-filter-options          option sets the filters reach (JSON)
//! ├── div.mdoc-content                    rendered body
//! └── section.mdoc-further-reading        optional
//! ```
//!
//! Uses [maud](https://maud.lambda.xyz/) for templating, so every attribute
//! and text value is escaped.

use crate::ast::{AnnotationKind, Node, NodeType};
use crate::config::SiteConfig;
use crate::document::ParsedFile;
use crate::filters::{OptionCatalog, PageFiltersManifest};
use crate::frontmatter::{FrontmatterError, FurtherReadingLink, validate_minified_filters};
use crate::partials::FILE_ATTRIBUTE;
use maud::{Markup, PreEscaped, html};
use pulldown_cmark::{Parser, html as md_html};
use thiserror::Error;

/// Element id of the embedded filter manifest.
pub const MANIFEST_SCRIPT_ID: &str = "mdoc-page-filters";

/// Element id of the embedded option sets.
pub const OPTIONS_SCRIPT_ID: &str = "mdoc-filter-options";

#[derive(Error, Debug)]
pub enum PageError {
    #[error("failed to serialize page filter data: {0}")]
    Json(#[from] serde_json::Error),
    #[error("page filter manifest is not embeddable")]
    Manifest(#[source] FrontmatterError),
}

/// Everything needed to render one page.
pub struct PageInputs<'a> {
    pub parsed: &'a ParsedFile,
    pub manifest: &'a PageFiltersManifest,
    /// Catalog subset the page's filters reach, from [`crate::filters::options_for_page`].
    pub filter_options: &'a OptionCatalog,
    pub config: &'a SiteConfig,
}

/// A rendered page.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltPage {
    pub title: String,
    /// Front matter exactly as written in the source file.
    pub frontmatter: String,
    pub html: String,
}

impl BuiltPage {
    /// Front matter block followed by the HTML body.
    pub fn to_hugo_markdown(&self) -> String {
        format!("---\n{}\n---\n{}\n", self.frontmatter, self.html)
    }
}

pub fn build_page(inputs: &PageInputs<'_>) -> Result<BuiltPage, PageError> {
    let parsed = inputs.parsed;
    let renderer = Renderer {
        parsed,
        img_url: inputs.config.img_url(),
    };

    let minified = inputs.manifest.minified();
    validate_minified_filters(&minified).map_err(PageError::Manifest)?;
    let manifest_json = escape_script(&serde_json::to_string(&minified)?);
    let options_json = escape_script(&serde_json::to_string(inputs.filter_options)?);
    let body = renderer.node(&parsed.ast);

    let page = html! {
        article.mdoc-page {
            h1 { (parsed.frontmatter.title) }
            @if !inputs.manifest.is_empty() {
                script type="application/json" id=(MANIFEST_SCRIPT_ID) {
                    (PreEscaped(manifest_json))
                }
                script type="application/json" id=(OPTIONS_SCRIPT_ID) {
                    (PreEscaped(options_json))
                }
            }
            div.mdoc-content {
                (body)
            }
            @if let Some(links) = &parsed.frontmatter.further_reading {
                (further_reading(links))
            }
        }
    };

    Ok(BuiltPage {
        title: parsed.frontmatter.title.clone(),
        frontmatter: parsed.ast.frontmatter().unwrap_or_default().to_string(),
        html: page.into_string(),
    })
}

struct Renderer<'a> {
    parsed: &'a ParsedFile,
    img_url: &'a str,
}

impl Renderer<'_> {
    fn node(&self, node: &Node) -> Markup {
        match node.node_type {
            NodeType::Document => self.children(node),
            NodeType::Text => markdown(node.content.as_deref().unwrap_or_default()),
            NodeType::Tag => self.tag(node),
            NodeType::Error => html! {},
        }
    }

    fn children(&self, node: &Node) -> Markup {
        html! {
            @for child in &node.children {
                (self.node(child))
            }
        }
    }

    fn tag(&self, node: &Node) -> Markup {
        if node.is_partial() {
            return node
                .attribute(FILE_ATTRIBUTE)
                .and_then(|file| self.parsed.partials.get(file))
                .map_or_else(|| html! {}, |tree| self.node(tree));
        }

        let name = node.tag.as_deref().unwrap_or_default();
        if name == "img" {
            let src = node.attribute("src").map(|src| image_url(self.img_url, src));
            return html! {
                img src=[src] alt=[node.attribute("alt")];
            };
        }

        let mut classes = vec!["mdoc-tag".to_string(), format!("mdoc-{name}")];
        classes.extend(
            node.annotations
                .iter()
                .filter(|a| a.kind == AnnotationKind::Class)
                .map(|a| a.name.clone()),
        );
        let id = node
            .annotations
            .iter()
            .find(|a| a.kind == AnnotationKind::Id)
            .map(|a| a.name.as_str());

        html! {
            div class=(classes.join(" ")) id=[id] {
                (self.children(node))
            }
        }
    }
}

fn further_reading(links: &[FurtherReadingLink]) -> Markup {
    html! {
        section.mdoc-further-reading {
            h2 { "Further reading" }
            ul {
                @for link in links {
                    li {
                        a href=(link.link) { (link.text) }
                        @if let Some(tag) = &link.tag {
                            " "
                            span.mdoc-link-tag { (tag) }
                        }
                    }
                }
            }
        }
    }
}

fn markdown(source: &str) -> Markup {
    let mut out = String::new();
    md_html::push_html(&mut out, Parser::new(source));
    PreEscaped(out)
}

/// Joins a relative image path onto the image host; absolute URLs pass through.
fn image_url(img_url: &str, src: &str) -> String {
    if src.starts_with("http://") || src.starts_with("https://") {
        return src.to_string();
    }
    format!(
        "{}/{}",
        img_url.trim_end_matches('/'),
        src.trim_start_matches('/')
    )
}

/// Keeps embedded JSON from closing its `<script>` element early.
fn escape_script(json: &str) -> String {
    json.replace("</", "<\\/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::parse_source;
    use crate::filters::{Allowlist, FilterOption, ManifestFilter, build_manifest, options_for_page};
    use crate::frontmatter::PageFilterConfig;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn config() -> SiteConfig {
        let mut config = SiteConfig::default();
        config.site_params.img_url = Some("https://img.example.com/".to_string());
        config
    }

    fn render(source: &str, partials: &[(&str, &str)]) -> BuiltPage {
        let tmp = TempDir::new().unwrap();
        for (name, content) in partials {
            fs::write(tmp.path().join(name), content).unwrap();
        }
        let parsed = parse_source(source, Path::new("page.mdoc"), tmp.path()).unwrap();
        let manifest = PageFiltersManifest::default();
        build_page(&PageInputs {
            parsed: &parsed,
            manifest: &manifest,
            filter_options: &OptionCatalog::default(),
            config: &config(),
        })
        .unwrap()
    }

    #[test]
    fn renders_title_and_markdown() {
        let page = render("---\ntitle: Colors\n---\n# Primary\n\nSome *emphasis*.\n", &[]);
        assert!(page.html.contains("<h1>Colors</h1>"));
        assert!(page.html.contains("<h1>Primary</h1>"));
        assert!(page.html.contains("<em>emphasis</em>"));
        assert_eq!(page.title, "Colors");
    }

    #[test]
    fn partials_are_inlined() {
        let page = render(
            "---\ntitle: T\n---\n{% partial file=\"note.mdoc\" /%}\n",
            &[("note.mdoc", "From the partial.\n")],
        );
        assert!(page.html.contains("<p>From the partial.</p>"));
    }

    #[test]
    fn images_use_configured_host() {
        let page = render(
            "---\ntitle: T\n---\n{% img src=\"/colors/wheel.png\" alt=\"Color wheel\" /%}\n",
            &[],
        );
        assert!(
            page.html
                .contains(r#"<img src="https://img.example.com/colors/wheel.png" alt="Color wheel">"#)
        );
    }

    #[test]
    fn absolute_image_urls_untouched() {
        assert_eq!(
            image_url("https://img.example.com", "https://other.com/a.png"),
            "https://other.com/a.png"
        );
        assert_eq!(
            image_url("https://img.example.com", "a.png"),
            "https://img.example.com/a.png"
        );
    }

    #[test]
    fn generic_tags_become_divs() {
        let page = render(
            "---\ntitle: T\n---\n{% alert .warning #careful %}\nMind the paint.\n{% /alert %}\n",
            &[],
        );
        assert!(page.html.contains(
            r#"<div class="mdoc-tag mdoc-alert warning" id="careful"><p>Mind the paint.</p>"#
        ));
    }

    #[test]
    fn error_nodes_render_nothing() {
        let page = render("---\ntitle: T\n---\n{% /stray %}\nText\n", &[]);
        assert!(!page.html.contains("stray"));
        assert!(page.html.contains("<p>Text</p>"));
    }

    #[test]
    fn further_reading_listed() {
        let page = render(
            "---\ntitle: T\nfurther_reading:\n  - link: https://example.com\n    text: Example\n    tag: blog\n---\nBody\n",
            &[],
        );
        assert!(page.html.contains(r#"<a href="https://example.com">Example</a>"#));
        assert!(page.html.contains(r#"<span class="mdoc-link-tag">blog</span>"#));
    }

    #[test]
    fn manifest_embedded_when_filters_present() {
        let tmp = TempDir::new().unwrap();
        let source = "---\ntitle: T\npage_filters:\n  - display_name: color\n    id: color\n    options_source: color_options\n---\nBody\n";
        let parsed = parse_source(source, Path::new("page.mdoc"), tmp.path()).unwrap();

        let mut catalog = OptionCatalog::default();
        catalog.insert(
            "color_options".into(),
            vec![FilterOption {
                id: "red".into(),
                display_name: "Red".into(),
                default: true,
            }],
        );
        catalog.insert("size_options".into(), vec![]);
        let allowlist = Allowlist {
            filter_ids: ["color".to_string()].into(),
            option_ids: ["red".to_string()].into(),
        };
        let manifest = build_manifest(&parsed.frontmatter, &catalog, &allowlist);
        let filter_options = options_for_page(&parsed.frontmatter, &catalog);
        let page = build_page(&PageInputs {
            parsed: &parsed,
            manifest: &manifest,
            filter_options: &filter_options,
            config: &config(),
        })
        .unwrap();

        assert!(page.html.contains(&format!(
            r#"<script type="application/json" id="{MANIFEST_SCRIPT_ID}">[{{"n":"color","i":"color","o":"color_options"}}]</script>"#
        )));
        assert!(page.html.contains(&format!(
            r#"<script type="application/json" id="{OPTIONS_SCRIPT_ID}">{{"color_options":[{{"id":"red","display_name":"Red","default":true}}]}}</script>"#
        )));
    }

    #[test]
    fn malformed_manifest_not_embedded() {
        let tmp = TempDir::new().unwrap();
        let parsed = parse_source("---\ntitle: T\n---\nBody\n", Path::new("page.mdoc"), tmp.path()).unwrap();
        let mut manifest = PageFiltersManifest::default();
        manifest.filters.insert(
            "Color".into(),
            ManifestFilter {
                config: PageFilterConfig {
                    display_name: "color".into(),
                    id: "Color".into(),
                    options_source: "color_options".into(),
                    default_value: None,
                },
                default_value: None,
                possible_values: vec![],
            },
        );

        let err = build_page(&PageInputs {
            parsed: &parsed,
            manifest: &manifest,
            filter_options: &OptionCatalog::default(),
            config: &config(),
        })
        .unwrap_err();
        assert!(matches!(
            err,
            PageError::Manifest(FrontmatterError::InvalidField { ref field, .. }) if field == "[0].i"
        ));
    }

    #[test]
    fn no_manifest_script_without_filters() {
        let page = render("---\ntitle: T\n---\nBody\n", &[]);
        assert!(!page.html.contains(MANIFEST_SCRIPT_ID));
        assert!(!page.html.contains(OPTIONS_SCRIPT_ID));
    }

    #[test]
    fn hugo_markdown_keeps_frontmatter() {
        let page = render("---\ntitle: T\naliases: [/old]\n---\nBody\n", &[]);
        let md = page.to_hugo_markdown();
        assert!(md.starts_with("---\ntitle: T\naliases: [/old]\n---\n<article"));
    }

    #[test]
    fn script_escape() {
        assert_eq!(escape_script(r#"["</script>"]"#), r#"["<\/script>"]"#);
    }

    #[test]
    fn html_escape_in_text_attributes() {
        let page = render("---\ntitle: \"<b>Bold</b>\"\n---\nBody\n", &[]);
        assert!(page.html.contains("&lt;b&gt;Bold&lt;/b&gt;"));
    }
}

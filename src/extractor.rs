use anyhow::{anyhow, Context, Result};
use scraper::{ElementRef, Node, Selector};
use tracing::{info, instrument};

use crate::browser::{PageSource, RenderRequest, SelectFilter};
use crate::datetime::collapse_whitespace;
use crate::model::fixture::Fixture;

/// Reads fixtures out of one source-site layout.
pub trait Extractor {
    /// Short layout name used in logs.
    fn name(&self) -> &'static str;

    /// Element that must be present before the page is read.
    fn ready_selector(&self) -> &str;

    /// Filter to apply on the rendered page before reading, if any.
    fn filter(&self) -> Option<SelectFilter> {
        None
    }

    /// Parse rendered HTML into fixtures, in page order.
    fn extract(&self, html: &str) -> Result<Vec<Fixture>>;
}

/// Render `url` through `pages` and run `extractor` over the result.
#[instrument(level = "info", skip(pages, extractor), fields(layout = extractor.name()))]
pub fn fetch_fixtures(pages: &dyn PageSource, url: &str, extractor: &dyn Extractor) -> Result<Vec<Fixture>> {
    let request = RenderRequest {
        url: url.to_string(),
        ready_selector: extractor.ready_selector().to_string(),
        filter: extractor.filter(),
    };
    let html = pages.render(&request)?;
    let fixtures = extractor
        .extract(&html)
        .with_context(|| format!("Failed to extract {} fixtures from {}", extractor.name(), url))?;
    info!(count = fixtures.len(), "Fixtures parsed");
    Ok(fixtures)
}

pub(crate) fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("Invalid selector {:?}: {:?}", css, e))
}

// Elements that start on their own line when rendered.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "br", "dd", "div", "dl", "dt", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header",
    "hr", "li", "ol", "p", "section", "table", "tbody", "td", "tfoot", "th", "thead", "tr", "ul",
];

/// Rendered text of an element with whitespace folded, close to what a browser shows.
///
/// Inline children run together (`3:30<span>PM</span>` reads `3:30PM`); block children are
/// separated by a space.
pub(crate) fn element_text(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    push_text(el, &mut out);
    collapse_whitespace(&out)
}

fn push_text(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                let Some(child) = ElementRef::wrap(child) else { continue };
                let block = BLOCK_ELEMENTS.contains(&child.value().name());
                if block {
                    out.push(' ');
                }
                push_text(child, out);
                if block {
                    out.push(' ');
                }
            }
            _ => {}
        }
    }
}

/// Text of the `index`-th descendant of `parent` matching `sel`.
pub(crate) fn nth_text(parent: ElementRef<'_>, sel: &Selector, index: usize, field: &str) -> Result<String> {
    parent
        .select(sel)
        .nth(index)
        .map(element_text)
        .ok_or_else(|| anyhow!("Missing {} (match #{})", field, index))
}

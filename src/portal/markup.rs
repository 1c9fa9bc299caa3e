//! Markup inspection for the portal pages.
//!
//! Every assumption about the portal's HTML lives here, so a change on the
//! remote site shows up as `None` / [`ResultsPage::NoTable`] from one of these
//! functions rather than somewhere downstream.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

static INPUT: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("input[name]"));
static TABLE: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("table"));
static ROW: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("tr"));
static CELL: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("td"));
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("a[href]"));

/// Compiles a selector at static init; panics on an invalid pattern.
#[allow(clippy::expect_used)]
fn compile_static_selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector is valid") // Static pattern, safe to panic
}

/// What a search results page contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultsPage {
    /// No results table at all.
    NoTable,
    /// A results table holding only its header row.
    HeaderOnly,
    /// Raw hrefs of the first anchor in the first cell of each data row.
    Rows(Vec<String>),
}

/// Value of the hidden input named `field`, if present and non-empty.
#[must_use]
pub fn extract_token(html: &str, field: &str) -> Option<String> {
    let document = Html::parse_document(html);
    document
        .select(&INPUT)
        .filter(|input| input.value().attr("name") == Some(field))
        .find_map(|input| input.value().attr("value"))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
}

/// Classifies a search results page and collects its row links.
///
/// The first row of the table is the header. Data rows without a cell
/// anchor contribute nothing.
#[must_use]
pub fn parse_results_page(html: &str, table_class: &str) -> ResultsPage {
    let document = Html::parse_document(html);
    let Some(table) = document
        .select(&TABLE)
        .find(|table| table.value().classes().any(|class| class == table_class))
    else {
        return ResultsPage::NoTable;
    };

    let rows: Vec<ElementRef<'_>> = table.select(&ROW).collect();
    if rows.len() <= 1 {
        return ResultsPage::HeaderOnly;
    }

    let hrefs = rows[1..]
        .iter()
        .filter_map(|row| row.select(&CELL).next())
        .filter_map(|cell| cell.select(&ANCHOR).next())
        .filter_map(|anchor| anchor.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .map(ToString::to_string)
        .collect();
    ResultsPage::Rows(hrefs)
}

/// Href of the first anchor whose visible text equals `link_text`.
///
/// Text is compared after trimming and collapsing whitespace, ignoring ASCII case.
#[must_use]
pub fn find_document_href(html: &str, link_text: &str) -> Option<String> {
    let document = Html::parse_document(html);
    document
        .select(&ANCHOR)
        .find(|anchor| visible_text(anchor).eq_ignore_ascii_case(link_text.trim()))
        .and_then(|anchor| anchor.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .map(ToString::to_string)
}

fn visible_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

//! Field extraction from catalog HTML
//!
//! The [`Extractor`] trait is the pluggable contract between the crawl
//! engine and the page-structure rules; [`CatalogExtractor`] implements
//! it for the book catalog's markup. Extraction is pure: no I/O, no
//! retries, just HTML in, fields out.

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::model::BookFields;

/// Extraction contract consumed by the discoverer and orchestrator
pub trait Extractor: Send + Sync {
    /// Parses a detail page into record fields, or `None` if required
    /// fields are missing
    fn extract_item(&self, html: &str, source_url: &str) -> Option<BookFields>;

    /// Extracts the item addresses linked from a listing page
    fn extract_listing_links(&self, html: &str, page_url: &str) -> Vec<String>;

    /// Extracts the next listing page address, or `None` on the last page
    fn extract_next_page(&self, html: &str, page_url: &str) -> Option<String>;
}

/// Default extractor for the book catalog markup
#[derive(Debug, Default)]
pub struct CatalogExtractor;

impl CatalogExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for CatalogExtractor {
    fn extract_item(&self, html: &str, source_url: &str) -> Option<BookFields> {
        let document = Html::parse_document(html);

        let name = extract_name(&document);
        let price_incl_tax = extract_price(&document, "Price (incl. tax)");

        // Name and incl-tax price are required; anything else degrades to
        // a default.
        if name.is_empty() || price_incl_tax.is_none() {
            tracing::warn!("Missing required fields for {}", source_url);
            return None;
        }
        let price_incl_tax = price_incl_tax?;
        let price_excl_tax = extract_price(&document, "Price (excl. tax)").unwrap_or(price_incl_tax);

        Some(BookFields {
            url: source_url.to_string(),
            name,
            description: extract_description(&document),
            category: extract_category(&document),
            price_excl_tax,
            price_incl_tax,
            availability: extract_availability(&document),
            num_reviews: extract_num_reviews(&document),
            rating: extract_rating(&document),
            image_url: extract_image_url(&document, source_url),
        })
    }

    fn extract_listing_links(&self, html: &str, page_url: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        let mut links = Vec::new();

        if let Ok(selector) = Selector::parse("article.product_pod h3 a[href]") {
            for element in document.select(&selector) {
                if let Some(href) = element.value().attr("href") {
                    if let Some(absolute) = resolve_link(href, page_url) {
                        links.push(absolute);
                    }
                }
            }
        }

        links
    }

    fn extract_next_page(&self, html: &str, page_url: &str) -> Option<String> {
        let document = Html::parse_document(html);
        let selector = Selector::parse("li.next a[href]").ok()?;

        document
            .select(&selector)
            .next()
            .and_then(|element| element.value().attr("href"))
            .and_then(|href| resolve_link(href, page_url))
    }
}

/// Resolves an href against the page it was found on
fn resolve_link(href: &str, base: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    base.join(href.trim()).ok().map(|u| u.to_string())
}

fn extract_name(document: &Html) -> String {
    element_text(document, "h1").unwrap_or_default()
}

/// Description lives in the paragraph right after the product_description
/// header div
fn extract_description(document: &Html) -> Option<String> {
    element_text(document, "#product_description + p")
}

/// Category is the third breadcrumb entry (home / catalog / category)
fn extract_category(document: &Html) -> String {
    let selector = match Selector::parse("ul.breadcrumb li a") {
        Ok(s) => s,
        Err(_) => return "Unknown".to_string(),
    };

    document
        .select(&selector)
        .nth(2)
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "Unknown".to_string())
}

fn extract_availability(document: &Html) -> String {
    element_text(document, "p.instock.availability").unwrap_or_else(|| "Unknown".to_string())
}

/// Pulls a numeric price from the product information table row with the
/// given label (e.g. "Price (incl. tax)" with a value like "£51.77")
fn extract_price(document: &Html, label: &str) -> Option<f64> {
    product_table_value(document, label).and_then(|text| parse_price(&text))
}

fn extract_num_reviews(document: &Html) -> u32 {
    product_table_value(document, "Number of reviews")
        .and_then(|text| text.trim().parse().ok())
        .unwrap_or(0)
}

/// Star rating is encoded as a class on the star-rating paragraph
fn extract_rating(document: &Html) -> u8 {
    let selector = match Selector::parse("p.star-rating") {
        Ok(s) => s,
        Err(_) => return 3,
    };

    document
        .select(&selector)
        .next()
        .and_then(|element| {
            element.value().classes().find_map(|class| match class {
                "One" => Some(1),
                "Two" => Some(2),
                "Three" => Some(3),
                "Four" => Some(4),
                "Five" => Some(5),
                _ => None,
            })
        })
        .unwrap_or(3)
}

fn extract_image_url(document: &Html, source_url: &str) -> String {
    let selector = match Selector::parse("img[src]") {
        Ok(s) => s,
        Err(_) => return String::new(),
    };

    document
        .select(&selector)
        .next()
        .and_then(|element| element.value().attr("src"))
        .and_then(|src| resolve_link(src, source_url))
        .unwrap_or_default()
}

/// Looks up a cell value in the striped product-information table by its
/// row header
fn product_table_value(document: &Html, label: &str) -> Option<String> {
    let row_selector = Selector::parse("table.table-striped tr").ok()?;
    let th_selector = Selector::parse("th").ok()?;
    let td_selector = Selector::parse("td").ok()?;

    for row in document.select(&row_selector) {
        let header = row
            .select(&th_selector)
            .next()
            .map(|th| th.text().collect::<String>());

        if header.is_some_and(|h| h.contains(label)) {
            return row
                .select(&td_selector)
                .next()
                .map(|td| td.text().collect::<String>().trim().to_string());
        }
    }

    None
}

/// Extracts the numeric part of a currency string like "£51.77"
fn parse_price(text: &str) -> Option<f64> {
    let numeric: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    numeric.parse().ok()
}

fn element_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .next()
        .map(collect_text)
        .filter(|s| !s.is_empty())
}

fn collect_text(element: ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

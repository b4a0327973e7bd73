//! Site adapters: the only code that knows the target site's markup.
//!
//! The crawler talks to [`SiteAdapter`] and never builds a selector itself,
//! so a front-end rebuild on the target site is absorbed here.

pub mod shopino;

use scraper::{ElementRef, Html};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MarkupError {
    #[error("expected 2 hidden subcategory sections and 1 visible one, found {hidden} hidden, visible present: {visible}")]
    MissingSections { hidden: usize, visible: bool },
}

/// A leaf subcategory found on the base page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryLink {
    pub main_category: String,
    pub sub_category: String,
    pub url: Url,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShopRef {
    pub url: Option<Url>,
    pub name: Option<String>,
}

/// Raw fields read off a product page. Every field is independently optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductPage {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
    pub old_price: Option<String>,
    pub discount_percentage: Option<String>,
    pub shop: Option<ShopRef>,
    /// Unique image URLs, in first-seen order.
    pub image_urls: Vec<Url>,
    pub related_names: Vec<String>,
}

pub trait SiteAdapter {
    fn base_url(&self) -> &Url;

    /// Leaf subcategories from the base page, women then men then kids.
    fn category_links(&self, doc: &Html) -> Result<Vec<CategoryLink>, MarkupError>;

    /// URL of listing page `page` (1-based) for a category.
    fn listing_url(&self, category: &Url, page: u32) -> Url;

    /// One entry per product article on a listing page; `None` when the
    /// article carries no product link. An empty vec means the listing is exhausted.
    fn listing_articles(&self, doc: &Html) -> Vec<Option<Url>>;

    fn product_page(&self, doc: &Html) -> ProductPage;
}

/// Descendant text with surrounding whitespace trimmed, `None` when empty.
pub(crate) fn element_text(el: ElementRef<'_>) -> Option<String> {
    let text = el.text().collect::<String>();
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Each text node trimmed, then concatenated.
pub(crate) fn stripped_text(el: ElementRef<'_>) -> String {
    el.text().map(str::trim).collect()
}

/// Last non-empty path segment, used as the product identifier.
pub fn product_id(url: &Url) -> Option<String> {
    url.path_segments()?
        .filter(|s| !s.is_empty())
        .last()
        .map(str::to_string)
}

//! Selectors for the shopino.app storefront.
//!
//! Class names come from the site's Svelte build and change whenever it is
//! rebuilt; when extraction starts coming back empty, capture a page, fix the
//! selector here and refresh the fixture under `tests/fixtures/`.

use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::{
    element_text, stripped_text, CategoryLink, MarkupError, ProductPage, ShopRef, SiteAdapter,
};

pub const WOMEN: &str = "زنانه";
pub const MEN: &str = "مردانه";
pub const KIDS: &str = "بچه گانه";

fn sel(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("bad selector {css:?}: {e:?}"))
}

// ── Base page ──
static HIDDEN_SECTION: LazyLock<Selector> =
    LazyLock::new(|| sel("div.subcategories.hidden.svelte-cjiu79"));
static VISIBLE_SECTION: LazyLock<Selector> =
    LazyLock::new(|| sel("div.subcategories.flex.svelte-cjiu79"));
static SUBCATEGORY_LINK: LazyLock<Selector> = LazyLock::new(|| sel("a.svelte-cjiu79"));
static ICON: LazyLock<Selector> = LazyLock::new(|| sel("svg"));

// ── Listing page ──
static ARTICLE: LazyLock<Selector> = LazyLock::new(|| sel("article.svelte-nicmne"));
static ARTICLE_LINK: LazyLock<Selector> =
    LazyLock::new(|| sel("a.wrapper.primary.small.tonal.svelte-atwtro"));

// ── Product page ──
static TITLE: LazyLock<Selector> = LazyLock::new(|| sel("h1.svelte-7lo6ed"));
static DESCRIPTION: LazyLock<Selector> = LazyLock::new(|| sel("pre.svelte-1j2bv51"));
static PRICE: LazyLock<Selector> = LazyLock::new(|| sel("div.price.discounted.svelte-1ldsyi0"));
static OLD_PRICE: LazyLock<Selector> = LazyLock::new(|| sel("div.old-price.svelte-1ldsyi0"));
static DISCOUNT: LazyLock<Selector> =
    LazyLock::new(|| sel("div.discount-percentage.svelte-1ldsyi0"));
static SHOP: LazyLock<Selector> = LazyLock::new(|| sel("a.shop-info.svelte-7lo6ed"));
static IMG: LazyLock<Selector> = LazyLock::new(|| sel("img"));
static GALLERY_IMAGE: LazyLock<Selector> = LazyLock::new(|| sel("img.svelte-13ln6ur"));
static RELATED_CONTAINER: LazyLock<Selector> =
    LazyLock::new(|| sel("div.address-container.svelte-7lo6ed"));
static RELATED_DESCRIPTION: LazyLock<Selector> =
    LazyLock::new(|| sel("div.description.svelte-7lo6ed"));
static LIST_ITEM: LazyLock<Selector> = LazyLock::new(|| sel("li"));
static RELATED_LINK: LazyLock<Selector> = LazyLock::new(|| sel(r#"a[class~="hover:underline"]"#));

pub struct Shopino {
    base_url: Url,
}

impl Shopino {
    pub fn new(base_url: Url) -> Self {
        Self { base_url }
    }

    fn leaf_links(&self, section: ElementRef<'_>, main_category: &str) -> Vec<CategoryLink> {
        section
            .select(&SUBCATEGORY_LINK)
            // An icon marks a parent category that opens another level.
            .filter(|a| a.select(&ICON).next().is_none())
            .filter_map(|a| {
                let url = self.base_url.join(a.value().attr("href")?).ok()?;
                Some(CategoryLink {
                    main_category: main_category.to_string(),
                    sub_category: element_text(a).unwrap_or_default(),
                    url,
                })
            })
            .collect()
    }
}

fn first_text(doc: &Html, selector: &Selector) -> Option<String> {
    doc.select(selector).next().and_then(element_text)
}

impl SiteAdapter for Shopino {
    fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn category_links(&self, doc: &Html) -> Result<Vec<CategoryLink>, MarkupError> {
        let hidden: Vec<ElementRef<'_>> = doc.select(&HIDDEN_SECTION).collect();
        let visible = doc.select(&VISIBLE_SECTION).next();

        let (women, men, kids) = match (visible, hidden.as_slice()) {
            (Some(women), [men, kids, ..]) => (women, *men, *kids),
            _ => {
                return Err(MarkupError::MissingSections {
                    hidden: hidden.len(),
                    visible: visible.is_some(),
                })
            }
        };

        let mut links = self.leaf_links(women, WOMEN);
        links.extend(self.leaf_links(men, MEN));
        links.extend(self.leaf_links(kids, KIDS));
        Ok(links)
    }

    fn listing_url(&self, category: &Url, page: u32) -> Url {
        let mut url = category.clone();
        url.query_pairs_mut().append_pair("page", &page.to_string());
        url
    }

    fn listing_articles(&self, doc: &Html) -> Vec<Option<Url>> {
        doc.select(&ARTICLE)
            .map(|article| {
                let href = article.select(&ARTICLE_LINK).next()?.value().attr("href")?;
                self.base_url.join(href).ok()
            })
            .collect()
    }

    fn product_page(&self, doc: &Html) -> ProductPage {
        let shop = doc.select(&SHOP).next().map(|a| ShopRef {
            url: a
                .value()
                .attr("href")
                .and_then(|href| self.base_url.join(href).ok()),
            name: a
                .select(&IMG)
                .next()
                .and_then(|img| img.value().attr("alt"))
                .map(str::to_string),
        });

        let mut seen = HashSet::new();
        let image_urls = doc
            .select(&GALLERY_IMAGE)
            .filter_map(|img| img.value().attr("src"))
            .filter(|src| !src.is_empty())
            .filter_map(|src| self.base_url.join(src).ok())
            .filter(|url| seen.insert(url.clone()))
            .collect();

        let related_names = doc
            .select(&RELATED_CONTAINER)
            .next()
            .and_then(|c| c.select(&RELATED_DESCRIPTION).next())
            .map(|desc| {
                desc.select(&LIST_ITEM)
                    .filter_map(|li| li.select(&RELATED_LINK).next())
                    .map(stripped_text)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        ProductPage {
            title: first_text(doc, &TITLE),
            description: first_text(doc, &DESCRIPTION),
            price: first_text(doc, &PRICE),
            old_price: first_text(doc, &OLD_PRICE),
            discount_percentage: first_text(doc, &DISCOUNT),
            shop,
            image_urls,
            related_names,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> Html {
        let html = std::fs::read_to_string(format!("tests/fixtures/{}.html", name)).unwrap();
        Html::parse_document(&html)
    }

    fn site() -> Shopino {
        Shopino::new(Url::parse("https://shopino.app").unwrap())
    }

    #[test]
    fn base_page_yields_leaf_categories_only() {
        let links = site().category_links(&fixture("base")).unwrap();

        let women: Vec<_> = links.iter().filter(|l| l.main_category == WOMEN).collect();
        assert_eq!(women.len(), 2, "parent anchor with icon must be skipped");
        assert_eq!(women[0].sub_category, "مانتو");
        assert_eq!(women[0].url.as_str(), "https://shopino.app/category/women-manto");
        assert_eq!(women[1].sub_category, "شلوار");

        let order: Vec<&str> = links.iter().map(|l| l.main_category.as_str()).collect();
        assert_eq!(order, vec![WOMEN, WOMEN, MEN, KIDS]);
        assert_eq!(links[2].sub_category, "پیراهن");
        assert_eq!(links[3].url.as_str(), "https://shopino.app/category/kids-shoes");
    }

    #[test]
    fn base_page_without_hidden_sections_is_rejected() {
        let doc = Html::parse_document(
            r#"<div class="subcategories flex svelte-cjiu79"><a class="svelte-cjiu79" href="/a">A</a></div>
               <div class="subcategories hidden svelte-cjiu79"></div>"#,
        );
        assert_eq!(
            site().category_links(&doc),
            Err(MarkupError::MissingSections {
                hidden: 1,
                visible: true
            })
        );
    }

    #[test]
    fn base_page_without_visible_section_is_rejected() {
        let doc = Html::parse_document(
            r#"<div class="subcategories hidden svelte-cjiu79"></div>
               <div class="subcategories hidden svelte-cjiu79"></div>"#,
        );
        assert_eq!(
            site().category_links(&doc),
            Err(MarkupError::MissingSections {
                hidden: 2,
                visible: false
            })
        );
    }

    #[test]
    fn listing_url_appends_page_query() {
        let cat = Url::parse("https://shopino.app/category/women-manto").unwrap();
        assert_eq!(
            site().listing_url(&cat, 3).as_str(),
            "https://shopino.app/category/women-manto?page=3"
        );
    }

    #[test]
    fn listing_articles_resolve_links() {
        let articles = site().listing_articles(&fixture("listing"));
        assert_eq!(articles.len(), 3);
        assert_eq!(
            articles[0].as_ref().map(Url::as_str),
            Some("https://shopino.app/product/1001")
        );
        assert_eq!(articles[1], None, "article without product link");
        assert_eq!(
            articles[2].as_ref().map(Url::as_str),
            Some("https://shopino.app/product/1002")
        );
    }

    #[test]
    fn empty_listing_has_no_articles() {
        assert!(site().listing_articles(&fixture("listing_empty")).is_empty());
    }

    #[test]
    fn product_page_fields() {
        let p = site().product_page(&fixture("product"));

        assert_eq!(p.title.as_deref(), Some("مانتو کتان"));
        assert_eq!(p.description.as_deref(), Some("جنس: کتان\nسایز: آزاد"));
        assert_eq!(p.price.as_deref(), Some("۸۵۰,۰۰۰ تومان"));
        assert_eq!(p.old_price.as_deref(), Some("۱,۰۰۰,۰۰۰ تومان"));
        assert_eq!(p.discount_percentage, None);

        let shop = p.shop.unwrap();
        assert_eq!(shop.url.unwrap().as_str(), "https://shopino.app/shop/atelier");
        assert_eq!(shop.name.as_deref(), Some("آتلیه"));

        assert_eq!(p.related_names, vec!["مانتو مشکی", "مانتو سفید"]);
    }

    #[test]
    fn duplicate_gallery_images_collapse() {
        let p = site().product_page(&fixture("product"));
        let urls: Vec<&str> = p.image_urls.iter().map(Url::as_str).collect();
        assert_eq!(
            urls,
            vec![
                "https://cdn.shopino.app/img/a1.jpg",
                "https://cdn.shopino.app/img/a2.jpg",
            ]
        );
    }

    #[test]
    fn bare_product_page_has_no_fields() {
        let p = site().product_page(&Html::parse_document("<html><body></body></html>"));
        assert_eq!(p, ProductPage::default());
    }

    #[test]
    fn blank_nodes_count_as_missing() {
        let doc = Html::parse_document(
            r#"<h1 class="svelte-7lo6ed">  </h1><pre class="svelte-1j2bv51"></pre>
               <div class="price discounted svelte-1ldsyi0"> </div>"#,
        );
        let p = site().product_page(&doc);
        assert_eq!(p.title, None);
        assert_eq!(p.description, None);
        assert_eq!(p.price, None);
    }
}

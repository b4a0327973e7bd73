use serde::Serialize;
use url::Url;

use crate::site::ProductPage;

pub const NO_TITLE: &str = "No Title";
pub const NO_DESCRIPTION: &str = "No Description";
pub const NO_PRICE: &str = "No Price";
pub const NO_SHOP_NAME: &str = "No Shop Name";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelatedProduct {
    pub name: String,
}

/// The full extracted record written as the product's sidecar JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductMetadata {
    pub product_id: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_category: Option<String>,
    pub title: String,
    pub description: String,
    pub price: String,
    pub old_price: Option<String>,
    pub discount_percentage: Option<String>,
    pub shop_url: Option<String>,
    pub shop_name: Option<String>,
    pub images: Vec<String>,
    pub related_lists: Vec<RelatedProduct>,
}

impl ProductMetadata {
    /// Fill sentinels for missing fields. `images` starts empty and is
    /// populated as downloads succeed.
    pub fn from_page(
        product_id: &str,
        url: &Url,
        categories: Option<(&str, &str)>,
        page: ProductPage,
    ) -> Self {
        let (shop_url, shop_name) = match page.shop {
            Some(shop) => (
                shop.url.map(String::from),
                Some(shop.name.unwrap_or_else(|| NO_SHOP_NAME.to_string())),
            ),
            None => (None, None),
        };

        Self {
            product_id: product_id.to_string(),
            url: url.to_string(),
            main_category: categories.map(|(main, _)| main.to_string()),
            sub_category: categories.map(|(_, sub)| sub.to_string()),
            title: page.title.unwrap_or_else(|| NO_TITLE.to_string()),
            description: page.description.unwrap_or_else(|| NO_DESCRIPTION.to_string()),
            price: page.price.unwrap_or_else(|| NO_PRICE.to_string()),
            old_price: page.old_price,
            discount_percentage: page.discount_percentage,
            shop_url,
            shop_name,
            images: Vec::new(),
            related_lists: page
                .related_names
                .into_iter()
                .map(|name| RelatedProduct { name })
                .collect(),
        }
    }
}

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use url::Url;

const ENV_PREFIX: &str = "SHOP";

/// Run settings: the site root and how many products to crawl per leaf category.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub base_url: Url,
    pub products_per_subcategory: usize,
}

/// Load settings from a YAML (or any format `config` recognises) file,
/// with `SHOP_*` environment variables taking precedence.
pub fn load(path: &Path) -> Result<Settings> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path))
        .add_source(config::Environment::with_prefix(ENV_PREFIX))
        .build()
        .with_context(|| format!("Failed to read config {:?}", path))?;

    settings
        .try_deserialize()
        .with_context(|| format!("Invalid settings in {:?}", path))
}

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::Connection;
use scraper::Html;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::db::{self, CategoryRow, ProductRow};
use crate::fetch::{FetchError, Fetcher};
use crate::record::ProductMetadata;
use crate::site::{self, CategoryLink, MarkupError, SiteAdapter};
use crate::storage;

// ── Discovery ──

#[derive(Debug, Error)]
pub enum DiscoverError {
    #[error("could not fetch base page: {0}")]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Markup(#[from] MarkupError),
}

/// Categories found on the base page. Nothing downstream runs until the
/// plan is turned into an [`ApprovedPlan`].
#[derive(Debug)]
pub struct CrawlPlan {
    categories: Vec<CategoryLink>,
}

impl CrawlPlan {
    pub fn categories(&self) -> &[CategoryLink] {
        &self.categories
    }

    pub fn approve(self) -> ApprovedPlan {
        ApprovedPlan {
            categories: self.categories,
        }
    }
}

#[derive(Debug)]
pub struct ApprovedPlan {
    categories: Vec<CategoryLink>,
}

impl ApprovedPlan {
    pub fn categories(&self) -> &[CategoryLink] {
        &self.categories
    }
}

pub fn discover(fetcher: &dyn Fetcher, site: &dyn SiteAdapter) -> Result<CrawlPlan, DiscoverError> {
    info!("Crawling categories from {}", site.base_url());
    let html = fetcher.fetch_text(site.base_url().as_str())?;
    let doc = Html::parse_document(&html);
    let mut seen = HashSet::new();
    let categories: Vec<CategoryLink> = site
        .category_links(&doc)?
        .into_iter()
        .filter(|c| {
            let fresh = seen.insert((c.main_category.clone(), c.sub_category.clone()));
            if !fresh {
                debug!("Dropping repeated {} > {} at {}", c.main_category, c.sub_category, c.url);
            }
            fresh
        })
        .collect();
    info!("Found {} subcategories", categories.len());
    Ok(CrawlPlan { categories })
}

/// Store the approved categories. Pairs already in the table are left alone.
pub fn persist_plan(conn: &Connection, plan: &ApprovedPlan) -> rusqlite::Result<usize> {
    let rows: Vec<CategoryRow> = plan
        .categories
        .iter()
        .map(|c| CategoryRow {
            main_category: c.main_category.clone(),
            sub_category: c.sub_category.clone(),
            url: c.url.to_string(),
        })
        .collect();
    db::insert_categories(conn, &rows)
}

// ── Products ──

#[derive(Debug, Error)]
pub enum SkipReason {
    #[error("no product id in {0}")]
    NoProductId(String),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("filesystem: {0}")]
    Io(#[from] std::io::Error),
    #[error("sidecar: {0}")]
    Json(#[from] serde_json::Error),
    #[error("database: {0}")]
    Database(#[from] rusqlite::Error),
}

#[derive(Debug)]
pub struct Skipped {
    pub product: String,
    pub reason: SkipReason,
}

#[derive(Debug)]
pub struct SavedProduct {
    pub product_id: String,
    pub folder: PathBuf,
    pub json_path: PathBuf,
    pub images: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationStop {
    /// Listing page N had no product articles.
    EmptyPage(u32),
    QuotaReached,
    /// Listing page N could not be fetched.
    FetchFailed(u32),
}

#[derive(Debug)]
pub struct CategoryReport {
    pub main_category: String,
    pub sub_category: String,
    pub pages: u32,
    pub saved: usize,
    pub skipped: Vec<Skipped>,
    pub stop: PaginationStop,
}

impl CategoryReport {
    /// Products attempted so far, saved or not. This is what the quota counts.
    pub fn attempted(&self) -> usize {
        self.saved + self.skipped.len()
    }
}

pub struct Crawler<'a> {
    fetcher: &'a dyn Fetcher,
    site: &'a dyn SiteAdapter,
    conn: Option<&'a Connection>,
    assets: &'a Path,
}

impl<'a> Crawler<'a> {
    pub fn new(fetcher: &'a dyn Fetcher, site: &'a dyn SiteAdapter, assets: &'a Path) -> Self {
        Self {
            fetcher,
            site,
            conn: None,
            assets,
        }
    }

    /// Without a database only images and sidecars are written.
    pub fn with_db(mut self, conn: &'a Connection) -> Self {
        self.conn = Some(conn);
        self
    }

    pub fn run(&self, plan: &ApprovedPlan, quota: usize) -> Vec<CategoryReport> {
        plan.categories
            .iter()
            .map(|category| {
                info!(
                    "Crawling products for {} > {}",
                    category.main_category, category.sub_category
                );
                self.crawl_category(category, quota)
            })
            .collect()
    }

    /// Walk `?page=1, 2, ...` until a page has no articles or `quota`
    /// products have been attempted.
    pub fn crawl_category(&self, category: &CategoryLink, quota: usize) -> CategoryReport {
        let mut report = CategoryReport {
            main_category: category.main_category.clone(),
            sub_category: category.sub_category.clone(),
            pages: 0,
            saved: 0,
            skipped: Vec::new(),
            stop: PaginationStop::QuotaReached,
        };
        if quota == 0 {
            return report;
        }

        let pb = progress_bar(quota);
        let mut page = 1;
        loop {
            let url = self.site.listing_url(&category.url, page);
            info!(
                "Crawling page {} for {} > {}",
                page, category.main_category, category.sub_category
            );

            let html = match self.fetcher.fetch_text(url.as_str()) {
                Ok(html) => html,
                Err(e) => {
                    warn!("Listing page failed, leaving {}: {}", category.sub_category, e);
                    report.stop = PaginationStop::FetchFailed(page);
                    break;
                }
            };
            report.pages += 1;

            let articles = self.site.listing_articles(&Html::parse_document(&html));
            if articles.is_empty() {
                info!("No more products found");
                report.stop = PaginationStop::EmptyPage(page);
                break;
            }

            for product_url in articles.into_iter().flatten() {
                if report.attempted() >= quota {
                    break;
                }
                let Some(product_id) = site::product_id(&product_url) else {
                    warn!("Skipping {}: no product id", product_url);
                    report.skipped.push(Skipped {
                        product: product_url.to_string(),
                        reason: SkipReason::NoProductId(product_url.to_string()),
                    });
                    pb.inc(1);
                    continue;
                };

                match self.crawl_product(Some(category), &product_id, &product_url) {
                    Ok(saved) => {
                        info!(
                            "Metadata and {} images for product {} saved",
                            saved.images, saved.product_id
                        );
                        report.saved += 1;
                    }
                    Err(reason) => {
                        warn!("Failed to extract product {}: {}", product_id, reason);
                        report.skipped.push(Skipped {
                            product: product_id,
                            reason,
                        });
                    }
                }
                pb.inc(1);
            }

            if report.attempted() >= quota {
                report.stop = PaginationStop::QuotaReached;
                break;
            }
            page += 1;
        }

        pb.finish_and_clear();
        report
    }

    /// Fetch one product page, download its images, write the sidecar and,
    /// when it belongs to a category and a database is attached, insert its row.
    ///
    /// Nothing is written if the page itself cannot be fetched. A failure
    /// after that point can leave the folder or sidecar behind without a row.
    pub fn crawl_product(
        &self,
        category: Option<&CategoryLink>,
        product_id: &str,
        url: &Url,
    ) -> Result<SavedProduct, SkipReason> {
        info!("Extracting metadata for product {}", product_id);
        let html = self.fetcher.fetch_text(url.as_str())?;
        let mut page = self.site.product_page(&Html::parse_document(&html));

        let labels = category.map(|c| (c.main_category.as_str(), c.sub_category.as_str()));
        let folder = storage::product_dir(self.assets, labels, product_id);
        fs::create_dir_all(&folder)?;

        let image_urls = std::mem::take(&mut page.image_urls);
        let mut record = ProductMetadata::from_page(product_id, url, labels, page);

        let mut used = HashSet::new();
        for (i, image_url) in image_urls.iter().enumerate() {
            let mut name = storage::image_filename(image_url, product_id, i);
            if !used.insert(name.clone()) {
                name = format!("{}_{}", i, name);
                used.insert(name.clone());
            }
            if let Some(path) = storage::save_image(self.fetcher, image_url.as_str(), &folder, &name) {
                record.images.push(path.display().to_string());
            }
        }

        let json_path = folder.join(format!("{}.json", storage::sanitize_filename(product_id)));
        storage::write_sidecar(&json_path, &record)?;

        if let (Some(c), Some(conn)) = (category, self.conn) {
            db::insert_product(
                conn,
                &ProductRow {
                    main_category: c.main_category.clone(),
                    sub_category: c.sub_category.clone(),
                    title: record.title.clone(),
                    old_price: record.old_price.clone(),
                    new_price: record.price.clone(),
                    description: record.description.clone(),
                    seller_url: record.shop_url.clone(),
                    image_folder: folder.display().to_string(),
                    json_path: json_path.display().to_string(),
                },
            )?;
        }

        Ok(SavedProduct {
            product_id: product_id.to_string(),
            images: record.images.len(),
            folder,
            json_path,
        })
    }
}

fn progress_bar(quota: usize) -> ProgressBar {
    let pb = ProgressBar::new(quota as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")
    {
        pb.set_style(style.progress_chars("=> "));
    }
    pb
}

mod config;
mod crawler;
mod db;
mod fetch;
mod record;
mod site;
mod storage;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::error;

use crate::crawler::{CategoryReport, CrawlPlan, Crawler, PaginationStop};
use crate::fetch::HttpFetcher;
use crate::site::shopino::Shopino;

#[derive(Parser)]
#[command(name = "shop_crawler", about = "Category, listing and product crawler for shopino.app")]
struct Cli {
    /// Settings file with base_url and products_per_subcategory
    #[arg(long, global = true, default_value = "config.yaml")]
    config: PathBuf,
    /// SQLite database file
    #[arg(long, global = true, default_value = "products.db")]
    db: PathBuf,
    /// Root folder for images and sidecar JSON
    #[arg(long, global = true, default_value = "assets")]
    assets: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover categories, confirm them, then crawl every subcategory
    Crawl {
        /// Approve the discovered categories without prompting
        #[arg(short, long)]
        yes: bool,
    },
    /// Discover categories and print them without storing anything
    Discover,
    /// Extract a single product into <assets>/<product_id>/
    Product {
        /// Product page URL (relative URLs resolve against base_url)
        url: String,
        /// Override the id taken from the last URL segment
        #[arg(long)]
        id: Option<String>,
    },
    /// Show stored category and product counts
    Stats,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Crawl { yes } => {
            let settings = config::load(&cli.config)?;
            let fetcher = HttpFetcher::new()?;
            let site = Shopino::new(settings.base_url.clone());

            let plan = match crawler::discover(&fetcher, &site) {
                Ok(plan) => plan,
                Err(e) => {
                    error!("Category discovery failed: {}", e);
                    return Ok(());
                }
            };
            print_plan(&plan);

            if !yes && !confirm("\nIs this information correct? (yes/no): ")? {
                println!("Aborting crawl. Please check the configuration.");
                return Ok(());
            }
            let plan = plan.approve();

            let conn = db::connect(&cli.db)?;
            db::init_schema(&conn)?;
            let added = crawler::persist_plan(&conn, &plan)?;
            println!(
                "Stored {} new of {} categories in {:?}",
                added,
                plan.categories().len(),
                cli.db
            );

            let reports = Crawler::new(&fetcher, &site, &cli.assets)
                .with_db(&conn)
                .run(&plan, settings.products_per_subcategory);
            print_reports(&reports);
            Ok(())
        }
        Commands::Discover => {
            let settings = config::load(&cli.config)?;
            let fetcher = HttpFetcher::new()?;
            let site = Shopino::new(settings.base_url);
            match crawler::discover(&fetcher, &site) {
                Ok(plan) => print_plan(&plan),
                Err(e) => error!("Category discovery failed: {}", e),
            }
            Ok(())
        }
        Commands::Product { url, id } => {
            let settings = config::load(&cli.config)?;
            let url = settings
                .base_url
                .join(&url)
                .with_context(|| format!("Bad product URL {:?}", url))?;
            let Some(product_id) = id.or_else(|| site::product_id(&url)) else {
                anyhow::bail!("No product id in {}; pass --id", url);
            };

            let fetcher = HttpFetcher::new()?;
            let site = Shopino::new(settings.base_url.clone());

            match Crawler::new(&fetcher, &site, &cli.assets).crawl_product(None, &product_id, &url) {
                Ok(saved) => println!(
                    "Saved product {} ({} images) to {:?}, record {:?}",
                    saved.product_id, saved.images, saved.folder, saved.json_path
                ),
                Err(e) => error!("Failed to extract product {}: {}", product_id, e),
            }
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect(&cli.db)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Categories: {}", s.categories);
            println!("Products:   {}", s.products);
            if !s.per_category.is_empty() {
                println!();
                println!("{:<16} | {:<32} | {:>8}", "Main", "Subcategory", "Products");
                println!("{}", "-".repeat(62));
                for c in &s.per_category {
                    println!(
                        "{:<16} | {:<32} | {:>8}",
                        truncate(&c.main_category, 16),
                        truncate(&c.sub_category, 32),
                        c.products
                    );
                }
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn print_plan(plan: &CrawlPlan) {
    println!("\nThe following categories and subcategories were found:");
    for c in plan.categories() {
        println!(
            "Main Category: {}, Subcategory: {}, URL: {}",
            c.main_category, c.sub_category, c.url
        );
    }
}

/// Blocks on one line from stdin. Only an exact "yes" (any case) approves.
fn confirm(prompt: &str) -> io::Result<bool> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(is_yes(&line))
}

fn is_yes(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("yes")
}

fn print_reports(reports: &[CategoryReport]) {
    println!(
        "\n{:<16} | {:<28} | {:>5} | {:>5} | {:>7} | {:<14}",
        "Main", "Subcategory", "Pages", "Saved", "Skipped", "Stopped"
    );
    println!("{}", "-".repeat(90));
    for r in reports {
        println!(
            "{:<16} | {:<28} | {:>5} | {:>5} | {:>7} | {:<14}",
            truncate(&r.main_category, 16),
            truncate(&r.sub_category, 28),
            r.pages,
            r.saved,
            r.skipped.len(),
            describe_stop(r.stop)
        );
    }

    let skipped: Vec<_> = reports.iter().flat_map(|r| &r.skipped).collect();
    if !skipped.is_empty() {
        println!("\n--- Skipped ---");
        for s in &skipped {
            println!("  {}: {}", s.product, s.reason);
        }
    }

    let saved: usize = reports.iter().map(|r| r.saved).sum();
    println!("\n{} products saved, {} skipped.", saved, skipped.len());
}

fn describe_stop(stop: PaginationStop) -> String {
    match stop {
        PaginationStop::EmptyPage(n) => format!("empty page {}", n),
        PaginationStop::QuotaReached => "quota".to_string(),
        PaginationStop::FetchFailed(n) => format!("page {} failed", n),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

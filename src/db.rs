use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;

pub fn connect(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS categories (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            main_category TEXT NOT NULL,
            sub_category  TEXT NOT NULL,
            url           TEXT,
            UNIQUE (main_category, sub_category)
        );

        CREATE TABLE IF NOT EXISTS products (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            main_category TEXT NOT NULL,
            sub_category  TEXT NOT NULL,
            title         TEXT,
            old_price     TEXT,
            new_price     TEXT,
            description   TEXT,
            seller_url    TEXT,
            image_folder  TEXT,
            json_path     TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_products_category ON products(main_category, sub_category);
        ",
    )
}

// ── Categories ──

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRow {
    pub main_category: String,
    pub sub_category: String,
    pub url: String,
}

/// Insert new (main, sub) pairs, ignoring ones already present. Returns how many were added.
pub fn insert_categories(conn: &Connection, rows: &[CategoryRow]) -> rusqlite::Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO categories (main_category, sub_category, url) VALUES (?1, ?2, ?3)",
        )?;
        for r in rows {
            count += stmt.execute(rusqlite::params![r.main_category, r.sub_category, r.url])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

// ── Products ──

pub struct ProductRow {
    pub main_category: String,
    pub sub_category: String,
    pub title: String,
    pub old_price: Option<String>,
    pub new_price: String,
    pub description: String,
    pub seller_url: Option<String>,
    pub image_folder: String,
    pub json_path: String,
}

pub fn insert_product(conn: &Connection, r: &ProductRow) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO products
         (main_category, sub_category, title, old_price, new_price, description,
          seller_url, image_folder, json_path)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        rusqlite::params![
            r.main_category, r.sub_category, r.title, r.old_price, r.new_price,
            r.description, r.seller_url, r.image_folder, r.json_path,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

#[cfg(test)]
pub fn count_products(conn: &Connection, main_category: &str, sub_category: &str) -> rusqlite::Result<usize> {
    conn.query_row(
        "SELECT COUNT(*) FROM products WHERE main_category = ?1 AND sub_category = ?2",
        rusqlite::params![main_category, sub_category],
        |r| r.get(0),
    )
}

// ── Stats ──

pub struct CategoryCount {
    pub main_category: String,
    pub sub_category: String,
    pub products: usize,
}

pub struct Stats {
    pub categories: usize,
    pub products: usize,
    pub per_category: Vec<CategoryCount>,
}

pub fn get_stats(conn: &Connection) -> rusqlite::Result<Stats> {
    let categories: usize = conn.query_row("SELECT COUNT(*) FROM categories", [], |r| r.get(0))?;
    let products: usize = conn.query_row("SELECT COUNT(*) FROM products", [], |r| r.get(0))?;

    let mut stmt = conn.prepare(
        "SELECT c.main_category, c.sub_category, COUNT(p.id)
         FROM categories c
         LEFT JOIN products p
           ON p.main_category = c.main_category AND p.sub_category = c.sub_category
         GROUP BY c.id
         ORDER BY c.id",
    )?;
    let per_category = stmt
        .query_map([], |row| {
            Ok(CategoryCount {
                main_category: row.get(0)?,
                sub_category: row.get(1)?,
                products: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Stats {
        categories,
        products,
        per_category,
    })
}

#[cfg(test)]
pub fn open_test_db() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    init_schema(&conn).unwrap();
    conn
}

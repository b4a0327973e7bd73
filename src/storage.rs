use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::fetch::{FetchError, Fetcher};

const CHUNK_SIZE: usize = 1024;

/// Anything outside word characters, hyphen, space and the Arabic block.
static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\- \x{0600}-\x{06FF}]").unwrap());

pub fn sanitize_filename(name: &str) -> String {
    DISALLOWED.replace_all(name, "_").into_owned()
}

/// `<root>/<main>/<sub>/<product_id>` when categorised, `<root>/<product_id>` otherwise.
pub fn product_dir(root: &Path, categories: Option<(&str, &str)>, product_id: &str) -> PathBuf {
    let mut dir = root.to_path_buf();
    if let Some((main, sub)) = categories {
        dir.push(sanitize_filename(main));
        dir.push(sanitize_filename(sub));
    }
    dir.push(sanitize_filename(product_id));
    dir
}

/// Local filename for the `index`-th image of a product. Keeps the remote
/// basename when there is one.
pub fn image_filename(url: &Url, product_id: &str, index: usize) -> String {
    let basename = url
        .path_segments()
        .and_then(|mut s| s.next_back())
        .filter(|s| !s.is_empty());

    match basename {
        Some(name) => match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
                format!("{}.{}", sanitize_filename(stem), sanitize_filename(ext))
            }
            _ => sanitize_filename(name),
        },
        None if index == 0 => format!("{}.jpg", sanitize_filename(product_id)),
        None => format!("{}_{}.jpg", sanitize_filename(product_id), index),
    }
}

#[derive(Debug, Error)]
enum SaveError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("{path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },
}

/// Download `url` into `folder/filename`. Returns `None` (after logging) when
/// nothing could be written.
pub fn save_image(fetcher: &dyn Fetcher, url: &str, folder: &Path, filename: &str) -> Option<PathBuf> {
    match try_save(fetcher, url, folder, filename) {
        Ok(path) => Some(path),
        Err(e) => {
            warn!("Failed to download image {}: {}", url, e);
            None
        }
    }
}

fn try_save(fetcher: &dyn Fetcher, url: &str, folder: &Path, filename: &str) -> Result<PathBuf, SaveError> {
    let mut body = fetcher.open(url)?;

    let path = folder.join(filename);
    let io_err = |source| SaveError::Io { path: path.clone(), source };

    fs::create_dir_all(folder).map_err(io_err)?;
    let mut out = BufWriter::new(File::create(&path).map_err(io_err)?);
    let mut chunk = [0u8; CHUNK_SIZE];
    loop {
        let n = body.read(&mut chunk).map_err(|source| FetchError::Body {
            url: url.to_string(),
            source,
        })?;
        if n == 0 {
            break;
        }
        out.write_all(&chunk[..n]).map_err(io_err)?;
    }
    out.flush().map_err(io_err)?;
    Ok(path)
}

/// Write `record` as 4-space-indented JSON with non-ASCII left as-is.
pub fn write_sidecar<T: Serialize>(path: &Path, record: &T) -> Result<(), serde_json::Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(serde_json::Error::io)?;
    }
    let file = File::create(path).map_err(serde_json::Error::io)?;
    let mut out = BufWriter::new(file);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    record.serialize(&mut ser)?;
    out.flush().map_err(serde_json::Error::io)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::fixture::FixtureFetcher;

    fn is_allowed(c: char) -> bool {
        c.is_alphanumeric()
            || c == '_'
            || c == '-'
            || c == ' '
            || ('\u{0600}'..='\u{06FF}').contains(&c)
            || regex::Regex::new(r"^\w$").unwrap().is_match(&c.to_string())
    }

    #[test]
    fn sanitize_keeps_persian_and_words() {
        assert_eq!(sanitize_filename("بچه گانه"), "بچه گانه");
        assert_eq!(sanitize_filename("T-Shirt_2"), "T-Shirt_2");
        assert_eq!(sanitize_filename("کفش/صندل"), "کفش_صندل");
        assert_eq!(sanitize_filename("a.b?c*d"), "a_b_c_d");
        assert_eq!(sanitize_filename(".."), "__");
    }

    #[test]
    fn sanitize_is_total_and_idempotent() {
        let inputs = [
            "",
            "../../etc/passwd",
            "مانتو & شلوار (جدید)",
            "tab\there\nnewline",
            "emoji 👗 dress",
            "C:\\Windows\\system32",
            "100% cotton, size: L",
            "«نقل‌قول»",
        ];
        for input in inputs {
            let once = sanitize_filename(input);
            assert!(once.chars().all(is_allowed), "{:?} -> {:?}", input, once);
            assert_eq!(sanitize_filename(&once), once, "not idempotent for {:?}", input);
            assert_eq!(once.chars().count(), input.chars().count());
        }
    }

    #[test]
    fn product_dir_layouts() {
        let root = Path::new("assets");
        assert_eq!(
            product_dir(root, Some(("زنانه", "کیف/کوله")), "1001"),
            PathBuf::from("assets/زنانه/کیف_کوله/1001")
        );
        assert_eq!(product_dir(root, None, "1001"), PathBuf::from("assets/1001"));
    }

    #[test]
    fn image_filename_falls_back_to_product_id() {
        let u = Url::parse("https://cdn.test/img/a%20b.jpg?w=300").unwrap();
        assert_eq!(image_filename(&u, "7", 0), "a_20b.jpg");

        let u = Url::parse("https://cdn.test/img/photo.v2.webp").unwrap();
        assert_eq!(image_filename(&u, "7", 3), "photo_v2.webp");

        let u = Url::parse("https://cdn.test/img/..").unwrap();
        assert_eq!(image_filename(&u, "7", 0), "7.jpg");

        let u = Url::parse("https://cdn.test/img/").unwrap();
        assert_eq!(image_filename(&u, "7", 0), "7.jpg");
        assert_eq!(image_filename(&u, "7", 2), "7_2.jpg");
    }

    #[test]
    fn save_image_streams_body_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let body: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
        let f = FixtureFetcher::new().with("https://cdn.test/a.jpg", body.clone());

        let folder = dir.path().join("nested/deeper");
        let path = save_image(&f, "https://cdn.test/a.jpg", &folder, "a.jpg").unwrap();

        assert_eq!(path, folder.join("a.jpg"));
        assert_eq!(fs::read(&path).unwrap(), body);
    }

    #[test]
    fn save_image_failure_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let f = FixtureFetcher::new();
        let folder = dir.path().join("p");

        assert_eq!(save_image(&f, "https://cdn.test/missing.jpg", &folder, "x.jpg"), None);
        assert!(!folder.join("x.jpg").exists());
    }

    #[test]
    fn sidecar_is_four_space_indented_unescaped_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1/1.json");
        write_sidecar(&path, &serde_json::json!({ "title": "مانتو" })).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "{\n    \"title\": \"مانتو\"\n}");
    }
}

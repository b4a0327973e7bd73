use std::io::Read;

use reqwest::blocking::Client;
use thiserror::Error;
use tracing::debug;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("GET {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("GET {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("reading body of {url} failed: {source}")]
    Body {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

/// Blocking GET access to the target site. Every call runs to completion before returning.
pub trait Fetcher {
    /// Fetch a page and return its body decoded as UTF-8.
    fn fetch_text(&self, url: &str) -> Result<String, FetchError>;

    /// Start a GET and hand back the body as a reader, for streaming downloads.
    fn open(&self, url: &str) -> Result<Box<dyn Read>, FetchError>;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> anyhow::Result<Self> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { client })
    }

    fn get(&self, url: &str) -> Result<reqwest::blocking::Response, FetchError> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().map_err(|e| FetchError::Transport {
            url: url.to_string(),
            source: e,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

impl Fetcher for HttpFetcher {
    fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let bytes = self.get(url)?.bytes().map_err(|e| FetchError::Transport {
            url: url.to_string(),
            source: e,
        })?;
        // Decode as UTF-8 whatever charset the server claims.
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn open(&self, url: &str) -> Result<Box<dyn Read>, FetchError> {
        Ok(Box::new(self.get(url)?))
    }
}

#[cfg(test)]
pub mod fixture {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::io::{Cursor, Read};

    use super::{FetchError, Fetcher};

    /// In-memory site: URL → body. Unknown URLs answer 404. Records every request.
    #[derive(Default)]
    pub struct FixtureFetcher {
        pages: HashMap<String, Vec<u8>>,
        requests: RefCell<Vec<String>>,
    }

    impl FixtureFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
            self.pages.insert(url.to_string(), body.into());
            self
        }

        pub fn requests(&self) -> Vec<String> {
            self.requests.borrow().clone()
        }

        pub fn request_count(&self, url: &str) -> usize {
            self.requests.borrow().iter().filter(|u| *u == url).count()
        }

        fn lookup(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            self.requests.borrow_mut().push(url.to_string());
            self.pages.get(url).cloned().ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
        }
    }

    impl Fetcher for FixtureFetcher {
        fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
            let body = self.lookup(url)?;
            Ok(String::from_utf8_lossy(&body).into_owned())
        }

        fn open(&self, url: &str) -> Result<Box<dyn Read>, FetchError> {
            Ok(Box::new(Cursor::new(self.lookup(url)?)))
        }
    }
}

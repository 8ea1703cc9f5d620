//! Cursor-paginated bucket listing.
//!
//! A listing is a lazy sequence of pages. Each transition is
//! `cursor -> (keys, prefixes, next cursor | end)`; the sequence ends when a
//! page carries no next cursor. Listing state lives only in the iterator.
//!
//! Responses are S3 `ListBucketResult` documents. The next cursor is
//! `NextMarker` when present. S3 omits `NextMarker` when no delimiter is sent,
//! so a truncated page without one continues from its last entry.

use crate::error::DataError;
use crate::retry::RetryableFetcher;
use crate::transport::Request;
use serde::Deserialize;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListBucketResult {
    #[serde(default)]
    is_truncated: Option<bool>,
    #[serde(default)]
    next_marker: Option<String>,
    #[serde(default)]
    contents: Vec<ObjectEntry>,
    #[serde(default)]
    common_prefixes: Vec<PrefixEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ObjectEntry {
    key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PrefixEntry {
    prefix: String,
}

/// One decoded listing page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    /// Object keys (`Contents/Key`).
    pub keys: Vec<String>,
    /// Common prefixes (`CommonPrefixes/Prefix`), only present with a delimiter.
    pub prefixes: Vec<String>,
    pub next_cursor: Option<String>,
}

impl ListingPage {
    pub fn parse(body: &[u8]) -> Result<Self, DataError> {
        let text = std::str::from_utf8(body)
            .map_err(|e| DataError::Parse(format!("listing is not UTF-8: {e}")))?;
        let raw: ListBucketResult = quick_xml::de::from_str(text)
            .map_err(|e| DataError::Parse(format!("listing XML: {e}")))?;

        let keys: Vec<String> = raw.contents.into_iter().map(|c| c.key).collect();
        let prefixes: Vec<String> = raw.common_prefixes.into_iter().map(|p| p.prefix).collect();

        let next_cursor = match raw.next_marker.filter(|m| !m.is_empty()) {
            Some(marker) => Some(marker),
            None if raw.is_truncated == Some(true) => {
                keys.last().into_iter().chain(prefixes.last()).max().cloned()
            }
            None => None,
        };

        Ok(Self {
            keys,
            prefixes,
            next_cursor,
        })
    }
}

/// What to list: endpoint, key prefix, optional delimiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingQuery {
    pub base_url: String,
    pub prefix: String,
    pub delimiter: Option<String>,
    pub max_keys: Option<u32>,
}

impl ListingQuery {
    /// Object listing under `prefix` (no delimiter).
    pub fn objects(base_url: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            prefix: prefix.into(),
            delimiter: None,
            max_keys: Some(1000),
        }
    }

    /// Common-prefix listing one level below `prefix`.
    pub fn common_prefixes(base_url: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            prefix: prefix.into(),
            delimiter: Some("/".into()),
            max_keys: None,
        }
    }

    pub fn request(&self, cursor: Option<&str>) -> Request {
        let mut req = Request::get(&self.base_url).param("prefix", &self.prefix);
        if let Some(ref d) = self.delimiter {
            req = req.param("delimiter", d);
        }
        if let Some(n) = self.max_keys {
            req = req.param("max-keys", n.to_string());
        }
        if let Some(c) = cursor {
            req = req.param("marker", c);
        }
        req
    }
}

/// Lazy page sequence over a listing. Yields an `Err` at most once, then ends.
pub struct ListingPages<'a> {
    fetcher: &'a RetryableFetcher,
    query: ListingQuery,
    cursor: Option<String>,
    pending_error: Option<DataError>,
    done: bool,
}

impl<'a> ListingPages<'a> {
    pub fn new(fetcher: &'a RetryableFetcher, query: ListingQuery) -> Self {
        Self::resume(fetcher, query, None)
    }

    /// Restart a listing from a previously returned cursor.
    pub fn resume(fetcher: &'a RetryableFetcher, query: ListingQuery, cursor: Option<String>) -> Self {
        Self {
            fetcher,
            query,
            cursor,
            pending_error: None,
            done: false,
        }
    }

    /// Cursor the next request will carry.
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }
}

impl Iterator for ListingPages<'_> {
    type Item = Result<ListingPage, DataError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(e) = self.pending_error.take() {
            self.done = true;
            return Some(Err(e));
        }
        if self.done {
            return None;
        }

        let request = self.query.request(self.cursor.as_deref());
        let page = match self
            .fetcher
            .fetch(&request)
            .and_then(|body| ListingPage::parse(&body))
        {
            Ok(page) => page,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };

        debug!(
            prefix = %self.query.prefix,
            keys = page.keys.len(),
            prefixes = page.prefixes.len(),
            more = page.next_cursor.is_some(),
            "listing page"
        );

        match page.next_cursor {
            Some(ref next) if self.cursor.as_deref() == Some(next.as_str()) => {
                warn!(prefix = %self.query.prefix, cursor = %next, "listing cursor did not advance");
                self.pending_error = Some(DataError::Parse(format!(
                    "listing cursor did not advance past '{next}'"
                )));
            }
            Some(ref next) => self.cursor = Some(next.clone()),
            None => self.done = true,
        }

        Some(Ok(page))
    }
}

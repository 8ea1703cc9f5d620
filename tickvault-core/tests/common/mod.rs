//! Offline fixtures shared by the integration tests: a routed mock transport,
//! S3-style listing documents and in-memory zip archives.

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};
use tickvault_core::error::DataError;
use tickvault_core::retry::{RetryPolicy, RetryableFetcher};
use tickvault_core::transport::{Request, Transport};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

type Route = Box<dyn Fn(&Request) -> Option<Result<Vec<u8>, DataError>> + Send + Sync>;

/// Answers each request with the first matching route; unmatched requests
/// are 404s. Every request is recorded.
#[derive(Default)]
pub struct MockTransport {
    routes: Vec<Route>,
    log: Mutex<Vec<Request>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route<F>(mut self, f: F) -> Self
    where
        F: Fn(&Request) -> Option<Result<Vec<u8>, DataError>> + Send + Sync + 'static,
    {
        self.routes.push(Box::new(f));
        self
    }

    /// Serve `body` for every request to exactly `url`.
    pub fn serve(self, url: &str, body: Vec<u8>) -> Self {
        let url = url.to_string();
        self.route(move |req| (req.url == url).then(|| Ok(body.clone())))
    }

    pub fn requests(&self) -> Vec<Request> {
        self.log.lock().unwrap().clone()
    }

    pub fn count_for(&self, url: &str) -> usize {
        self.log.lock().unwrap().iter().filter(|r| r.url == url).count()
    }
}

impl Transport for MockTransport {
    fn get(&self, request: &Request) -> Result<Vec<u8>, DataError> {
        self.log.lock().unwrap().push(request.clone());
        self.routes
            .iter()
            .find_map(|route| route(request))
            .unwrap_or_else(|| Err(DataError::NotFound(request.url.clone())))
    }
}

pub fn fetcher(transport: &Arc<MockTransport>) -> RetryableFetcher {
    fetcher_with_retries(transport, 0)
}

pub fn fetcher_with_retries(transport: &Arc<MockTransport>, retries: u32) -> RetryableFetcher {
    RetryableFetcher::new(transport.clone(), RetryPolicy::immediate(retries))
}

/// A `ListBucketResult` page with object keys, common prefixes and an
/// optional `NextMarker`.
pub fn listing_xml(keys: &[&str], prefixes: &[&str], next_marker: Option<&str>) -> Vec<u8> {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?><ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/"><Name>data.binance.vision</Name>"#,
    );
    xml.push_str(&format!(
        "<IsTruncated>{}</IsTruncated>",
        next_marker.is_some()
    ));
    if let Some(marker) = next_marker {
        xml.push_str(&format!("<NextMarker>{marker}</NextMarker>"));
    }
    for key in keys {
        xml.push_str(&format!(
            "<Contents><Key>{key}</Key><Size>1024</Size></Contents>"
        ));
    }
    for prefix in prefixes {
        xml.push_str(&format!(
            "<CommonPrefixes><Prefix>{prefix}</Prefix></CommonPrefixes>"
        ));
    }
    xml.push_str("</ListBucketResult>");
    xml.into_bytes()
}

pub fn zip_bytes(members: &[(&str, &str)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in members {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(body.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// One kline row with a 13-digit open time.
pub fn kline_row(open_time_ms: u64) -> String {
    format!(
        "{open_time_ms},42000.1,42100.0,41900.5,42050.2,12.5,{},525000.0,321,6.2,260000.0,0\n",
        open_time_ms + 59_999
    )
}

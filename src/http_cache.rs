use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, anyhow};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{ETAG, HeaderName, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};

#[derive(Debug, Clone)]
struct CacheEntry {
    body: String,
    etag: Option<String>,
    last_modified: Option<String>,
    fetched_at: u64,
}

/// Conditional GETs keyed by URL. A 304 answers with the remembered body, so
/// polling an unchanged endpoint costs the backend almost nothing.
#[derive(Debug, Default)]
pub struct ConditionalCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl ConditionalCache {
    pub fn fetch(&self, client: &Client, url: &str) -> Result<String> {
        let cached = self.get(url);

        let mut req = client.get(url);
        if let Some(entry) = cached.as_ref() {
            if let Some(etag) = entry.etag.as_ref() {
                req = req.header(IF_NONE_MATCH, etag);
            }
            if let Some(last_modified) = entry.last_modified.as_ref() {
                req = req.header(IF_MODIFIED_SINCE, last_modified);
            }
        }

        let resp = req.send().context("request failed")?;
        let status = resp.status();
        let headers = resp.headers().clone();
        if status == StatusCode::NOT_MODIFIED {
            let Some(mut entry) = cached else {
                return Err(anyhow!("received 304 without cache body"));
            };
            entry.fetched_at = now_secs();
            let body = entry.body.clone();
            self.put(url, entry);
            return Ok(body);
        }

        let body = resp.text().context("failed reading body")?;
        if !status.is_success() {
            return Err(anyhow!("http {status}: {body}"));
        }

        let header = |name: HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_string())
        };
        self.put(
            url,
            CacheEntry {
                body: body.clone(),
                etag: header(ETAG),
                last_modified: header(LAST_MODIFIED),
                fetched_at: now_secs(),
            },
        );
        Ok(body)
    }

    /// Seconds since the epoch at which `url` was last confirmed fresh.
    pub fn fetched_at(&self, url: &str) -> Option<u64> {
        self.get(url).map(|e| e.fetched_at)
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .expect("http cache lock poisoned")
            .clear();
    }

    fn get(&self, url: &str) -> Option<CacheEntry> {
        self.entries
            .lock()
            .expect("http cache lock poisoned")
            .get(url)
            .cloned()
    }

    fn put(&self, url: &str, entry: CacheEntry) {
        self.entries
            .lock()
            .expect("http cache lock poisoned")
            .insert(url.to_string(), entry);
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

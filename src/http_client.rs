use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};

const CONNECT_TIMEOUT_SECS: u64 = 4;
const REQUEST_TIMEOUT_SECS: u64 = 10;
const USER_AGENT: &str = concat!("kickoff_pool/", env!("CARGO_PKG_VERSION"));

static BACKEND_CLIENT: OnceCell<Client> = OnceCell::new();

/// Shared client for the pool backend. A live refresh must give up well inside one poll period.
pub fn http_client() -> Result<&'static Client> {
    BACKEND_CLIENT.get_or_try_init(build_backend_client)
}

fn build_backend_client() -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    Client::builder()
        .default_headers(headers)
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .user_agent(USER_AGENT)
        .build()
        .context("failed to build pool backend client")
}

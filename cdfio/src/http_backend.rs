//! HTTP access to remote CDF files
//!
//! The whole object is fetched once into memory and opened from there;
//! block reads after that never touch the network. Only available when the
//! "http" feature is enabled.

use crate::backend::Source;
use crate::file::{CdfFile, OpenOptions};
use crate::Result;
use reqwest::Client;

/// Fetch `url` and open it with default options
pub async fn open_url(url: &str) -> Result<CdfFile> {
    open_url_with(&Client::new(), url, &OpenOptions::default()).await
}

/// Fetch `url` with a caller-provided client
pub async fn open_url_with(client: &Client, url: &str, options: &OpenOptions) -> Result<CdfFile> {
    let bytes = fetch(client, url).await?;
    tracing::debug!(url, bytes = bytes.len(), "fetched remote CDF file");
    CdfFile::from_source(Source::Memory(bytes), options)
}

async fn fetch(client: &Client, url: &str) -> Result<Vec<u8>> {
    let response = client.get(url).send().await?.error_for_status()?;
    Ok(response.bytes().await?.to_vec())
}

/// Blocking variant of [`open_url`] for callers without a runtime
pub fn open_url_blocking(url: &str) -> Result<CdfFile> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(open_url(url))
}

//! Query-time PDF excerpt extraction.
//!
//! Given a stored document URL and a page number, fetches the PDF and
//! returns that page's text so the chat layer can quote precedents exactly.
//! This path is lazy and never part of ingestion. Out-of-range pages yield
//! an empty string with a logged warning rather than an error; callers
//! treat the empty string as "no excerpt available".

use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::error::{Error, Result};
use crate::object_store::{ObjectStoreClient, S3Location};
use crate::pdf;

/// Reads judgment pages back out of the object store at query time.
pub struct ExcerptReader {
    store: Option<Arc<ObjectStoreClient>>,
    client: reqwest::Client,
}

impl ExcerptReader {
    /// `store` carries signed-request credentials; without it, PDFs are
    /// fetched through the public HTTPS form of the URL.
    pub fn new(store: Option<Arc<ObjectStoreClient>>, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(60))
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self { store, client }
    }

    /// Extract the text of one page (1-indexed). Returns an empty string
    /// when the page is out of range.
    pub async fn extract_page_content(&self, url: &str, page_number: usize) -> Result<String> {
        let pages = self.fetch_pages(url).await?;

        if page_number == 0 || page_number > pages.len() {
            warn!(
                url,
                page_number,
                total_pages = pages.len(),
                "requested page out of range"
            );
            return Ok(String::new());
        }

        Ok(pages[page_number - 1].clone())
    }

    /// Extract up to `max_pages` pages, separated by page marker lines.
    pub async fn extract_full_content(&self, url: &str, max_pages: usize) -> Result<String> {
        let pages = self.fetch_pages(url).await?;

        let parts: Vec<String> = pages
            .iter()
            .take(max_pages)
            .enumerate()
            .filter(|(_, text)| !text.trim().is_empty())
            .map(|(i, text)| format!("--- Page {} ---\n{}", i + 1, text))
            .collect();

        Ok(parts.join("\n\n"))
    }

    async fn fetch_pages(&self, url: &str) -> Result<Vec<String>> {
        let bytes = self.download(url).await?;
        pdf::extract_pages(&bytes)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        if let Some(ref store) = self.store {
            return store.download_url(url).await;
        }

        let https = S3Location::parse(url)?.to_https_url();
        let resp = self
            .client
            .get(&https)
            .send()
            .await
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(Error::StorageUnavailable(format!(
                "GET {} failed (HTTP {})",
                https,
                resp.status()
            )));
        }
        Ok(resp.bytes().await.map_err(Error::from)?.to_vec())
    }
}

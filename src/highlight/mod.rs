//! highlight.js language assets
//!
//! Language files live at `<static>/hljs/languages/<lang>.min.js`. Missing ones
//! can be downloaded from a CDN; downloads are best-effort and a language
//! without a local file is simply not offered to pages.

use anyhow::Result;
use arc_swap::ArcSwap;
use reqwest::Client;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Tracks which configured highlight.js languages have local assets
pub struct HighlightAssets {
    dir: PathBuf,
    languages: Vec<String>,
    available: ArcSwap<BTreeSet<String>>,
}

impl HighlightAssets {
    /// Scan `<static_dir>/hljs/languages` for the configured languages
    pub fn new<P: AsRef<Path>>(static_dir: P, languages: &[String]) -> Self {
        let languages = languages
            .iter()
            .map(|l| l.trim().to_lowercase())
            .filter(|l| is_valid_language(l))
            .collect();
        let assets = Self {
            dir: static_dir.as_ref().join("hljs").join("languages"),
            languages,
            available: ArcSwap::from_pointee(BTreeSet::new()),
        };
        assets.refresh();
        assets
    }

    pub fn asset_path(&self, language: &str) -> PathBuf {
        self.dir.join(format!("{}.min.js", language))
    }

    /// Re-check which languages have a local file
    pub fn refresh(&self) {
        let found: BTreeSet<String> = self
            .languages
            .iter()
            .filter(|l| self.asset_path(l).is_file())
            .cloned()
            .collect();
        tracing::debug!("highlight.js languages available: {:?}", found);
        self.available.store(Arc::new(found));
    }

    /// Configured languages without a local file
    pub fn missing(&self) -> Vec<String> {
        let available = self.available.load();
        self.languages
            .iter()
            .filter(|l| !available.contains(*l))
            .cloned()
            .collect()
    }

    /// Languages with a local asset, sorted
    pub fn available(&self) -> Vec<String> {
        self.available.load().iter().cloned().collect()
    }

    /// Keep the languages of `wanted` that have a local asset, in order
    pub fn filter(&self, wanted: &[String]) -> Vec<String> {
        let available = self.available.load();
        wanted
            .iter()
            .filter(|l| available.contains(*l))
            .cloned()
            .collect()
    }

    /// Download missing language files from `cdn`. Individual failures are
    /// logged and skipped. Returns the number of files fetched.
    pub async fn fetch_missing(&self, cdn: &str) -> Result<usize> {
        let missing = self.missing();
        if missing.is_empty() {
            return Ok(0);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("amiablog/", env!("CARGO_PKG_VERSION")))
            .build()?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let cdn = cdn.trim_end_matches('/');
        let mut fetched = 0;
        for language in &missing {
            let url = format!("{}/{}.min.js", cdn, language);
            match download(&client, &url).await {
                Ok(body) => {
                    tokio::fs::write(self.asset_path(language), body).await?;
                    tracing::info!("Fetched highlight.js language: {}", language);
                    fetched += 1;
                }
                Err(e) => {
                    tracing::warn!("Failed to fetch highlight.js language {}: {}", language, e);
                }
            }
        }

        self.refresh();
        Ok(fetched)
    }
}

async fn download(client: &Client, url: &str) -> Result<Vec<u8>> {
    let response = client.get(url).send().await?.error_for_status()?;
    Ok(response.bytes().await?.to_vec())
}

/// Language names become file names
fn is_valid_language(language: &str) -> bool {
    !language.is_empty()
        && language
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

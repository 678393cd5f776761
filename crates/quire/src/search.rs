use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::error::{IoContext, Result};
use crate::site::Site;

/// One search hit: `k` is the post title, `v` its absolute URL.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct SearchEntry {
    pub k: String,
    pub v: String,
}

pub fn search_entries(site: &Site) -> Vec<SearchEntry> {
    site.posts
        .iter()
        .map(|post| SearchEntry {
            k: post.title.clone(),
            v: format!("{}{}", site.config.base_url, post.permalink),
        })
        .collect()
}

/// Writes `search.json`. Nothing is written for a site without posts.
pub fn generate_search_index(site: &Site, output_dir: &Path) -> Result<()> {
    if site.posts.is_empty() {
        return Ok(());
    }

    let json = serde_json::to_string(&search_entries(site))?;
    let path = output_dir.join("search.json");
    fs::write(&path, json).io_context("writing", &path)?;

    Ok(())
}

use std::fs;
use std::time::{Duration, Instant};

use tracing::info;

use crate::assets::copy_static;
use crate::config::SiteConfig;
use crate::error::{IoContext, Result};
use crate::feeds::generate_rss;
use crate::search::generate_search_index;
use crate::site::SiteBuilder;
use crate::sitemap::{generate_robots, generate_sitemap};
use crate::theme::ThemeEngine;

/// What one build produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub posts: usize,
    pub tags: usize,
    pub categories: usize,
    pub pages: usize,
    pub static_files: usize,
    pub elapsed: Duration,
}

/// Runs the whole pipeline once: scan, render pages, then feeds and static
/// files. Failing to create the build directory, to load the layouts or to
/// write an ancillary file aborts the build; everything else is logged and
/// skipped.
pub fn build(config: &SiteConfig) -> Result<BuildReport> {
    let start = Instant::now();
    let output_dir = &config.build_dir;

    fs::create_dir_all(output_dir).io_context("creating build directory", output_dir)?;
    info!("Building site into {}", output_dir.display());

    let site = SiteBuilder::new(config).build()?;
    let engine = ThemeEngine::new(config)?;
    let pages = engine.render_site(&site, output_dir)?;

    generate_rss(&site, output_dir)?;
    generate_sitemap(&site, output_dir)?;
    generate_search_index(&site, output_dir)?;
    generate_robots(&site, output_dir)?;

    let static_files = copy_static(&config.static_dir(), output_dir);

    let report = BuildReport {
        posts: site.posts.len(),
        tags: site.tags.len(),
        categories: site.categories.len(),
        pages,
        static_files,
        elapsed: start.elapsed(),
    };
    info!(
        "Built {} posts, {} pages in {:.2?}",
        report.posts, report.pages, report.elapsed
    );

    Ok(report)
}

use crate::error::{IoContext, Result};
use crate::site::Site;
use crate::xml::escape;
use std::fs;
use std::path::Path;

/// Date layout shared by the feed and the sitemap: local wall time, no zone.
pub const FEED_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Writes `rss.xml` for every published post, newest first. Nothing is
/// written for a site without posts.
pub fn generate_rss(site: &Site, output_dir: &Path) -> Result<()> {
    if site.posts.is_empty() {
        return Ok(());
    }

    let base_url = &site.config.base_url;

    let mut items = String::new();
    for post in &site.posts {
        items.push_str(&format!(
            r#"    <item>
      <title>{}</title>
      <link>{}</link>
      <description>{}</description>
      <pubDate>{}</pubDate>
    </item>
"#,
            escape(&post.title),
            escape(&format!("{}{}", base_url, post.permalink)),
            escape(&post.summary_clean),
            post.date.format(FEED_DATE_FORMAT)
        ));
    }

    let rss = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>{}</title>
    <link>{}</link>
    <description>{}</description>
{}  </channel>
</rss>
"#,
        escape(&site.config.title),
        escape(base_url),
        escape(&site.config.description),
        items
    );

    let path = output_dir.join("rss.xml");
    fs::write(&path, rss).io_context("writing", &path)?;

    Ok(())
}

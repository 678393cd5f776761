use crate::error::{IoContext, Result};
use crate::feeds::FEED_DATE_FORMAT;
use crate::site::Site;
use crate::xml::escape;
use std::fs;
use std::path::Path;

/// Writes `sitemap.xml` with one `<url>` per published post. Nothing is
/// written for a site without posts.
pub fn generate_sitemap(site: &Site, output_dir: &Path) -> Result<()> {
    if site.posts.is_empty() {
        return Ok(());
    }

    let mut urls = String::new();
    for post in &site.posts {
        urls.push_str(&format!(
            "  <url>\n    <loc>{}</loc>\n    <lastmod>{}</lastmod>\n  </url>\n",
            escape(&format!("{}{}", site.config.base_url, post.permalink)),
            post.date.format(FEED_DATE_FORMAT)
        ));
    }

    let sitemap = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
{}</urlset>
"#,
        urls
    );

    let path = output_dir.join("sitemap.xml");
    fs::write(&path, sitemap).io_context("writing", &path)?;

    Ok(())
}

pub fn generate_robots(site: &Site, output_dir: &Path) -> Result<()> {
    let robots = format!(
        "User-agent: *\nDisallow:\n\nSitemap: {}/sitemap.xml",
        site.config.base_url
    );

    let path = output_dir.join("robots.txt");
    fs::write(&path, robots).io_context("writing", &path)?;

    Ok(())
}

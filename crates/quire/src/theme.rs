//! Template loading and the page render driver.
//!
//! Layout fragments under `<source_dir>/layouts` are loaded once into a base
//! engine as `layouts/<file>`. Every top-level template (`index.html`,
//! `detail.html`, ...) is compiled on first use against a clone of that base,
//! so a broken template only takes down the pages that use it.

use crate::config::SiteConfig;
use crate::error::{IoContext, QuireError, Result};
use crate::helpers::register_helpers;
use crate::pagination::{Axis, divide_posts};
use crate::site::Site;
use crate::types::{Post, Tag};
use chrono::{Datelike, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tera::{Context, Tera, Value};
use tracing::{debug, info, warn};

pub const INDEX_TEMPLATE: &str = "index.html";
pub const DETAIL_TEMPLATE: &str = "detail.html";
pub const TAG_INDEX_TEMPLATE: &str = "tags.html";
pub const TAG_TEMPLATE: &str = "tag.html";
pub const CATEGORY_TEMPLATE: &str = "posts.html";

const LAYOUTS_PREFIX: &str = "layouts";

pub struct ThemeEngine {
    base: Tera,
    source_dir: PathBuf,
}

impl ThemeEngine {
    /// Loads every layout and registers the helper vocabulary. A layout that
    /// fails to parse fails the whole build.
    pub fn new(config: &SiteConfig) -> Result<Self> {
        let mut base = Tera::default();
        register_helpers(&mut base, &config.post_types);

        let layouts = layout_files(&config.layouts_dir())?;
        debug!("Loading {} layouts", layouts.len());
        base.add_template_files(layouts)?;

        Ok(Self {
            base,
            source_dir: config.source_dir.clone(),
        })
    }

    /// A copy of the base engine with `<source_dir>/<name>` added as `name`.
    pub fn compile(&self, name: &str) -> Result<Tera> {
        let path = self.source_dir.join(name);
        if !path.is_file() {
            return Err(QuireError::TemplateNotFound {
                name: name.to_string(),
            });
        }

        let mut tera = self.base.clone();
        tera.add_template_file(&path, Some(name))?;
        Ok(tera)
    }

    /// Renders every HTML page of `site` into `output_dir`. Pages that fail
    /// are logged and skipped. Returns the number of pages written.
    pub fn render_site(&self, site: &Site, output_dir: &Path) -> Result<usize> {
        let mut pass = RenderPass::new(self, site, output_dir)?;

        pass.render_standalone_pages();
        pass.render_home();
        pass.render_details();
        pass.render_tag_index();
        pass.render_tag_pages();
        pass.render_categories();

        info!("Rendered {} pages", pass.written);
        Ok(pass.written)
    }
}

fn layout_files(layouts_dir: &Path) -> Result<Vec<(PathBuf, Option<String>)>> {
    if !layouts_dir.is_dir() {
        debug!("No layouts directory at {}", layouts_dir.display());
        return Ok(Vec::new());
    }

    let mut layouts = Vec::new();
    for entry in fs::read_dir(layouts_dir).io_context("reading", layouts_dir)? {
        let path = entry.io_context("reading", layouts_dir)?.path();
        if path.is_file()
            && path.extension().is_some_and(|extension| extension == "html")
            && let Some(file_name) = path.file_name()
        {
            let name = format!("{}/{}", LAYOUTS_PREFIX, file_name.to_string_lossy());
            layouts.push((path, Some(name)));
        }
    }
    layouts.sort();
    Ok(layouts)
}

/// The `site` value every page sees.
#[derive(Serialize)]
struct SiteContext<'a> {
    base_url: &'a str,
    title: &'a str,
    name: &'a str,
    description: &'a str,
    keywords: &'a str,
    now_year: String,
    timestamp: i64,
    posts: &'a [Post],
    tags: &'a [&'a Tag],
}

/// The `tag` value on a per-tag page: the tag plus every post carrying it,
/// regardless of which page is being rendered.
#[derive(Serialize)]
struct TagContext<'a> {
    #[serde(flatten)]
    tag: &'a Tag,
    posts: &'a [&'a Post],
}

struct RenderPass<'a> {
    engine: &'a ThemeEngine,
    site: &'a Site,
    output_dir: &'a Path,
    site_value: Value,
    sorted_tags: Vec<&'a Tag>,
    templates: HashMap<String, Option<Tera>>,
    written: usize,
}

impl<'a> RenderPass<'a> {
    fn new(engine: &'a ThemeEngine, site: &'a Site, output_dir: &'a Path) -> Result<Self> {
        let sorted_tags = site.sorted_tags();
        let now = Utc::now();
        let site_value = tera::to_value(SiteContext {
            base_url: &site.config.base_url,
            title: &site.config.title,
            name: &site.config.name,
            description: &site.config.description,
            keywords: &site.config.keywords,
            now_year: format!("{:04}", now.year()),
            timestamp: now.timestamp(),
            posts: &site.posts,
            tags: &sorted_tags,
        })?;

        Ok(Self {
            engine,
            site,
            output_dir,
            site_value,
            sorted_tags,
            templates: HashMap::new(),
            written: 0,
        })
    }

    fn render_standalone_pages(&mut self) {
        let site = self.site;
        for name in &site.config.pages {
            let relative = Path::new(name);
            if !is_plain_relative(relative) {
                warn!("Skipping page {name}: not a plain path inside the build directory");
                continue;
            }
            self.write_page(name, relative, Context::new());
        }
    }

    fn render_home(&mut self) {
        let site = self.site;
        let pages = divide_posts(&site.posts, site.config.per_page_index, Axis::All);

        if pages.is_empty() {
            let mut context = Context::new();
            context.insert("posts", &Vec::<&Post>::new());
            context.insert("is_home", &true);
            context.insert("current_page", &0);
            context.insert("total_pages", &0);
            self.write_page(INDEX_TEMPLATE, Path::new("index.html"), context);
            return;
        }

        let total_pages = pages.len();
        for (index, posts) in pages.iter().enumerate() {
            let current_page = index + 1;
            let mut context = Context::new();
            context.insert("posts", posts);
            context.insert("is_home", &true);
            context.insert("current_page", &current_page);
            context.insert("total_pages", &total_pages);

            let file_name = if current_page == 1 {
                "index.html".to_string()
            } else {
                format!("{current_page}.html")
            };
            self.write_page(INDEX_TEMPLATE, Path::new(&file_name), context);
        }
    }

    fn render_details(&mut self) {
        let site = self.site;
        for post in &site.posts {
            let mut context = Context::new();
            context.insert("post", post);
            context.insert("is_singular", &true);
            context.insert("tags", &self.sorted_tags);
            self.write_page(DETAIL_TEMPLATE, &post.output_path(), context);
        }
    }

    fn render_tag_index(&mut self) {
        if self.sorted_tags.is_empty() {
            return;
        }

        let mut context = Context::new();
        context.insert("tags", &self.sorted_tags);
        self.write_page(TAG_INDEX_TEMPLATE, Path::new("tags/index.html"), context);
    }

    fn render_tag_pages(&mut self) {
        let site = self.site;
        let tags = self.sorted_tags.clone();
        for tag in tags {
            let tagged = site.posts_tagged(&tag.name);
            let tag_context = TagContext { tag, posts: &tagged };
            let pages = divide_posts(tagged.iter().copied(), site.config.per_page_tag, Axis::All);
            let total_pages = pages.len();

            for (index, posts) in pages.iter().enumerate() {
                let current_page = index + 1;
                let mut context = Context::new();
                context.insert("tag_posts", posts);
                context.insert("is_archive", &true);
                context.insert("current_page", &current_page);
                context.insert("tag", &tag_context);
                context.insert("post_types", &site.categories);
                context.insert("tags", &self.sorted_tags);
                context.insert("total_pages", &total_pages);

                let output = if current_page == 1 {
                    PathBuf::from("tags").join(format!("{}.html", tag.slug))
                } else {
                    PathBuf::from("tags")
                        .join(current_page.to_string())
                        .join(format!("{}.html", tag.slug))
                };
                self.write_page(TAG_TEMPLATE, &output, context);
            }
        }
    }

    fn render_categories(&mut self) {
        let site = self.site;
        let per_page = site.config.per_page_category;

        for category in &site.categories {
            if category.is_empty() {
                debug!("Posts at the content root get no category archive");
                continue;
            }

            let pages = divide_posts(&site.posts, per_page, Axis::Category(category));
            let total_pages = pages.len();

            for (index, posts) in pages.iter().enumerate() {
                let current_page = index + 1;
                let mut context = Context::new();
                context.insert("posts", posts);
                context.insert("post_type", category);
                context.insert("post_types", &site.categories);
                context.insert("tags", &self.sorted_tags);
                context.insert("per_page", &per_page);
                context.insert("current_page", &current_page);
                context.insert("total_pages", &total_pages);

                let output = if current_page == 1 {
                    PathBuf::from(category).join("index.html")
                } else {
                    PathBuf::from(category)
                        .join("page")
                        .join(format!("{current_page}.html"))
                };
                self.write_page(CATEGORY_TEMPLATE, &output, context);
            }
        }
    }

    fn template(&mut self, name: &str) -> Option<&Tera> {
        if !self.templates.contains_key(name) {
            let compiled = match self.engine.compile(name) {
                Ok(tera) => Some(tera),
                Err(error) => {
                    warn!("Template {name} unavailable: {error}");
                    None
                }
            };
            self.templates.insert(name.to_string(), compiled);
        }
        self.templates.get(name).and_then(Option::as_ref)
    }

    /// Renders `template` with `context` plus `site` into `relative` under
    /// the output directory. Failures are logged and the page is skipped.
    fn write_page(&mut self, template: &str, relative: &Path, mut context: Context) {
        context.insert("site", &self.site_value);
        let output_path = self.output_dir.join(relative);

        let Some(tera) = self.template(template) else {
            return;
        };
        let rendered = match tera.render(template, &context) {
            Ok(rendered) => rendered,
            Err(error) => {
                warn!(
                    "Skipping {}: {}",
                    relative.display(),
                    render_error_chain(&error)
                );
                return;
            }
        };

        match write_file(&output_path, &rendered) {
            Ok(()) => {
                debug!("Wrote {}", relative.display());
                self.written += 1;
            }
            Err(error) => warn!("Skipping {}: {error}", relative.display()),
        }
    }
}

fn is_plain_relative(path: &Path) -> bool {
    !path.as_os_str().is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).io_context("creating", parent)?;
    }
    fs::write(path, content).io_context("writing", path)
}

/// Tera keeps the useful part of a render failure in the source chain.
fn render_error_chain(error: &tera::Error) -> String {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = std::error::Error::source(cause);
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_theme(templates: &[(&str, &str)]) -> (TempDir, SiteConfig) {
        let dir = TempDir::new().unwrap();
        let mut config =
            SiteConfig::from_yaml("baseURL: https://example.com\ntitle: Test\n", Path::new("site.yml"))
                .unwrap();
        config.source_dir = dir.path().join("theme");
        config.build_dir = dir.path().join("build");
        fs::create_dir_all(config.layouts_dir()).unwrap();
        for (name, body) in templates {
            let path = config.source_dir.join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, body).unwrap();
        }
        (dir, config)
    }

    fn read(config: &SiteConfig, relative: &str) -> String {
        fs::read_to_string(config.build_dir.join(relative)).unwrap()
    }

    fn tagged(slug: &str, post_type: &str, date: &str, tags: &[&str]) -> Post {
        let mut post = Post::sample(slug, post_type, date);
        post.tags = tags.iter().map(|tag| tag.to_string()).collect();
        post
    }

    #[test]
    fn test_layouts_are_prefixed() {
        let (_dir, config) = create_theme(&[
            ("layouts/base.html", "<title>{{ site.title }}</title>{% block body %}{% endblock %}"),
            ("index.html", "{% extends \"layouts/base.html\" %}{% block body %}home{% endblock %}"),
        ]);
        let engine = ThemeEngine::new(&config).unwrap();
        let site = Site::sample(Vec::new());

        engine.render_site(&site, &config.build_dir).unwrap();
        assert_eq!(read(&config, "index.html"), "<title>Test Blog</title>home");
    }

    #[test]
    fn test_broken_layout_is_fatal() {
        let (_dir, config) = create_theme(&[("layouts/base.html", "{% block body %}")]);
        assert!(ThemeEngine::new(&config).is_err());
    }

    #[test]
    fn test_compile_missing_template() {
        let (_dir, config) = create_theme(&[]);
        let engine = ThemeEngine::new(&config).unwrap();
        assert!(matches!(
            engine.compile("detail.html"),
            Err(QuireError::TemplateNotFound { .. })
        ));
    }

    #[test]
    fn test_broken_template_skips_only_its_pages() {
        let (_dir, config) = create_theme(&[
            ("index.html", "{% for post in posts %}{{ post.slug }}{% endfor %}"),
            ("detail.html", "{{ post.title "),
        ]);
        let engine = ThemeEngine::new(&config).unwrap();
        let site = Site::sample(vec![Post::sample("hello", "blog", "2024-01-01")]);

        let written = engine.render_site(&site, &config.build_dir).unwrap();
        assert_eq!(written, 1);
        assert_eq!(read(&config, "index.html"), "hello");
        assert!(!config.build_dir.join("blog/hello.html").exists());
    }

    #[test]
    fn test_standalone_pages() {
        let (_dir, mut config) = create_theme(&[
            ("about.html", "about {{ site.base_url | safe }}"),
            ("index.html", ""),
        ]);
        config.pages = vec!["about.html".to_string(), "missing.html".to_string()];
        let engine = ThemeEngine::new(&config).unwrap();
        let mut site = Site::sample(Vec::new());
        site.config = config.clone();

        engine.render_site(&site, &config.build_dir).unwrap();
        assert_eq!(read(&config, "about.html"), "about https://example.com");
        assert!(!config.build_dir.join("missing.html").exists());
    }

    #[test]
    fn test_standalone_pages_stay_inside_build_dir() {
        let (dir, mut config) = create_theme(&[("nested/page.html", "nested")]);
        config.build_dir = dir.path().join("site/build");
        let absolute = dir.path().join("absolute.html");
        fs::write(dir.path().join("theme/../parent.html"), "{{ 1 + 1 }}").unwrap();
        fs::write(&absolute, "{{ 1 + 1 }}").unwrap();
        config.pages = vec![
            "../parent.html".to_string(),
            absolute.to_string_lossy().to_string(),
            "nested/page.html".to_string(),
        ];
        let engine = ThemeEngine::new(&config).unwrap();
        let mut site = Site::sample(Vec::new());
        site.config = config.clone();

        let written = engine.render_site(&site, &config.build_dir).unwrap();
        assert_eq!(written, 1);
        assert_eq!(read(&config, "nested/page.html"), "nested");
        assert!(!dir.path().join("site/parent.html").exists());
        assert_eq!(fs::read_to_string(&absolute).unwrap(), "{{ 1 + 1 }}");
    }

    #[test]
    fn test_is_plain_relative() {
        assert!(is_plain_relative(Path::new("about.html")));
        assert!(is_plain_relative(Path::new("docs/about.html")));
        assert!(!is_plain_relative(Path::new("../about.html")));
        assert!(!is_plain_relative(Path::new("docs/../../about.html")));
        assert!(!is_plain_relative(Path::new("/etc/about.html")));
        assert!(!is_plain_relative(Path::new("")));
    }

    #[test]
    fn test_home_with_no_posts() {
        let (_dir, config) = create_theme(&[(
            "index.html",
            "{{ posts | length }}/{{ current_page }}/{{ total_pages }}/{{ is_home }}",
        )]);
        let engine = ThemeEngine::new(&config).unwrap();

        engine
            .render_site(&Site::sample(Vec::new()), &config.build_dir)
            .unwrap();
        assert_eq!(read(&config, "index.html"), "0/0/0/true");
    }

    #[test]
    fn test_detail_context() {
        let (_dir, config) = create_theme(&[(
            "detail.html",
            "{{ post.title }}|{{ post.permalink | safe }}|{{ is_singular }}|{% for tag in tags %}{{ tag.name }},{% endfor %}|{{ post.content | safe_html }}",
        )]);
        let engine = ThemeEngine::new(&config).unwrap();
        let site = Site::sample(vec![tagged("hello", "blog/news", "2024-01-01", &["zeta", "alpha"])]);

        engine.render_site(&site, &config.build_dir).unwrap();
        assert_eq!(
            read(&config, "blog/news/hello.html"),
            "hello|/blog/news/hello.html|true|alpha,zeta,|<p>hello</p>"
        );
    }

    #[test]
    fn test_tag_pages_paginate() {
        let (_dir, mut config) = create_theme(&[
            ("tags.html", "{% for tag in tags %}{{ tag.name }}={{ tag.count_posts }};{% endfor %}"),
            (
                "tag.html",
                "{{ tag.name }}:{% for post in tag_posts %}{{ post.slug }}{% endfor %}:{{ current_page }}/{{ total_pages }}:{{ is_archive }}:{{ tag.count_posts }}",
            ),
        ]);
        config.per_page_tag = 2;
        let engine = ThemeEngine::new(&config).unwrap();
        let mut site = Site::sample(vec![
            tagged("c", "blog", "2024-03-01", &["Go"]),
            tagged("b", "blog", "2024-02-01", &["Go", "Rust"]),
            tagged("a", "blog", "2024-01-01", &["Go"]),
        ]);
        site.config = config.clone();

        engine.render_site(&site, &config.build_dir).unwrap();
        assert_eq!(read(&config, "tags/index.html"), "Go=3;Rust=1;");
        assert_eq!(read(&config, "tags/go.html"), "Go:cb:1/2:true:3");
        assert_eq!(read(&config, "tags/2/go.html"), "Go:a:2/2:true:3");
        assert_eq!(read(&config, "tags/rust.html"), "Rust:b:1/1:true:1");
    }

    #[test]
    fn test_tag_carries_all_its_posts() {
        let (_dir, mut config) = create_theme(&[(
            "tag.html",
            "{{ tag.name }}:{{ tag.posts | length }}:{% for post in tag.posts %}{{ post.slug }}{% endfor %}:{{ tag.permalink | safe }}",
        )]);
        config.per_page_tag = 1;
        let engine = ThemeEngine::new(&config).unwrap();
        let mut site = Site::sample(vec![
            tagged("b", "blog", "2024-02-01", &["Go"]),
            tagged("a", "blog", "2024-01-01", &["Go", "Rust"]),
        ]);
        site.config = config.clone();

        engine.render_site(&site, &config.build_dir).unwrap();
        assert_eq!(read(&config, "tags/go.html"), "Go:2:ba:/tags/go.html");
        assert_eq!(read(&config, "tags/2/go.html"), "Go:2:ba:/tags/go.html");
        assert_eq!(read(&config, "tags/rust.html"), "Rust:1:a:/tags/rust.html");
    }

    #[test]
    fn test_no_tag_index_without_tags() {
        let (_dir, config) = create_theme(&[("tags.html", "tags")]);
        let engine = ThemeEngine::new(&config).unwrap();
        let site = Site::sample(vec![Post::sample("a", "blog", "2024-01-01")]);

        engine.render_site(&site, &config.build_dir).unwrap();
        assert!(!config.build_dir.join("tags/index.html").exists());
    }

    #[test]
    fn test_category_pages_include_nested_types() {
        let (_dir, mut config) = create_theme(&[(
            "posts.html",
            "{{ post_type | safe }}:{% for post in posts %}{{ post.slug }}{% endfor %}:{{ current_page }}/{{ total_pages }}:{{ per_page }}:{{ post_type | post_types }}",
        )]);
        config.per_page_category = 2;
        config
            .post_types
            .insert("blog".to_string(), "Blog".to_string());
        let engine = ThemeEngine::new(&config).unwrap();
        let mut site = Site::sample(vec![
            Post::sample("c", "blog", "2024-03-01"),
            Post::sample("b", "blog/news", "2024-02-01"),
            Post::sample("a", "blog", "2024-01-01"),
        ]);
        site.config = config.clone();

        engine.render_site(&site, &config.build_dir).unwrap();
        assert_eq!(read(&config, "blog/index.html"), "blog:cb:1/2:2:Blog");
        assert_eq!(read(&config, "blog/page/2.html"), "blog:a:2/2:2:Blog");
        assert_eq!(read(&config, "blog/news/index.html"), "blog/news:b:1/1:2:-");
    }

    #[test]
    fn test_root_category_does_not_replace_home() {
        let (_dir, config) = create_theme(&[
            ("index.html", "home"),
            ("posts.html", "archive"),
        ]);
        let engine = ThemeEngine::new(&config).unwrap();
        let site = Site::sample(vec![Post::sample("root", "", "2024-01-01")]);

        engine.render_site(&site, &config.build_dir).unwrap();
        assert_eq!(read(&config, "index.html"), "home");
    }

    #[test]
    fn test_site_context() {
        let (_dir, config) = create_theme(&[(
            "index.html",
            "{{ site.title }}|{{ site.now_year | length }}|{{ site.posts | length }}|{{ site.timestamp > 0 }}",
        )]);
        let engine = ThemeEngine::new(&config).unwrap();
        let site = Site::sample(vec![Post::sample("a", "blog", "2024-01-01")]);

        engine.render_site(&site, &config.build_dir).unwrap();
        assert_eq!(read(&config, "index.html"), "Test Blog|4|1|true");
    }
}

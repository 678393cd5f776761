use crate::config::SiteConfig;
use crate::error::{IoContext, QuireError, Result};
use crate::parsing::{
    MarkdownRenderer, extract_frontmatter, remove_html_tags, slugify, split_content,
};
use crate::types::{Post, PostStatus, Tag};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const MARKDOWN_EXTENSION: &str = ".md";

/// The frozen content model of one build.
#[derive(Debug, Clone)]
pub struct Site {
    pub config: SiteConfig,
    /// Published posts, newest first. Equal dates keep scan order.
    pub posts: Vec<Post>,
    /// Tags in order of first appearance.
    pub tags: Vec<Tag>,
    /// Distinct post types in order of first appearance.
    pub categories: Vec<String>,
}

impl Site {
    pub fn sorted_tags(&self) -> Vec<&Tag> {
        let mut tags: Vec<&Tag> = self.tags.iter().collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        tags
    }

    pub fn posts_tagged(&self, name: &str) -> Vec<&Post> {
        self.posts.iter().filter(|post| post.has_tag(name)).collect()
    }
}

#[cfg(test)]
impl Site {
    /// A site over already-sorted posts with `https://example.com` as base.
    pub(crate) fn sample(posts: Vec<Post>) -> Self {
        let config = SiteConfig::from_yaml(
            "baseURL: https://example.com/\ntitle: Test Blog\ndescription: A test blog\n",
            Path::new("site.yml"),
        )
        .expect("sample config parses");
        let mut categories: Vec<String> = Vec::new();
        for post in &posts {
            if !categories.contains(&post.post_type) {
                categories.push(post.post_type.clone());
            }
        }
        Site {
            config,
            tags: collect_tags(&posts),
            posts,
            categories,
        }
    }
}

pub struct SiteBuilder<'a> {
    config: &'a SiteConfig,
    renderer: MarkdownRenderer,
}

impl<'a> SiteBuilder<'a> {
    pub fn new(config: &'a SiteConfig) -> Self {
        Self {
            config,
            renderer: MarkdownRenderer::new(),
        }
    }

    /// Scans the content directory. Files that fail to read or parse are
    /// logged and left out; drafts are dropped.
    pub fn build(&self) -> Result<Site> {
        let mut posts = Vec::new();
        let mut categories: Vec<String> = Vec::new();

        for path in self.markdown_files() {
            let post = match self.parse_post(&path) {
                Ok(post) => post,
                Err(error) => {
                    warn!("Skipping {}: {error}", path.display());
                    continue;
                }
            };

            if !post.is_published() {
                debug!("Skipping draft {}", path.display());
                continue;
            }

            if !categories.contains(&post.post_type) {
                categories.push(post.post_type.clone());
            }
            posts.push(post);
        }

        let tags = collect_tags(&posts);

        posts.sort_by(|a, b| b.date.cmp(&a.date));

        info!(
            "Scanned {} posts, {} tags, {} categories",
            posts.len(),
            tags.len(),
            categories.len()
        );

        Ok(Site {
            config: self.config.clone(),
            posts,
            tags,
            categories,
        })
    }

    fn markdown_files(&self) -> Vec<PathBuf> {
        let content_dir = &self.config.content_dir;
        if !content_dir.is_dir() {
            warn!("Content directory {} not found", content_dir.display());
            return Vec::new();
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(content_dir).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(error) => {
                    warn!("Directory walk error in {}: {error}", content_dir.display());
                    continue;
                }
            };

            if entry.file_type().is_file()
                && entry
                    .file_name()
                    .to_string_lossy()
                    .ends_with(MARKDOWN_EXTENSION)
            {
                files.push(entry.into_path());
            }
        }

        files
    }

    pub fn parse_post(&self, path: &Path) -> Result<Post> {
        let file_content = fs::read_to_string(path).io_context("reading post", path)?;
        let (frontmatter, body) = extract_frontmatter(&file_content, path)?;

        let post_type = self.post_type(path)?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| QuireError::InvalidPath {
                path: path.to_path_buf(),
            })?;
        let slug = slugify(
            filename
                .strip_suffix(MARKDOWN_EXTENSION)
                .unwrap_or(&filename),
        );

        let content = self.renderer.render(&body);
        let (summary, reminder) = split_content(&content);
        let summary_clean = remove_html_tags(&summary);

        let status = if frontmatter.draft.unwrap_or(false) {
            PostStatus::Draft
        } else {
            PostStatus::Published
        };

        Ok(Post {
            title: frontmatter.title.unwrap_or_default(),
            date: frontmatter
                .date
                .unwrap_or_else(|| DateTime::<Utc>::UNIX_EPOCH.fixed_offset()),
            permalink: Post::permalink_for(&post_type, &slug),
            slug,
            post_type,
            tags: frontmatter.tags,
            status,
            content,
            summary,
            reminder,
            summary_clean,
            description: frontmatter.description.unwrap_or_default(),
            author: frontmatter.author.unwrap_or_default(),
            source_url: frontmatter.source_url.unwrap_or_default(),
            cover: frontmatter.cover.unwrap_or_default(),
            image: frontmatter.image.unwrap_or_default(),
        })
    }

    /// Parent directory relative to the content root, `/`-separated.
    fn post_type(&self, path: &Path) -> Result<String> {
        let parent = path.parent().unwrap_or(Path::new(""));
        let relative = parent
            .strip_prefix(&self.config.content_dir)
            .map_err(|_| QuireError::InvalidPath {
                path: path.to_path_buf(),
            })?;

        Ok(relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"))
    }
}

/// One tag per distinct name in first-seen order, with `count_posts` set to
/// the number of posts carrying that exact name.
pub fn collect_tags(posts: &[Post]) -> Vec<Tag> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut tags = Vec::new();

    for post in posts {
        for name in &post.tags {
            if seen.insert(name) {
                tags.push(Tag::new(name));
            }
        }
    }

    for tag in &mut tags {
        tag.count_posts = posts.iter().filter(|post| post.has_tag(&tag.name)).count();
    }

    tags
}

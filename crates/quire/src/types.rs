use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Published,
}

/// Metadata block at the top of a markdown file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Frontmatter {
    #[serde(default, deserialize_with = "crate::parsing::deserialize_optional_text")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "crate::parsing::deserialize_date")]
    pub date: Option<DateTime<FixedOffset>>,
    #[serde(default, deserialize_with = "crate::parsing::deserialize_tags")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub draft: Option<bool>,
    #[serde(default, deserialize_with = "crate::parsing::deserialize_optional_text")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "crate::parsing::deserialize_optional_text")]
    pub author: Option<String>,
    #[serde(default, deserialize_with = "crate::parsing::deserialize_optional_text")]
    pub source_url: Option<String>,
    #[serde(default, deserialize_with = "crate::parsing::deserialize_optional_text")]
    pub cover: Option<String>,
    #[serde(default, deserialize_with = "crate::parsing::deserialize_optional_text")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Post {
    pub title: String,
    pub date: DateTime<FixedOffset>,
    pub slug: String,
    #[serde(rename = "type")]
    pub post_type: String,
    pub tags: Vec<String>,
    pub status: PostStatus,
    pub content: String,
    pub summary: String,
    pub reminder: String,
    pub summary_clean: String,
    pub description: String,
    pub author: String,
    pub source_url: String,
    pub cover: String,
    pub image: String,
    pub permalink: String,
}

impl Post {
    pub fn permalink_for(post_type: &str, slug: &str) -> String {
        format!("/{}/{}.html", post_type, slug)
    }

    /// Output path relative to the build directory.
    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(&self.post_type).join(format!("{}.html", self.slug))
    }

    pub fn is_published(&self) -> bool {
        self.status == PostStatus::Published
    }

    pub fn has_tag(&self, name: &str) -> bool {
        self.tags.iter().any(|tag| tag == name)
    }

    /// Category membership is a prefix match so `blog/news` belongs to `blog`.
    pub fn in_category(&self, category: &str) -> bool {
        self.post_type.starts_with(category)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Tag {
    pub name: String,
    pub slug: String,
    pub count_posts: usize,
    pub permalink: String,
}

impl Tag {
    pub fn new(name: &str) -> Self {
        let slug = crate::parsing::slugify(name);
        Self {
            name: name.to_string(),
            permalink: format!("/tags/{}.html", slug),
            slug,
            count_posts: 0,
        }
    }
}

#[cfg(test)]
impl Post {
    pub(crate) fn sample(slug: &str, post_type: &str, date: &str) -> Self {
        Post {
            title: slug.to_string(),
            date: crate::parsing::parse_date(date).expect("sample date parses"),
            slug: slug.to_string(),
            post_type: post_type.to_string(),
            tags: vec![],
            status: PostStatus::Published,
            content: format!("<p>{slug}</p>"),
            summary: format!("<p>{slug}</p>"),
            reminder: String::new(),
            summary_clean: slug.to_string(),
            description: String::new(),
            author: String::new(),
            source_url: String::new(),
            cover: String::new(),
            image: String::new(),
            permalink: Post::permalink_for(post_type, slug),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_new() {
        let tag = Tag::new("Rust Lang");
        assert_eq!(tag.name, "Rust Lang");
        assert_eq!(tag.slug, "rust-lang");
        assert_eq!(tag.permalink, "/tags/rust-lang.html");
        assert_eq!(tag.count_posts, 0);
    }

    #[test]
    fn test_permalink_for() {
        assert_eq!(Post::permalink_for("blog", "hello"), "/blog/hello.html");
        assert_eq!(
            Post::permalink_for("blog/news", "hello"),
            "/blog/news/hello.html"
        );
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let value = serde_json::to_value(PostStatus::Published).unwrap();
        assert_eq!(value, serde_json::json!("published"));
    }
}

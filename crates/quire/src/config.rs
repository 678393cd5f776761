use crate::error::{IoContext, QuireError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(rename = "baseURL", default)]
    pub base_url: String,
    #[serde(rename = "site_name", default)]
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub keywords: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_port", deserialize_with = "deserialize_port")]
    pub port: u16,
    #[serde(default = "default_content_dir")]
    pub content_dir: PathBuf,
    #[serde(default = "default_build_dir")]
    pub build_dir: PathBuf,
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,
    #[serde(default)]
    pub pages: Vec<String>,
    #[serde(default)]
    pub post_types: HashMap<String, String>,
    #[serde(default = "default_per_page")]
    pub per_page_index: usize,
    #[serde(default = "default_per_page")]
    pub per_page_category: usize,
    #[serde(default = "default_per_page")]
    pub per_page_tag: usize,
    #[serde(flatten)]
    pub deploy: DeployTarget,
}

/// Upload target for the deploy step. Parsed and carried, never used by the
/// build itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeployTarget {
    #[serde(rename = "sftp_server", default)]
    pub server: String,
    #[serde(rename = "sftp_port", default, deserialize_with = "deserialize_text")]
    pub port: String,
    #[serde(rename = "sftp_login", default)]
    pub login: String,
    #[serde(rename = "sftp_pass", default, skip_serializing)]
    pub password: String,
}

pub fn default_port() -> u16 {
    3000
}

pub fn default_per_page() -> usize {
    10
}

fn default_content_dir() -> PathBuf {
    PathBuf::from("content")
}

fn default_build_dir() -> PathBuf {
    PathBuf::from("build")
}

fn default_source_dir() -> PathBuf {
    PathBuf::from("theme")
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(u64),
    Text(String),
}

fn deserialize_text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(number) => number.to_string(),
        NumberOrText::Text(text) => text,
    })
}

fn deserialize_port<'de, D>(deserializer: D) -> std::result::Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    let text = deserialize_text(deserializer)?;
    text.trim()
        .parse()
        .map_err(|_| serde::de::Error::custom(format!("invalid port '{text}'")))
}

impl SiteConfig {
    /// Reads the YAML configuration at `path`. Relative directories are
    /// resolved against the directory holding the file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(QuireError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = fs::read_to_string(path).io_context("reading config", path)?;
        let mut config = Self::from_yaml(&content, path)?;

        let root = path.parent().unwrap_or(Path::new(""));
        config.content_dir = root.join(&config.content_dir);
        config.build_dir = root.join(&config.build_dir);
        config.source_dir = root.join(&config.source_dir);

        Ok(config)
    }

    pub fn from_yaml(content: &str, path: &Path) -> Result<Self> {
        let mut config: SiteConfig =
            serde_yaml::from_str(content).map_err(|error| QuireError::YamlParse {
                path: path.to_path_buf(),
                message: error.to_string(),
            })?;

        config.base_url = config.base_url.trim_end_matches('/').to_string();

        Ok(config)
    }

    pub fn static_dir(&self) -> PathBuf {
        self.source_dir.join("static")
    }

    pub fn layouts_dir(&self) -> PathBuf {
        self.source_dir.join("layouts")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const FULL_CONFIG: &str = r#"
baseURL: "https://example.com/"
site_name: "Example"
title: "Example Blog"
author: "Jane"
keywords: "rust, blog"
description: "Notes"
port: "8080"
content_dir: "posts"
build_dir: "public"
source_dir: "design"
pages: ["about.html", "404.html"]
post_types:
  blog: "Blog"
  news: ""
per_page_index: 5
per_page_category: 7
per_page_tag: 3
sftp_server: "example.com"
sftp_port: "22"
sftp_login: "deploy"
sftp_pass: "secret"
"#;

    #[test]
    fn test_load_full_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("site.yml");
        fs::write(&path, FULL_CONFIG).unwrap();

        let config = SiteConfig::load(&path).unwrap();
        assert_eq!(config.base_url, "https://example.com");
        assert_eq!(config.name, "Example");
        assert_eq!(config.title, "Example Blog");
        assert_eq!(config.port, 8080);
        assert_eq!(config.content_dir, dir.path().join("posts"));
        assert_eq!(config.build_dir, dir.path().join("public"));
        assert_eq!(config.source_dir, dir.path().join("design"));
        assert_eq!(config.pages, vec!["about.html", "404.html"]);
        assert_eq!(config.post_types.get("blog").map(String::as_str), Some("Blog"));
        assert_eq!(config.post_types.get("news").map(String::as_str), Some(""));
        assert_eq!(config.per_page_index, 5);
        assert_eq!(config.per_page_category, 7);
        assert_eq!(config.per_page_tag, 3);
        assert_eq!(config.deploy.server, "example.com");
        assert_eq!(config.deploy.password, "secret");
    }

    #[test]
    fn test_defaults() {
        let config = SiteConfig::from_yaml("title: Minimal\n", Path::new("site.yml")).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.content_dir, PathBuf::from("content"));
        assert_eq!(config.build_dir, PathBuf::from("build"));
        assert_eq!(config.source_dir, PathBuf::from("theme"));
        assert_eq!(config.per_page_index, 10);
        assert!(config.pages.is_empty());
        assert!(config.post_types.is_empty());
    }

    #[test]
    fn test_numeric_port() {
        let config = SiteConfig::from_yaml("port: 4000\n", Path::new("site.yml")).unwrap();
        assert_eq!(config.port, 4000);
    }

    #[test]
    fn test_numeric_deploy_port() {
        let config = SiteConfig::from_yaml("sftp_port: 2222\n", Path::new("site.yml")).unwrap();
        assert_eq!(config.deploy.port, "2222");
    }

    #[test]
    fn test_missing_config_is_error() {
        let dir = TempDir::new().unwrap();
        let result = SiteConfig::load(&dir.path().join("missing.yml"));
        assert!(matches!(result, Err(QuireError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_malformed_config_is_error() {
        let result = SiteConfig::from_yaml("pages: {not: [a list", Path::new("site.yml"));
        assert!(matches!(result, Err(QuireError::YamlParse { .. })));
    }
}

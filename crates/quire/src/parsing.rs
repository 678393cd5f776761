use crate::error::{QuireError, Result};
use crate::types::Frontmatter;
use crate::xml::escape;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use pulldown_cmark::{
    CowStr, Event, LinkType, Options, Parser, Tag, TagEnd, TextMergeStream, html,
};
use regex::Regex;
use serde::{Deserialize, Deserializer};
use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

pub const MORE_MARKER: &str = "<!--more-->";

static NON_ALPHANUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}]+").expect("slug pattern is valid"));

static BARE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:https?://|www\.)[^\s<>"]*[^\s<>"'.,:;!?)\]]"#)
        .expect("bare url pattern is valid")
});

pub struct MarkdownRenderer {
    options: Options,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);

        Self { options }
    }

    /// Renders markdown to HTML. Raw HTML passes through untouched, soft
    /// breaks become `<br />`, bare URLs are linked and links to `http*`
    /// destinations open in a new tab.
    pub fn render(&self, content: &str) -> String {
        let mut events: Vec<Event> =
            TextMergeStream::new(Parser::new_ext(content, self.options)).collect();
        assign_heading_ids(&mut events);

        let mut output = Vec::with_capacity(events.len());
        let mut link_depth = 0usize;
        let mut in_code_block = false;

        for event in events {
            match event {
                Event::Start(Tag::Link {
                    link_type,
                    dest_url,
                    title,
                    ..
                }) if dest_url.starts_with("http")
                    && !matches!(link_type, LinkType::Autolink | LinkType::Email) =>
                {
                    link_depth += 1;
                    output.push(Event::InlineHtml(
                        external_link_open(&dest_url, &title).into(),
                    ));
                }
                Event::Start(tag @ (Tag::Link { .. } | Tag::Image { .. })) => {
                    link_depth += 1;
                    output.push(Event::Start(tag));
                }
                Event::End(end @ (TagEnd::Link | TagEnd::Image)) => {
                    link_depth = link_depth.saturating_sub(1);
                    output.push(Event::End(end));
                }
                Event::Start(Tag::CodeBlock(kind)) => {
                    in_code_block = true;
                    output.push(Event::Start(Tag::CodeBlock(kind)));
                }
                Event::End(TagEnd::CodeBlock) => {
                    in_code_block = false;
                    output.push(Event::End(TagEnd::CodeBlock));
                }
                Event::Text(text) if link_depth == 0 && !in_code_block => {
                    linkify(text, &mut output);
                }
                Event::SoftBreak => output.push(Event::HardBreak),
                other => output.push(other),
            }
        }

        let mut html_output = String::new();
        html::push_html(&mut html_output, output.into_iter());
        html_output
    }
}

fn external_link_open(dest_url: &str, title: &str) -> String {
    let mut tag = format!(r#"<a href="{}""#, escape(dest_url));
    if !title.is_empty() {
        tag.push_str(&format!(r#" title="{}""#, escape(title)));
    }
    tag.push_str(r#" target="_blank">"#);
    tag
}

fn linkify<'a>(text: CowStr<'a>, output: &mut Vec<Event<'a>>) {
    if !BARE_URL.is_match(&text) {
        output.push(Event::Text(text));
        return;
    }

    let mut last = 0;
    for found in BARE_URL.find_iter(&text) {
        if found.start() > last {
            output.push(Event::Text(text[last..found.start()].to_string().into()));
        }
        let url = found.as_str();
        let href = if url.starts_with("www.") {
            format!("http://{url}")
        } else {
            url.to_string()
        };
        output.push(Event::InlineHtml(
            format!(r#"<a href="{}">{}</a>"#, escape(&href), escape(url)).into(),
        ));
        last = found.end();
    }
    if last < text.len() {
        output.push(Event::Text(text[last..].to_string().into()));
    }
}

#[derive(Default)]
struct HeadingIds {
    seen: HashSet<String>,
}

impl HeadingIds {
    fn generate(&mut self, text: &str) -> String {
        let mut base = String::new();
        for character in text.trim().chars() {
            if !character.is_ascii() {
                continue;
            }
            if character.is_ascii_alphanumeric() {
                base.push(character.to_ascii_lowercase());
            } else if character.is_ascii_whitespace() || character == '-' || character == '_' {
                base.push('-');
            }
        }
        if base.is_empty() {
            base.push_str("heading");
        }

        if self.seen.insert(base.clone()) {
            return base;
        }
        let mut suffix = 1;
        loop {
            let candidate = format!("{base}-{suffix}");
            if self.seen.insert(candidate.clone()) {
                return candidate;
            }
            suffix += 1;
        }
    }
}

fn assign_heading_ids(events: &mut [Event]) {
    let mut ids = HeadingIds::default();

    for index in 0..events.len() {
        if !matches!(events[index], Event::Start(Tag::Heading { .. })) {
            continue;
        }

        let mut text = String::new();
        for event in &events[index + 1..] {
            match event {
                Event::End(TagEnd::Heading(_)) => break,
                Event::Text(fragment) | Event::Code(fragment) => text.push_str(fragment),
                _ => {}
            }
        }

        let generated = ids.generate(&text);
        if let Event::Start(Tag::Heading { id, .. }) = &mut events[index] {
            *id = Some(generated.into());
        }
    }
}

/// Splits a document into its YAML head and its body.
///
/// The opening fence is the first line that is exactly `---` once trimmed.
/// The closing fence is the next line that starts with `---` once trimmed.
/// With no closing fence the rest of the file is YAML and the body is empty.
/// With no opening fence there is no YAML and the whole file is the body.
pub fn split_frontmatter(content: &str) -> (&str, &str) {
    let mut offset = 0;
    let mut yaml_start = None;

    for line in content.split_inclusive('\n') {
        let next = offset + line.len();
        let trimmed = line.trim();
        match yaml_start {
            None if trimmed == "---" => yaml_start = Some(next),
            Some(start) if trimmed.starts_with("---") => {
                return (&content[start..offset], &content[next..]);
            }
            _ => {}
        }
        offset = next;
    }

    match yaml_start {
        Some(start) => (&content[start..], ""),
        None => ("", content),
    }
}

pub fn extract_frontmatter(content: &str, path: &Path) -> Result<(Frontmatter, String)> {
    let content = content.replace("\r\n", "\n");
    let (yaml, body) = split_frontmatter(&content);

    if yaml.trim().is_empty() {
        return Ok((Frontmatter::default(), body.to_string()));
    }

    let frontmatter: Frontmatter =
        serde_yaml::from_str(yaml).map_err(|error| QuireError::YamlParse {
            path: path.to_path_buf(),
            message: error.to_string(),
        })?;

    Ok((frontmatter, body.to_string()))
}

pub fn parse_date(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(value) {
        return Some(date);
    }
    if let Ok(date) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(date.and_utc().fixed_offset());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN).and_utc().fixed_offset())
}

pub fn deserialize_date<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<DateTime<FixedOffset>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) => parse_date(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid date '{raw}'"))),
    }
}

/// Textual form of a YAML scalar; `None` for null, sequences and mappings.
fn scalar_text(value: serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(text) => Some(text),
        serde_yaml::Value::Number(number) => Some(number.to_string()),
        serde_yaml::Value::Bool(flag) => Some(flag.to_string()),
        serde_yaml::Value::Tagged(tagged) => scalar_text(tagged.value),
        _ => None,
    }
}

/// Reads an optional text field, accepting numbers and booleans in their
/// textual form so `title: 1984` is the title "1984".
pub fn deserialize_optional_text<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_yaml::Value::deserialize(deserializer)? {
        serde_yaml::Value::Null => Ok(None),
        value @ (serde_yaml::Value::Sequence(_) | serde_yaml::Value::Mapping(_)) => Err(
            serde::de::Error::custom(format!("expected text, found {value:?}")),
        ),
        value => Ok(scalar_text(value)),
    }
}

/// Reads a tag list, trimming each entry. Scalars that are not strings are
/// kept in their textual form.
pub fn deserialize_tags<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<serde_yaml::Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .filter_map(scalar_text)
        .map(|tag| tag.trim().to_string())
        .collect())
}

/// Lowercases `input` one character at a time and collapses every run of
/// characters that are not letters or numbers into a single `-`, trimming
/// dashes at both ends.
pub fn slugify(input: &str) -> String {
    let lowered: String = input
        .chars()
        .map(|character| character.to_lowercase().next().unwrap_or(character))
        .collect();
    NON_ALPHANUMERIC
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

pub fn slugify_tag(input: &str) -> String {
    format!("{input}.html")
}

/// Splits rendered HTML at the first `<!--more-->` into summary and
/// remainder.
pub fn split_content(content: &str) -> (String, String) {
    match content.split_once(MORE_MARKER) {
        Some((summary, reminder)) => (summary.trim().to_string(), reminder.trim().to_string()),
        None => (content.to_string(), String::new()),
    }
}

/// Drops everything between `<` and `>` along with control characters.
/// Meant for titles and summaries, not arbitrary HTML.
pub fn remove_html_tags(html: &str) -> String {
    let mut inside_tag = false;
    html.chars()
        .filter(|&character| match character {
            '<' => {
                inside_tag = true;
                false
            }
            '>' => {
                inside_tag = false;
                false
            }
            _ => !inside_tag && !character.is_control(),
        })
        .collect()
}

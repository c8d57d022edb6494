//! Turns a forwarded email into a structured post.
//!
//! The LLM does the real work. When it is unavailable, returns something that
//! is not JSON, or returns an empty `content`, the extractor falls back to
//! scanning the email for a known post URL and the subject line for an
//! author. Extraction never fails: the worst case is a record authored by
//! `Unknown` with the truncated email text as content.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::PostSource;
use crate::services::llm_client::LlmClient;

pub const EXTRACTION_INPUT_LIMIT: usize = 10_000;
pub const FALLBACK_CONTENT_LIMIT: usize = 5_000;
pub const EXTRACTION_MAX_TOKENS: u32 = 2_000;
pub const MAX_TAGS: usize = 10;
pub const UNKNOWN_AUTHOR: &str = "Unknown";

#[allow(clippy::unwrap_used)]
static POST_URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)https?://(?:[a-z0-9-]+\.)*(?:linkedin\.com/(?:posts|feed/update|pulse)/|[a-z0-9-]+\.substack\.com/p/)[^\s"'<>()\[\]]+"#,
    )
    .unwrap()
});

#[allow(clippy::unwrap_used)]
static FORWARD_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(?:fwd?|fw)\s*:\s*").unwrap());

#[allow(clippy::unwrap_used)]
static SUBJECT_AUTHOR_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)^post by\s+(.+?)\s*$",
        r"(?i)^(.+?)\s+(?:posted|shared|reposted)\b",
        r"(?i)^(.+?)['’]s\s+post\b",
        r"(?i)^(.+?)\s+on\s+linkedin\b",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

#[allow(clippy::unwrap_used)]
static SCRIPT_OR_STYLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(script|style)\b.*?</(?:script|style)\s*>").unwrap());

#[allow(clippy::unwrap_used)]
static BLOCK_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<br\s*/?>|</(?:p|div|li|tr|h[1-6])\s*>").unwrap());

#[allow(clippy::unwrap_used)]
static ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());

#[allow(clippy::unwrap_used)]
static BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// The parts of an inbound email the extractor reads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InboundEmail {
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedPost {
    pub source: PostSource,
    pub author_name: String,
    pub author_headline: Option<String>,
    pub content: String,
    pub original_url: Option<String>,
    pub post_date: Option<String>,
    pub tags: Vec<String>,
}

/// Shape the LLM is asked to produce. Every field is optional so a partially
/// filled answer still parses.
#[derive(Debug, Default, Deserialize)]
struct LlmExtraction {
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    author_name: Option<String>,
    #[serde(default)]
    author_headline: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    original_url: Option<String>,
    #[serde(default)]
    post_date: Option<String>,
    #[serde(default)]
    tags: Option<Vec<String>>,
}

pub struct ContentExtractor {
    llm: Arc<dyn LlmClient>,
}

impl ContentExtractor {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub async fn extract(&self, email: &InboundEmail) -> ExtractedPost {
        let hints = FallbackHints::from_email(email);
        let llm_input = if email.text_body.trim().is_empty() {
            email.html_body.as_str()
        } else {
            email.text_body.as_str()
        };

        if llm_input.trim().is_empty() {
            tracing::warn!("Inbound email has no body, using fallback extraction");
            return hints.into_fallback(email);
        }

        let prompt = build_extraction_prompt(llm_input);
        let reply = match self.llm.complete(&prompt, EXTRACTION_MAX_TOKENS).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!("LLM extraction failed: {}. Using fallback extraction", e);
                return hints.into_fallback(email);
            }
        };

        let parsed: LlmExtraction = match serde_json::from_str(strip_code_fences(&reply)) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("LLM extraction returned invalid JSON: {}. Using fallback", e);
                return hints.into_fallback(email);
            }
        };

        match hints.merge(parsed) {
            Some(post) => post,
            None => {
                tracing::warn!("LLM extraction returned empty content, using fallback");
                hints.into_fallback(email)
            }
        }
    }
}

pub fn build_extraction_prompt(email_body: &str) -> String {
    format!(
        r#"You are a content extraction specialist. Parse this forwarded email and extract the original LinkedIn post or Substack newsletter content.

EMAIL CONTENT:
{}

Extract and return ONLY valid JSON (no markdown, no explanation, no backticks):
{{
  "source": "linkedin" or "substack" or "other",
  "author_name": "Full name of original author",
  "author_headline": "Their headline if visible, or null",
  "content": "The full text of the original post/article",
  "original_url": "Direct link to post if present, or null",
  "post_date": "ISO date if visible, or null",
  "tags": ["relevant", "topic", "tags"]
}}

Rules:
- Strip all email forwarding artifacts (Fw:, -----, signatures)
- For LinkedIn: Look for the post content, author name, and any engagement numbers
- For Substack: Look for the article title and body
- Extract only the meaningful content
- Return ONLY the JSON object"#,
        truncate_chars(email_body, EXTRACTION_INPUT_LIMIT)
    )
}

/// What can be learned from the email without the LLM.
struct FallbackHints {
    url: Option<String>,
    author: Option<String>,
    title: Option<String>,
}

impl FallbackHints {
    fn from_email(email: &InboundEmail) -> Self {
        let url = find_post_url(&email.text_body).or_else(|| find_post_url(&email.html_body));
        let title = url.as_deref().and_then(title_from_url);
        Self {
            url,
            author: author_from_subject(&email.subject),
            title,
        }
    }

    fn source(&self) -> PostSource {
        self.url
            .as_deref()
            .map(PostSource::from_url)
            .unwrap_or(PostSource::Other)
    }

    fn author(&self) -> String {
        self.author
            .clone()
            .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string())
    }

    fn into_fallback(self, email: &InboundEmail) -> ExtractedPost {
        let body = if email.text_body.trim().is_empty() {
            html_to_text(&email.html_body)
        } else {
            email.text_body.trim().to_string()
        };
        let content = if body.is_empty() {
            email.subject.trim().to_string()
        } else {
            truncate_chars(&body, FALLBACK_CONTENT_LIMIT).to_string()
        };

        ExtractedPost {
            source: self.source(),
            author_name: self.author(),
            author_headline: self.title.clone(),
            content,
            original_url: self.url,
            post_date: None,
            tags: Vec::new(),
        }
    }

    /// Fills gaps in the LLM answer. `None` when the answer has no content.
    fn merge(&self, parsed: LlmExtraction) -> Option<ExtractedPost> {
        let content = non_blank(parsed.content)?;

        let source = match parsed.source.as_deref().map(PostSource::parse) {
            Some(PostSource::Other) | None => self.source(),
            Some(source) => source,
        };
        let author_name = non_blank(parsed.author_name)
            .filter(|name| !name.eq_ignore_ascii_case(UNKNOWN_AUTHOR))
            .unwrap_or_else(|| self.author());

        Some(ExtractedPost {
            source,
            author_name,
            author_headline: non_blank(parsed.author_headline),
            content,
            original_url: non_blank(parsed.original_url).or_else(|| self.url.clone()),
            post_date: non_blank(parsed.post_date),
            tags: normalize_tags(parsed.tags.unwrap_or_default()),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("null"))
}

/// Lower-cased, trimmed, deduplicated, at most [`MAX_TAGS`].
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.trim().trim_start_matches('#').to_lowercase();
        if !tag.is_empty() && !normalized.contains(&tag) {
            normalized.push(tag);
        }
        if normalized.len() == MAX_TAGS {
            break;
        }
    }
    normalized
}

/// Removes markdown code fences and anything outside the outermost braces.
pub fn strip_code_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim(),
    }
}

/// First LinkedIn or Substack post URL in the text.
pub fn find_post_url(text: &str) -> Option<String> {
    POST_URL_PATTERN.find(text).map(|m| {
        m.as_str()
            .trim_end_matches(['.', ',', ';', ':', '!', '?', '*'])
            .to_string()
    })
}

/// Human-readable title from the last path segment of a post URL.
pub fn title_from_url(url: &str) -> Option<String> {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let path = without_query
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(without_query);
    let segment = path
        .split('/')
        .skip(1)
        .filter(|s| !s.is_empty())
        .last()?;

    let slug = segment.split("-activity-").next().unwrap_or(segment);
    // LinkedIn slugs lead with the author's handle: `handle_the-post-title`.
    let slug = match slug.split_once('_') {
        Some((_, rest)) if !rest.is_empty() => rest,
        _ => slug,
    };

    let words: Vec<String> = slug
        .split(['-', '_', '+'])
        .filter(|word| !word.is_empty() && !is_noise_token(word))
        .map(capitalize)
        .collect();

    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

fn is_noise_token(word: &str) -> bool {
    let all_digits = word.chars().all(|c| c.is_ascii_digit());
    let hex_id = word.len() >= 6
        && word.chars().all(|c| c.is_ascii_hexdigit())
        && word.chars().any(|c| c.is_ascii_digit());
    let urn = word.contains(':');
    all_digits || hex_id || urn
}

fn capitalize(word: &str) -> String {
    let decoded = urlencoding::decode(word)
        .map(|w| w.into_owned())
        .unwrap_or_else(|_| word.to_string());
    let mut chars = decoded.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Author name from a forwarded subject such as `Fwd: Jane Doe posted on LinkedIn`.
pub fn author_from_subject(subject: &str) -> Option<String> {
    let mut rest = subject.trim();
    while let Some(m) = FORWARD_PREFIX.find(rest) {
        rest = rest[m.end()..].trim();
    }

    SUBJECT_AUTHOR_PATTERNS
        .iter()
        .filter_map(|pattern| pattern.captures(rest))
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().trim_matches(['"', '\'', '“', '”']).trim().to_string())
        .find(|name| !name.is_empty() && name.chars().count() <= 80)
}

/// Plain text from an HTML body: tags dropped, common entities decoded.
pub fn html_to_text(html: &str) -> String {
    let without_scripts = SCRIPT_OR_STYLE.replace_all(html, "");
    let with_breaks = BLOCK_BREAK.replace_all(&without_scripts, "\n");
    let stripped = ANY_TAG.replace_all(&with_breaks, "");
    let decoded = stripped
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&");

    let lines: Vec<&str> = decoded.lines().map(str::trim).collect();
    BLANK_RUN
        .replace_all(&lines.join("\n"), "\n\n")
        .trim()
        .to_string()
}

/// Prefix of at most `max` characters, cut on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

//! The single markdown renderer used for digests.
//!
//! Digest prose comes back from the LLM as loosely formatted markdown. Every
//! place that needs HTML (the cron email, the CLI `render` command) goes
//! through [`render_markdown`], so the output looks the same everywhere.

use pulldown_cmark::{html, CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd};

use crate::models::{User, WeeklyDigest};

/// Converts digest markdown to an HTML fragment.
///
/// `##` headings become major sections and `###` headings become theme
/// titles. Raw HTML in the input is emitted as escaped text, and links with
/// a `javascript:` or `data:` scheme lose their target.
pub fn render_markdown(markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, Options::ENABLE_STRIKETHROUGH).map(|event| match event {
        Event::Start(Tag::Heading { level, .. }) => {
            Event::Html(CowStr::Borrowed(heading_open(level)))
        }
        Event::End(TagEnd::Heading(level)) => Event::Html(CowStr::Borrowed(heading_close(level))),
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Link {
            link_type,
            dest_url: safe_url(dest_url),
            title,
            id,
        }),
        Event::Start(Tag::Image {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Image {
            link_type,
            dest_url: safe_url(dest_url),
            title,
            id,
        }),
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });

    let mut output = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut output, parser);
    output
}

fn heading_open(level: HeadingLevel) -> &'static str {
    match level {
        HeadingLevel::H1 => "<h1>",
        HeadingLevel::H2 => "<h2 class=\"major-section\">",
        HeadingLevel::H3 => "<h3 class=\"theme-title\">",
        HeadingLevel::H4 => "<h4>",
        HeadingLevel::H5 => "<h5>",
        HeadingLevel::H6 => "<h6>",
    }
}

fn heading_close(level: HeadingLevel) -> &'static str {
    match level {
        HeadingLevel::H1 => "</h1>\n",
        HeadingLevel::H2 => "</h2>\n",
        HeadingLevel::H3 => "</h3>\n",
        HeadingLevel::H4 => "</h4>\n",
        HeadingLevel::H5 => "</h5>\n",
        HeadingLevel::H6 => "</h6>\n",
    }
}

fn safe_url(url: CowStr<'_>) -> CowStr<'_> {
    let scheme = url.trim_start().to_ascii_lowercase();
    if scheme.starts_with("javascript:") || scheme.starts_with("data:") || scheme.starts_with("vbscript:") {
        CowStr::Borrowed("#")
    } else {
        url
    }
}

const DIGEST_STYLES: &str = r#"
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; line-height: 1.6; color: #1a1a2e; max-width: 640px; margin: 0 auto; padding: 32px 20px; background: #fdfbf7; }
h2.major-section { font-size: 20px; margin: 36px 0 12px; padding-bottom: 6px; border-bottom: 2px solid #e8dcc8; }
h3.theme-title { font-size: 18px; font-weight: 700; margin: 24px 0 8px; color: #5c3d1e; }
strong { color: #1a1a2e; }
a { color: #8b5a2b; text-decoration: underline; }
ul, ol { padding-left: 22px; }
li { margin: 4px 0; }
hr { border: none; border-top: 1px solid #e8dcc8; margin: 32px 0; }
.footer { font-size: 13px; color: #888; margin-top: 40px; }
"#;

/// Wraps a rendered digest in the email layout.
pub fn render_digest_email(digest: &WeeklyDigest, user: &User, dashboard_url: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Your Weekly Steep</title>
<style>{styles}</style>
</head>
<body>
{body}
<div class="footer">
<p>{count} saves from {start} to {end}. Forward more posts to {alias}.</p>
<p><a href="{dashboard}">Open your dashboard</a></p>
</div>
</body>
</html>
"#,
        styles = DIGEST_STYLES,
        body = render_markdown(&digest.digest_content),
        count = digest.post_count,
        start = digest.week_start,
        end = digest.week_end,
        alias = user.inbound_email,
        dashboard = dashboard_url,
    )
}

/// Subject line for the weekly digest email.
pub fn digest_subject(post_count: i64) -> String {
    format!("☕ Your Weekly Steep ({} saves)", post_count)
}

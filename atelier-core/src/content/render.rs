//! Read-side rendering of article bodies.
//!
//! Text blocks go through a deliberately small markdown subset: HTML
//! escaping, `**bold**`, `*italic*` and `[k]` citation links. Nothing else.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use once_cell::sync::Lazy;
use regex::Regex;

use super::block::{BlockBody, ContentBlock, SourceCitation};
use super::citations::link_citations_where;
use super::codec::DecodedContent;

/// Entities and the exact markup this module emits. These survive escaping
/// untouched, which is what makes rendering idempotent.
static PASSTHROUGH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r##"&(?:amp|lt|gt|quot|#\d+|#x[0-9a-fA-F]+);|</?strong>|</?em>|<a href="#source-\d+" class="citation-link">|</a>"##,
    )
    .expect("passthrough regex")
});

// Emphasis never spans another asterisk or markup, so a stray `*` left over
// from one pass cannot pair up across emitted tags on the next
static BOLD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*([^*<>]+?)\*\*").expect("bold regex"));
static ITALIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*([^*<>]+?)\*").expect("italic regex"));

/// Escape `&`, `<`, `>` and `"` unconditionally. For attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Escape text while leaving entities and renderer-emitted tags intact
fn escape_preserving_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for m in PASSTHROUGH_RE.find_iter(text) {
        out.push_str(&escape_html(&text[last..m.start()]));
        out.push_str(m.as_str());
        last = m.end();
    }
    out.push_str(&escape_html(&text[last..]));
    out
}

/// Render one text block's raw content to inline markup.
///
/// `source_count` bounds which `[k]` markers become citation anchors.
pub fn simple_markdown_to_html(text: &str, source_count: usize) -> String {
    render_inline(text, |num| num as usize <= source_count)
}

fn render_inline(text: &str, known: impl Fn(u32) -> bool) -> String {
    let escaped = escape_preserving_markup(text);
    // ** before *, otherwise the inner pair of a bold run is eaten as italic
    let bold = BOLD_RE.replace_all(&escaped, "<strong>$1</strong>");
    let italic = ITALIC_RE.replace_all(&bold, "<em>$1</em>");
    link_citations_where(&italic, known)
}

/// Render decoded blocks and sources to an HTML fragment.
///
/// Sources keep their stored numbers: a `[k]` marker links to the listed
/// source numbered `k`, and list entries carry that number as anchor and
/// label. Blank sources are skipped without shifting the others.
pub fn render_blocks(blocks: &[ContentBlock], sources: &[SourceCitation]) -> String {
    let sources: Vec<&SourceCitation> = sources
        .iter()
        .filter(|source| !source.text.trim().is_empty())
        .collect();
    let numbers: BTreeSet<u32> = sources.iter().map(|source| source.num).collect();
    let mut html = String::new();

    for block in blocks {
        match &block.body {
            BlockBody::Text { content } => {
                if content.trim().is_empty() {
                    continue;
                }
                let _ = writeln!(
                    html,
                    r#"<p class="article-text">{}</p>"#,
                    render_inline(content, |num| numbers.contains(&num))
                );
            }
            BlockBody::Image { url, alt } => {
                if url.trim().is_empty() {
                    continue;
                }
                let _ = write!(
                    html,
                    r#"<figure class="article-image"><img src="{}" alt="{}" loading="lazy" />"#,
                    escape_html(url),
                    escape_html(alt)
                );
                if !alt.trim().is_empty() {
                    let _ = write!(html, "<figcaption>{}</figcaption>", escape_html(alt));
                }
                html.push_str("</figure>\n");
            }
        }
    }

    if !sources.is_empty() {
        html.push_str("<section class=\"article-sources\">\n<h3>Sources</h3>\n<ol>\n");
        let mut anchored = BTreeSet::new();
        for source in &sources {
            // Duplicate numbers keep their text but not a second anchor
            if anchored.insert(source.num) {
                let _ = writeln!(
                    html,
                    r#"<li id="{}" value="{}">{}</li>"#,
                    source.anchor_id(),
                    source.num,
                    escape_html(&source.text)
                );
            } else {
                let _ = writeln!(
                    html,
                    r#"<li value="{}">{}</li>"#,
                    source.num,
                    escape_html(&source.text)
                );
            }
        }
        html.push_str("</ol>\n</section>\n");
    }

    html
}

/// Render a persisted article body.
///
/// Legacy bodies predate the block editor and are already HTML, so they are
/// returned as stored.
pub fn render_article(content: &str) -> String {
    match DecodedContent::decode(content) {
        DecodedContent::Legacy(body) => body,
        DecodedContent::Blocks { blocks, sources } => render_blocks(&blocks, &sources),
    }
}

//! Minimal markdown rendering for comment bodies, plus @mention extraction.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use ts_rs::TS;

static BOLD_STARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*").unwrap());
static BOLD_UNDERSCORES: Lazy<Regex> = Lazy::new(|| Regex::new(r"__(.+?)__").unwrap());
static ITALIC_STAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*(.+?)\*").unwrap());
static STRIKE: Lazy<Regex> = Lazy::new(|| Regex::new(r"~~(.+?)~~").unwrap());
static FENCED_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```(\w*)\n([\s\S]*?)```").unwrap());
static INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`(.+?)`").unwrap());
static LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\[(.+?)\]\((https?://[^\s)"]+)\)"#).unwrap());
static MENTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"@([a-zA-Z0-9_.-]+)").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
pub struct Mention {
    pub username: String,
    /// Byte offset of the `@`.
    pub start: usize,
    pub end: usize,
}

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// `_x_` to `<em>x</em>` when neither underscore touches a word character,
/// so identifiers such as @first_last stay literal. A closing underscore may
/// sit right before the next opening one's delimiter.
fn italic_underscores(html: &str) -> String {
    let chars: Vec<(usize, char)> = html.char_indices().collect();
    let mut out = String::with_capacity(html.len());
    let mut copied = 0;
    let mut i = 0;
    while i < chars.len() {
        let (open_at, c) = chars[i];
        let opens = c == '_' && (i == 0 || !is_word(chars[i - 1].1));
        if !opens {
            i += 1;
            continue;
        }
        let close = chars[i + 1..]
            .iter()
            .position(|&(_, c)| c == '_' || c == '\n')
            .map(|offset| i + 1 + offset);
        let Some(j) = close else { break };
        let closes = chars[j].1 == '_'
            && j > i + 1
            && chars.get(j + 1).is_none_or(|&(_, next)| !is_word(next));
        if !closes {
            i = j;
            continue;
        }
        let close_at = chars[j].0;
        out.push_str(&html[copied..open_at]);
        out.push_str("<em>");
        out.push_str(&html[open_at + 1..close_at]);
        out.push_str("</em>");
        copied = close_at + 1;
        i = j + 1;
    }
    out.push_str(&html[copied..]);
    out
}

/// Apply `f` to text between tags, leaving emitted markup (and its attributes) untouched.
fn map_text_outside_tags(html: &str, f: impl Fn(&str) -> String) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(start) = rest.find('<') {
        out.push_str(&f(&rest[..start]));
        let end = rest[start..].find('>').map_or(rest.len(), |e| start + e + 1);
        out.push_str(&rest[start..end]);
        rest = &rest[end..];
    }
    out.push_str(&f(rest));
    out
}

pub fn render(content: &str) -> String {
    let html = escape_html(content);
    let html = BOLD_STARS.replace_all(&html, "<strong>$1</strong>");
    let html = BOLD_UNDERSCORES.replace_all(&html, "<strong>$1</strong>");
    let html = ITALIC_STAR.replace_all(&html, "<em>$1</em>");
    let html = italic_underscores(&html);
    let html = STRIKE.replace_all(&html, "<del>$1</del>");
    let html = FENCED_CODE.replace_all(&html, r#"<pre><code class="language-$1">$2</code></pre>"#);
    let html = INLINE_CODE.replace_all(&html, "<code>$1</code>");
    let html = LINK.replace_all(
        &html,
        r#"<a href="$2" target="_blank" rel="noopener noreferrer">$1</a>"#,
    );
    let html = map_text_outside_tags(&html, |text| {
        MENTION
            .replace_all(text, r#"<span class="mention" data-username="$1">@$1</span>"#)
            .into_owned()
    });
    html.replace('\n', "<br>")
}

/// Every distinct @username in `content`, first occurrence wins.
pub fn extract_mentions(content: &str) -> Vec<Mention> {
    let mut seen = HashSet::new();
    MENTION
        .captures_iter(content)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let username = caps.get(1)?.as_str();
            seen.insert(username.to_lowercase()).then(|| Mention {
                username: username.to_string(),
                start: whole.start(),
                end: whole.end(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escapes_before_formatting() {
        assert_eq!(
            render("<script> & **bold**"),
            "&lt;script&gt; &amp; <strong>bold</strong>"
        );
    }

    #[test]
    fn test_inline_styles() {
        assert_eq!(render("*it* and ~~gone~~"), "<em>it</em> and <del>gone</del>");
        assert_eq!(render("use `cargo`"), "use <code>cargo</code>");
        assert_eq!(render("_soft_ note"), "<em>soft</em> note");
    }

    #[test]
    fn test_links_require_http_scheme() {
        assert_eq!(
            render("[site](https://example.org)"),
            r#"<a href="https://example.org" target="_blank" rel="noopener noreferrer">site</a>"#
        );
        assert_eq!(render("[x](javascript:alert)"), "[x](javascript:alert)");
    }

    #[test]
    fn test_adjacent_underscore_italics() {
        assert_eq!(render("_a_ _b_"), "<em>a</em> <em>b</em>");
        assert_eq!(render("see _one_, _two_"), "see <em>one</em>, <em>two</em>");
        assert_eq!(render("snake_case_name stays"), "snake_case_name stays");
        assert_eq!(render("foo_bar _baz_"), "foo_bar <em>baz</em>");
        assert_eq!(render("__"), "__");
    }

    #[test]
    fn test_mentions_skip_link_attributes() {
        assert_eq!(
            render("[x](https://a.b/@user)"),
            r#"<a href="https://a.b/@user" target="_blank" rel="noopener noreferrer">x</a>"#
        );
        assert_eq!(
            render("[@sara](https://a.b)"),
            r#"<a href="https://a.b" target="_blank" rel="noopener noreferrer"><span class="mention" data-username="sara">@sara</span></a>"#
        );
    }

    #[test]
    fn test_mentions_and_line_breaks() {
        assert_eq!(
            render("hi @sara_k\nthanks"),
            r#"hi <span class="mention" data-username="sara_k">@sara_k</span><br>thanks"#
        );
    }

    #[test]
    fn test_fenced_code_block() {
        let html = render("```rust\nlet x = 1;\n```");
        assert!(html.starts_with(r#"<pre><code class="language-rust">let x = 1;"#));
    }

    #[test]
    fn test_extract_mentions_offsets_and_dedup() {
        let text = "ping @ali and @noor.h then @Ali again";
        let mentions = extract_mentions(text);
        assert_eq!(mentions.len(), 2);
        assert_eq!(mentions[0].username, "ali");
        assert_eq!(&text[mentions[0].start..mentions[0].end], "@ali");
        assert_eq!(mentions[1].username, "noor.h");
        assert_eq!(mentions[1].start, 14);
    }

    #[test]
    fn test_extract_mentions_byte_offsets_with_arabic() {
        let text = "مرحبا @omar";
        let mentions = extract_mentions(text);
        assert_eq!(&text[mentions[0].start..mentions[0].end], "@omar");
    }
}

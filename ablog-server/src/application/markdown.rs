//! Markdown subset rendered to HTML for post previews and post pages.
//!
//! Block rules run line by line (fenced code, headings, quotes, lists, rules,
//! paragraphs); inline rules then run over the escaped text of each block in
//! a fixed order: code spans, images, links, bold, italic, strikethrough.
//! Input is never rejected: anything that does not parse is emitted as text.

const EXCERPT_CHARS: usize = 160;

pub fn render_markdown(source: &str) -> String {
    let mut renderer = BlockRenderer::default();
    for line in source.lines() {
        renderer.line(line);
    }
    renderer.finish()
}

/// Text content of the rendered markdown with tags removed and whitespace collapsed.
pub fn plain_text(source: &str) -> String {
    let html = render_markdown(source);

    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => {
                in_tag = true;
                text.push(' ');
            }
            '>' if in_tag => in_tag = false,
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }

    let text = text
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Summary used when a post is saved without an explicit excerpt.
pub fn excerpt(source: &str) -> String {
    let text = plain_text(source);
    if text.chars().count() <= EXCERPT_CHARS {
        return text;
    }

    let cut: String = text.chars().take(EXCERPT_CHARS).collect();
    format!("{}...", cut.trim_end())
}

#[derive(Default)]
struct BlockRenderer {
    out: String,
    paragraph: Vec<String>,
    quote: Vec<String>,
    list: Option<(ListKind, Vec<String>)>,
    code: Option<(String, Vec<String>)>,
}

#[derive(Clone, Copy, PartialEq)]
enum ListKind {
    Unordered,
    Ordered,
}

impl BlockRenderer {
    fn line(&mut self, line: &str) {
        if let Some((_, lines)) = &mut self.code {
            if line.trim_start().starts_with("```") {
                self.close_code();
            } else {
                lines.push(line.to_string());
            }
            return;
        }

        let trimmed = line.trim();

        if let Some(lang) = trimmed.strip_prefix("```") {
            self.flush();
            self.code = Some((lang.trim().to_string(), Vec::new()));
        } else if trimmed.is_empty() {
            self.flush();
        } else if let Some((level, text)) = heading(trimmed) {
            self.flush();
            self.out.push_str(&format!(
                "<h{level}>{}</h{level}>\n",
                render_inline(text)
            ));
        } else if is_rule(trimmed) {
            self.flush();
            self.out.push_str("<hr>\n");
        } else if let Some(text) = trimmed.strip_prefix('>') {
            self.flush_paragraph();
            self.flush_list();
            self.quote.push(text.trim().to_string());
        } else if let Some((kind, text)) = list_item(trimmed) {
            self.flush_paragraph();
            self.flush_quote();
            if self.list.as_ref().is_some_and(|(k, _)| *k != kind) {
                self.flush_list();
            }
            self.list
                .get_or_insert_with(|| (kind, Vec::new()))
                .1
                .push(text.to_string());
        } else {
            self.flush_quote();
            self.flush_list();
            self.paragraph.push(trimmed.to_string());
        }
    }

    fn finish(mut self) -> String {
        // an unterminated fence still renders as code
        if self.code.is_some() {
            self.close_code();
        }
        self.flush();
        self.out
    }

    fn close_code(&mut self) {
        if let Some((lang, lines)) = self.code.take() {
            let class = if lang.is_empty() {
                String::new()
            } else {
                format!(" class=\"language-{}\"", escape_html(&lang))
            };
            self.out.push_str(&format!(
                "<pre><code{}>{}</code></pre>\n",
                class,
                escape_html(&lines.join("\n"))
            ));
        }
    }

    fn flush(&mut self) {
        self.flush_paragraph();
        self.flush_quote();
        self.flush_list();
    }

    fn flush_paragraph(&mut self) {
        if self.paragraph.is_empty() {
            return;
        }
        let lines: Vec<String> = self.paragraph.drain(..).map(|l| render_inline(&l)).collect();
        self.out
            .push_str(&format!("<p>{}</p>\n", lines.join("<br>\n")));
    }

    fn flush_quote(&mut self) {
        if self.quote.is_empty() {
            return;
        }
        let lines: Vec<String> = self.quote.drain(..).map(|l| render_inline(&l)).collect();
        self.out.push_str(&format!(
            "<blockquote><p>{}</p></blockquote>\n",
            lines.join("<br>\n")
        ));
    }

    fn flush_list(&mut self) {
        let Some((kind, items)) = self.list.take() else {
            return;
        };
        let tag = match kind {
            ListKind::Unordered => "ul",
            ListKind::Ordered => "ol",
        };
        self.out.push_str(&format!("<{}>\n", tag));
        for item in items {
            self.out
                .push_str(&format!("<li>{}</li>\n", render_inline(&item)));
        }
        self.out.push_str(&format!("</{}>\n", tag));
    }
}

fn heading(line: &str) -> Option<(usize, &str)> {
    let level = line.chars().take_while(|&c| c == '#').count();
    if !(1..=6).contains(&level) {
        return None;
    }
    let rest = &line[level..];
    if rest.starts_with(' ') {
        Some((level, rest.trim()))
    } else {
        None
    }
}

fn is_rule(line: &str) -> bool {
    line.len() >= 3 && (line.chars().all(|c| c == '-') || line.chars().all(|c| c == '*'))
}

fn list_item(line: &str) -> Option<(ListKind, &str)> {
    for marker in ["- ", "* ", "+ "] {
        if let Some(text) = line.strip_prefix(marker) {
            return Some((ListKind::Unordered, text.trim()));
        }
    }

    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        if let Some(text) = line[digits..].strip_prefix(". ") {
            return Some((ListKind::Ordered, text.trim()));
        }
    }
    None
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Inline rules over one line of raw text.
fn render_inline(text: &str) -> String {
    let escaped = escape_html(text);

    // odd-indexed pieces sit between backticks
    let pieces: Vec<&str> = escaped.split('`').collect();
    let closed = pieces.len() % 2 == 1;
    let mut out = String::with_capacity(escaped.len());

    for (i, piece) in pieces.iter().enumerate() {
        let is_code = i % 2 == 1 && (closed || i + 1 < pieces.len());
        if is_code {
            out.push_str("<code>");
            out.push_str(piece);
            out.push_str("</code>");
        } else {
            if i % 2 == 1 {
                // dangling backtick
                out.push('`');
            }
            out.push_str(&render_links(piece));
        }
    }
    out
}

/// Images and links; the text around and inside them gets emphasis rules.
fn render_links(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find('[') {
        let is_image = open > 0 && rest[..open].ends_with('!');
        let after_open = &rest[open + 1..];

        let parsed = after_open.find("](").and_then(|close| {
            let label = &after_open[..close];
            let after_label = &after_open[close + 2..];
            after_label
                .find(')')
                .map(|end| (label, &after_label[..end], &after_label[end + 1..]))
        });

        let Some((label, url, remainder)) = parsed else {
            out.push_str(&render_emphasis(&rest[..open + 1]));
            rest = after_open;
            continue;
        };

        let prefix_end = if is_image { open - 1 } else { open };
        out.push_str(&render_emphasis(&rest[..prefix_end]));

        let url = url.trim();
        if is_image {
            if is_safe_url(url) {
                out.push_str(&format!("<img src=\"{}\" alt=\"{}\">", url, label));
            } else {
                out.push_str(label);
            }
        } else if is_safe_url(url) {
            out.push_str(&format!(
                "<a href=\"{}\">{}</a>",
                url,
                render_emphasis(label)
            ));
        } else {
            out.push_str(&render_emphasis(label));
        }

        rest = remainder;
    }

    out.push_str(&render_emphasis(rest));
    out
}

fn render_emphasis(text: &str) -> String {
    let text = replace_delimited(text, "**", "strong", false);
    let text = replace_delimited(&text, "__", "strong", true);
    let text = replace_delimited(&text, "~~", "del", false);
    let text = replace_delimited(&text, "*", "em", false);
    replace_delimited(&text, "_", "em", true)
}

/// Wraps `delim`-enclosed runs in `tag`.
///
/// The enclosed text must not start or end with whitespace. With
/// `word_bound`, the delimiters must not touch letters or digits on the
/// outside, so `snake_case_names` stay intact.
fn replace_delimited(text: &str, delim: &str, tag: &str, word_bound: bool) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find(delim) {
        let inner_start = start + delim.len();
        let after = &rest[inner_start..];

        let opens_ok = !word_bound
            || !rest[..start]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric());

        let close = after.find(delim).filter(|&end| {
            let inner = &after[..end];
            let tight = !inner.is_empty()
                && !inner.starts_with(char::is_whitespace)
                && !inner.ends_with(char::is_whitespace);
            let closes_ok = !word_bound
                || !after[end + delim.len()..]
                    .chars()
                    .next()
                    .is_some_and(|c| c.is_alphanumeric());
            tight && closes_ok
        });

        match close {
            Some(end) if opens_ok => {
                out.push_str(&rest[..start]);
                out.push_str(&format!("<{tag}>{}</{tag}>", &after[..end]));
                rest = &after[end + delim.len()..];
            }
            _ => {
                out.push_str(&rest[..inner_start]);
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Allows web and mail links plus relative targets; rejects `javascript:` and friends.
fn is_safe_url(url: &str) -> bool {
    if url.is_empty() {
        return false;
    }

    let lower = url.to_ascii_lowercase();
    let scheme_end = lower.find(':');
    let path_start = lower.find(['/', '?', '#']);

    match (scheme_end, path_start) {
        (Some(colon), Some(slash)) if slash < colon => true,
        (Some(_), _) => {
            lower.starts_with("http:") || lower.starts_with("https:") || lower.starts_with("mailto:")
        }
        (None, _) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headings_and_paragraphs() {
        let html = render_markdown("# Title\n\nFirst line\nsecond line\n\n### Small");
        assert_eq!(
            html,
            "<h1>Title</h1>\n<p>First line<br>\nsecond line</p>\n<h3>Small</h3>\n"
        );
    }

    #[test]
    fn hash_without_space_is_text() {
        assert_eq!(render_markdown("#hashtag"), "<p>#hashtag</p>\n");
    }

    #[test]
    fn inline_emphasis_code_and_strike() {
        let html = render_markdown("**bold** and *italic* and `a * b` and ~~gone~~");
        assert_eq!(
            html,
            "<p><strong>bold</strong> and <em>italic</em> and <code>a * b</code> and <del>gone</del></p>\n"
        );
    }

    #[test]
    fn underscores_inside_words_are_left_alone() {
        assert_eq!(
            render_markdown("call snake_case_name or _this_"),
            "<p>call snake_case_name or <em>this</em></p>\n"
        );
    }

    #[test]
    fn links_and_images() {
        let html = render_markdown("See [the *docs*](https://example.com/a_b) ![cat](/img/cat.png)");
        assert_eq!(
            html,
            "<p>See <a href=\"https://example.com/a_b\">the <em>docs</em></a> <img src=\"/img/cat.png\" alt=\"cat\"></p>\n"
        );
    }

    #[test]
    fn unsafe_links_are_dropped() {
        let html = render_markdown("[click](javascript:alert(1))");
        assert!(!html.contains("href"));
        assert!(html.contains("click"));
    }

    #[test]
    fn raw_html_is_escaped() {
        let html = render_markdown("<script>alert('x')</script>");
        assert_eq!(
            html,
            "<p>&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;</p>\n"
        );
    }

    #[test]
    fn lists_quotes_rules_and_code() {
        let source = "- one\n- two\n1. first\n> quoted\n---\n```rust\nlet x = 1 < 2;\n```";
        let html = render_markdown(source);
        assert_eq!(
            html,
            "<ul>\n<li>one</li>\n<li>two</li>\n</ul>\n\
             <ol>\n<li>first</li>\n</ol>\n\
             <blockquote><p>quoted</p></blockquote>\n\
             <hr>\n\
             <pre><code class=\"language-rust\">let x = 1 &lt; 2;</code></pre>\n"
        );
    }

    #[test]
    fn unterminated_fence_still_renders() {
        assert_eq!(
            render_markdown("```\nraw *text*"),
            "<pre><code>raw *text*</code></pre>\n"
        );
    }

    #[test]
    fn excerpt_strips_markup_and_truncates() {
        assert_eq!(excerpt("# Hi\n\nSome **bold** & more"), "Hi Some bold & more");

        let long = "word ".repeat(100);
        let summary = excerpt(&long);
        assert!(summary.ends_with("..."));
        assert!(summary.chars().count() <= EXCERPT_CHARS + 3);
    }
}

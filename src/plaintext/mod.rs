//! HTML to plaintext conversion.
//!
//! Every envelope carries a plaintext fallback derived from its HTML body.
//! The conversion is a narrow collaborator seam; [`TagStripper`] is the
//! built-in implementation.

/// Conversion options
#[derive(Debug, Clone, Copy)]
pub struct PlainTextOptions {
    /// Drop `<img>` elements entirely instead of keeping their alt text
    pub strip_images: bool,
}

impl Default for PlainTextOptions {
    fn default() -> Self {
        Self { strip_images: true }
    }
}

/// Port for deriving a plaintext body from rendered HTML.
pub trait HtmlToText: Send + Sync {
    fn to_plain_text(&self, html: &str, options: PlainTextOptions) -> String;
}

/// Built-in tag-stripping converter.
///
/// Removes markup, decodes the common entities, keeps line structure for
/// block-level elements, and skips `<style>`/`<script>` content.
pub struct TagStripper;

impl HtmlToText for TagStripper {
    fn to_plain_text(&self, html: &str, options: PlainTextOptions) -> String {
        let mut out = String::with_capacity(html.len());
        let mut chars = html.char_indices().peekable();
        let mut skip_until_close: Option<&str> = None;

        while let Some((idx, ch)) = chars.next() {
            if ch != '<' {
                if skip_until_close.is_none() {
                    out.push(ch);
                }
                continue;
            }

            // Collect the raw tag up to the closing '>'
            let rest = &html[idx + 1..];
            let Some(end) = rest.find('>') else {
                // Unterminated tag: drop the remainder
                break;
            };
            let tag = &rest[..end];
            let close_idx = idx + 1 + end;
            while let Some(&(i, _)) = chars.peek() {
                if i > close_idx {
                    break;
                }
                chars.next();
            }

            let name = tag_name(tag);

            if let Some(awaited) = skip_until_close {
                if tag.starts_with('/') && name == awaited {
                    skip_until_close = None;
                }
                continue;
            }

            match name {
                "style" | "script" if !tag.starts_with('/') => {
                    skip_until_close = Some(name);
                }
                "img" => {
                    if !options.strip_images {
                        if let Some(alt) = attribute_value(tag, "alt") {
                            out.push_str(&alt);
                        }
                    }
                }
                "br" => out.push('\n'),
                _ if tag.starts_with('/') && is_block(name) => out.push('\n'),
                _ => {}
            }
        }

        collapse(&decode_entities(&out))
    }
}

fn tag_name(tag: &str) -> &str {
    tag.trim_start_matches('/')
        .split(|c: char| c.is_whitespace() || c == '/' || c == '>')
        .next()
        .unwrap_or("")
        .trim_end_matches('/')
}

fn is_block(name: &str) -> bool {
    matches!(
        name,
        "p" | "div" | "li" | "tr" | "table" | "ul" | "ol" | "blockquote" | "h1" | "h2" | "h3"
            | "h4" | "h5" | "h6"
    )
}

fn attribute_value(tag: &str, attribute: &str) -> Option<String> {
    let lower = tag.to_ascii_lowercase();
    let marker = format!("{attribute}=\"");
    let start = lower.find(&marker)? + marker.len();
    let end = tag[start..].find('"')? + start;
    Some(tag[start..end].to_string())
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Collapse runs of blank lines and trim the result
fn collapse(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0usize;

    for line in text.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
            out.push('\n');
        } else {
            blank_run = 0;
            out.push_str(line);
            out.push('\n');
        }
    }

    out.trim().to_string()
}

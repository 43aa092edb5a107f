//! Structural allowlist for generated markup.
//!
//! The fragment is parsed with `scraper` and re-serialized keeping only a
//! small set of formatting elements. Attributes are dropped except `href` on
//! links with a web or mail scheme. Active content is removed together with
//! everything inside it; any other element is unwrapped to its children.

use scraper::{ElementRef, Html, Node};

use crate::export::escape_html;

/// Elements kept as-is (without attributes).
const ALLOWED: &[&str] = &[
    "p", "ul", "ol", "li", "strong", "b", "em", "i", "blockquote", "h3", "h4",
];

/// Elements removed with their whole subtree.
const DROPPED: &[&str] = &[
    "script", "style", "iframe", "frame", "frameset", "object", "embed", "applet", "noscript",
    "template", "svg", "math", "title", "textarea", "select", "button", "form",
];

/// Rebuild `html` from allowed elements and text only.
pub fn allowlist(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut out = String::with_capacity(html.len());
    write_children(fragment.root_element(), &mut out);
    out
}

fn write_children(parent: ElementRef<'_>, out: &mut String) {
    for child in parent.children() {
        match child.value() {
            Node::Text(text) => out.push_str(&escape_text(text)),
            Node::Element(_) => {
                if let Some(element) = ElementRef::wrap(child) {
                    write_element(element, out);
                }
            }
            _ => {}
        }
    }
}

fn write_element(element: ElementRef<'_>, out: &mut String) {
    let name = element.value().name();
    if DROPPED.contains(&name) {
        return;
    }

    match name {
        "br" => out.push_str("<br>"),
        "a" => match element.value().attr("href").filter(|href| is_safe_href(href)) {
            Some(href) => {
                out.push_str(&format!("<a href=\"{}\">", escape_html(href.trim())));
                write_children(element, out);
                out.push_str("</a>");
            }
            None => write_children(element, out),
        },
        _ if ALLOWED.contains(&name) => {
            out.push_str(&format!("<{name}>"));
            write_children(element, out);
            out.push_str(&format!("</{name}>"));
        }
        _ => write_children(element, out),
    }
}

fn is_safe_href(href: &str) -> bool {
    let href = href.trim().to_ascii_lowercase();
    ["http://", "https://", "mailto:"]
        .iter()
        .any(|scheme| href.starts_with(scheme))
}

// Text nodes only need the structural characters escaped.
fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_and_style_removed_with_contents() {
        let out = allowlist(
            "<p>Safe.</p><script>alert(document.cookie)</script><style>p{}</style><p>After.</p>",
        );
        assert_eq!(out, "<p>Safe.</p><p>After.</p>");
    }

    #[test]
    fn event_handlers_and_images_stripped() {
        let out = allowlist(r#"<p onclick="steal()">Text<img src=x onerror="alert(1)"></p>"#);
        assert_eq!(out, "<p>Text</p>");
    }

    #[test]
    fn script_urls_lose_their_link() {
        let out = allowlist(r#"<p><a href="javascript:alert(2)">more</a></p>"#);
        assert_eq!(out, "<p>more</p>");
        let out = allowlist(r#"<p><a href=" JaVaScRiPt:alert(2)">more</a></p>"#);
        assert_eq!(out, "<p>more</p>");
    }

    #[test]
    fn web_links_keep_href_only() {
        let out = allowlist(
            r#"<p><a href="https://fda.gov/ai" target="_blank" style="color:red">FDA</a></p>"#,
        );
        assert_eq!(out, r#"<p><a href="https://fda.gov/ai">FDA</a></p>"#);
    }

    #[test]
    fn unknown_elements_are_unwrapped() {
        let out = allowlist("<div><p><span>Kept</span> <em>text</em></p></div>");
        assert_eq!(out, "<p>Kept <em>text</em></p>");
    }

    #[test]
    fn clean_markup_passes_through() {
        let input = "<p>One &amp; two</p>\n<ul><li><strong>Three</strong></li></ul>";
        assert_eq!(allowlist(input), input);
    }

    #[test]
    fn plain_text_is_escaped() {
        assert_eq!(allowlist("a < b"), "a &lt; b");
    }
}

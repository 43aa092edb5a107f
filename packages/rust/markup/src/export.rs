//! Render a finished document to JSON, a standalone HTML page, or Markdown.

use std::fmt::Write as _;
use std::str::FromStr;

use letterpress_shared::{FinalDocument, LetterpressError, Result};

/// Output formats for a finished document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Json,
    Html,
    Markdown,
}

impl FromStr for ExportFormat {
    type Err = LetterpressError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "html" => Ok(Self::Html),
            "md" | "markdown" => Ok(Self::Markdown),
            other => Err(LetterpressError::validation(format!(
                "unknown export format '{other}': expected json, html, or markdown"
            ))),
        }
    }
}

/// Render `doc` in the requested format.
pub fn export(doc: &FinalDocument, format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Json => serde_json::to_string_pretty(doc)
            .map_err(|e| LetterpressError::parse(format!("failed to serialize document: {e}"))),
        ExportFormat::Html => Ok(render_html(doc)),
        ExportFormat::Markdown => render_markdown(doc),
    }
}

/// Render a standalone HTML page.
pub fn render_html(doc: &FinalDocument) -> String {
    let mut out = String::from("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    let _ = writeln!(out, "<title>{}</title>", escape_html(&doc.header.title));
    out.push_str("</head>\n<body>\n");
    out.push_str(&render_body(doc));
    out.push_str("</body>\n</html>\n");
    out
}

/// Render Markdown by converting the HTML body with `htmd`.
pub fn render_markdown(doc: &FinalDocument) -> Result<String> {
    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style"])
        .build();

    let markdown = converter
        .convert(&render_body(doc))
        .map_err(|e| LetterpressError::parse(format!("htmd conversion failed: {e}")))?;

    Ok(format!("{}\n", markdown.trim_end()))
}

fn render_body(doc: &FinalDocument) -> String {
    let header = &doc.header;
    let mut out = String::from("<header>\n");
    if let Some(logo) = &header.logo_url {
        let alt = header.brand_name.as_deref().unwrap_or("logo");
        let _ = writeln!(out, "<img src=\"{}\" alt=\"{}\">", escape_html(logo), escape_html(alt));
    }
    if let Some(brand) = &header.brand_name {
        let _ = writeln!(out, "<p><strong>{}</strong></p>", escape_html(brand));
    }
    let _ = writeln!(out, "<h1>{}</h1>", escape_html(&header.title));
    if !header.subtitle.is_empty() {
        let _ = writeln!(out, "<p><em>{}</em></p>", escape_html(&header.subtitle));
    }
    let _ = writeln!(out, "<p>{}</p>", header.date.format("%B %-d, %Y"));
    out.push_str("</header>\n");

    for section in &doc.sections {
        let _ = writeln!(
            out,
            "<section data-type=\"{}\">\n<h2>{}</h2>",
            section.section_type.as_str(),
            escape_html(&section.title)
        );
        if let Some(image) = &section.image {
            let _ = writeln!(
                out,
                "<img src=\"{}\" alt=\"{}\">",
                escape_html(&image.url),
                escape_html(&image.alt)
            );
        }
        // Content has been through the allowlist in `sanitize_markup`.
        out.push_str(&section.content);
        out.push_str("\n</section>\n");
    }

    out.push_str("<footer>\n");
    let _ = writeln!(out, "<p>{}</p>", escape_html(&doc.footer.text));
    if !doc.footer.links.is_empty() {
        out.push_str("<ul>\n");
        for link in &doc.footer.links {
            let _ = writeln!(
                out,
                "<li><a href=\"{}\">{}</a></li>",
                escape_html(&link.url),
                escape_html(&link.label)
            );
        }
        out.push_str("</ul>\n");
    }
    out.push_str("</footer>\n");
    out
}

/// Escape text for use in HTML content or a quoted attribute.
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

//! HTML and plain-text page emission.

use std::fmt::Write;

use thiserror::Error;

use super::attributes::Attribute;

/// Rendering failed while producing the page body.
///
/// Surfaced by the HTTP layer as a 500 with the message as body.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to write page body: {0}")]
    Write(#[from] std::fmt::Error),
}

/// Output format for the attribute page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageFormat {
    Html,
    Text,
}

impl PageFormat {
    /// Resolve the `format` query parameter. Only the literal `text` selects
    /// the plain-text page; anything else (including absent) is HTML.
    pub fn from_query(value: Option<&str>) -> Self {
        match value {
            Some("text") => PageFormat::Text,
            _ => PageFormat::Html,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            PageFormat::Html => "text/html",
            PageFormat::Text => "text/plain",
        }
    }
}

/// A rendered page body plus its content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub body: String,
    pub content_type: &'static str,
}

/// Fixed page skeleton up to the closing of the "Actions" table.
const HTML_HEAD: &str = r#"<!DOCTYPE html>
<html>
<head>
<title>saml-sp</title>
<style>
body {
	font-family: monospace;
	color: #555;
	background: #e6edf4;
	padding: 1.25rem;
	margin: 0;
}
table {
	background: #fff;
	border: .0625rem solid #c4cdda;
	border-radius: 0 0 .25rem .25rem;
	border-spacing: 0;
	margin-bottom: 1.25rem;
	padding: .75rem 1.25rem;
	text-align: left;
	white-space: pre;
}
table > caption {
	background: #f1f6fb;
	text-align: left;
	font-weight: bold;
	padding: .75rem 1.25rem;
	border: .0625rem solid #c4cdda;
	border-radius: .25rem .25rem 0 0;
	border-bottom: 0;
}
table td, table th {
	padding: .25rem;
}
table > tbody > tr:hover {
	background: #f1f6fb;
}
</style>
</head>
<body>
	<table>
		<caption>Actions</caption>
		<tbody>
			<tr><td><a href="/login">login</a></td></tr>
		</tbody>
	</table>
"#;

/// Render the attribute page in the requested format.
///
/// Pure: identical inputs produce byte-identical output.
pub fn render(attributes: &[Attribute], format: PageFormat) -> Result<RenderedPage, RenderError> {
    let body = match format {
        PageFormat::Text => render_text(attributes)?,
        PageFormat::Html => render_html(attributes)?,
    };

    Ok(RenderedPage {
        body,
        content_type: format.content_type(),
    })
}

fn render_text(attributes: &[Attribute]) -> Result<String, RenderError> {
    let mut out = String::new();
    out.push_str("# SAML Attributes\n");
    for attr in attributes {
        for value in &attr.values {
            writeln!(out, "{}: {}", attr.name, value)?;
        }
    }
    Ok(out)
}

fn render_html(attributes: &[Attribute]) -> Result<String, RenderError> {
    let mut out = String::from(HTML_HEAD);

    if !attributes.is_empty() {
        out.push_str("\t<table>\n\t\t<caption>SAML Attributes</caption>\n\t\t<tbody>\n");
        for attr in attributes {
            for value in &attr.values {
                writeln!(
                    out,
                    "\t\t\t<tr>\n\t\t\t\t<th>{}</th>\n\t\t\t\t<td>{}</td>\n\t\t\t</tr>",
                    escape_html(&attr.name),
                    escape_html(value),
                )?;
            }
        }
        out.push_str("\t\t</tbody>\n\t</table>\n");
    }

    out.push_str("</body>\n</html>\n");
    Ok(out)
}

fn escape_html(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

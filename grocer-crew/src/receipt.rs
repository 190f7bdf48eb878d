//! Receipt loading

use std::path::Path;

use pulldown_cmark::{html, Options, Parser};
use tracing::debug;

use grocer_error::{Error, Result};

/// Read a receipt markdown file and render it to HTML for prompting.
///
/// Line endings become `\n`, trailing whitespace is dropped and runs of
/// blank lines collapse to one before rendering. Tables are supported.
pub fn load_receipt(path: &Path) -> Result<String> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| Error::io_at(path, e).with_operation("receipt::load"))?;

    let text = normalize(&raw);
    if text.is_empty() {
        return Err(Error::invalid_argument(format!("receipt {} is empty", path.display()))
            .with_operation("receipt::load")
            .with_context("path", path.display().to_string()));
    }

    let rendered = render(&text);
    debug!(path = %path.display(), chars = rendered.len(), "loaded receipt");
    Ok(rendered)
}

fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut blank_run = false;
    for line in raw.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            if !blank_run && !out.is_empty() {
                out.push('\n');
            }
            blank_run = true;
            continue;
        }
        blank_run = false;
        out.push_str(line);
        out.push('\n');
    }
    out.trim_end().to_string()
}

fn render(markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, Options::ENABLE_TABLES);
    let mut out = String::with_capacity(markdown.len() * 2);
    html::push_html(&mut out, parser);
    out.trim_end().to_string()
}

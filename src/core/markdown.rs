//! Readme rendering
//!
//! Project and part readmes are Markdown; the rendered HTML is recomputed
//! at every build and carried alongside the raw text.

use pulldown_cmark::{html as md_html, Options, Parser};

/// Render Markdown to an HTML fragment.
pub fn to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(markdown, options);
    let mut html = String::new();
    md_html::push_html(&mut html, parser);
    html
}

//! Markdown rendering
//!
//! Code blocks are emitted as `<pre><code class="language-x">` and highlighted
//! in the browser by highlight.js.

use pulldown_cmark::{html, CodeBlockKind, Event, Options, Parser, Tag};

/// Markdown renderer
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownRenderer;

impl MarkdownRenderer {
    pub fn new() -> Self {
        Self
    }

    fn options() -> Options {
        // Front-matter is handled separately, so no YAML metadata blocks
        Options::ENABLE_TABLES
            | Options::ENABLE_FOOTNOTES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS
            | Options::ENABLE_HEADING_ATTRIBUTES
            | Options::ENABLE_GFM
    }

    /// Render markdown to HTML
    pub fn render(&self, markdown: &str) -> String {
        let parser = Parser::new_ext(markdown, Self::options());
        let mut html_output = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut html_output, parser);
        html_output
    }

    /// Distinct languages of fenced code blocks, in first-seen order
    pub fn code_languages(&self, markdown: &str) -> Vec<String> {
        let mut languages: Vec<String> = Vec::new();
        for event in Parser::new_ext(markdown, Self::options()) {
            if let Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) = event {
                // Info strings may carry attributes after the language
                let lang = info
                    .split(|c: char| c.is_whitespace() || c == ',' || c == '{')
                    .next()
                    .unwrap_or("")
                    .to_lowercase();
                if !lang.is_empty() && !languages.contains(&lang) {
                    languages.push(lang);
                }
            }
        }
        languages
    }
}

//! Converts Markdown article bodies to HTML.
//!
//! There are two renderers. The full renderer (behind the `full-markdown`
//! feature) is built on [`pulldown_cmark`] and supports tables, footnotes,
//! syntax-highlighted fenced code and a table of contents; see
//! [`crate::htmlrenderer`]. The basic renderer is a naive line scanner which
//! only understands headings, fenced code, dash lists and paragraphs. Which
//! one is used is decided once, up front, by [`Renderer::resolve`].

use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::sync::OnceLock;

/// The kind of Markdown renderer to use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flavor {
    /// CommonMark with extensions, highlighting and a table of contents.
    Full,

    /// The line-based fallback renderer.
    Basic,
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Flavor::Full => f.write_str("full"),
            Flavor::Basic => f.write_str("basic"),
        }
    }
}

/// A Markdown-to-HTML strategy. Rendering is total: malformed input degrades
/// into odd-looking HTML, never into an error.
#[derive(Clone, Copy)]
pub struct Renderer {
    flavor: Flavor,
    render: fn(&str) -> String,
}

impl Renderer {
    /// Picks a renderer for the `requested` flavor (full if unspecified). If
    /// the full renderer was compiled out, this falls back to the basic one.
    pub fn resolve(requested: Option<Flavor>) -> Renderer {
        match requested.unwrap_or(Flavor::Full) {
            Flavor::Basic => Renderer::basic(),
            Flavor::Full => Renderer::full().unwrap_or_else(|| {
                tracing::warn!(
                    "full markdown renderer unavailable (built without `full-markdown`); \
                     using the basic renderer"
                );
                Renderer::basic()
            }),
        }
    }

    /// The line-based fallback renderer.
    pub fn basic() -> Renderer {
        Renderer {
            flavor: Flavor::Basic,
            render: render_basic,
        }
    }

    /// The full renderer, if it was compiled in.
    #[cfg(feature = "full-markdown")]
    pub fn full() -> Option<Renderer> {
        Some(Renderer {
            flavor: Flavor::Full,
            render: crate::htmlrenderer::to_html,
        })
    }

    /// The full renderer, if it was compiled in.
    #[cfg(not(feature = "full-markdown"))]
    pub fn full() -> Option<Renderer> {
        None
    }

    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    /// Renders `markdown` to HTML.
    pub fn render(&self, markdown: &str) -> String {
        (self.render)(markdown)
    }
}

impl fmt::Debug for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("flavor", &self.flavor)
            .finish()
    }
}

const FENCE: &str = "```";

static H3: OnceLock<Regex> = OnceLock::new();
static H2: OnceLock<Regex> = OnceLock::new();
static H1: OnceLock<Regex> = OnceLock::new();
static LIST_ITEM: OnceLock<Regex> = OnceLock::new();

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    // The patterns are literals below; compiling them can't fail.
    cell.get_or_init(|| Regex::new(pattern).unwrap())
}

// Returns the heading level and text if `line` is a `#`, `##` or `###`
// heading.
fn heading(line: &str) -> Option<(u8, &str)> {
    let levels: [(u8, &'static OnceLock<Regex>, &str); 3] = [
        (3, &H3, r"^###\s+"),
        (2, &H2, r"^##\s+"),
        (1, &H1, r"^#\s+"),
    ];
    levels.iter().find_map(|&(level, cell, pattern)| {
        regex(cell, pattern)
            .find(line)
            .map(|marker| (level, &line[marker.end()..]))
    })
}

fn list_item(line: &str) -> Option<&str> {
    regex(&LIST_ITEM, r"^\s*-\s+")
        .find(line)
        .map(|marker| &line[marker.end()..])
}

/// State for the basic renderer's single pass over the input lines.
#[derive(Default)]
struct Basic {
    html: Vec<String>,
    paragraph: Vec<String>,
    code: Option<Vec<String>>,
    in_list: bool,
}

impl Basic {
    fn flush_paragraph(&mut self) {
        if !self.paragraph.is_empty() {
            let text = self.paragraph.join(" ");
            self.html.push(format!("<p>{}</p>", text.trim()));
            self.paragraph.clear();
        }
    }

    fn close_list(&mut self) {
        if self.in_list {
            self.html.push(String::from("</ul>"));
            self.in_list = false;
        }
    }

    fn flush_code(&mut self, code: Vec<String>) {
        self.html
            .push(format!("<pre><code>{}</code></pre>", code.join("\n")));
    }

    fn on_line(&mut self, line: &str) {
        if line.trim().starts_with(FENCE) {
            match self.code.take() {
                Some(code) => self.flush_code(code),
                None => {
                    self.flush_paragraph();
                    self.close_list();
                    self.code = Some(Vec::new());
                }
            }
            return;
        }

        if let Some(code) = &mut self.code {
            code.push(line.to_owned());
            return;
        }

        if let Some((level, text)) = heading(line) {
            self.flush_paragraph();
            self.close_list();
            self.html
                .push(format!("<h{}>{}</h{}>", level, text.trim_end(), level));
            return;
        }

        if let Some(item) = list_item(line) {
            if !self.in_list {
                self.flush_paragraph();
                self.html.push(String::from("<ul>"));
                self.in_list = true;
            }
            self.html.push(format!("<li>{}</li>", item.trim_end()));
            return;
        }
        self.close_list();

        if line.trim().is_empty() {
            self.flush_paragraph();
        } else {
            self.paragraph.push(line.trim().to_owned());
        }
    }

    fn finish(mut self) -> String {
        if let Some(code) = self.code.take() {
            self.flush_code(code);
        }
        self.flush_paragraph();
        self.close_list();
        self.html.join("\n")
    }
}

/// The basic renderer. Text is passed through without HTML escaping.
pub fn render_basic(markdown: &str) -> String {
    let mut basic = Basic::default();
    for line in markdown.lines() {
        basic.on_line(line);
    }
    basic.finish()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_basic_heading_paragraph_list() {
        assert_eq!(
            render_basic("# Title\n\nSome text\n\n- a\n- b\n"),
            "<h1>Title</h1>\n<p>Some text</p>\n<ul>\n<li>a</li>\n<li>b</li>\n</ul>",
        );
    }

    #[test]
    fn test_basic_heading_levels() {
        assert_eq!(
            render_basic("# one\n## two\n### three\n#### four"),
            "<h1>one</h1>\n<h2>two</h2>\n<h3>three</h3>\n<p>#### four</p>",
        );
    }

    #[test]
    fn test_basic_heading_needs_whitespace() {
        assert_eq!(render_basic("#hashtag"), "<p>#hashtag</p>");
    }

    #[test]
    fn test_basic_paragraph_lines_are_joined() {
        assert_eq!(
            render_basic("  first line\nsecond line  \n\nnext"),
            "<p>first line second line</p>\n<p>next</p>",
        );
    }

    #[test]
    fn test_basic_code_block_is_verbatim() {
        assert_eq!(
            render_basic("intro\n```rust\nfn main() {\n    <b>\n}\n```\nafter"),
            "<p>intro</p>\n<pre><code>fn main() {\n    <b>\n}</code></pre>\n<p>after</p>",
        );
    }

    #[test]
    fn test_basic_code_block_ignores_markdown() {
        assert_eq!(
            render_basic("```\n# not a heading\n- not an item\n```"),
            "<pre><code># not a heading\n- not an item</code></pre>",
        );
    }

    #[test]
    fn test_basic_unterminated_code_block_is_emitted() {
        assert_eq!(render_basic("```\nlet x = 1;"), "<pre><code>let x = 1;</code></pre>");
    }

    #[test]
    fn test_basic_list_closed_by_text_and_heading() {
        assert_eq!(
            render_basic("- a\nplain\n\n- b\n# H"),
            "<ul>\n<li>a</li>\n</ul>\n<p>plain</p>\n<ul>\n<li>b</li>\n</ul>\n<h1>H</h1>",
        );
    }

    #[test]
    fn test_basic_indented_list_items() {
        assert_eq!(
            render_basic("  - nested\n-\tx"),
            "<ul>\n<li>nested</li>\n<li>x</li>\n</ul>",
        );
    }

    #[test]
    fn test_basic_is_not_escaped() {
        assert_eq!(render_basic("a < b & c"), "<p>a < b & c</p>");
    }

    #[test]
    fn test_basic_empty_input() {
        assert_eq!(render_basic(""), "");
    }

    #[test]
    fn test_resolve_basic() {
        let renderer = Renderer::resolve(Some(Flavor::Basic));
        assert_eq!(renderer.flavor(), Flavor::Basic);
        assert_eq!(renderer.render("# x"), "<h1>x</h1>");
    }

    #[cfg(feature = "full-markdown")]
    #[test]
    fn test_resolve_defaults_to_full() {
        assert_eq!(Renderer::resolve(None).flavor(), Flavor::Full);
    }

    #[cfg(not(feature = "full-markdown"))]
    #[test]
    fn test_resolve_full_falls_back() {
        assert_eq!(Renderer::resolve(Some(Flavor::Full)).flavor(), Flavor::Basic);
    }
}

//! The full Markdown renderer. [`pulldown_cmark`] does the parsing; rendering
//! is done here instead of with [`pulldown_cmark::html::push_html`] so that
//! we can:
//!
//! * give every heading an `id` and replace a `[TOC]` paragraph with a table
//!   of contents linking to those ids;
//! * syntax-highlight fenced code blocks which name a language.
//!
//! The event renderer is largely modeled after [`pulldown_cmark`]'s private
//! `HtmlWriter`.

use pulldown_cmark::escape::{escape_href, escape_html, StrWrite};
use pulldown_cmark::{
    Alignment, CodeBlockKind, CowStr, Event, LinkType, Options, Parser, Tag,
};
use std::collections::{HashSet, VecDeque};
use std::fmt::{self, Display};
use std::io;
use std::sync::OnceLock;
use syntect::html::{ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

const TOC_MARKER: &str = "[TOC]";

static SYNTAX_SET: OnceLock<SyntaxSet> = OnceLock::new();

fn syntax_set() -> &'static SyntaxSet {
    SYNTAX_SET.get_or_init(SyntaxSet::load_defaults_newlines)
}

/// Converts `markdown` to HTML.
pub fn to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);

    let events: Vec<Event> = Parser::new_ext(markdown, options).collect();
    let headings = headings(&events);
    let events = insert_toc(events, &headings);

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    let mut renderer = HtmlRenderer::new(headings.into_iter().map(|h| h.id));
    for event in events {
        // Writing into a `String` never fails.
        if renderer.on_event(&mut out, event).is_err() {
            break;
        }
    }
    out
}

/// A heading as it appears in the table of contents.
#[derive(Debug, PartialEq, Eq)]
struct Heading {
    level: u32,
    id: String,
    text: String,
}

// Collects the headings in document order, assigning each a unique id.
fn headings(events: &[Event]) -> Vec<Heading> {
    let mut seen = HashSet::new();
    let mut headings = Vec::new();
    let mut current: Option<(u32, String)> = None;
    for event in events {
        match event {
            Event::Start(Tag::Heading(level)) => {
                current = Some((*level, String::new()))
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some((_, buf)) = &mut current {
                    buf.push_str(text);
                }
            }
            Event::End(Tag::Heading(_)) => {
                if let Some((level, text)) = current.take() {
                    headings.push(Heading {
                        level,
                        id: unique_id(&mut seen, &text),
                        text,
                    });
                }
            }
            _ => {}
        }
    }
    headings
}

fn unique_id(seen: &mut HashSet<String>, text: &str) -> String {
    let base = match slug::slugify(text) {
        slug if slug.is_empty() => String::from("section"),
        slug => slug,
    };
    let mut id = base.clone();
    let mut n = 1;
    while !seen.insert(id.clone()) {
        id = format!("{}_{}", base, n);
        n += 1;
    }
    id
}

// Returns the `(start, end)` event indices of every paragraph whose only
// content is the `[TOC]` marker.
fn toc_markers(events: &[Event]) -> Vec<(usize, usize)> {
    let mut markers = Vec::new();
    for (start, event) in events.iter().enumerate() {
        if !matches!(event, Event::Start(Tag::Paragraph)) {
            continue;
        }
        let mut text = String::new();
        for (end, event) in events.iter().enumerate().skip(start + 1) {
            match event {
                Event::Text(t) => text.push_str(t),
                Event::End(Tag::Paragraph) => {
                    if text.trim() == TOC_MARKER {
                        markers.push((start, end));
                    }
                    break;
                }
                _ => break,
            }
        }
    }
    markers
}

fn insert_toc<'a>(events: Vec<Event<'a>>, headings: &[Heading]) -> Vec<Event<'a>> {
    let markers = toc_markers(&events);
    if markers.is_empty() {
        return events;
    }

    let toc = toc_html(headings);
    events
        .into_iter()
        .enumerate()
        .filter_map(|(i, event)| {
            match markers.iter().find(|(start, end)| (*start..=*end).contains(&i)) {
                Some((start, _)) if *start == i => {
                    Some(Event::Html(CowStr::from(toc.clone())))
                }
                Some(_) => None,
                None => Some(event),
            }
        })
        .collect()
}

// Renders nested `<ul>` lists of heading links. A heading deeper than the one
// before it opens a sublist inside the previous item.
fn toc_html(headings: &[Heading]) -> String {
    let mut out = String::from("<div class=\"toc\">\n");
    let mut levels: Vec<u32> = Vec::new();
    for heading in headings {
        while levels.len() > 1 && levels.last().map_or(false, |&top| top > heading.level) {
            levels.pop();
            out.push_str("</li>\n</ul>\n");
        }
        match levels.last() {
            Some(&top) if heading.level <= top => out.push_str("</li>\n<li>"),
            _ => {
                levels.push(heading.level);
                out.push_str("<ul>\n<li>");
            }
        }
        out.push_str(&format!(
            r##"<a href="#{}">{}</a>"##,
            EscapeHtml(&heading.id),
            EscapeHtml(&heading.text),
        ));
    }
    for _ in levels {
        out.push_str("</li>\n</ul>\n");
    }
    out.push_str("</div>\n");
    out
}

/// Highlights `code` as `lang`, producing class-based `<span>`s. Unknown
/// languages are treated as plain text.
fn highlight(lang: &str, code: &str) -> String {
    let syntax_set = syntax_set();
    let syntax = syntax_set
        .find_syntax_by_token(lang)
        .unwrap_or_else(|| syntax_set.find_syntax_plain_text());
    let mut generator = ClassedHTMLGenerator::new_with_class_style(
        syntax,
        syntax_set,
        ClassStyle::Spaced,
    );
    for line in LinesWithEndings::from(code) {
        if let Err(err) = generator.parse_html_for_line_which_includes_newline(line) {
            tracing::debug!("highlighting `{}` block failed: {}", lang, err);
            return EscapeHtml(code).to_string();
        }
    }
    generator.finalize()
}

struct Adaptor<'a, T> {
    formatter: &'a mut T,
    result: fmt::Result,
}

impl<T> Adaptor<'_, T> {
    fn handle_result(&mut self, result: fmt::Result) -> io::Result<()> {
        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                self.result = result;
                Err(io::Error::new(io::ErrorKind::Other, e))
            }
        }
    }
}

impl<T: fmt::Write> StrWrite for Adaptor<'_, T> {
    fn write_str(&mut self, s: &str) -> io::Result<()> {
        let result = self.formatter.write_str(s);
        self.handle_result(result)
    }

    fn write_fmt(&mut self, args: fmt::Arguments) -> io::Result<()> {
        let result = self.formatter.write_fmt(args);
        self.handle_result(result)
    }
}

struct EscapeHref<'a>(&'a str);

impl Display for EscapeHref<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut adaptor = Adaptor {
            formatter: f,
            result: Ok(()),
        };
        let _ = escape_href(&mut adaptor, self.0);
        adaptor.result
    }
}

struct EscapeHtml<'a>(&'a str);

impl Display for EscapeHtml<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut adaptor = Adaptor {
            formatter: f,
            result: Ok(()),
        };
        let _ = escape_html(&mut adaptor, self.0);
        adaptor.result
    }
}

enum TableState {
    Head,
    Body,
}

/// A fenced code block which is buffered until its end so it can be
/// highlighted in one go.
struct CodeBlock {
    lang: String,
    code: String,
}

/// Renders markdown [`Event`]s into HTML.
struct HtmlRenderer {
    table_alignments: Vec<Alignment>,
    table_state: TableState,
    table_cell_index: usize,

    /// Ids for the remaining headings, in document order.
    heading_ids: VecDeque<String>,

    /// The fenced code block currently being buffered, if any.
    code_block: Option<CodeBlock>,

    /// How many images we're inside of. While non-zero, text goes into the
    /// `alt` attribute and markup is dropped.
    image_depth: usize,
}

impl HtmlRenderer {
    fn new(heading_ids: impl Iterator<Item = String>) -> Self {
        HtmlRenderer {
            table_alignments: Vec::default(),
            table_state: TableState::Head,
            table_cell_index: usize::default(),
            heading_ids: heading_ids.collect(),
            code_block: None,
            image_depth: 0,
        }
    }

    fn on_event<'a, W: StrWrite>(
        &mut self,
        w: &mut W,
        event: Event<'a>,
    ) -> io::Result<()> {
        match event {
            Event::Start(tag) => self.on_start(w, tag),
            Event::End(tag) => self.on_end(w, tag),
            Event::Code(code) => self.on_code(w, code),
            Event::FootnoteReference(name) => write!(
                w,
                r##"<sup class="footnote-reference"><a href="#{}">{}</a></sup>"##,
                EscapeHtml(&name),
                EscapeHtml(&name),
            ),
            Event::HardBreak => self.on_hard_break(w),
            Event::Html(html) => self.on_html(w, html),
            Event::Rule => w.write_str("<hr />\n"),
            Event::SoftBreak => self.on_soft_break(w),
            Event::TaskListMarker(checked) => {
                self.on_task_list_marker(w, checked)
            }
            Event::Text(text) => self.on_text(w, text),
        }
    }

    fn on_start<'a, W: StrWrite>(
        &mut self,
        w: &mut W,
        tag: Tag<'a>,
    ) -> io::Result<()> {
        if self.image_depth > 0 {
            if let Tag::Image(..) = tag {
                self.image_depth += 1;
            }
            return Ok(());
        }

        match tag {
            Tag::BlockQuote => w.write_str("<blockquote>\n"),
            Tag::CodeBlock(CodeBlockKind::Fenced(info)) => {
                match info.split_whitespace().next() {
                    Some(lang) => {
                        self.code_block = Some(CodeBlock {
                            lang: lang.to_owned(),
                            code: String::new(),
                        });
                        Ok(())
                    }
                    None => w.write_str("<pre><code>"),
                }
            }
            Tag::CodeBlock(CodeBlockKind::Indented) => {
                w.write_str("<pre><code>")
            }
            Tag::Emphasis => w.write_str("<em>"),
            Tag::FootnoteDefinition(name) => write!(
                w,
                r#"<div class="footnote-definition" id="{}"><sup class="footnote-definition-label">{}</sup>"#,
                EscapeHtml(&name),
                EscapeHtml(&name),
            ),
            Tag::Heading(level) => match self.heading_ids.pop_front() {
                Some(id) => write!(w, r#"<h{} id="{}">"#, level, EscapeHtml(&id)),
                None => write!(w, "<h{}>", level),
            },
            Tag::Image(_link_type, dest, _title) => {
                self.image_depth += 1;
                write!(w, r#"<img src="{}" alt=""#, EscapeHref(&dest))
            }
            Tag::Item => w.write_str("<li>"),
            Tag::Link(LinkType::Email, dest, title) => write!(
                w,
                r#"<a href="mailto:{}" title="{}">"#,
                EscapeHref(&dest),
                EscapeHtml(&title),
            ),
            Tag::Link(_link_type, dest, title) => match title.is_empty() {
                true => write!(w, r#"<a href="{}">"#, EscapeHref(&dest)),
                false => write!(
                    w,
                    r#"<a href="{}" title="{}">"#,
                    EscapeHref(&dest),
                    EscapeHtml(&title),
                ),
            },
            Tag::List(None) => w.write_str("<ul>\n"),
            Tag::List(Some(1)) => w.write_str("<ol>\n"),
            Tag::List(Some(start)) => {
                write!(w, "<ol start=\"{}\">\n", start)
            }
            Tag::Paragraph => w.write_str("<p>"),
            Tag::Strikethrough => w.write_str("<del>"),
            Tag::Strong => w.write_str("<strong>"),
            Tag::Table(alignments) => {
                self.table_alignments = alignments;
                w.write_str("<table>")
            }
            Tag::TableHead => {
                self.table_state = TableState::Head;
                self.table_cell_index = 0;
                w.write_str("<thead><tr>")
            }
            Tag::TableRow => {
                self.table_cell_index = 0;
                w.write_str("<tr>")
            }
            Tag::TableCell => write!(
                w,
                "<{}{}>",
                match self.table_state {
                    TableState::Head => "th",
                    TableState::Body => "td",
                },
                match self.table_alignments.get(self.table_cell_index) {
                    Some(Alignment::Left) => r#" align="left""#,
                    Some(Alignment::Right) => r#" align="right""#,
                    Some(Alignment::Center) => r#" align="center""#,
                    _ => "",
                }
            ),
        }
    }

    fn on_end<'a, W: StrWrite>(
        &mut self,
        w: &mut W,
        tag: Tag<'a>,
    ) -> io::Result<()> {
        if self.image_depth > 0 {
            if let Tag::Image(_, _, title) = tag {
                self.image_depth -= 1;
                if self.image_depth == 0 {
                    return match title.is_empty() {
                        true => w.write_str("\" />"),
                        false => {
                            write!(w, "\" title=\"{}\" />", EscapeHtml(&title))
                        }
                    };
                }
            }
            return Ok(());
        }

        match tag {
            Tag::BlockQuote => w.write_str("</blockquote>\n"),
            Tag::CodeBlock(_) => match self.code_block.take() {
                Some(block) => write!(
                    w,
                    "<div class=\"codehilite\"><pre><code class=\"language-{}\">{}</code></pre></div>\n",
                    EscapeHtml(&block.lang),
                    highlight(&block.lang, &block.code),
                ),
                None => w.write_str("</code></pre>\n"),
            },
            Tag::Emphasis => w.write_str("</em>"),
            Tag::FootnoteDefinition(_) => w.write_str("</div>\n"),
            Tag::Heading(level) => write!(w, "</h{}>\n", level),
            Tag::Image(..) => Ok(()),
            Tag::Item => w.write_str("</li>\n"),
            Tag::Link(..) => w.write_str("</a>"),
            Tag::List(Some(_)) => w.write_str("</ol>\n"),
            Tag::List(None) => w.write_str("</ul>\n"),
            Tag::Paragraph => w.write_str("</p>\n"),
            Tag::Strikethrough => w.write_str("</del>"),
            Tag::Strong => w.write_str("</strong>"),
            Tag::Table(_) => w.write_str("</tbody></table>\n"),
            Tag::TableHead => {
                self.table_state = TableState::Body;
                w.write_str("</tr></thead><tbody>")
            }
            Tag::TableRow => w.write_str("</tr>"),
            Tag::TableCell => {
                self.table_cell_index += 1;
                w.write_str(match self.table_state {
                    TableState::Head => "</th>",
                    TableState::Body => "</td>",
                })
            }
        }
    }

    fn on_text<W: StrWrite>(&mut self, w: &mut W, s: CowStr) -> io::Result<()> {
        match &mut self.code_block {
            Some(block) => {
                block.code.push_str(&s);
                Ok(())
            }
            None => escape_html(w, &s),
        }
    }

    fn on_code<W: StrWrite>(&mut self, w: &mut W, s: CowStr) -> io::Result<()> {
        match self.image_depth {
            0 => write!(w, "<code>{}</code>", EscapeHtml(&s)),
            _ => escape_html(w, &s),
        }
    }

    fn on_html<W: StrWrite>(&mut self, w: &mut W, s: CowStr) -> io::Result<()> {
        w.write_str(&s)
    }

    fn on_soft_break<W: StrWrite>(&mut self, w: &mut W) -> io::Result<()> {
        match self.image_depth {
            0 => w.write_str("\n"),
            _ => w.write_str(" "),
        }
    }

    fn on_hard_break<W: StrWrite>(&mut self, w: &mut W) -> io::Result<()> {
        match self.image_depth {
            0 => w.write_str("<br />\n"),
            _ => w.write_str(" "),
        }
    }

    fn on_task_list_marker<W: StrWrite>(
        &mut self,
        w: &mut W,
        checked: bool,
    ) -> io::Result<()> {
        write!(
            w,
            r#"<input disabled="" type="checkbox" {}/>"#,
            match checked {
                true => r#"checked="" "#,
                false => "",
            }
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_blocks() {
        assert_eq!(
            to_html("# Title\n\nSome text\n\n- a\n- b\n"),
            "<h1 id=\"title\">Title</h1>\n<p>Some text</p>\n<ul>\n<li>a</li>\n<li>b</li>\n</ul>\n",
        );
    }

    #[test]
    fn test_text_is_escaped() {
        assert_eq!(to_html("a < b & `<c>`"), "<p>a &lt; b &amp; <code>&lt;c&gt;</code></p>\n");
    }

    #[test]
    fn test_heading_ids_are_unique() {
        let html = to_html("# Intro\n\n## Intro\n\n### Intro\n");
        assert!(html.contains(r#"<h1 id="intro">"#));
        assert!(html.contains(r#"<h2 id="intro_1">"#));
        assert!(html.contains(r#"<h3 id="intro_2">"#));
    }

    #[test]
    fn test_heading_id_for_symbols_only() {
        assert_eq!(to_html("# ???"), "<h1 id=\"section\">???</h1>\n");
    }

    #[test]
    fn test_table_of_contents() {
        let html = to_html("[TOC]\n\n# A\n\n## B\n\n# C\n");
        assert!(html.starts_with(concat!(
            "<div class=\"toc\">\n",
            "<ul>\n<li><a href=\"#a\">A</a><ul>\n",
            "<li><a href=\"#b\">B</a></li>\n</ul>\n</li>\n",
            "<li><a href=\"#c\">C</a></li>\n</ul>\n",
            "</div>\n",
        )));
        assert!(!html.contains("[TOC]"));
        assert!(html.ends_with("<h1 id=\"c\">C</h1>\n"));
    }

    #[test]
    fn test_toc_marker_must_be_alone() {
        let html = to_html("see [TOC] here\n\n# A\n");
        assert!(!html.contains("class=\"toc\""));
        assert!(html.contains("see [TOC] here"));
    }

    #[test]
    fn test_toc_from_deep_heading_first() {
        let headings = vec![
            Heading { level: 3, id: "x".into(), text: "X".into() },
            Heading { level: 1, id: "y".into(), text: "Y".into() },
        ];
        assert_eq!(
            toc_html(&headings),
            "<div class=\"toc\">\n<ul>\n<li><a href=\"#x\">X</a></li>\n<li><a href=\"#y\">Y</a></li>\n</ul>\n</div>\n",
        );
    }

    #[test]
    fn test_highlighted_code_block() {
        let html = to_html("```rust\nfn main() {}\n```\n");
        assert!(html.starts_with(
            "<div class=\"codehilite\"><pre><code class=\"language-rust\">"
        ));
        assert!(html.contains("<span class=\""));
        assert!(html.contains("main"));
        assert!(html.ends_with("</code></pre></div>\n"));
    }

    #[test]
    fn test_unknown_language_is_plain_but_escaped() {
        let html = to_html("```nosuchlanguage\n<x>\n```\n");
        assert!(html.contains("language-nosuchlanguage"));
        assert!(html.contains("&lt;x&gt;"));
        assert!(!html.contains("<x>"));
    }

    #[test]
    fn test_untagged_code_block() {
        assert_eq!(to_html("```\n<x>\n```\n"), "<pre><code>&lt;x&gt;\n</code></pre>\n");
    }

    #[test]
    fn test_table() {
        let html = to_html("| a | b |\n|:--|--:|\n| 1 | 2 |\n");
        assert!(html.contains("<table><thead><tr><th align=\"left\">a</th>"));
        assert!(html.contains("<td align=\"right\">2</td>"));
    }

    #[test]
    fn test_image_alt_text() {
        assert_eq!(
            to_html("![a *cat*](cat.png \"Cat\")"),
            "<p><img src=\"cat.png\" alt=\"a cat\" title=\"Cat\" /></p>\n",
        );
    }

    #[test]
    fn test_links() {
        assert_eq!(
            to_html("[home](/index.html)"),
            "<p><a href=\"/index.html\">home</a></p>\n",
        );
    }
}

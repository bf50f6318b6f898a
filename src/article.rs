//! Defines the [`Builder`], which renders a single article source into an HTML
//! page, and the [`ArticleRecord`] it hands back for the index listings.
//!
//! Front matter is optional. Anything it doesn't provide is derived:
//!
//! | field         | front matter key | fallback                          |
//! |---------------|------------------|-----------------------------------|
//! | title         | `title`          | file stem, hyphens to spaces, capitalized |
//! | date          | `date`           | today, as `YYYY-MM-DD`            |
//! | slug          | `slug`           | file stem                         |
//! | description   | `summary`        | empty                             |
//! | tags          | `tags`           | empty                             |

use crate::config::Config;
use crate::frontmatter;
use crate::markdown::Renderer;
use crate::util::write_file;
use chrono::{Local, NaiveDate};
use regex::Regex;
use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// The maximum length of a listing summary, in characters.
pub const SUMMARY_LENGTH: usize = 160;

const ELLIPSIS: char = '…';

const TAG_SEPARATOR: &str = " · ";

const INCLUDE_STUB: &str = "<h3>resources</h3>\n<ul>\n  <!-- add links here -->\n</ul>\n";

/// What the index listings need to know about a built article.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArticleRecord {
    pub title: String,

    /// The article date. Listings are sorted on this string, so it should be
    /// zero-padded `YYYY-MM-DD`.
    pub date: String,

    /// The raw `tags` value from the front matter, possibly empty.
    pub tags: String,

    pub slug: String,

    /// The URL of the rendered article, `{articles_url}{slug}.html`.
    pub url: String,

    /// A plain-text excerpt of at most [`SUMMARY_LENGTH`] characters (plus an
    /// ellipsis if it was cut short).
    pub summary: String,
}

/// Renders article sources into the articles directory.
pub struct Builder<'a> {
    /// The directory the rendered `{slug}.html` files are written to.
    articles_directory: &'a Path,

    /// The directory holding the `{slug}-links.html` include stubs.
    includes_directory: &'a Path,

    /// The URL prefix for rendered articles.
    articles_url: &'a str,

    /// The article template text.
    template: &'a str,

    renderer: Renderer,

    /// The date given to articles whose front matter has none.
    today: String,
}

impl<'a> Builder<'a> {
    /// Constructs a builder for the project described by `config`. `template`
    /// is the contents of the article template.
    pub fn new(config: &'a Config, template: &'a str, renderer: Renderer) -> Builder<'a> {
        Builder::with_date(config, template, renderer, Local::now().date_naive())
    }

    /// Like [`Builder::new`], but articles without a date get `today`.
    pub fn with_date(
        config: &'a Config,
        template: &'a str,
        renderer: Renderer,
        today: NaiveDate,
    ) -> Builder<'a> {
        Builder {
            articles_directory: &config.articles_directory,
            includes_directory: &config.includes_directory,
            articles_url: &config.articles_url,
            template,
            renderer,
            today: today.format("%Y-%m-%d").to_string(),
        }
    }

    /// Builds the article at `source`: writes `{slug}.html` into the articles
    /// directory, creates the include stub if it's missing, and returns the
    /// article's [`ArticleRecord`].
    pub fn build(&self, source: &Path) -> Result<ArticleRecord> {
        let stem = source
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| Error::InvalidFileName(source.to_owned()))?;
        let input = std::fs::read_to_string(source).map_err(|err| Error::Read {
            path: source.to_owned(),
            err,
        })?;

        let (front_matter, body) = frontmatter::parse(&input);
        let title = match front_matter.non_empty("title") {
            Some(title) => title.to_owned(),
            None => title_from_stem(stem),
        };
        let date = front_matter.non_empty("date").unwrap_or(self.today.as_str());
        let slug = front_matter.non_empty("slug").unwrap_or(stem);
        let description = front_matter.non_empty("summary").unwrap_or_default();
        let tags = front_matter.get("tags").unwrap_or_default();

        let content = self.renderer.render(body);

        if self.ensure_include_stub(slug)? {
            tracing::debug!("created include stub for `{}`", slug);
        }

        let page = render_template(
            self.template,
            &[
                ("{{ title }}", title.as_str()),
                ("{{ description }}", description),
                ("{{ date }}", date),
                ("{{ slug }}", slug),
                ("{{ tags_line }}", format_tags(tags).as_str()),
                ("{{ content }}", content.as_str()),
            ],
        );
        let output = self.articles_directory.join(format!("{}.html", slug));
        write_file(&output, &page).map_err(|err| Error::Write {
            path: output.clone(),
            err,
        })?;
        tracing::debug!("built `{}` -> `{}`", source.display(), output.display());

        Ok(ArticleRecord {
            summary: summarize(description, &content),
            url: format!("{}{}.html", self.articles_url, slug),
            title,
            date: date.to_owned(),
            tags: tags.to_owned(),
            slug: slug.to_owned(),
        })
    }

    /// Creates `{slug}-links.html` in the includes directory unless it
    /// already exists. Returns whether the stub was created.
    fn ensure_include_stub(&self, slug: &str) -> Result<bool> {
        let path = self.includes_directory.join(format!("{}-links.html", slug));
        let create = || -> io::Result<bool> {
            // The slug may contain separators.
            std::fs::create_dir_all(path.parent().unwrap_or(self.includes_directory))?;
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    use std::io::Write;
                    file.write_all(INCLUDE_STUB.as_bytes())?;
                    Ok(true)
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
                Err(e) => Err(e),
            }
        };
        create().map_err(|err| Error::Write {
            path: path.clone(),
            err,
        })
    }
}

/// Derives a title from a file stem: `hello-world` becomes `Hello World`.
pub fn title_from_stem(stem: &str) -> String {
    stem.replace('-', " ")
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Formats the raw `tags` value for the article template: empty if there are
/// no tags, otherwise a separator followed by the comma-joined tags.
pub fn format_tags(raw: &str) -> String {
    let tags: Vec<&str> = raw
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .collect();
    match tags.is_empty() {
        true => String::new(),
        false => format!("{}{}", TAG_SEPARATOR, tags.join(", ")),
    }
}

/// The listing summary: the description if there is one, otherwise the
/// rendered body without its markup, truncated to [`SUMMARY_LENGTH`].
pub fn summarize(description: &str, html: &str) -> String {
    let summary = match description.is_empty() {
        false => description.to_owned(),
        true => strip_tags(html).trim().to_owned(),
    };
    match summary.chars().count() > SUMMARY_LENGTH {
        false => summary,
        true => summary
            .chars()
            .take(SUMMARY_LENGTH)
            .chain(std::iter::once(ELLIPSIS))
            .collect(),
    }
}

static TAG: OnceLock<Regex> = OnceLock::new();

fn strip_tags(html: &str) -> std::borrow::Cow<str> {
    TAG.get_or_init(|| Regex::new(r"<[^<]+?>").unwrap())
        .replace_all(html, "")
}

// Replaces every occurrence of each placeholder, in order.
fn render_template(template: &str, substitutions: &[(&str, &str)]) -> String {
    substitutions
        .iter()
        .fold(template.to_owned(), |page, (placeholder, value)| {
            page.replace(placeholder, value)
        })
}

/// The result of building an article.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error building an article.
#[derive(Debug)]
pub enum Error {
    /// Returned when the article source can't be read.
    Read { path: PathBuf, err: io::Error },

    /// Returned when the rendered article or its include stub can't be
    /// written.
    Write { path: PathBuf, err: io::Error },

    /// Returned when the source file name isn't valid UTF-8.
    InvalidFileName(PathBuf),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Read { path, err } => {
                write!(f, "Reading article '{}': {}", path.display(), err)
            }
            Error::Write { path, err } => {
                write!(f, "Writing '{}': {}", path.display(), err)
            }
            Error::InvalidFileName(path) => {
                write!(f, "invalid file name: {:?}", path)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Read { path: _, err } => Some(err),
            Error::Write { path: _, err } => Some(err),
            Error::InvalidFileName(_) => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const TEMPLATE: &str =
        "<title>{{ title }}</title><meta content=\"{{ description }}\">\
         <time>{{ date }}</time>{{ tags_line }}<main>{{ content }}</main>\
         <!-- {{ slug }} / {{ title }} -->";

    fn project() -> std::io::Result<(TempDir, Config)> {
        let dir = tempfile::tempdir()?;
        let config = Config::with_root(dir.path());
        fs::create_dir_all(&config.articles_directory)?;
        Ok((dir, config))
    }

    fn write_source(config: &Config, name: &str, contents: &str) -> PathBuf {
        let path = config.articles_directory.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_front_matter_values_are_used() -> Result<()> {
        let (_dir, config) = project().unwrap();
        let source = write_source(
            &config,
            "draft.md",
            "---\ntitle: Hello, World\ndate: 2024-03-05\nslug: hello\ntags: go, cli\nsummary: A greeting.\n---\n# Hi\n",
        );
        let builder = Builder::new(&config, TEMPLATE, Renderer::basic());
        let record = builder.build(&source)?;

        assert_eq!(
            record,
            ArticleRecord {
                title: String::from("Hello, World"),
                date: String::from("2024-03-05"),
                tags: String::from("go, cli"),
                slug: String::from("hello"),
                url: String::from("/articles/hello.html"),
                summary: String::from("A greeting."),
            }
        );
        let page = fs::read_to_string(config.articles_directory.join("hello.html")).unwrap();
        assert_eq!(
            page,
            "<title>Hello, World</title><meta content=\"A greeting.\">\
             <time>2024-03-05</time> · go, cli<main><h1>Hi</h1></main>\
             <!-- hello / Hello, World -->"
        );
        Ok(())
    }

    #[test]
    fn test_fallbacks_without_front_matter() -> Result<()> {
        let (_dir, config) = project().unwrap();
        let source = write_source(&config, "my-first-post.md", "Just text.\n");
        let builder = Builder::new(&config, TEMPLATE, Renderer::basic());
        let record = builder.build(&source)?;

        assert_eq!(record.title, "My First Post");
        assert_eq!(
            record.date,
            Local::now().date_naive().format("%Y-%m-%d").to_string()
        );
        assert_eq!(record.slug, "my-first-post");
        assert_eq!(record.tags, "");
        assert_eq!(record.summary, "Just text.");
        assert!(config.articles_directory.join("my-first-post.html").is_file());
        Ok(())
    }

    #[test]
    fn test_fixed_date_for_undated_articles() -> Result<()> {
        let (_dir, config) = project().unwrap();
        let source = write_source(&config, "x.md", "---\ntitle: X\ndate:\n---\nbody");
        let today = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
        let record = Builder::with_date(&config, TEMPLATE, Renderer::basic(), today)
            .build(&source)?;
        assert_eq!(record.date, "2023-12-31");
        Ok(())
    }

    #[test]
    fn test_include_stub_is_created_once() -> Result<()> {
        let (_dir, config) = project().unwrap();
        let source = write_source(&config, "post.md", "body");
        let builder = Builder::new(&config, TEMPLATE, Renderer::basic());
        builder.build(&source)?;

        let stub = config.includes_directory.join("post-links.html");
        assert_eq!(fs::read_to_string(&stub).unwrap(), INCLUDE_STUB);

        fs::write(&stub, "<a href=\"https://example.org\">curated</a>").unwrap();
        builder.build(&source)?;
        assert_eq!(
            fs::read_to_string(&stub).unwrap(),
            "<a href=\"https://example.org\">curated</a>"
        );
        Ok(())
    }

    #[test]
    fn test_nested_slug() -> Result<()> {
        let (_dir, config) = project().unwrap();
        let source = write_source(&config, "post.md", "---\nslug: 2024/post\n---\nbody");
        let record = Builder::new(&config, TEMPLATE, Renderer::basic()).build(&source)?;

        assert_eq!(record.url, "/articles/2024/post.html");
        assert!(config.articles_directory.join("2024").join("post.html").is_file());
        assert_eq!(
            fs::read_to_string(config.includes_directory.join("2024").join("post-links.html"))
                .unwrap(),
            INCLUDE_STUB
        );
        Ok(())
    }

    #[test]
    fn test_rebuild_is_identical() -> Result<()> {
        let (_dir, config) = project().unwrap();
        let source = write_source(&config, "same.md", "---\ndate: 2024-01-01\n---\n# Same\n");
        let builder = Builder::new(&config, TEMPLATE, Renderer::basic());
        let output = config.articles_directory.join("same.html");

        builder.build(&source)?;
        let first = fs::read(&output).unwrap();
        builder.build(&source)?;
        assert_eq!(first, fs::read(&output).unwrap());
        Ok(())
    }

    #[test]
    fn test_missing_source() {
        let (_dir, config) = project().unwrap();
        let builder = Builder::new(&config, TEMPLATE, Renderer::basic());
        match builder.build(&config.articles_directory.join("nope.md")) {
            Err(Error::Read { path, .. }) => assert!(path.ends_with("nope.md")),
            other => panic!("expected a read error, got {:?}", other),
        }
    }

    #[test]
    fn test_title_from_stem() {
        assert_eq!(title_from_stem("hello-world"), "Hello World");
        assert_eq!(title_from_stem("rust-IS-fun"), "Rust Is Fun");
        assert_eq!(title_from_stem("2nd-try"), "2nd Try");
        assert_eq!(title_from_stem("single"), "Single");
    }

    #[test]
    fn test_format_tags() {
        assert_eq!(format_tags("go, cli"), " · go, cli");
        assert_eq!(format_tags("go cli,,rust "), " · go, cli, rust");
        assert_eq!(format_tags(""), "");
        assert_eq!(format_tags(" , "), "");
    }

    #[test]
    fn test_summary_is_truncated() {
        let long = format!("<p>{}</p>", "x".repeat(200));
        let summary = summarize("", &long);
        assert_eq!(summary.chars().count(), 161);
        assert!(summary.ends_with('…'));
        assert!(summary.starts_with(&"x".repeat(160)));

        let short = format!("<p>{}</p>", "y".repeat(100));
        assert_eq!(summarize("", &short), "y".repeat(100));
    }

    #[test]
    fn test_summary_prefers_description() {
        assert_eq!(summarize("Described.", "<p>Body</p>"), "Described.");
    }

    #[test]
    fn test_summary_strips_markup() {
        assert_eq!(
            summarize("", "<h1>Title</h1>\n<p>Some <em>text</em></p>\n"),
            "Title\nSome text"
        );
    }

    #[test]
    fn test_summary_counts_characters_not_bytes() {
        let summary = summarize("", &"é".repeat(160));
        assert_eq!(summary, "é".repeat(160));
    }
}

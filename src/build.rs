//! Exports the [`build_site`] function which stitches together the high-level
//! steps of a build: reading the article template, discovering and building
//! every article ([`crate::article`]), and splicing the article listings into
//! the home page and the archive page ([`crate::splice`]).

use crate::article::{ArticleRecord, Builder, Error as ArticleError};
use crate::config::{Config, Listing};
use crate::markdown::Renderer;
use crate::splice::{render_list, splice};
use crate::util::write_file;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const MARKDOWN_EXTENSION: &str = "md";

/// The outcome of a successful build.
#[derive(Debug)]
pub struct BuildReport {
    /// The built articles, most recent first.
    pub articles: Vec<ArticleRecord>,

    /// The index pages whose listings were rewritten.
    pub spliced: Vec<PathBuf>,
}

/// Builds the site described by `config`, rendering Markdown with
/// `renderer`. Stops at the first error; files written before it are left in
/// place.
pub fn build_site(config: &Config, renderer: Renderer) -> Result<BuildReport> {
    tracing::info!(
        "building articles in `{}` ({} markdown)",
        config.articles_directory.display(),
        renderer.flavor()
    );
    let template = std::fs::read_to_string(&config.article_template).map_err(|err| {
        Error::ReadTemplate {
            path: config.article_template.clone(),
            err,
        }
    })?;

    let builder = Builder::new(config, &template, renderer);
    let mut articles = Vec::new();
    let mut sources: HashMap<String, PathBuf> = HashMap::new();
    for source in discover(&config.articles_directory, &config.reserved_source)? {
        let article = builder.build(&source)?;
        if let Some(previous) = sources.insert(article.slug.clone(), source.clone()) {
            tracing::warn!(
                "`{}` and `{}` share the slug `{}`; the latter overwrites the former",
                previous.display(),
                source.display(),
                article.slug
            );
        }
        articles.push(article);
    }
    sort_by_date(&mut articles);
    tracing::info!("built {} article(s)", articles.len());

    let mut spliced = Vec::new();
    for listing in [&config.home_page, &config.archive] {
        if update_listing(listing, &articles)? {
            spliced.push(listing.file.clone());
        }
    }

    Ok(BuildReport { articles, spliced })
}

/// Returns the article sources in `dir` (not its subdirectories) sorted by
/// file name, skipping `reserved`. A missing `dir` has no articles.
pub fn discover(dir: &Path, reserved: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        tracing::warn!("articles directory `{}` doesn't exist", dir.display());
        return Ok(Vec::new());
    }

    let mut sources = Vec::new();
    for result in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by(|a, b| a.file_name().cmp(b.file_name()))
    {
        let entry = result?;
        let path = entry.path();
        if entry.file_type().is_file()
            && path.extension().map_or(false, |ext| ext == MARKDOWN_EXTENSION)
            && entry.file_name() != reserved
        {
            sources.push(path.to_owned());
        }
    }
    Ok(sources)
}

/// Sorts articles most recent first. Dates are compared as strings, which is
/// chronological for zero-padded `YYYY-MM-DD`. Articles with equal dates keep
/// their relative order.
pub fn sort_by_date(articles: &mut [ArticleRecord]) {
    articles.sort_by(|a, b| b.date.cmp(&a.date));
}

// Rewrites the listing region of `listing.file`. Returns whether the file was
// written; a missing page, missing markers or an up-to-date listing leave it
// alone.
fn update_listing(listing: &Listing, articles: &[ArticleRecord]) -> Result<bool> {
    if !listing.file.is_file() {
        tracing::debug!("skipping missing index page `{}`", listing.file.display());
        return Ok(false);
    }

    let index_error = |err| Error::Index {
        path: listing.file.clone(),
        err,
    };
    let html = std::fs::read_to_string(&listing.file).map_err(index_error)?;
    let fragment = format!("\n{}\n", render_list(articles, listing.limit));
    let updated = splice(&html, &listing.start_marker, &listing.end_marker, &fragment);
    if updated == html {
        tracing::debug!("`{}` is up to date", listing.file.display());
        return Ok(false);
    }
    write_file(&listing.file, &updated).map_err(index_error)?;
    tracing::debug!("updated listing in `{}`", listing.file.display());
    Ok(true)
}

type Result<T> = std::result::Result<T, Error>;

/// The error type for building a site. Errors can be during template loading,
/// discovery, article building, or index splicing.
#[derive(Debug)]
pub enum Error {
    /// Returned when the article template can't be read. Nothing has been
    /// built when this is returned.
    ReadTemplate { path: PathBuf, err: std::io::Error },

    /// Returned for errors building an article.
    Article(ArticleError),

    /// Returned for errors reading or rewriting an index page.
    Index { path: PathBuf, err: std::io::Error },

    /// Returned for errors walking the articles directory.
    WalkDir(walkdir::Error),
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::ReadTemplate { path, err } => {
                write!(f, "Opening template file '{}': {}", path.display(), err)
            }
            Error::Article(err) => fmt::Display::fmt(err, f),
            Error::Index { path, err } => {
                write!(f, "Updating index page '{}': {}", path.display(), err)
            }
            Error::WalkDir(err) => fmt::Display::fmt(err, f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::ReadTemplate { path: _, err } => Some(err),
            Error::Article(err) => Some(err),
            Error::Index { path: _, err } => Some(err),
            Error::WalkDir(err) => Some(err),
        }
    }
}

impl From<ArticleError> for Error {
    /// Converts [`ArticleError`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: ArticleError) -> Error {
        Error::Article(err)
    }
}

impl From<walkdir::Error> for Error {
    /// Converts [`walkdir::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: walkdir::Error) -> Error {
        Error::WalkDir(err)
    }
}

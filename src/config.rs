//! Project configuration. Every path the builder touches comes from a
//! [`Config`], which is usually loaded by [`Config::from_directory`] from the
//! optional `folio.yaml` at the project root. Relative paths in the project
//! file are resolved against the root.

use crate::markdown::Flavor;
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// The name of the optional project file.
pub const PROJECT_FILE: &str = "folio.yaml";

/// The on-disk shape of `folio.yaml`. Everything is optional.
#[derive(Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct Project {
    articles_directory: Option<PathBuf>,
    article_template: Option<PathBuf>,
    includes_directory: Option<PathBuf>,
    articles_url: Option<String>,
    reserved_source: Option<String>,
    markdown: Option<Flavor>,
    home_page: Option<ListingOverrides>,
    archive: Option<ListingOverrides>,
}

#[derive(Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct ListingOverrides {
    file: Option<PathBuf>,
    start_marker: Option<String>,
    end_marker: Option<String>,
    limit: Option<usize>,
}

/// An index page with a region that lists articles.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Listing {
    /// The HTML file to splice into. Skipped if it doesn't exist.
    pub file: PathBuf,

    /// The comment opening the rewritten region.
    pub start_marker: String,

    /// The comment closing the rewritten region.
    pub end_marker: String,

    /// The maximum number of articles to list, or `None` for all of them.
    pub limit: Option<usize>,
}

impl Listing {
    fn merge(mut self, root: &Path, overrides: Option<ListingOverrides>) -> Listing {
        if let Some(o) = overrides {
            if let Some(file) = o.file {
                self.file = root.join(file);
            }
            if let Some(start_marker) = o.start_marker {
                self.start_marker = start_marker;
            }
            if let Some(end_marker) = o.end_marker {
                self.end_marker = end_marker;
            }
            if o.limit.is_some() {
                self.limit = o.limit;
            }
        }
        self
    }
}

/// Everything the build needs to know about a project's layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// The directory holding the `*.md` sources and the rendered articles.
    pub articles_directory: PathBuf,

    /// The HTML template every article is rendered into.
    pub article_template: PathBuf,

    /// The directory holding the per-article `<slug>-links.html` stubs.
    pub includes_directory: PathBuf,

    /// The URL prefix for rendered articles (e.g., `/articles/`).
    pub articles_url: String,

    /// A source file name in the articles directory that is never built.
    pub reserved_source: String,

    /// The requested Markdown renderer, if any.
    pub markdown: Option<Flavor>,

    /// The home page, listing the most recent articles.
    pub home_page: Listing,

    /// The archive page, listing every article.
    pub archive: Listing,
}

impl Config {
    /// The default layout rooted at `root`.
    pub fn with_root(root: &Path) -> Config {
        let articles_directory = root.join("articles");
        Config {
            article_template: root.join("templates").join("article.html"),
            includes_directory: root.join("includes"),
            articles_url: String::from("/articles/"),
            reserved_source: String::from("_template.md"),
            markdown: None,
            home_page: Listing {
                file: root.join("index.html"),
                start_marker: String::from("<!-- posts:start -->"),
                end_marker: String::from("<!-- posts:end -->"),
                limit: Some(5),
            },
            archive: Listing {
                file: articles_directory.join("index.html"),
                start_marker: String::from("<!-- all-posts:start -->"),
                end_marker: String::from("<!-- all-posts:end -->"),
                limit: None,
            },
            articles_directory,
        }
    }

    /// Loads the configuration for the project rooted at `dir`, applying
    /// `dir/folio.yaml` on top of the defaults if it exists.
    pub fn from_directory(dir: &Path) -> Result<Config> {
        let path = dir.join(PROJECT_FILE);
        match path.exists() {
            true => Config::from_project_file(&path),
            false => {
                tracing::debug!(
                    "no `{}` in `{}`; using the default layout",
                    PROJECT_FILE,
                    dir.display()
                );
                Ok(Config::with_root(dir))
            }
        }
    }

    /// Loads the configuration from a project file. The file's directory is
    /// the project root.
    pub fn from_project_file(path: &Path) -> Result<Config> {
        use crate::util::open;
        let project: Project = serde_yaml::from_reader(open(path, "project")?)
            .with_context(|| format!("Parsing project file `{}`", path.display()))?;
        match path.parent() {
            None => Err(anyhow!(
                "Can't get parent directory for provided project file path '{:?}'",
                path
            )),
            Some(root) => Ok(Config::with_root(root).merge(root, project)),
        }
    }

    fn merge(mut self, root: &Path, project: Project) -> Config {
        if let Some(dir) = project.articles_directory {
            self.articles_directory = root.join(dir);
        }
        if let Some(template) = project.article_template {
            self.article_template = root.join(template);
        }
        if let Some(dir) = project.includes_directory {
            self.includes_directory = root.join(dir);
        }
        if let Some(url) = project.articles_url {
            self.articles_url = url;
        }
        if let Some(name) = project.reserved_source {
            self.reserved_source = name;
        }
        self.markdown = project.markdown.or(self.markdown);
        self.home_page = self.home_page.merge(root, project.home_page);
        self.archive = self.archive.merge(root, project.archive);
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults_without_project_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let config = Config::from_directory(dir.path())?;
        assert_eq!(config, Config::with_root(dir.path()));
        assert_eq!(config.articles_directory, dir.path().join("articles"));
        assert_eq!(
            config.archive.file,
            dir.path().join("articles").join("index.html")
        );
        assert_eq!(config.home_page.limit, Some(5));
        assert_eq!(config.archive.limit, None);
        Ok(())
    }

    #[test]
    fn test_project_file_overrides() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(
            dir.path().join(PROJECT_FILE),
            "articles_directory: posts\n\
             articles_url: /posts/\n\
             markdown: basic\n\
             home_page:\n  limit: 3\n  start_marker: \"<!-- recent -->\"\n",
        )?;
        let config = Config::from_directory(dir.path())?;
        assert_eq!(config.articles_directory, dir.path().join("posts"));
        assert_eq!(config.articles_url, "/posts/");
        assert_eq!(config.markdown, Some(Flavor::Basic));
        assert_eq!(config.home_page.limit, Some(3));
        assert_eq!(config.home_page.start_marker, "<!-- recent -->");
        assert_eq!(config.home_page.end_marker, "<!-- posts:end -->");
        // The archive keeps its default location even if the articles move.
        assert_eq!(
            config.archive.file,
            dir.path().join("articles").join("index.html")
        );
        Ok(())
    }

    #[test]
    fn test_unknown_keys_are_rejected() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join(PROJECT_FILE), "artcles_directory: typo\n")?;
        assert!(Config::from_directory(dir.path()).is_err());
        Ok(())
    }
}

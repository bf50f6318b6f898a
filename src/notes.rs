//! Aggregates dated notes from a knowledge-base vault into Jekyll posts.
//!
//! The vault is laid out as `{vault}/{category}/{DD-MM-YYYY}/{note}`: every
//! top-level directory is a category, and inside it every directory named
//! after a date holds that week's notes. Each such group becomes one post,
//! `{posts}/{YYYY-MM-DD}-{category}.md`, containing the concatenated notes
//! under a Jekyll front matter block.

use crate::util::write_file;
use chrono::NaiveDate;
use std::fmt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const GROUP_DATE_FORMAT: &str = "%d-%m-%Y";

/// Turns every dated note group in `vault` into a post in `posts_directory`,
/// overwriting existing posts. Returns the paths of the posts written.
pub fn aggregate(vault: &Path, posts_directory: &Path) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for category_dir in subdirectories(vault)? {
        let category = file_name(&category_dir)?;
        for group_dir in subdirectories(&category_dir)? {
            let date = match parse_group_date(file_name(&group_dir)?) {
                Some(date) => date,
                None => {
                    tracing::debug!("skipping `{}`: not a dated group", group_dir.display());
                    continue;
                }
            };

            let post = posts_directory.join(post_file_name(category, date));
            let contents = render_post(category, date, &concat_notes(&group_dir)?);
            write_file(&post, &contents).map_err(|err| Error::Io {
                path: post.clone(),
                err,
            })?;
            tracing::info!("wrote `{}`", post.display());
            written.push(post);
        }
    }
    Ok(written)
}

/// Parses a group directory name like `16-04-2021`. Names that aren't
/// exactly two-digit day, two-digit month and four-digit year are rejected.
pub fn parse_group_date(name: &str) -> Option<NaiveDate> {
    let shape_ok = name.len() == 10
        && name.bytes().enumerate().all(|(i, b)| match i {
            2 | 5 => b == b'-',
            _ => b.is_ascii_digit(),
        });
    match shape_ok {
        true => NaiveDate::parse_from_str(name, GROUP_DATE_FORMAT).ok(),
        false => None,
    }
}

/// The Jekyll file name for a category's group: `2021-04-16-deep-work.md`.
pub fn post_file_name(category: &str, date: NaiveDate) -> String {
    format!(
        "{}-{}.md",
        date.format("%Y-%m-%d"),
        category.to_lowercase().replace(' ', "-")
    )
}

/// Renders a post: Jekyll front matter followed by the notes with their
/// leading vault metadata removed.
pub fn render_post(category: &str, date: NaiveDate, notes: &str) -> String {
    format!(
        "---\n\
         layout: post\n\
         title: \"Notes — week of {}\"\n\
         date:  {} 10:00:00 +0000\n\
         tags:  \n\
         - {}\n\
         ---\n\
         \n\
         {}",
        date.format("%d/%m/%Y"),
        date.format("%Y-%m-%d"),
        category.to_lowercase(),
        strip_metadata(notes),
    )
}

/// Drops everything up to and including the second `---` (or the first, if
/// there's only one) and trims the rest.
pub fn strip_metadata(notes: &str) -> &str {
    notes.splitn(3, "---").last().unwrap_or(notes).trim()
}

// Concatenates the files in `dir`, sorted by name, each followed by a blank
// line.
fn concat_notes(dir: &Path) -> Result<String> {
    let mut notes = String::new();
    for result in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by(|a, b| a.file_name().cmp(b.file_name()))
    {
        let entry = result?;
        if !entry.file_type().is_file() {
            continue;
        }
        let note = std::fs::read_to_string(entry.path()).map_err(|err| Error::Io {
            path: entry.path().to_owned(),
            err,
        })?;
        notes.push_str(&note);
        notes.push_str("\n\n");
    }
    Ok(notes)
}

// The immediate subdirectories of `dir`, sorted by name.
fn subdirectories(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for result in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by(|a, b| a.file_name().cmp(b.file_name()))
    {
        let entry = result?;
        if entry.file_type().is_dir() {
            dirs.push(entry.into_path());
        }
    }
    Ok(dirs)
}

fn file_name(path: &Path) -> Result<&str> {
    path.file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| Error::InvalidFileName(path.to_owned()))
}

/// Represents the result of aggregating notes.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error aggregating notes.
#[derive(Debug)]
pub enum Error {
    /// Returned when a note can't be read or a post can't be written.
    Io { path: PathBuf, err: std::io::Error },

    /// Returned for errors walking the vault.
    WalkDir(walkdir::Error),

    /// Returned when a category or group name isn't valid UTF-8.
    InvalidFileName(PathBuf),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io { path, err } => write!(f, "'{}': {}", path.display(), err),
            Error::WalkDir(err) => fmt::Display::fmt(err, f),
            Error::InvalidFileName(path) => write!(f, "invalid file name: {:?}", path),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io { path: _, err } => Some(err),
            Error::WalkDir(err) => Some(err),
            Error::InvalidFileName(_) => None,
        }
    }
}

impl From<walkdir::Error> for Error {
    /// Converts a [`walkdir::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator while walking the vault.
    fn from(err: walkdir::Error) -> Error {
        Error::WalkDir(err)
    }
}

//! The library code for `folio`, a builder for small hand-maintained static
//! sites. A build is a single pass:
//!
//! 1. Discover the Markdown article sources ([`crate::build`])
//! 2. Build each article ([`crate::article`]): parse its front matter
//!    ([`crate::frontmatter`]), render its body ([`crate::markdown`]), and
//!    write it into the article template
//! 3. Splice the list of articles, most recent first, into the home page and
//!    the archive page ([`crate::splice`])
//!
//! The index pages are otherwise hand-written; only the region between their
//! marker comments is rewritten.
//!
//! Separately, [`crate::notes`] turns a vault of dated notes into Jekyll
//! posts.

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod article;
pub mod build;
pub mod config;
pub mod frontmatter;
#[cfg(feature = "full-markdown")]
pub mod htmlrenderer;
pub mod markdown;
pub mod notes;
pub mod splice;
mod util;

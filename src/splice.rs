//! Rewrites the article listings in hand-maintained index pages. A listing
//! lives between two marker comments, e.g.:
//!
//! ```html
//! <section>
//!   <!-- posts:start -->
//!   ...replaced on every build...
//!   <!-- posts:end -->
//! </section>
//! ```
//!
//! Only the text strictly between the markers is replaced; the markers and
//! everything around them are left alone.

use crate::article::ArticleRecord;
use std::borrow::Cow;

/// Replaces the text between the first `start` marker and the first `end`
/// marker after it with `fragment`. If either marker is missing, `html` is
/// returned as-is.
pub fn splice<'a>(html: &'a str, start: &str, end: &str, fragment: &str) -> Cow<'a, str> {
    let region_start = match html.find(start) {
        Some(i) => i + start.len(),
        None => return Cow::Borrowed(html),
    };
    let region_end = match html[region_start..].find(end) {
        Some(i) => region_start + i,
        None => return Cow::Borrowed(html),
    };

    let mut out = String::with_capacity(html.len() - (region_end - region_start) + fragment.len());
    out.push_str(&html[..region_start]);
    out.push_str(fragment);
    out.push_str(&html[region_end..]);
    Cow::Owned(out)
}

/// Renders `articles` as an HTML list, listing at most `limit` of them.
pub fn render_list(articles: &[ArticleRecord], limit: Option<usize>) -> String {
    let items: Vec<String> = articles
        .iter()
        .take(limit.unwrap_or(usize::MAX))
        .map(render_item)
        .collect();
    format!(
        "        <ul class=\"list\">\n{}\n        </ul>",
        items.join("\n")
    )
}

fn render_item(article: &ArticleRecord) -> String {
    let meta = match article.tags.is_empty() {
        true => article.date.clone(),
        false => format!("{} · {}", article.date, article.tags),
    };
    format!(
        concat!(
            "          <li class=\"list-item\">\n",
            "            <a class=\"post\" href=\"{}\">\n",
            "              <span class=\"post-title\">{}</span>\n",
            "              <span class=\"post-meta\">{}</span>\n",
            "            </a>\n",
            "          </li>",
        ),
        article.url, article.title, meta,
    )
}

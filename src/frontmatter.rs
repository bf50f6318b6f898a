//! Splits an article source into its front matter and its Markdown body.
//!
//! Front matter is a block of `key: value` lines fenced by `---` lines at the
//! very top of the file:
//!
//! ```md
//! ---
//! title: Hello, world!
//! date: 2021-04-16
//! tags: greet, intro
//! ---
//! # Hello
//! ```
//!
//! There is no YAML here: values are taken verbatim as strings, and anything
//! the parser doesn't understand is ignored rather than reported.

use std::collections::HashMap;

const FENCE: &str = "---";

/// The metadata parsed from the top of an article source. Keys are not
/// unique-enforced; the last occurrence of a key wins.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrontMatter(HashMap<String, String>);

impl FrontMatter {
    /// Returns the value for `key`, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Returns the value for `key` unless it's missing or empty.
    pub fn non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    fn from_block(block: &str) -> FrontMatter {
        let mut fields = HashMap::new();
        for line in block.lines() {
            if let Some((key, value)) = line.split_once(':') {
                fields.insert(key.trim().to_owned(), value.trim().to_owned());
            }
        }
        FrontMatter(fields)
    }
}

/// Parses `input` into its [`FrontMatter`] and body. If `input` doesn't open
/// with a fence line, or the fence is never closed, the front matter is empty
/// and the whole input is the body.
pub fn parse(input: &str) -> (FrontMatter, &str) {
    match frontmatter_indices(input) {
        Some((block_start, block_stop, body_start)) => (
            FrontMatter::from_block(&input[block_start..block_stop]),
            &input[body_start..],
        ),
        None => (FrontMatter::default(), input),
    }
}

// Returns `(block_start, block_stop, body_start)` byte offsets.
fn frontmatter_indices(input: &str) -> Option<(usize, usize, usize)> {
    let mut lines = input.split_inclusive('\n');
    let opening = lines.next()?;
    if !is_fence(opening) {
        return None;
    }

    let block_start = opening.len();
    let mut offset = block_start;
    for line in lines {
        if is_fence(line) {
            return Some((block_start, offset, offset + line.len()));
        }
        offset += line.len();
    }
    None
}

fn is_fence(line: &str) -> bool {
    line.trim_end_matches('\n').trim_end_matches('\r') == FENCE
}

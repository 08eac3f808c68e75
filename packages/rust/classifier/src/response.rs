//! Reading a category out of free-text service responses.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use leadflow_shared::Category;

static CATEGORY_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(owner|operations|procurement|other)\b").expect("valid category regex")
});

/// Extract the single category named in `text`.
///
/// Returns `None` when the text names no category or more than one distinct
/// category; the caller decides the fallback.
pub fn parse_category(text: &str) -> Option<Category> {
    let found: BTreeSet<Category> = CATEGORY_TOKEN
        .find_iter(text)
        .filter_map(|m| Category::from_token(m.as_str()))
        .collect();

    if found.len() == 1 {
        found.into_iter().next()
    } else {
        None
    }
}

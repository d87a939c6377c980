//! Keyword blacklist scan.
//!
//! Runs against the whole statement body, string literals and comments
//! included. Whole-word matching keeps identifiers like `created_at` clear of
//! `CREATE`, but a literal such as `'DROP'` is still rejected.

use std::sync::LazyLock;

use regex::Regex;

/// Keywords that never appear in a read-only query, in scan order.
pub const BLOCKED_KEYWORDS: &[&str] = &[
    "INTO",
    "ATTACH",
    "DETACH",
    "PRAGMA",
    "LOAD_EXTENSION",
    "CREATE",
    "DROP",
    "ALTER",
    "INSERT",
    "UPDATE",
    "DELETE",
    "REPLACE",
    "GRANT",
    "REVOKE",
    "BEGIN",
    "COMMIT",
    "ROLLBACK",
    "SAVEPOINT",
    "RELEASE",
    "VACUUM",
    "REINDEX",
    "ANALYZE",
];

static KEYWORD_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    BLOCKED_KEYWORDS
        .iter()
        .map(|keyword| {
            let pattern = Regex::new(&format!(r"(?i)\b{keyword}\b"))
                .expect("blocked keywords are plain words");
            (*keyword, pattern)
        })
        .collect()
});

/// `REPLACE` directly followed by an opening parenthesis is the string function.
static REPLACE_CALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^REPLACE\s*\(").expect("constant pattern"));

/// Returns the first blocked keyword found in `body`, if any.
///
/// `body` is the trimmed statement without its trailing separator.
pub(super) fn find_blocked_keyword(body: &str) -> Option<&'static str> {
    for (keyword, pattern) in KEYWORD_PATTERNS.iter() {
        for hit in pattern.find_iter(body) {
            if is_permitted_use(keyword, body, hit.start()) {
                continue;
            }
            return Some(*keyword);
        }
    }
    None
}

fn is_permitted_use(keyword: &str, body: &str, offset: usize) -> bool {
    match keyword {
        "REPLACE" => REPLACE_CALL.is_match(&body[offset..]),
        // Only a standalone `ANALYZE` command is administrative.
        "ANALYZE" => offset != 0,
        _ => false,
    }
}

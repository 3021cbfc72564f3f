//! Shared utility functions.

/// Convert a puzzle title to a URL slug.
///
/// Lowercases, turns runs of whitespace, `/`, `-` and `_` into a single `-`,
/// and drops anything else that is not alphanumeric.
/// "Cryptic Crossword" -> "cryptic-crossword"
/// "Who's On First?" -> "whos-on-first"
pub fn slugify(s: &str) -> String {
    let mut slug = String::with_capacity(s.len());
    let mut pending_dash = false;
    for c in s.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else if c.is_whitespace() || matches!(c, '-' | '_' | '/') {
            pending_dash = true;
        }
    }
    slug
}

/// True if `s` is a valid slug: non-empty ASCII letters, digits, `-` and `_`.
pub fn is_valid_slug(s: &str) -> bool {
    !s.is_empty()
        && s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

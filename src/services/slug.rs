//! URL slugs
//!
//! A slug is lowercase ASCII letters and digits separated by single hyphens,
//! with no hyphen at either end.

/// Derive a slug from a name or title.
///
/// Runs of anything other than ASCII letters and digits collapse into one
/// hyphen. The result is empty when the input has no ASCII alphanumerics.
pub fn generate_slug(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut pending_hyphen = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !result.is_empty() {
                result.push('-');
            }
            pending_hyphen = false;
            result.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    result
}

/// Whether `slug` is already in canonical slug form
pub fn validate_slug(slug: &str) -> bool {
    !slug.is_empty()
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--")
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

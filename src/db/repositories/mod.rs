//! Database repositories
//!
//! One repository per entity. Each trait has a single sqlx implementation
//! that serves both SQLite and MySQL.

pub mod category;
pub mod contact;
pub mod page;
pub mod tag;
pub mod user;

pub use category::{CategoryRepository, SqlxCategoryRepository};
pub use contact::{ContactRepository, SqlxContactRepository};
pub use page::{PageRepository, SqlxPageRepository};
pub use tag::{SqlxTagRepository, TagRepository};
pub use user::{SqlxUserRepository, UserRepository};

/// Escape character used in every `LIKE ... ESCAPE` clause. `!` needs no
/// quoting in either SQL dialect.
const LIKE_ESCAPE: char = '!';

/// `%term%` pattern with LIKE wildcards in `term` escaped.
///
/// Only ASCII letters are lowercased, matching SQLite's `LOWER()`; the
/// pattern is always compared against a `LOWER(column)`.
pub(crate) fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars().map(|c| c.to_ascii_lowercase()) {
        if c == LIKE_ESCAPE || c == '%' || c == '_' {
            pattern.push(LIKE_ESCAPE);
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// `?, ?, ?` for an `IN (...)` list of `n` values
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

//! URL slug generation for categories, courses and lessons.

use std::collections::HashSet;

use crate::config::{FALLBACK_SLUG, MAX_SLUG_LENGTH};

/// Turn a title into a URL slug.
///
/// ASCII letters and digits are kept (lowercased); every other run of
/// characters collapses into a single `-`. The result never starts or ends
/// with a dash and is at most `MAX_SLUG_LENGTH` characters long.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    if slug.len() > MAX_SLUG_LENGTH {
        slug.truncate(MAX_SLUG_LENGTH);
        while slug.ends_with('-') {
            slug.pop();
        }
    }

    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

/// Pick `base` or the first free `base-2`, `base-3`, ... not in `taken`.
pub fn unique_slug(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }

    (2u32..)
        .map(|n| format!("{}-{}", base, n))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Rust for Beginners"), "rust-for-beginners");
        assert_eq!(slugify("  C++ & Rust: Zero-Cost!  "), "c-rust-zero-cost");
        assert_eq!(slugify("Intro___to---SQL"), "intro-to-sql");
    }

    #[test]
    fn test_slugify_non_ascii_and_empty() {
        assert_eq!(slugify("Café Crème 101"), "caf-cr-me-101");
        assert_eq!(slugify("日本語"), FALLBACK_SLUG);
        assert_eq!(slugify(""), FALLBACK_SLUG);
    }

    #[test]
    fn test_slugify_truncates_without_trailing_dash() {
        let title = format!("{} tail", "a".repeat(MAX_SLUG_LENGTH - 1));
        let slug = slugify(&title);
        assert!(slug.len() <= MAX_SLUG_LENGTH);
        assert!(!slug.ends_with('-'));
    }

    #[test]
    fn test_unique_slug_appends_counter() {
        let mut taken = HashSet::new();
        assert_eq!(unique_slug("rust", &taken), "rust");

        taken.insert("rust".to_string());
        taken.insert("rust-2".to_string());
        assert_eq!(unique_slug("rust", &taken), "rust-3");
    }
}

//! Slug rules for content records.
//!
//! A slug is lowercase ASCII alphanumerics separated by single hyphens. The
//! rendered-page cache reserves a key outside that alphabet for the homepage,
//! so no content slug can ever collide with it.

use slug::slugify;
use thiserror::Error;

const MAX_SLUG_LEN: usize = 200;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug source text is empty")]
    EmptyInput,
    #[error("failed to derive slug from `{input}`")]
    Unrepresentable { input: String },
    #[error("slug `{slug}` is invalid: {reason}")]
    Invalid { slug: String, reason: &'static str },
}

/// Derive a slug from human-readable text such as a title.
pub fn derive_slug(input: &str) -> Result<String, SlugError> {
    if input.trim().is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let candidate = slugify(input);
    if candidate.is_empty() {
        return Err(SlugError::Unrepresentable {
            input: input.to_string(),
        });
    }

    let truncated: String = candidate.chars().take(MAX_SLUG_LEN).collect();
    Ok(truncated.trim_end_matches('-').to_string())
}

/// Check that an author-supplied slug follows the slug alphabet.
pub fn validate_slug(slug: &str) -> Result<(), SlugError> {
    let invalid = |reason| SlugError::Invalid {
        slug: slug.to_string(),
        reason,
    };

    if slug.is_empty() {
        return Err(SlugError::EmptyInput);
    }
    if slug.len() > MAX_SLUG_LEN {
        return Err(invalid("longer than 200 characters"));
    }
    if !slug
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    {
        return Err(invalid("only lowercase letters, digits and hyphens are allowed"));
    }
    if slug.starts_with('-') || slug.ends_with('-') || slug.contains("--") {
        return Err(invalid("hyphens must separate words"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_slug_from_title() {
        assert_eq!(derive_slug("Hello, World!").unwrap(), "hello-world");
        assert_eq!(derive_slug("   "), Err(SlugError::EmptyInput));
    }

    #[test]
    fn validate_accepts_canonical_slugs() {
        assert!(validate_slug("hello").is_ok());
        assert!(validate_slug("release-2-0").is_ok());
    }

    #[test]
    fn validate_rejects_reserved_alphabet() {
        assert!(validate_slug("__home__").is_err());
        assert!(validate_slug("Hello").is_err());
        assert!(validate_slug("a--b").is_err());
        assert!(validate_slug("-a").is_err());
        assert_eq!(validate_slug(""), Err(SlugError::EmptyInput));
    }

    #[test]
    fn derived_slugs_always_validate() {
        for title in ["Hello", "Rust 2024: what's new?", "  spaced   out  "] {
            let slug = derive_slug(title).unwrap();
            assert!(validate_slug(&slug).is_ok(), "{slug}");
        }
    }
}

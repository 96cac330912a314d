//! Cache key definitions.
//!
//! `TemplateKey` addresses the compiled-template cache; `PageKey` addresses the
//! rendered-page cache.

use std::fmt;

use uuid::Uuid;

/// Reserved page identity for the homepage listing. Underscores are outside
/// the slug alphabet, so no content slug maps onto it.
pub const HOMEPAGE_SENTINEL: &str = "__home__";

/// Compiled templates are keyed by id *and* version: an edit bumps the
/// version, so a reader holding the old version can never hit a newer entry
/// and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TemplateKey {
    pub id: Uuid,
    pub version: i64,
}

impl TemplateKey {
    pub fn new(id: Uuid, version: i64) -> Self {
        Self { id, version }
    }
}

/// Identity of a fully rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PageKey {
    /// The listing view; aggregates many content items.
    Homepage,
    /// A single content item.
    Slug(String),
}

impl PageKey {
    /// An empty slug addresses the homepage.
    pub fn for_slug(slug: &str) -> Self {
        if slug.is_empty() {
            PageKey::Homepage
        } else {
            PageKey::Slug(slug.to_string())
        }
    }

    /// Backend key under the given namespace prefix.
    pub fn storage_key(&self, prefix: &str) -> String {
        format!("{}{}", page_namespace(prefix), self)
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageKey::Homepage => f.write_str(HOMEPAGE_SENTINEL),
            PageKey::Slug(slug) => f.write_str(slug),
        }
    }
}

/// Prefix shared by every page key; used for namespace-wide purges.
pub fn page_namespace(prefix: &str) -> String {
    format!("{prefix}page:")
}

/// Set of stored page keys kept by backends that cannot cheaply list a namespace.
pub fn page_index_key(prefix: &str) -> String {
    format!("{prefix}page-index")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_keys_are_deterministic() {
        let a = PageKey::for_slug("hello").storage_key("vellum:");
        let b = PageKey::Slug("hello".to_string()).storage_key("vellum:");
        assert_eq!(a, "vellum:page:hello");
        assert_eq!(a, b);
    }

    #[test]
    fn empty_slug_is_homepage() {
        assert_eq!(PageKey::for_slug(""), PageKey::Homepage);
        assert_eq!(
            PageKey::Homepage.storage_key("vellum:"),
            "vellum:page:__home__"
        );
    }

    #[test]
    fn all_page_keys_live_under_namespace() {
        let namespace = page_namespace("x:");
        assert!(PageKey::Homepage.storage_key("x:").starts_with(&namespace));
        assert!(PageKey::for_slug("a").storage_key("x:").starts_with(&namespace));
    }

    #[test]
    fn index_key_is_not_a_page_key() {
        assert!(!page_index_key("x:").starts_with(&page_namespace("x:")));
    }

    #[test]
    fn template_keys_differ_by_version() {
        let id = Uuid::new_v4();
        assert_ne!(TemplateKey::new(id, 1), TemplateKey::new(id, 2));
        assert_eq!(TemplateKey::new(id, 3), TemplateKey::new(id, 3));
    }
}

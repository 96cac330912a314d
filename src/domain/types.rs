//! Shared domain enumerations aligned with persisted database enums.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// Slot a template fills when a page is assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "template_type", rename_all = "snake_case")]
pub enum TemplateType {
    Header,
    Footer,
    Page,
    ArticleLoop,
}

impl TemplateType {
    pub const ALL: [TemplateType; 4] = [
        TemplateType::Header,
        TemplateType::Footer,
        TemplateType::Page,
        TemplateType::ArticleLoop,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TemplateType::Header => "header",
            TemplateType::Footer => "footer",
            TemplateType::Page => "page",
            TemplateType::ArticleLoop => "article_loop",
        }
    }

    /// Fragments render with no page data and may be absent.
    pub fn is_fragment(self) -> bool {
        matches!(self, TemplateType::Header | TemplateType::Footer)
    }
}

impl fmt::Display for TemplateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateType {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        TemplateType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| DomainError::validation(format!("unknown template type `{value}`")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "content_type", rename_all = "snake_case")]
pub enum ContentType {
    Post,
    Page,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Post => "post",
            ContentType::Page => "page",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "body_format", rename_all = "snake_case")]
pub enum BodyFormat {
    #[default]
    Html,
    Markdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "content_status", rename_all = "snake_case")]
pub enum ContentStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

/// Kind of entity whose mutation triggered a cache purge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "entity_kind", rename_all = "snake_case")]
pub enum EntityKind {
    Content,
    Template,
    Cache,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Content => "content",
            EntityKind::Template => "template",
            EntityKind::Cache => "cache",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "mutation_action", rename_all = "snake_case")]
pub enum MutationAction {
    Created,
    Updated,
    Deleted,
    Activated,
    Purged,
}

impl MutationAction {
    pub fn as_str(self) -> &'static str {
        match self {
            MutationAction::Created => "created",
            MutationAction::Updated => "updated",
            MutationAction::Deleted => "deleted",
            MutationAction::Activated => "activated",
            MutationAction::Purged => "purged",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_type_round_trips_through_str() {
        for kind in TemplateType::ALL {
            assert_eq!(kind.as_str().parse::<TemplateType>().unwrap(), kind);
        }
        assert!("sidebar".parse::<TemplateType>().is_err());
    }

    #[test]
    fn only_header_and_footer_are_fragments() {
        assert!(TemplateType::Header.is_fragment());
        assert!(TemplateType::Footer.is_fragment());
        assert!(!TemplateType::Page.is_fragment());
        assert!(!TemplateType::ArticleLoop.is_fragment());
    }
}

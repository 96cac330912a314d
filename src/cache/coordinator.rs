//! Invalidation coordinator.
//!
//! Translates a successful content or template mutation into the minimal set
//! of cache evictions and runs them before the mutating request returns.
//!
//! | Mutation                       | L1              | L2                          |
//! |--------------------------------|-----------------|-----------------------------|
//! | content create/update/delete   | none            | the slug + homepage         |
//! | template create                | none            | none                        |
//! | template update                | that template   | everything                  |
//! | template delete                | that template   | everything, if it was active|
//! | template activate              | everything      | everything                  |

use std::fmt;
use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::application::repos::InvalidationLog;
use crate::domain::entities::InvalidationLogRecord;
use crate::domain::types::{EntityKind, MutationAction};

use super::keys::PageKey;
use super::pages::PageCache;
use super::templates::TemplateCache;

const METRIC_INVALIDATION: &str = "vellum_invalidation_total";

/// A mutation that has already been committed to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    ContentCreated {
        id: Uuid,
        slug: String,
    },
    ContentUpdated {
        id: Uuid,
        slug: String,
        /// Set when the update renamed the slug.
        previous_slug: Option<String>,
    },
    ContentDeleted {
        id: Uuid,
        slug: String,
    },
    TemplateCreated {
        id: Uuid,
    },
    TemplateUpdated {
        id: Uuid,
    },
    TemplateDeleted {
        id: Uuid,
        was_active: bool,
    },
    TemplateActivated {
        id: Uuid,
    },
    /// Operator-requested purge of both tiers.
    PurgeAll,
}

impl Mutation {
    pub fn entity_kind(&self) -> EntityKind {
        match self {
            Mutation::ContentCreated { .. }
            | Mutation::ContentUpdated { .. }
            | Mutation::ContentDeleted { .. } => EntityKind::Content,
            Mutation::TemplateCreated { .. }
            | Mutation::TemplateUpdated { .. }
            | Mutation::TemplateDeleted { .. }
            | Mutation::TemplateActivated { .. } => EntityKind::Template,
            Mutation::PurgeAll => EntityKind::Cache,
        }
    }

    pub fn entity_id(&self) -> Option<Uuid> {
        match self {
            Mutation::ContentCreated { id, .. }
            | Mutation::ContentUpdated { id, .. }
            | Mutation::ContentDeleted { id, .. }
            | Mutation::TemplateCreated { id }
            | Mutation::TemplateUpdated { id }
            | Mutation::TemplateDeleted { id, .. }
            | Mutation::TemplateActivated { id } => Some(*id),
            Mutation::PurgeAll => None,
        }
    }

    pub fn action(&self) -> MutationAction {
        match self {
            Mutation::ContentCreated { .. } | Mutation::TemplateCreated { .. } => {
                MutationAction::Created
            }
            Mutation::ContentUpdated { .. } | Mutation::TemplateUpdated { .. } => {
                MutationAction::Updated
            }
            Mutation::ContentDeleted { .. } | Mutation::TemplateDeleted { .. } => {
                MutationAction::Deleted
            }
            Mutation::TemplateActivated { .. } => MutationAction::Activated,
            Mutation::PurgeAll => MutationAction::Purged,
        }
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = self.entity_kind().as_str();
        let action = self.action().as_str();
        match self.entity_id() {
            Some(id) => write!(f, "{kind} {action} ({id})"),
            None => write!(f, "{kind} {action}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum L1Action {
    None,
    Template(Uuid),
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum L2Action {
    None,
    Pages(Vec<PageKey>),
    All,
}

/// Evictions owed for one mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationPlan {
    pub l1: L1Action,
    pub l2: L2Action,
}

impl InvalidationPlan {
    pub fn for_mutation(mutation: &Mutation) -> Self {
        match mutation {
            Mutation::ContentCreated { slug, .. } | Mutation::ContentDeleted { slug, .. } => Self {
                l1: L1Action::None,
                l2: L2Action::Pages(page_keys([Some(slug.as_str()), None])),
            },
            Mutation::ContentUpdated {
                slug,
                previous_slug,
                ..
            } => Self {
                l1: L1Action::None,
                l2: L2Action::Pages(page_keys([Some(slug.as_str()), previous_slug.as_deref()])),
            },
            Mutation::TemplateCreated { .. } => Self {
                l1: L1Action::None,
                l2: L2Action::None,
            },
            Mutation::TemplateUpdated { id } => Self {
                l1: L1Action::Template(*id),
                l2: L2Action::All,
            },
            Mutation::TemplateDeleted { id, was_active } => Self {
                l1: L1Action::Template(*id),
                l2: if *was_active {
                    L2Action::All
                } else {
                    L2Action::None
                },
            },
            Mutation::TemplateActivated { .. } | Mutation::PurgeAll => Self {
                l1: L1Action::All,
                l2: L2Action::All,
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.l1 == L1Action::None && self.l2 == L2Action::None
    }

    /// Coarsest scope touched, used as a metric label.
    pub fn scope(&self) -> &'static str {
        match (&self.l1, &self.l2) {
            (L1Action::All, _) | (_, L2Action::All) => "all",
            (L1Action::Template(_), _) => "template",
            (_, L2Action::Pages(_)) => "pages",
            (L1Action::None, L2Action::None) => "none",
        }
    }
}

/// Every content mutation also evicts the homepage, since it lists content.
fn page_keys<const N: usize>(slugs: [Option<&str>; N]) -> Vec<PageKey> {
    let mut keys = Vec::with_capacity(N + 1);
    for slug in slugs.into_iter().flatten() {
        let key = PageKey::for_slug(slug);
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    if !keys.contains(&PageKey::Homepage) {
        keys.push(PageKey::Homepage);
    }
    keys
}

impl fmt::Display for InvalidationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let l1 = match &self.l1 {
            L1Action::None => "none".to_string(),
            L1Action::Template(id) => format!("template {id}"),
            L1Action::All => "all".to_string(),
        };
        let l2 = match &self.l2 {
            L2Action::None => "none".to_string(),
            L2Action::Pages(keys) => {
                let keys: Vec<String> = keys.iter().map(ToString::to_string).collect();
                format!("pages [{}]", keys.join(", "))
            }
            L2Action::All => "all".to_string(),
        };
        write!(f, "InvalidationPlan {{ l1: {l1}, l2: {l2} }}")
    }
}

/// What an `apply` call actually did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InvalidationReport {
    pub scope: &'static str,
    pub templates_removed: usize,
    /// Stored pages actually evicted; keys that were not cached do not count.
    pub pages_removed: u64,
    /// Page-cache evictions that failed; those entries age out by TTL.
    pub page_errors: Vec<String>,
}

impl InvalidationReport {
    pub fn is_clean(&self) -> bool {
        self.page_errors.is_empty()
    }
}

pub struct InvalidationCoordinator {
    templates: Arc<TemplateCache>,
    pages: Arc<PageCache>,
    log: Arc<dyn InvalidationLog>,
}

impl InvalidationCoordinator {
    pub fn new(
        templates: Arc<TemplateCache>,
        pages: Arc<PageCache>,
        log: Arc<dyn InvalidationLog>,
    ) -> Self {
        Self {
            templates,
            pages,
            log,
        }
    }

    /// Run the evictions for `mutation` and append one audit record.
    ///
    /// Never fails: page-cache errors are reported in the returned value and
    /// an audit write failure is only logged.
    #[instrument(skip(self), fields(mutation = %mutation))]
    pub async fn apply(&self, mutation: Mutation) -> InvalidationReport {
        let plan = InvalidationPlan::for_mutation(&mutation);
        let mut report = InvalidationReport {
            scope: plan.scope(),
            ..Default::default()
        };

        report.templates_removed = match plan.l1 {
            L1Action::None => 0,
            L1Action::Template(id) => self.templates.invalidate(id),
            L1Action::All => self.templates.invalidate_all(),
        };

        match &plan.l2 {
            L2Action::None => {}
            L2Action::Pages(keys) => {
                for key in keys {
                    match self.pages.invalidate(key).await {
                        Ok(true) => report.pages_removed += 1,
                        Ok(false) => {}
                        Err(err) => report.page_errors.push(format!("{key}: {err}")),
                    }
                }
            }
            L2Action::All => match self.pages.invalidate_all().await {
                Ok(removed) => report.pages_removed = removed,
                Err(err) => report.page_errors.push(err.to_string()),
            },
        }

        counter!(METRIC_INVALIDATION, "scope" => plan.scope()).increment(1);
        if report.is_clean() {
            info!(
                %plan,
                templates_removed = report.templates_removed,
                pages_removed = report.pages_removed,
                "cache invalidated"
            );
        } else {
            warn!(%plan, errors = ?report.page_errors, "page cache invalidation incomplete");
        }

        self.record(&mutation).await;
        report
    }

    pub async fn content_created(&self, id: Uuid, slug: &str) -> InvalidationReport {
        self.apply(Mutation::ContentCreated {
            id,
            slug: slug.to_string(),
        })
        .await
    }

    pub async fn content_updated(
        &self,
        id: Uuid,
        slug: &str,
        previous_slug: Option<&str>,
    ) -> InvalidationReport {
        self.apply(Mutation::ContentUpdated {
            id,
            slug: slug.to_string(),
            previous_slug: previous_slug
                .filter(|previous| *previous != slug)
                .map(str::to_string),
        })
        .await
    }

    pub async fn content_deleted(&self, id: Uuid, slug: &str) -> InvalidationReport {
        self.apply(Mutation::ContentDeleted {
            id,
            slug: slug.to_string(),
        })
        .await
    }

    pub async fn template_created(&self, id: Uuid) -> InvalidationReport {
        self.apply(Mutation::TemplateCreated { id }).await
    }

    pub async fn template_updated(&self, id: Uuid) -> InvalidationReport {
        self.apply(Mutation::TemplateUpdated { id }).await
    }

    pub async fn template_deleted(&self, id: Uuid, was_active: bool) -> InvalidationReport {
        self.apply(Mutation::TemplateDeleted { id, was_active }).await
    }

    pub async fn template_activated(&self, id: Uuid) -> InvalidationReport {
        self.apply(Mutation::TemplateActivated { id }).await
    }

    pub async fn purge_all(&self) -> InvalidationReport {
        self.apply(Mutation::PurgeAll).await
    }

    async fn record(&self, mutation: &Mutation) {
        let record = InvalidationLogRecord::new(
            mutation.entity_kind(),
            mutation.entity_id().map(|id| id.to_string()),
            mutation.action(),
        );
        if let Err(err) = self.log.append(record).await {
            warn!(error = %err, "failed to append invalidation log record");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use bytes::Bytes;

    use super::*;
    use crate::application::render::Compiler;
    use crate::application::repos::RepoError;
    use crate::cache::backend::MemoryPageBackend;
    use crate::cache::config::CacheConfig;

    #[derive(Default)]
    struct RecordingLog {
        records: Mutex<Vec<InvalidationLogRecord>>,
        fail: bool,
    }

    #[async_trait]
    impl InvalidationLog for RecordingLog {
        async fn append(&self, record: InvalidationLogRecord) -> Result<(), RepoError> {
            if self.fail {
                return Err(RepoError::Timeout);
            }
            self.records.lock().unwrap().push(record);
            Ok(())
        }

        async fn list_recent(&self, limit: u32) -> Result<Vec<InvalidationLogRecord>, RepoError> {
            let records = self.records.lock().unwrap();
            Ok(records.iter().rev().take(limit as usize).cloned().collect())
        }
    }

    struct Fixture {
        templates: Arc<TemplateCache>,
        pages: Arc<PageCache>,
        log: Arc<RecordingLog>,
        coordinator: InvalidationCoordinator,
    }

    fn fixture_with_log(log: RecordingLog) -> Fixture {
        let config = CacheConfig::default();
        let templates = Arc::new(TemplateCache::default());
        let pages = Arc::new(PageCache::new(
            &config,
            Arc::new(MemoryPageBackend::new(&config)),
        ));
        let log = Arc::new(log);
        let coordinator =
            InvalidationCoordinator::new(templates.clone(), pages.clone(), log.clone());
        Fixture {
            templates,
            pages,
            log,
            coordinator,
        }
    }

    fn fixture() -> Fixture {
        fixture_with_log(RecordingLog::default())
    }

    async fn seed_pages(pages: &PageCache, slugs: &[&str]) {
        for slug in slugs {
            pages
                .put(
                    &PageKey::for_slug(slug),
                    Bytes::from(slug.to_string()),
                    Duration::from_secs(60),
                )
                .await;
        }
        pages
            .put(&PageKey::Homepage, Bytes::from("home"), Duration::from_secs(60))
            .await;
    }

    fn seed_template(templates: &TemplateCache, id: Uuid, version: i64) {
        let compiled = Compiler::new().compile("x").unwrap();
        templates.put(id, version, Arc::new(compiled));
    }

    #[test]
    fn plan_follows_the_table() {
        let id = Uuid::new_v4();

        let plan = InvalidationPlan::for_mutation(&Mutation::ContentDeleted {
            id,
            slug: "post".into(),
        });
        assert_eq!(plan.l1, L1Action::None);
        assert_eq!(
            plan.l2,
            L2Action::Pages(vec![PageKey::for_slug("post"), PageKey::Homepage])
        );

        assert!(InvalidationPlan::for_mutation(&Mutation::TemplateCreated { id }).is_empty());

        let plan = InvalidationPlan::for_mutation(&Mutation::TemplateUpdated { id });
        assert_eq!(plan.l1, L1Action::Template(id));
        assert_eq!(plan.l2, L2Action::All);

        let plan = InvalidationPlan::for_mutation(&Mutation::TemplateDeleted {
            id,
            was_active: false,
        });
        assert_eq!(plan.l1, L1Action::Template(id));
        assert_eq!(plan.l2, L2Action::None);

        let plan = InvalidationPlan::for_mutation(&Mutation::TemplateDeleted {
            id,
            was_active: true,
        });
        assert_eq!(plan.l2, L2Action::All);

        let plan = InvalidationPlan::for_mutation(&Mutation::TemplateActivated { id });
        assert_eq!(plan.l1, L1Action::All);
        assert_eq!(plan.l2, L2Action::All);
        assert_eq!(plan.scope(), "all");
    }

    #[test]
    fn renamed_slug_evicts_both_slugs() {
        let plan = InvalidationPlan::for_mutation(&Mutation::ContentUpdated {
            id: Uuid::new_v4(),
            slug: "new".into(),
            previous_slug: Some("old".into()),
        });
        assert_eq!(
            plan.l2,
            L2Action::Pages(vec![
                PageKey::for_slug("new"),
                PageKey::for_slug("old"),
                PageKey::Homepage
            ])
        );
        assert_eq!(plan.scope(), "pages");
    }

    #[tokio::test]
    async fn content_update_evicts_slug_and_homepage_only() {
        let fx = fixture();
        seed_pages(&fx.pages, &["a", "b"]).await;
        let template = Uuid::new_v4();
        seed_template(&fx.templates, template, 1);

        let report = fx.coordinator.content_updated(Uuid::new_v4(), "a", None).await;

        assert!(report.is_clean());
        assert_eq!(report.pages_removed, 2);
        assert!(fx.pages.get(&PageKey::for_slug("a")).await.is_none());
        assert!(fx.pages.get(&PageKey::Homepage).await.is_none());
        assert!(fx.pages.get(&PageKey::for_slug("b")).await.is_some());
        assert!(fx.templates.get(template, 1).is_some());
    }

    #[tokio::test]
    async fn uncached_pages_are_not_counted_as_removed() {
        let fx = fixture();
        seed_pages(&fx.pages, &["cached"]).await;

        let report = fx
            .coordinator
            .content_created(Uuid::new_v4(), "never-rendered")
            .await;

        assert!(report.is_clean());
        // Only the homepage was stored.
        assert_eq!(report.pages_removed, 1);
        assert!(fx.pages.get(&PageKey::for_slug("cached")).await.is_some());
    }

    #[tokio::test]
    async fn template_update_evicts_its_versions_and_all_pages() {
        let fx = fixture();
        seed_pages(&fx.pages, &["a", "b"]).await;
        let edited = Uuid::new_v4();
        let other = Uuid::new_v4();
        seed_template(&fx.templates, edited, 1);
        seed_template(&fx.templates, edited, 2);
        seed_template(&fx.templates, other, 1);

        let report = fx.coordinator.template_updated(edited).await;

        assert_eq!(report.templates_removed, 2);
        assert_eq!(report.pages_removed, 3);
        assert!(fx.templates.get(other, 1).is_some());
        assert!(fx.pages.get(&PageKey::for_slug("b")).await.is_none());
    }

    #[tokio::test]
    async fn inactive_template_delete_keeps_pages() {
        let fx = fixture();
        seed_pages(&fx.pages, &["a"]).await;
        let id = Uuid::new_v4();
        seed_template(&fx.templates, id, 1);

        fx.coordinator.template_deleted(id, false).await;

        assert!(fx.templates.get(id, 1).is_none());
        assert!(fx.pages.get(&PageKey::for_slug("a")).await.is_some());
    }

    #[tokio::test]
    async fn activation_clears_both_tiers() {
        let fx = fixture();
        seed_pages(&fx.pages, &["a", "b"]).await;
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            seed_template(&fx.templates, *id, 1);
        }

        fx.coordinator.template_activated(ids[0]).await;

        assert!(fx.templates.is_empty());
        assert!(fx.pages.get(&PageKey::for_slug("a")).await.is_none());
        assert!(fx.pages.get(&PageKey::Homepage).await.is_none());
    }

    #[tokio::test]
    async fn every_call_is_audited_once() {
        let fx = fixture();
        let id = Uuid::new_v4();

        fx.coordinator.template_created(id).await;
        fx.coordinator.content_deleted(id, "gone").await;
        fx.coordinator.purge_all().await;

        let records = fx.log.records.lock().unwrap().clone();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].entity_kind, EntityKind::Template);
        assert_eq!(records[0].action, MutationAction::Created);
        assert_eq!(records[1].entity_id.as_deref(), Some(id.to_string().as_str()));
        assert_eq!(records[2].entity_kind, EntityKind::Cache);
        assert_eq!(records[2].entity_id, None);
    }

    #[tokio::test]
    async fn audit_failure_does_not_block_invalidation() {
        let fx = fixture_with_log(RecordingLog {
            fail: true,
            ..Default::default()
        });
        seed_pages(&fx.pages, &["a"]).await;

        let report = fx.coordinator.content_created(Uuid::new_v4(), "a").await;

        assert!(report.is_clean());
        assert!(fx.pages.get(&PageKey::for_slug("a")).await.is_none());
    }
}

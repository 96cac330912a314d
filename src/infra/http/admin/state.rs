use std::sync::Arc;

use crate::application::admin::{AdminContentService, AdminTemplateService};
use crate::application::repos::InvalidationLog;
use crate::cache::InvalidationCoordinator;
use crate::infra::db::PostgresRepositories;

#[derive(Clone)]
pub struct AdminState {
    pub templates: Arc<AdminTemplateService>,
    pub contents: Arc<AdminContentService>,
    pub coordinator: Arc<InvalidationCoordinator>,
    pub invalidations: Arc<dyn InvalidationLog>,
    /// Absent when running on the in-memory repositories.
    pub db: Option<Arc<PostgresRepositories>>,
}

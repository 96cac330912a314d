//! Application services for the administrative surface.

pub mod content;
pub mod templates;

use serde::Serialize;

use crate::cache::InvalidationReport;

pub use content::{AdminContentError, AdminContentService, ContentCommand};
pub use templates::{
    AdminTemplateError, AdminTemplateService, CreateTemplateCommand, UpdateTemplateCommand,
};

/// A stored record together with the cache invalidation its write triggered.
#[derive(Debug, Clone, Serialize)]
pub struct Mutated<T> {
    pub record: T,
    pub invalidation: InvalidationReport,
}

impl<T> Mutated<T> {
    pub fn new(record: T, invalidation: InvalidationReport) -> Self {
        Self {
            record,
            invalidation,
        }
    }
}

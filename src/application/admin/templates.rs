use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::application::admin::Mutated;
use crate::application::error::AppError;
use crate::application::render::{RenderContext, RenderError, RenderPipeline};
use crate::application::repos::{
    CreateTemplateParams, RepoError, TemplateStore, UpdateTemplateParams,
};
use crate::cache::InvalidationCoordinator;
use crate::domain::entities::TemplateRecord;
use crate::domain::types::TemplateType;

#[derive(Debug, Error)]
pub enum AdminTemplateError {
    #[error("{0}")]
    ConstraintViolation(&'static str),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<AdminTemplateError> for AppError {
    fn from(error: AdminTemplateError) -> Self {
        match error {
            AdminTemplateError::ConstraintViolation(message) => AppError::validation(message),
            AdminTemplateError::Render(err) => AppError::Render(err),
            AdminTemplateError::Repo(err) => AppError::Repo(err),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTemplateCommand {
    pub template_type: TemplateType,
    pub name: String,
    pub source: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTemplateCommand {
    pub name: String,
    pub source: String,
}

/// Template authoring. Markup is compiled before it is stored, and every
/// successful write is followed by the matching cache invalidation.
#[derive(Clone)]
pub struct AdminTemplateService {
    store: Arc<dyn TemplateStore>,
    pipeline: Arc<RenderPipeline>,
    coordinator: Arc<InvalidationCoordinator>,
}

impl AdminTemplateService {
    pub fn new(
        store: Arc<dyn TemplateStore>,
        pipeline: Arc<RenderPipeline>,
        coordinator: Arc<InvalidationCoordinator>,
    ) -> Self {
        Self {
            store,
            pipeline,
            coordinator,
        }
    }

    pub async fn list(
        &self,
        template_type: Option<TemplateType>,
    ) -> Result<Vec<TemplateRecord>, AdminTemplateError> {
        Ok(self.store.list_templates(template_type).await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<TemplateRecord, AdminTemplateError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or(AdminTemplateError::Repo(RepoError::NotFound))
    }

    pub async fn create(
        &self,
        command: CreateTemplateCommand,
    ) -> Result<Mutated<TemplateRecord>, AdminTemplateError> {
        let name = normalize_name(&command.name)?;
        self.pipeline.validate_template(&command.source)?;

        let record = self
            .store
            .create_template(CreateTemplateParams {
                template_type: command.template_type,
                name,
                source: command.source,
            })
            .await?;

        let invalidation = self.coordinator.template_created(record.id).await;
        info!(template_id = %record.id, template_type = %record.template_type, "Template created");
        Ok(Mutated::new(record, invalidation))
    }

    pub async fn update(
        &self,
        id: Uuid,
        command: UpdateTemplateCommand,
    ) -> Result<Mutated<TemplateRecord>, AdminTemplateError> {
        let name = normalize_name(&command.name)?;
        self.pipeline.validate_template(&command.source)?;

        let record = self
            .store
            .update_template(UpdateTemplateParams {
                id,
                name,
                source: command.source,
            })
            .await?;

        let invalidation = self.coordinator.template_updated(record.id).await;
        info!(template_id = %record.id, version = record.version, "Template updated");
        Ok(Mutated::new(record, invalidation))
    }

    pub async fn activate(&self, id: Uuid) -> Result<Mutated<TemplateRecord>, AdminTemplateError> {
        let record = self.store.activate_template(id).await?;

        let invalidation = self.coordinator.template_activated(record.id).await;
        info!(template_id = %record.id, template_type = %record.template_type, "Template activated");
        Ok(Mutated::new(record, invalidation))
    }

    pub async fn delete(&self, id: Uuid) -> Result<Mutated<TemplateRecord>, AdminTemplateError> {
        let record = self.store.delete_template(id).await?;

        let invalidation = self
            .coordinator
            .template_deleted(record.id, record.is_active)
            .await;
        info!(template_id = %record.id, "Template deleted");
        Ok(Mutated::new(record, invalidation))
    }

    pub fn validate(&self, source: &str) -> Result<(), AdminTemplateError> {
        Ok(self.pipeline.validate_template(source)?)
    }

    /// Render unsaved markup against free-form JSON data.
    pub fn preview(
        &self,
        source: &str,
        data: serde_json::Value,
    ) -> Result<String, AdminTemplateError> {
        let context = RenderContext::from_json(data);
        Ok(self.pipeline.validate_and_render(source, &context)?)
    }
}

fn normalize_name(name: &str) -> Result<String, AdminTemplateError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AdminTemplateError::ConstraintViolation(
            "template name must not be empty",
        ));
    }
    Ok(name.to_string())
}

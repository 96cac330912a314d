//! Compiled-template cache (L1).
//!
//! Process-local map from `(template id, version)` to a compiled template.
//! Entries never expire; they leave only through `invalidate` or
//! `invalidate_all`. Reads take a shared lock, writes an exclusive one.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use metrics::counter;
use tracing::debug;
use uuid::Uuid;

use crate::application::render::CompiledTemplate;

use super::keys::TemplateKey;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::templates";
const METRIC_L1_HIT: &str = "vellum_l1_hit_total";
const METRIC_L1_MISS: &str = "vellum_l1_miss_total";

pub struct TemplateCache {
    enabled: bool,
    entries: RwLock<HashMap<TemplateKey, Arc<CompiledTemplate>>>,
}

impl TemplateCache {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, id: Uuid, version: i64) -> Option<Arc<CompiledTemplate>> {
        if !self.enabled {
            return None;
        }

        let hit = rw_read(&self.entries, SOURCE, "get")
            .get(&TemplateKey::new(id, version))
            .cloned();

        if hit.is_some() {
            counter!(METRIC_L1_HIT).increment(1);
        } else {
            counter!(METRIC_L1_MISS).increment(1);
        }
        hit
    }

    pub fn put(&self, id: Uuid, version: i64, compiled: Arc<CompiledTemplate>) {
        if !self.enabled {
            return;
        }
        rw_write(&self.entries, SOURCE, "put").insert(TemplateKey::new(id, version), compiled);
    }

    /// Drop every version cached for `id`. Returns the number of entries removed.
    pub fn invalidate(&self, id: Uuid) -> usize {
        let mut entries = rw_write(&self.entries, SOURCE, "invalidate");
        let before = entries.len();
        entries.retain(|key, _| key.id != id);
        let removed = before - entries.len();
        debug!(cache = "l1", template_id = %id, removed, "invalidated template");
        removed
    }

    /// Drop everything. Returns the number of entries removed.
    pub fn invalidate_all(&self) -> usize {
        let mut entries = rw_write(&self.entries, SOURCE, "invalidate_all");
        let removed = entries.len();
        entries.clear();
        debug!(cache = "l1", removed, "invalidated all templates");
        removed
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TemplateCache {
    fn default() -> Self {
        Self::new(true)
    }
}

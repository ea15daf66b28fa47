//! Converted workflow templates, keyed by file identity
//!
//! Owned by the caller; nothing in the library holds one globally.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use crate::model::WorkflowTemplate;

#[derive(Debug, Default, Clone)]
pub struct WorkflowTemplateCache {
    templates: HashMap<String, Arc<WorkflowTemplate>>,
}

impl WorkflowTemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Arc<WorkflowTemplate>> {
        self.templates.get(key).cloned()
    }

    pub fn insert(&mut self, key: impl Into<String>, template: WorkflowTemplate) -> Arc<WorkflowTemplate> {
        let template = Arc::new(template);
        self.templates.insert(key.into(), Arc::clone(&template));
        template
    }

    pub fn clear_entry(&mut self, key: &str) {
        if self.templates.remove(key).is_some() {
            trace!(key, "evicted workflow template");
        }
    }

    pub fn clear(&mut self) {
        self.templates.clear();
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get_and_clear() {
        let mut cache = WorkflowTemplateCache::new();
        cache.insert("file:///a.yml", WorkflowTemplate::default());
        cache.insert("file:///b.yml", WorkflowTemplate::default());

        assert!(cache.get("file:///a.yml").is_some());
        assert!(cache.get("file:///c.yml").is_none());

        cache.clear_entry("file:///a.yml");
        assert!(cache.get("file:///a.yml").is_none());
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }
}

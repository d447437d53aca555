//! Resolved model: entity definitions checked and indexed for runtime use.

use crate::schema::types::EntityDef;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct Model {
    pub entities: Vec<Arc<EntityDef>>,
    pub entity_by_path: HashMap<&'static str, Arc<EntityDef>>,
}

impl Model {
    pub fn entity_by_path(&self, path: &str) -> Option<&EntityDef> {
        self.entity_by_path.get(path).map(Arc::as_ref)
    }

    /// Entities whose foreign keys point at `path`, with the referencing field.
    pub fn referencing(&self, path: &str) -> Vec<(&EntityDef, &'static str)> {
        self.entities
            .iter()
            .flat_map(|e| {
                e.relations()
                    .filter(move |(_, target, _)| *target == path)
                    .map(move |(f, _, _)| (e.as_ref(), f.name))
            })
            .collect()
    }
}

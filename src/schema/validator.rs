//! Schema validation: relation targets, unique names and resolvable filters.

use crate::error::SchemaError;
use crate::filter::resolve_target;
use crate::schema::resolved::Model;
use crate::schema::types::{EntityDef, FieldKind};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub fn validate(defs: &[EntityDef]) -> Result<(), SchemaError> {
    let mut paths = HashSet::new();
    let mut tables = HashSet::new();
    for e in defs {
        if !paths.insert(e.path_segment) {
            return Err(SchemaError::DuplicatePathSegment(e.path_segment.to_string()));
        }
        if !tables.insert(e.table) {
            return Err(SchemaError::DuplicateTable(e.table.to_string()));
        }
        let mut names = HashSet::new();
        let mut columns = HashSet::new();
        for f in &e.fields {
            if !names.insert(f.name) || !columns.insert(f.column) {
                return Err(SchemaError::DuplicateField {
                    entity: e.name,
                    field: f.name.to_string(),
                });
            }
        }
    }

    for e in defs {
        for f in &e.fields {
            match &f.kind {
                FieldKind::ForeignKey { target, .. } if !paths.contains(target) => {
                    return Err(SchemaError::MissingReference {
                        entity: e.name,
                        field: f.name,
                        target: target.to_string(),
                    });
                }
                FieldKind::Choice { choices, default } if !choices.iter().any(|(c, _)| c == default) => {
                    return Err(SchemaError::InvalidDefault {
                        entity: e.name,
                        field: f.name,
                    });
                }
                _ => {}
            }
        }
    }
    Ok(())
}

/// Build the runtime model from entity definitions. Filters are checked once the model
/// exists because traversal needs entity lookup by path.
pub fn resolve(defs: Vec<EntityDef>) -> Result<Model, SchemaError> {
    validate(&defs)?;
    let entities: Vec<Arc<EntityDef>> = defs.into_iter().map(Arc::new).collect();
    let entity_by_path: HashMap<_, _> = entities
        .iter()
        .map(|e| (e.path_segment, Arc::clone(e)))
        .collect();
    let model = Model {
        entities,
        entity_by_path,
    };

    for e in &model.entities {
        let mut params = HashSet::new();
        for def in &e.filters {
            if !params.insert(def.param) || resolve_target(&model, e, def).is_none() {
                return Err(SchemaError::InvalidFilter {
                    entity: e.name,
                    param: def.param,
                });
            }
        }
    }
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FilterDef, Lookup};
    use crate::schema::entities;
    use crate::schema::types::{FieldDef, OnDelete};

    #[test]
    fn workshop_entities_resolve() {
        let model = resolve(entities::all()).unwrap();
        assert_eq!(model.entities.len(), 11);
        assert!(model.entity_by_path("car_model").is_some());
        assert_eq!(model.entity_by_path("method").unwrap().table, "payment_type");
    }

    #[test]
    fn referencing_lists_children() {
        let model = resolve(entities::all()).unwrap();
        let refs: Vec<_> = model
            .referencing("customer")
            .into_iter()
            .map(|(e, f)| (e.path_segment, f))
            .collect();
        assert_eq!(refs, vec![("phone", "customer"), ("vehicle", "customer")]);
    }

    #[test]
    fn rejects_unknown_relation_target() {
        let orphan = EntityDef::new(
            "Orphan",
            "orphan",
            "orphan",
            vec![FieldDef::foreign_key("parent", "id_parent", "nowhere", OnDelete::Protect)],
        );
        assert!(matches!(
            resolve(vec![orphan]),
            Err(SchemaError::MissingReference { .. })
        ));
    }

    #[test]
    fn rejects_duplicate_path_segment() {
        let err = resolve(vec![entities::brand(), entities::brand()]).unwrap_err();
        assert!(matches!(err, SchemaError::DuplicatePathSegment(p) if p == "brand"));
    }

    #[test]
    fn rejects_filter_on_unknown_field() {
        let broken = entities::brand().with_filters(vec![FilterDef::related(
            "model",
            &["CarModel"],
            "name",
            Lookup::Like,
        )]);
        assert!(matches!(
            resolve(vec![broken]),
            Err(SchemaError::InvalidFilter { param: "model", .. })
        ));
    }
}

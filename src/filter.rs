//! Filter sets: query parameters translated into a predicate over an entity.
//!
//! Each entity declares a fixed list of [`FilterDef`]s. A filter names the query parameter,
//! an optional chain of relation fields to traverse and the target field, and exactly one
//! [`Lookup`]. [`build_predicate`] turns the request's parameters into a [`Predicate`]
//! (AND of conditions) without touching the database; `sql::render_predicate` turns it into SQL.

use crate::error::{AppError, FieldErrors};
use crate::schema::{EntityDef, FieldDef, FieldKind, Model};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;

/// Matching semantics of one filter parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lookup {
    Exact,
    /// Value is a prefix of the stored text (case-sensitive).
    StartsWith,
    /// Case-insensitive substring.
    IContains,
    /// Case- and accent-insensitive substring.
    Like,
    Gte,
    Lte,
}

impl Lookup {
    pub fn is_textual(&self) -> bool {
        matches!(self, Lookup::StartsWith | Lookup::IContains | Lookup::Like)
    }
}

#[derive(Clone, Debug)]
pub struct FilterDef {
    pub param: &'static str,
    /// Relation fields traversed from the filtered entity, outermost first.
    pub path: &'static [&'static str],
    pub field: &'static str,
    pub lookup: Lookup,
}

impl FilterDef {
    /// Filter on a local field named like the parameter.
    pub const fn local(param: &'static str, lookup: Lookup) -> Self {
        FilterDef {
            param,
            path: &[],
            field: param,
            lookup,
        }
    }

    /// Filter on a local field under a different parameter name.
    pub const fn on(param: &'static str, field: &'static str, lookup: Lookup) -> Self {
        FilterDef {
            param,
            path: &[],
            field,
            lookup,
        }
    }

    /// Filter on a field of a related entity reached through `path`.
    pub const fn related(
        param: &'static str,
        path: &'static [&'static str],
        field: &'static str,
        lookup: Lookup,
    ) -> Self {
        FilterDef {
            param,
            path,
            field,
            lookup,
        }
    }
}

/// One hop of a relation traversal: the referencing column on the current table and the
/// referenced table (joined on its `id`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Join {
    pub fk_column: &'static str,
    pub table: &'static str,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    pub join_path: Vec<Join>,
    pub column: &'static str,
    /// Cast applied to the bound parameter for comparison lookups.
    pub cast: &'static str,
    pub column_is_text: bool,
    pub lookup: Lookup,
    /// Normalized value, always bound as text.
    pub value: Value,
}

/// Conjunction of conditions; empty matches every row.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Predicate {
    pub conditions: Vec<Condition>,
}

impl Predicate {
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

/// Walk `def.path` from `entity` and return the join chain plus the target field.
pub fn resolve_target<'m>(
    model: &'m Model,
    entity: &'m EntityDef,
    def: &FilterDef,
) -> Option<(Vec<Join>, &'m FieldDef)> {
    let mut current = entity;
    let mut joins = Vec::with_capacity(def.path.len());
    for hop in def.path {
        let fk = current.field(hop)?;
        let FieldKind::ForeignKey { target, .. } = fk.kind else {
            return None;
        };
        let next = model.entity_by_path(target)?;
        joins.push(Join {
            fk_column: fk.column,
            table: next.table,
        });
        current = next;
    }
    let field = current.field(def.field)?;
    Some((joins, field))
}

/// Build the predicate for a list request. Parameters not declared by the entity's filter
/// set are ignored, as are empty values. Values that cannot be parsed for the target field
/// are reported together, keyed by parameter name.
pub fn build_predicate(
    model: &Model,
    entity: &EntityDef,
    params: &HashMap<String, String>,
) -> Result<Predicate, AppError> {
    let mut conditions = Vec::new();
    let mut errors = FieldErrors::default();
    for def in &entity.filters {
        let Some(raw) = params.get(def.param).map(|s| s.trim()) else {
            continue;
        };
        if raw.is_empty() {
            continue;
        }
        let (join_path, field) = resolve_target(model, entity, def).ok_or_else(|| {
            AppError::Internal(format!("filter {}.{} does not resolve", entity.name, def.param))
        })?;
        let value = if def.lookup.is_textual() {
            Value::String(raw.to_string())
        } else {
            match parse_filter_value(field, raw) {
                Ok(v) => v,
                Err(msg) => {
                    errors.add(def.param, msg);
                    continue;
                }
            }
        };
        conditions.push(Condition {
            join_path,
            column: field.column,
            cast: field.cast_type(),
            column_is_text: field.is_textual(),
            lookup: def.lookup,
            value,
        });
    }
    errors.into_result()?;
    Ok(Predicate { conditions })
}

fn parse_filter_value(field: &FieldDef, raw: &str) -> Result<Value, String> {
    match &field.kind {
        FieldKind::BigId
        | FieldKind::ForeignKey { .. }
        | FieldKind::Integer { .. }
        | FieldKind::Choice { .. } => raw
            .parse::<i64>()
            .map(|n| Value::String(n.to_string()))
            .map_err(|_| "Enter a whole number.".to_string()),
        FieldKind::Decimal { .. } => Decimal::from_str(raw)
            .map(|d| Value::String(d.normalize().to_string()))
            .map_err(|_| "Enter a number.".to_string()),
        FieldKind::DateTime => parse_datetime_or_date(raw)
            .map(|dt| Value::String(dt.to_rfc3339()))
            .ok_or_else(|| "Enter a valid date.".to_string()),
        FieldKind::Boolean => match raw.to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(Value::String("true".into())),
            "false" | "0" => Ok(Value::String("false".into())),
            _ => Err("Select a valid choice.".to_string()),
        },
        FieldKind::Text { .. } | FieldKind::Email { .. } => Ok(Value::String(raw.to_string())),
    }
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM[:SS]` (UTC) or a bare date (midnight UTC).
pub fn parse_datetime_or_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

//! Builds parameterized SELECT, COUNT, INSERT, UPDATE, DELETE from an entity definition.
//!
//! Identifiers come only from the static schema; request values are always parameters.
//! The entity's table is aliased as `main` and every column is selected as its JSON
//! field name, so rows map one-to-one onto documents.

use crate::filter::{Condition, Join, Lookup, Predicate};
use crate::schema::{EntityDef, FieldDef, FieldKind};
use serde_json::Value;

const MAIN_ALIAS: &str = "main";

/// Quote identifier for PostgreSQL (safe: only from schema).
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

#[derive(Debug, Default)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf::default()
    }

    fn push_param(&mut self, v: Value) -> usize {
        self.params.push(v);
        self.params.len()
    }

    /// Push a parameter and return its placeholder cast to `pg_type`.
    fn placeholder(&mut self, v: Value, pg_type: &str) -> String {
        let n = self.push_param(v);
        format!("${}::{}", n, pg_type)
    }
}

/// `main."tx_name" AS "name", ...`; numeric columns as text so decimals keep their scale.
fn select_column_list(entity: &EntityDef) -> String {
    entity
        .fields
        .iter()
        .map(|f| {
            let col = format!("{}.{}", MAIN_ALIAS, quoted(f.column));
            let expr = if matches!(f.kind, FieldKind::Decimal { .. }) {
                format!("{}::text", col)
            } else {
                col
            };
            format!("{} AS {}", expr, quoted(f.name))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn table_as_main(entity: &EntityDef) -> String {
    format!("{} AS {}", quoted(entity.table), MAIN_ALIAS)
}

/// Escape LIKE wildcards so the value matches literally.
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn render_lookup(q: &mut QueryBuf, alias: &str, cond: &Condition) -> String {
    let col = format!("{}.{}", alias, quoted(cond.column));
    let text_col = if cond.column_is_text {
        col.clone()
    } else {
        format!("{}::text", col)
    };
    let text_value = || match &cond.value {
        Value::String(s) => Value::String(escape_like(s)),
        other => Value::String(escape_like(&other.to_string())),
    };
    match cond.lookup {
        Lookup::Exact => {
            let ph = q.placeholder(cond.value.clone(), cond.cast);
            format!("{} = {}", col, ph)
        }
        Lookup::Gte => {
            let ph = q.placeholder(cond.value.clone(), cond.cast);
            format!("{} >= {}", col, ph)
        }
        Lookup::Lte => {
            let ph = q.placeholder(cond.value.clone(), cond.cast);
            format!("{} <= {}", col, ph)
        }
        Lookup::StartsWith => {
            let ph = q.placeholder(text_value(), "text");
            format!("{} LIKE ({} || '%')", text_col, ph)
        }
        Lookup::IContains => {
            let ph = q.placeholder(text_value(), "text");
            format!("{} ILIKE ('%' || {} || '%')", text_col, ph)
        }
        Lookup::Like => {
            let ph = q.placeholder(text_value(), "text");
            format!("unaccent({}) ILIKE ('%' || unaccent({}) || '%')", text_col, ph)
        }
    }
}

/// Each hop becomes `alias.fk IN (SELECT rN.id FROM related rN WHERE ...)`.
fn render_path(q: &mut QueryBuf, alias: &str, joins: &[Join], depth: usize, cond: &Condition) -> String {
    match joins.split_first() {
        None => render_lookup(q, alias, cond),
        Some((join, rest)) => {
            let inner = format!("r{}", depth + 1);
            let inner_cond = render_path(q, &inner, rest, depth + 1, cond);
            format!(
                "{}.{} IN (SELECT {}.{} FROM {} AS {} WHERE {})",
                alias,
                quoted(join.fk_column),
                inner,
                quoted("id"),
                quoted(join.table),
                inner,
                inner_cond
            )
        }
    }
}

/// Render a predicate as ` WHERE a AND b ...` (empty string when there are no conditions).
pub fn render_predicate(q: &mut QueryBuf, predicate: &Predicate) -> String {
    if predicate.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = predicate
        .conditions
        .iter()
        .map(|c| render_path(q, MAIN_ALIAS, &c.join_path, 0, c))
        .collect();
    format!(" WHERE {}", parts.join(" AND "))
}

/// SELECT by primary key. Caller binds the id as the sole param.
pub fn select_by_id(entity: &EntityDef) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!(
        "SELECT {} FROM {} WHERE {}.{} = $1::bigint",
        select_column_list(entity),
        table_as_main(entity),
        MAIN_ALIAS,
        quoted(entity.pk().column)
    );
    q
}

/// SELECT page matching the predicate, ORDER BY id, LIMIT/OFFSET.
pub fn select_list(entity: &EntityDef, predicate: &Predicate, limit: u32, offset: u32) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_clause = render_predicate(&mut q, predicate);
    q.sql = format!(
        "SELECT {} FROM {}{} ORDER BY {}.{} LIMIT {} OFFSET {}",
        select_column_list(entity),
        table_as_main(entity),
        where_clause,
        MAIN_ALIAS,
        quoted(entity.pk().column),
        limit,
        offset
    );
    q
}

/// COUNT of rows matching the predicate.
pub fn count(entity: &EntityDef, predicate: &Predicate) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_clause = render_predicate(&mut q, predicate);
    q.sql = format!("SELECT COUNT(*) FROM {}{}", table_as_main(entity), where_clause);
    q
}

/// INSERT the given values; server-managed columns take their database defaults.
pub fn insert(entity: &EntityDef, values: &[(&FieldDef, Value)]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::with_capacity(values.len());
    let mut placeholders = Vec::with_capacity(values.len());
    for (f, v) in values {
        cols.push(quoted(f.column));
        let ph = q.placeholder(v.clone(), f.cast_type());
        placeholders.push(ph);
    }
    let cols_clause = if cols.is_empty() {
        " DEFAULT VALUES".to_string()
    } else {
        format!(" ({}) VALUES ({})", cols.join(", "), placeholders.join(", "))
    };
    q.sql = format!(
        "INSERT INTO {}{} RETURNING {}",
        table_as_main(entity),
        cols_clause,
        select_column_list(entity)
    );
    q
}

/// UPDATE by id: SET the given columns and refresh the modification timestamp.
pub fn update(entity: &EntityDef, id: i64, values: &[(&FieldDef, Value)]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets = Vec::with_capacity(values.len() + 1);
    for (f, v) in values {
        let ph = q.placeholder(v.clone(), f.cast_type());
        sets.push(format!("{} = {}", quoted(f.column), ph));
    }
    if let Some(modified) = entity.field("modified_at") {
        sets.push(format!("{} = NOW()", quoted(modified.column)));
    }
    let id_ph = q.placeholder(Value::String(id.to_string()), "bigint");
    q.sql = format!(
        "UPDATE {} SET {} WHERE {}.{} = {} RETURNING {}",
        table_as_main(entity),
        sets.join(", "),
        MAIN_ALIAS,
        quoted(entity.pk().column),
        id_ph,
        select_column_list(entity)
    );
    q
}

/// DELETE by id. Caller binds the id as the sole param.
pub fn delete(entity: &EntityDef) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!(
        "DELETE FROM {} WHERE {}.{} = $1::bigint RETURNING {}.{}",
        table_as_main(entity),
        MAIN_ALIAS,
        quoted(entity.pk().column),
        MAIN_ALIAS,
        quoted(entity.pk().column)
    );
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::build_predicate;
    use crate::schema::{entities, resolve};
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn select_aliases_columns_to_field_names() {
        let q = select_by_id(&entities::brand());
        assert!(q.sql.starts_with(
            "SELECT main.\"id\" AS \"id\", main.\"dt_created_at\" AS \"created_at\""
        ));
        assert!(q.sql.contains("main.\"tx_name\" AS \"name\""));
        assert!(q.sql.ends_with("FROM \"brand\" AS main WHERE main.\"id\" = $1::bigint"));
    }

    #[test]
    fn decimals_are_selected_as_text() {
        let q = select_by_id(&entities::payment());
        assert!(q.sql.contains("main.\"nb_total\"::text AS \"total\""));
    }

    #[test]
    fn list_without_filters_has_no_where() {
        let q = select_list(&entities::customer(), &Predicate::default(), 100, 0);
        assert!(!q.sql.contains("WHERE"));
        assert!(q.sql.ends_with("ORDER BY main.\"id\" LIMIT 100 OFFSET 0"));
        assert!(q.params.is_empty());
    }

    #[test]
    fn like_lookup_strips_accents_on_both_sides() {
        let model = resolve(entities::all()).unwrap();
        let customer = model.entity_by_path("customer").unwrap();
        let params = HashMap::from([("name".to_string(), "joão".to_string())]);
        let predicate = build_predicate(&model, customer, &params).unwrap();
        let q = select_list(customer, &predicate, 10, 0);
        assert!(q.sql.contains(
            " WHERE unaccent(main.\"tx_name\") ILIKE ('%' || unaccent($1::text) || '%')"
        ));
        assert_eq!(q.params, vec![json!("joão")]);
    }

    #[test]
    fn conditions_are_joined_with_and_in_declaration_order() {
        let model = resolve(entities::all()).unwrap();
        let service = model.entity_by_path("service").unwrap();
        let params = HashMap::from([
            ("value".to_string(), "300".to_string()),
            ("delivery_deadline".to_string(), "2024-01-10".to_string()),
        ]);
        let predicate = build_predicate(&model, service, &params).unwrap();
        let q = count(service, &predicate);
        assert_eq!(
            q.sql,
            "SELECT COUNT(*) FROM \"service\" AS main WHERE main.\"nb_amount\" <= $1::numeric \
             AND main.\"dt_delivery_deadline\" >= $2::timestamptz"
        );
    }

    #[test]
    fn traversal_renders_nested_subqueries() {
        let model = resolve(entities::all()).unwrap();
        let service = model.entity_by_path("service").unwrap();
        let params = HashMap::from([("customer".to_string(), "maria".to_string())]);
        let predicate = build_predicate(&model, service, &params).unwrap();
        let mut q = QueryBuf::new();
        let clause = render_predicate(&mut q, &predicate);
        assert_eq!(
            clause,
            " WHERE main.\"id_vehicle\" IN (SELECT r1.\"id\" FROM \"vehicle\" AS r1 WHERE \
             r1.\"id_customer\" IN (SELECT r2.\"id\" FROM \"customer\" AS r2 WHERE \
             unaccent(r2.\"tx_name\") ILIKE ('%' || unaccent($1::text) || '%')))"
        );
    }

    #[test]
    fn prefix_match_escapes_wildcards() {
        let model = resolve(entities::all()).unwrap();
        let employer = model.entity_by_path("employer").unwrap();
        let params = HashMap::from([("cpf".to_string(), "12%_".to_string())]);
        let predicate = build_predicate(&model, employer, &params).unwrap();
        let q = select_list(employer, &predicate, 10, 0);
        assert!(q.sql.contains("main.\"tx_cpf\" LIKE ($1::text || '%')"));
        assert_eq!(q.params, vec![json!("12\\%\\_")]);
    }

    #[test]
    fn update_refreshes_modified_at_and_binds_id_last() {
        let brand = entities::brand();
        let name = brand.field("name").unwrap();
        let q = update(&brand, 7, &[(name, json!("Fiat"))]);
        assert!(q.sql.starts_with(
            "UPDATE \"brand\" AS main SET \"tx_name\" = $1::text, \"dt_modified_at\" = NOW() \
             WHERE main.\"id\" = $2::bigint RETURNING"
        ));
        assert_eq!(q.params, vec![json!("Fiat"), json!("7")]);
    }

    #[test]
    fn insert_casts_each_placeholder() {
        let vehicle = entities::vehicle();
        let year = vehicle.field("year").unwrap();
        let km = vehicle.field("km").unwrap();
        let q = insert(&vehicle, &[(year, json!(2020)), (km, json!(0))]);
        assert!(q.sql.starts_with(
            "INSERT INTO \"vehicle\" AS main (\"nb_year\", \"nb_km\") VALUES ($1::integer, $2::integer) RETURNING"
        ));
    }
}

//! Generic CRUD execution against PostgreSQL.

use crate::error::{AppError, FieldErrors};
use crate::filter::Predicate;
use crate::schema::{EntityDef, Model};
use crate::service::validation::WriteSet;
use crate::sql::{count, delete, insert, select_by_id, select_list, update, PgBindValue, QueryBuf};
use serde_json::Value;
use sqlx::PgPool;

pub const DEFAULT_LIMIT: u32 = 100;
pub const MAX_LIMIT: u32 = 1000;

const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";

/// One page of a list request plus the total number of matching rows.
#[derive(Debug)]
pub struct Page {
    pub rows: Vec<Value>,
    pub total: i64,
    pub limit: u32,
    pub offset: u32,
}

pub struct CrudService;

impl CrudService {
    /// List rows matching the predicate, ordered by id; limit (default 100, max 1000), offset (default 0).
    pub async fn list(
        pool: &PgPool,
        entity: &EntityDef,
        predicate: &Predicate,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<Page, AppError> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = offset.unwrap_or(0);
        let total_q = count(entity, predicate);
        let total = Self::query_count(pool, &total_q).await?;
        let q = select_list(entity, predicate, limit, offset);
        let rows = Self::query_many(pool, &q).await?;
        Ok(Page {
            rows,
            total,
            limit,
            offset,
        })
    }

    /// Fetch one row by id. Returns JSON object or None.
    pub async fn read(pool: &PgPool, entity: &EntityDef, id: i64) -> Result<Option<Value>, AppError> {
        let mut q = select_by_id(entity);
        q.params.push(Value::String(id.to_string()));
        Self::query_optional(pool, &q).await
    }

    /// Insert one row. Returns the created row including server-managed fields.
    pub async fn create(pool: &PgPool, entity: &EntityDef, values: &WriteSet<'_>) -> Result<Value, AppError> {
        let q = insert(entity, values);
        let row = Self::query_optional(pool, &q)
            .await
            .map_err(|e| write_error(entity, values, e))?
            .ok_or_else(|| AppError::Internal(format!("insert into {} returned no row", entity.table)))?;
        tracing::info!(entity = entity.name, id = ?row.get("id"), "created");
        Ok(row)
    }

    /// Update one row by id. Returns updated row, or None when the id does not exist.
    pub async fn update(
        pool: &PgPool,
        entity: &EntityDef,
        id: i64,
        values: &WriteSet<'_>,
    ) -> Result<Option<Value>, AppError> {
        let q = update(entity, id, values);
        let row = Self::query_optional(pool, &q)
            .await
            .map_err(|e| write_error(entity, values, e))?;
        if row.is_some() {
            tracing::info!(entity = entity.name, id, "updated");
        }
        Ok(row)
    }

    /// Delete one row by id. Returns false when the id does not exist. Cascading children
    /// are removed by the database; protected references refuse the delete.
    pub async fn delete(pool: &PgPool, model: &Model, entity: &EntityDef, id: i64) -> Result<bool, AppError> {
        let mut q = delete(entity);
        q.params.push(Value::String(id.to_string()));
        let row = Self::query_optional(pool, &q).await.map_err(|e| match e {
            AppError::Db(sqlx::Error::Database(db)) if db.code().as_deref() == Some(FOREIGN_KEY_VIOLATION) => {
                AppError::ReferentialIntegrity(format!(
                    "{} {} is still referenced by {}",
                    entity.name,
                    id,
                    blocking_reference(model, entity, db.constraint())
                ))
            }
            other => other,
        })?;
        if row.is_some() {
            tracing::info!(entity = entity.name, id, "deleted");
        }
        Ok(row.is_some())
    }

    async fn query_count(pool: &PgPool, q: &QueryBuf) -> Result<i64, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query_scalar::<_, i64>(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        Ok(query.fetch_one(pool).await?)
    }

    async fn query_many(pool: &PgPool, q: &QueryBuf) -> Result<Vec<Value>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let rows = query.fetch_all(pool).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn query_optional(pool: &PgPool, q: &QueryBuf) -> Result<Option<Value>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let row = query.fetch_optional(pool).await?;
        Ok(row.map(|r| row_to_json(&r)))
    }
}

/// `Child.field` of the relation whose constraint refused a delete.
fn blocking_reference(model: &Model, entity: &EntityDef, constraint: Option<&str>) -> String {
    let constraint = constraint.unwrap_or_default();
    model
        .referencing(entity.path_segment)
        .into_iter()
        .find(|(child, field)| {
            child
                .field(field)
                .is_some_and(|f| child.fk_constraint(f.column) == constraint)
        })
        .map(|(child, field)| format!("{}.{}", child.name, field))
        .unwrap_or_else(|| constraint.to_string())
}

/// Map constraint violations raised by INSERT/UPDATE back onto the offending field.
fn write_error(entity: &EntityDef, values: &WriteSet<'_>, e: AppError) -> AppError {
    let (code, constraint) = match &e {
        AppError::Db(sqlx::Error::Database(db)) => match (db.code(), db.constraint()) {
            (Some(code), Some(constraint)) => (code.into_owned(), constraint.to_string()),
            _ => return e,
        },
        _ => return e,
    };
    match code.as_str() {
        FOREIGN_KEY_VIOLATION => {
            let field = entity
                .relations()
                .find(|(f, _, _)| entity.fk_constraint(f.column) == constraint)
                .map(|(f, _, _)| f);
            let Some(field) = field else { return e };
            let pk = values
                .iter()
                .find(|(f, _)| f.name == field.name)
                .map(|(_, v)| v.to_string())
                .unwrap_or_default();
            AppError::Validation(FieldErrors::single(
                field.name,
                format!("Invalid pk \"{}\" - object does not exist.", pk.trim_matches('"')),
            ))
        }
        CHECK_VIOLATION => {
            let field = constraint
                .strip_prefix(&format!("ck_{}_", entity.table))
                .and_then(|col| entity.field_by_column(col));
            match field {
                Some(f) => AppError::Validation(FieldErrors::single(f.name, "Ensure this value is valid.")),
                None => e,
            }
        }
        _ => e,
    }
}

pub(crate) fn row_to_json(row: &sqlx::postgres::PgRow) -> Value {
    use sqlx::Column;
    use sqlx::Row;
    let mut map = serde_json::Map::new();
    for col in row.columns() {
        let name = col.name();
        let v = cell_to_value(row, name);
        map.insert(name.to_string(), v);
    }
    Value::Object(map)
}

fn cell_to_value(row: &sqlx::postgres::PgRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    Value::Null
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{entities, resolve};

    #[test]
    fn protected_delete_names_the_referencing_field() {
        let model = resolve(entities::all()).unwrap();
        let brand = model.entity_by_path("brand").unwrap();
        assert_eq!(
            blocking_reference(&model, brand, Some("fk_model_id_brand")),
            "CarModel.brand"
        );
        let customer = model.entity_by_path("customer").unwrap();
        assert_eq!(
            blocking_reference(&model, customer, Some("fk_vehicle_id_customer")),
            "Vehicle.customer"
        );
        assert_eq!(blocking_reference(&model, customer, Some("fk_other")), "fk_other");
    }
}

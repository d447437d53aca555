//! Apply the entity model to the database: extensions, tables, CHECK constraints, foreign keys
//! and indexes. Tables are created parent-first; foreign keys are added once every table exists.

use crate::error::AppError;
use crate::schema::{EntityDef, FieldDef, FieldKind, Model};
use crate::sql::quoted;
use sqlx::PgPool;

const AUTH_USER_DDL: &str = "CREATE TABLE IF NOT EXISTS \"auth_user\" (
  \"id\" BIGINT GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY,
  \"username\" varchar(150) NOT NULL UNIQUE,
  \"password_hash\" text NOT NULL,
  \"is_active\" boolean NOT NULL DEFAULT TRUE,
  \"created_at\" timestamptz NOT NULL DEFAULT NOW(),
  \"last_login\" timestamptz
)";

/// Apply the model to the database. Idempotent: every statement is guarded by IF NOT EXISTS
/// or an existence check, so it runs on every startup.
pub async fn apply_migrations(pool: &PgPool, model: &Model) -> Result<(), AppError> {
    sqlx::query("CREATE EXTENSION IF NOT EXISTS unaccent")
        .execute(pool)
        .await?;
    sqlx::query(AUTH_USER_DDL).execute(pool).await?;

    for entity in &model.entities {
        let sql = create_table_sql(entity);
        tracing::debug!(table = entity.table, %sql, "create table");
        sqlx::query(&sql).execute(pool).await?;
    }

    for entity in &model.entities {
        for (field, target, on_delete) in entity.relations() {
            let target = model.entity_by_path(target).ok_or_else(|| {
                AppError::Internal(format!("relation {}.{} has no target", entity.name, field.name))
            })?;
            let constraint = entity.fk_constraint(field.column);
            let exists: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM pg_constraint WHERE conname = $1)",
            )
            .bind(&constraint)
            .fetch_one(pool)
            .await?;
            if !exists {
                let sql = format!(
                    "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} (\"id\") ON DELETE {}",
                    quoted(entity.table),
                    quoted(&constraint),
                    quoted(field.column),
                    quoted(target.table),
                    on_delete.sql()
                );
                sqlx::query(&sql).execute(pool).await?;
            }
            let index = format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
                quoted(&format!("ix_{}_{}", entity.table, field.column)),
                quoted(entity.table),
                quoted(field.column)
            );
            sqlx::query(&index).execute(pool).await?;
        }
    }

    tracing::info!(entities = model.entities.len(), "migrations applied");
    Ok(())
}

/// CREATE TABLE for one entity, including NOT NULL, defaults and named CHECK constraints.
pub fn create_table_sql(entity: &EntityDef) -> String {
    let mut defs: Vec<String> = Vec::new();
    for f in &entity.fields {
        defs.push(column_sql(f));
    }
    for f in &entity.fields {
        if let Some(check) = check_expr(f) {
            defs.push(format!(
                "CONSTRAINT {} CHECK ({})",
                quoted(&format!("ck_{}_{}", entity.table, f.column)),
                check
            ));
        }
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
        quoted(entity.table),
        defs.join(",\n  ")
    )
}

fn column_sql(f: &FieldDef) -> String {
    if matches!(f.kind, FieldKind::BigId) {
        return format!("{} BIGINT GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY", quoted(f.column));
    }
    let mut def = format!("{} {}", quoted(f.column), f.pg_type());
    if !f.nullable {
        def.push_str(" NOT NULL");
    }
    let default = match (&f.kind, f.db_default) {
        (_, Some(d)) => Some(d.to_string()),
        (FieldKind::Choice { default, .. }, None) => Some(default.to_string()),
        _ => None,
    };
    if let Some(d) = default {
        def.push_str(" DEFAULT ");
        def.push_str(&d);
    }
    def
}

fn check_expr(f: &FieldDef) -> Option<String> {
    let col = quoted(f.column);
    match &f.kind {
        FieldKind::Integer { min, max } => match (min, max) {
            (Some(lo), Some(hi)) => Some(format!("{} BETWEEN {} AND {}", col, lo, hi)),
            (Some(lo), None) => Some(format!("{} >= {}", col, lo)),
            (None, Some(hi)) => Some(format!("{} <= {}", col, hi)),
            (None, None) => None,
        },
        FieldKind::Choice { choices, .. } => {
            let codes: Vec<String> = choices.iter().map(|(code, _)| code.to_string()).collect();
            Some(format!("{} IN ({})", col, codes.join(", ")))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::entities;

    #[test]
    fn customer_table_has_identity_key_and_base_columns() {
        let sql = create_table_sql(&entities::customer());
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"customer\""));
        assert!(sql.contains("\"id\" BIGINT GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY"));
        assert!(sql.contains("\"dt_created_at\" timestamptz NOT NULL DEFAULT NOW()"));
        assert!(sql.contains("\"cs_active\" boolean NOT NULL DEFAULT TRUE"));
    }

    #[test]
    fn vehicle_checks_year_range_and_type_choices() {
        let sql = create_table_sql(&entities::vehicle());
        assert!(sql.contains("CONSTRAINT \"ck_vehicle_nb_year\" CHECK (\"nb_year\" BETWEEN 1500 AND 9999)"));
        assert!(sql.contains("CONSTRAINT \"ck_vehicle_nb_type\" CHECK (\"nb_type\" IN (1, 2, 3))"));
        assert!(sql.contains("\"nb_type\" integer NOT NULL DEFAULT 1"));
    }

    #[test]
    fn nullable_columns_omit_not_null() {
        let sql = create_table_sql(&entities::address());
        let line = sql
            .lines()
            .find(|l| l.trim_start().starts_with("\"tx_city\""))
            .unwrap();
        assert!(!line.contains("NOT NULL"), "{}", line);
    }
}

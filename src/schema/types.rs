//! Entity definition types: fields, their storage columns, constraints and relations.

use crate::filter::FilterDef;

/// What happens to a referencing row when the referenced row is deleted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OnDelete {
    /// Referencing rows are deleted together with the parent.
    Cascade,
    /// The parent cannot be deleted while a reference exists.
    Protect,
}

impl OnDelete {
    pub fn sql(&self) -> &'static str {
        match self {
            OnDelete::Cascade => "CASCADE",
            OnDelete::Protect => "RESTRICT",
        }
    }
}

/// Field type plus its bounds. Bounds are enforced on write by the request validator
/// and mirrored as CHECK constraints by the migration.
#[derive(Clone, Debug)]
pub enum FieldKind {
    /// Server-assigned surrogate key.
    BigId,
    Text { max_length: Option<u32> },
    Email { max_length: u32 },
    Integer { min: Option<i64>, max: Option<i64> },
    /// Integer code restricted to a fixed set; `default` is used when omitted on create.
    Choice {
        choices: &'static [(i64, &'static str)],
        default: i64,
    },
    Decimal { max_digits: u32, decimal_places: u32 },
    DateTime,
    Boolean,
    /// Many-to-one reference to another entity's id, named by the target's path segment.
    ForeignKey {
        target: &'static str,
        on_delete: OnDelete,
    },
}

#[derive(Clone, Debug)]
pub struct FieldDef {
    /// Name in JSON documents and filter declarations.
    pub name: &'static str,
    /// Column name in the table.
    pub column: &'static str,
    pub kind: FieldKind,
    pub nullable: bool,
    /// Server-managed; returned but never taken from request bodies.
    pub read_only: bool,
    /// Column has a database default (server-managed timestamps and flags).
    pub db_default: Option<&'static str>,
}

impl FieldDef {
    fn new(name: &'static str, column: &'static str, kind: FieldKind) -> Self {
        FieldDef {
            name,
            column,
            kind,
            nullable: false,
            read_only: false,
            db_default: None,
        }
    }

    pub fn text(name: &'static str, column: &'static str, max_length: u32) -> Self {
        Self::new(name, column, FieldKind::Text { max_length: Some(max_length) })
    }

    pub fn unbounded_text(name: &'static str, column: &'static str) -> Self {
        Self::new(name, column, FieldKind::Text { max_length: None })
    }

    pub fn email(name: &'static str, column: &'static str) -> Self {
        Self::new(name, column, FieldKind::Email { max_length: 254 })
    }

    pub fn integer(name: &'static str, column: &'static str) -> Self {
        Self::new(name, column, FieldKind::Integer { min: None, max: None })
    }

    pub fn bounded_integer(
        name: &'static str,
        column: &'static str,
        min: Option<i64>,
        max: Option<i64>,
    ) -> Self {
        Self::new(name, column, FieldKind::Integer { min, max })
    }

    pub fn choice(
        name: &'static str,
        column: &'static str,
        choices: &'static [(i64, &'static str)],
        default: i64,
    ) -> Self {
        Self::new(name, column, FieldKind::Choice { choices, default })
    }

    pub fn money(name: &'static str, column: &'static str, max_digits: u32) -> Self {
        Self::new(
            name,
            column,
            FieldKind::Decimal {
                max_digits,
                decimal_places: 2,
            },
        )
    }

    pub fn datetime(name: &'static str, column: &'static str) -> Self {
        Self::new(name, column, FieldKind::DateTime)
    }

    pub fn foreign_key(
        name: &'static str,
        column: &'static str,
        target: &'static str,
        on_delete: OnDelete,
    ) -> Self {
        Self::new(name, column, FieldKind::ForeignKey { target, on_delete })
    }

    /// Allows NULL and blank values.
    pub fn optional(mut self) -> Self {
        self.nullable = true;
        self
    }

    fn server_managed(mut self, db_default: Option<&'static str>) -> Self {
        self.read_only = true;
        self.db_default = db_default;
        self
    }

    /// Must be supplied on create and full update.
    pub fn required(&self) -> bool {
        !self.read_only && !self.nullable && !matches!(self.kind, FieldKind::Choice { .. })
    }

    /// PostgreSQL column type used in DDL and for parameter casts.
    pub fn pg_type(&self) -> String {
        match &self.kind {
            FieldKind::BigId | FieldKind::ForeignKey { .. } => "bigint".into(),
            FieldKind::Text { max_length: Some(n) } => format!("varchar({})", n),
            FieldKind::Text { max_length: None } => "text".into(),
            FieldKind::Email { max_length } => format!("varchar({})", max_length),
            FieldKind::Integer { .. } | FieldKind::Choice { .. } => "integer".into(),
            FieldKind::Decimal {
                max_digits,
                decimal_places,
            } => format!("numeric({},{})", max_digits, decimal_places),
            FieldKind::DateTime => "timestamptz".into(),
            FieldKind::Boolean => "boolean".into(),
        }
    }

    /// Type used when casting a bound text parameter for comparison (no length modifiers).
    pub fn cast_type(&self) -> &'static str {
        match &self.kind {
            FieldKind::BigId | FieldKind::ForeignKey { .. } => "bigint",
            FieldKind::Text { .. } | FieldKind::Email { .. } => "text",
            FieldKind::Integer { .. } | FieldKind::Choice { .. } => "integer",
            FieldKind::Decimal { .. } => "numeric",
            FieldKind::DateTime => "timestamptz",
            FieldKind::Boolean => "boolean",
        }
    }

    pub fn is_textual(&self) -> bool {
        matches!(self.kind, FieldKind::Text { .. } | FieldKind::Email { .. })
    }
}

/// Columns every entity carries: id, creation/modification timestamps and the active flag.
pub fn base_fields() -> Vec<FieldDef> {
    vec![
        FieldDef::new("id", "id", FieldKind::BigId).server_managed(None),
        FieldDef::datetime("created_at", "dt_created_at").server_managed(Some("NOW()")),
        FieldDef::datetime("modified_at", "dt_modified_at").server_managed(Some("NOW()")),
        FieldDef::new("active", "cs_active", FieldKind::Boolean).server_managed(Some("TRUE")),
    ]
}

/// One persisted entity: storage table, exposed path segment, fields and filter set.
#[derive(Clone, Debug)]
pub struct EntityDef {
    /// Display name used in messages (e.g. "Customer").
    pub name: &'static str,
    pub path_segment: &'static str,
    pub table: &'static str,
    /// Base fields first, then the entity's own fields in declaration order.
    pub fields: Vec<FieldDef>,
    pub filters: Vec<FilterDef>,
}

impl EntityDef {
    pub fn new(
        name: &'static str,
        path_segment: &'static str,
        table: &'static str,
        own_fields: Vec<FieldDef>,
    ) -> Self {
        let mut fields = base_fields();
        fields.extend(own_fields);
        EntityDef {
            name,
            path_segment,
            table,
            fields,
            filters: Vec::new(),
        }
    }

    pub fn with_filters(mut self, filters: Vec<FilterDef>) -> Self {
        self.filters = filters;
        self
    }

    pub fn pk(&self) -> &FieldDef {
        &self.fields[0]
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_by_column(&self, column: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.column == column)
    }

    pub fn writable_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| !f.read_only)
    }

    /// Foreign keys declared by this entity: (field, target path segment, on-delete policy).
    pub fn relations(&self) -> impl Iterator<Item = (&FieldDef, &'static str, OnDelete)> {
        self.fields.iter().filter_map(|f| match f.kind {
            FieldKind::ForeignKey { target, on_delete } => Some((f, target, on_delete)),
            _ => None,
        })
    }

    /// Name of the foreign key constraint for a relation column.
    pub fn fk_constraint(&self, column: &str) -> String {
        format!("fk_{}_{}", self.table, column)
    }
}

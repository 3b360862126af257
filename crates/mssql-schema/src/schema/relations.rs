//! Key and relationship inference for a loaded table.
//!
//! Works on the rows of the primary-key and referential-constraint queries,
//! so the inference can be tested without a database.
//!
//! `many_many` relations are a heuristic: a table holding foreign keys to
//! both this table and some other table is taken to be a junction. Tables
//! with several unrelated foreign keys produce false positives, so callers
//! should treat `many_many` entries as hints.

use tracing::debug;

use crate::core::schema::{ForeignKeyRef, Junction, PrimaryKey, Relation, RelationKind, TableSchema};
use crate::core::spec::AbstractType;
use crate::core::value::ResultSet;

use super::columns::display_name;

/// One column pair of a referential constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyRow {
    pub constraint: String,
    pub table_schema: String,
    pub table_name: String,
    pub column: String,
    pub ref_schema: String,
    pub ref_table: String,
    pub ref_column: String,
}

impl ForeignKeyRow {
    /// Read the rows of the referential-constraint query.
    pub fn from_result_set(rs: &ResultSet) -> Vec<Self> {
        rs.iter()
            .map(|row| ForeignKeyRow {
                constraint: row.string("constraint_name"),
                table_schema: row.string("table_schema"),
                table_name: row.string("table_name"),
                column: row.string("column_name"),
                ref_schema: row.string("referenced_table_schema"),
                ref_table: row.string("referenced_table_name"),
                ref_column: row.string("referenced_column_name"),
            })
            .collect()
    }

    fn owned_by(&self, schema: &str, table: &str) -> bool {
        self.table_schema.eq_ignore_ascii_case(schema) && self.table_name.eq_ignore_ascii_case(table)
    }

    fn references(&self, schema: &str, table: &str) -> bool {
        self.ref_schema.eq_ignore_ascii_case(schema) && self.ref_table.eq_ignore_ascii_case(table)
    }

    fn same_owner(&self, other: &ForeignKeyRow) -> bool {
        other.owned_by(&self.table_schema, &self.table_name)
    }
}

/// Apply the primary key: normalize column flags and upgrade integer identity
/// key columns to [`AbstractType::Id`].
pub fn apply_primary_key(table: &mut TableSchema, key_columns: Vec<String>) {
    let key_columns: Vec<String> = key_columns
        .into_iter()
        .filter_map(|k| table.column(&k).map(|c| c.name.clone()))
        .collect();

    for column in table.columns.values_mut() {
        column.is_primary_key = key_columns.iter().any(|k| k == &column.name);
        if column.is_primary_key && column.auto_increment && column.r#type == AbstractType::Integer {
            column.r#type = AbstractType::Id;
        }
    }
    table.primary_key = PrimaryKey::from_columns(key_columns);
}

/// Annotate foreign keys and derive relations from the constraint rows.
pub fn apply_foreign_keys(table: &mut TableSchema, rows: &[ForeignKeyRow], default_schema: &str) {
    let schema = table.schema_name.clone();
    let name = table.name.clone();

    for row in rows {
        if row.owned_by(&schema, &name) {
            let ref_display = display_name(&row.ref_schema, &row.ref_table, default_schema);
            let Some(column) = table.column_mut(&row.column) else {
                continue;
            };
            column.is_foreign_key = true;
            column.ref_table = Some(ref_display.clone());
            column.ref_fields = Some(row.ref_column.clone());
            if column.r#type == AbstractType::Integer {
                column.r#type = AbstractType::Reference;
            }
            let field = column.name.clone();

            table.foreign_keys.insert(
                field.clone(),
                ForeignKeyRef {
                    constraint: row.constraint.clone(),
                    ref_table: ref_display.clone(),
                    ref_field: row.ref_column.clone(),
                },
            );
            table.add_relation(Relation {
                kind: RelationKind::BelongsTo,
                name: format!("{}_by_{}", ref_display, field),
                field,
                ref_table: ref_display,
                ref_field: row.ref_column.clone(),
                junction: None,
            });
        }

        if row.references(&schema, &name) {
            let owner = display_name(&row.table_schema, &row.table_name, default_schema);
            table.add_relation(Relation {
                kind: RelationKind::HasMany,
                name: format!("{}_by_{}", owner, row.column),
                field: row.ref_column.clone(),
                ref_table: owner.clone(),
                ref_field: row.column.clone(),
                junction: None,
            });

            for other in rows {
                if !row.same_owner(other)
                    || other.constraint == row.constraint
                    || other.column.eq_ignore_ascii_case(&row.column)
                    || other.references(&schema, &name)
                {
                    continue;
                }
                let related = display_name(&other.ref_schema, &other.ref_table, default_schema);
                debug!(
                    "{}: inferring many_many to {} through {} (heuristic)",
                    table.display_name, related, owner
                );
                table.add_relation(Relation {
                    kind: RelationKind::ManyMany,
                    name: format!("{}_by_{}", related, owner),
                    field: row.ref_column.clone(),
                    ref_table: related,
                    ref_field: other.ref_column.clone(),
                    junction: Some(Junction {
                        table: owner.clone(),
                        field: row.column.clone(),
                        ref_field: other.column.clone(),
                    }),
                });
            }
        }
    }
}

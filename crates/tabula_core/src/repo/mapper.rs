//! Row/entity conversion.
//!
//! # Responsibility
//! - Turn a fetched row into entity construction values, resolving
//!   relations by re-entering the engine for the related type.
//! - Turn an entity into bindable column values for insert/update.
//!
//! # Invariants
//! - Auto-increment primary keys and one-to-many fields never emit columns.
//! - A `*_to_one` value is always written as the related row's primary key,
//!   and only after the related row is confirmed to exist.
//! - One-to-many collections resolve only for the root entity of a load;
//!   nested entities carry empty collections, which keeps bidirectional
//!   parent/child declarations from recursing forever.

use crate::entity::{AnyEntity, EntityValues, FieldValue, ObjectMappingError};
use crate::repo::engine::{self, RowMap, MAX_RESOLVE_DEPTH};
use crate::repo::{BoundValue, RepoError, RepoResult};
use crate::schema::{EntitySchema, FieldDescriptor, RelationshipKind, ScalarType};
use crate::sql::QueryBuilder;
use rusqlite::types::Value;
use rusqlite::Connection;

/// Maps one fetched row into construction values for `schema`'s type.
pub(crate) fn map_row(
    conn: &Connection,
    schema: &EntitySchema,
    mut row: RowMap,
    depth: usize,
) -> RepoResult<EntityValues> {
    let mut values = EntityValues::new(schema.entity_name());

    for field in schema.fields() {
        match field.relationship() {
            RelationshipKind::ManyToOne | RelationshipKind::OneToOne => {
                let resolved = resolve_to_one(conn, schema, field, &mut row, depth)?;
                values.insert(field.name(), resolved);
            }
            // Children need the entity's own key; resolved below.
            RelationshipKind::OneToMany => {}
            RelationshipKind::None => {
                let value = match row.remove(field.name()) {
                    Some(value) => value_to_field(value),
                    None => field
                        .default_value()
                        .cloned()
                        .map_or(FieldValue::Null, value_to_field),
                };
                values.insert(field.name(), value);
            }
        }
    }

    let own_key = field_to_value(
        values
            .get(schema.primary_key().name())
            .unwrap_or(&FieldValue::Null),
    );
    for field in schema.one_to_many_fields() {
        let children = resolve_one_to_many(conn, field, own_key.as_ref(), depth)?;
        values.insert(field.name(), children);
    }

    Ok(values)
}

fn resolve_to_one(
    conn: &Connection,
    schema: &EntitySchema,
    field: &FieldDescriptor,
    row: &mut RowMap,
    depth: usize,
) -> RepoResult<FieldValue> {
    let Some(column) = field.related_column() else {
        return Ok(FieldValue::Null);
    };
    let Some(related_ref) = field.related_ref() else {
        return Ok(FieldValue::Null);
    };

    match row.remove(column) {
        None | Some(Value::Null) => Ok(FieldValue::Null),
        Some(key) => {
            if depth >= MAX_RESOLVE_DEPTH {
                return Err(RepoError::RelationDepthExceeded {
                    table: schema.table().to_string(),
                    depth,
                });
            }
            let related = related_ref.schema()?;
            let nested = engine::find_by_id_values(conn, &related, &key, depth + 1)?.ok_or_else(
                || RepoError::RelatedObjectNotFound {
                    entity: related.entity_name(),
                    table: related.table().to_string(),
                    key: engine::value_display(&key),
                },
            )?;
            Ok(FieldValue::One(related.construct(nested)?))
        }
    }
}

fn resolve_one_to_many(
    conn: &Connection,
    field: &FieldDescriptor,
    own_key: Option<&Value>,
    depth: usize,
) -> RepoResult<FieldValue> {
    if depth > 0 {
        return Ok(FieldValue::Many(Vec::new()));
    }
    let (Some(related_ref), Some(column), Some(key)) =
        (field.related_ref(), field.related_column(), own_key)
    else {
        return Ok(FieldValue::Many(Vec::new()));
    };

    let related = related_ref.schema()?;
    let sql = QueryBuilder::new()
        .select(None)
        .from(related.table())
        .where_clause(&format!("{column} = :{column}"))
        .build();
    let rows = engine::fetch_rows(conn, &sql, &[(format!(":{column}"), key.clone())])?;

    let mut children = Vec::with_capacity(rows.len());
    for row in rows {
        let child = map_row(conn, &related, row, depth + 1)?;
        children.push(related.construct(child)?);
    }
    Ok(FieldValue::Many(children))
}

/// Extracts bindable column values from an entity in schema order.
pub(crate) fn extract_values(
    conn: &Connection,
    schema: &EntitySchema,
    entity: &dyn AnyEntity,
) -> RepoResult<Vec<BoundValue>> {
    let mut out = Vec::new();

    for field in schema.fields() {
        if field.is_primary_key() && field.is_auto_increment() {
            continue;
        }
        match field.relationship() {
            RelationshipKind::OneToMany => {}
            RelationshipKind::ManyToOne | RelationshipKind::OneToOne => {
                if let Some(bound) = extract_to_one(conn, schema, field, entity)? {
                    out.push(bound);
                }
            }
            RelationshipKind::None => {
                match field_to_value(&entity.any_field(field.name())) {
                    Some(value) => out.push(BoundValue {
                        column: field.name().to_string(),
                        sql_type: field.scalar_type().unwrap_or(ScalarType::Text),
                        value,
                    }),
                    None => {
                        if write_required(field) {
                            return Err(RepoError::RequiredFieldMissing {
                                entity: schema.entity_name(),
                                field: field.name(),
                            });
                        }
                    }
                }
            }
        }
    }

    if out.is_empty() {
        return Err(RepoError::NoBindableData {
            entity: schema.entity_name(),
        });
    }
    Ok(out)
}

fn extract_to_one(
    conn: &Connection,
    schema: &EntitySchema,
    field: &FieldDescriptor,
    entity: &dyn AnyEntity,
) -> RepoResult<Option<BoundValue>> {
    match entity.any_field(field.name()) {
        FieldValue::One(related_entity) => {
            let Some(related_ref) = field.related_ref() else {
                return Ok(None);
            };
            let Some(column) = field.related_column() else {
                return Ok(None);
            };
            let related = related_ref.schema()?;
            let related_pk = related.primary_key();

            let Some(key) = field_to_value(&related_entity.any_field(related_pk.name())) else {
                // A related entity without a key value was never persisted.
                return Err(RepoError::RelatedObjectNotFound {
                    entity: related.entity_name(),
                    table: related.table().to_string(),
                    key: "NULL".to_string(),
                });
            };
            if !engine::exists(conn, &related, &key)? {
                return Err(RepoError::RelatedObjectNotFound {
                    entity: related.entity_name(),
                    table: related.table().to_string(),
                    key: engine::value_display(&key),
                });
            }

            Ok(Some(BoundValue {
                column: column.to_string(),
                sql_type: related_pk.scalar_type().unwrap_or(ScalarType::Text),
                value: key,
            }))
        }
        FieldValue::Null => {
            if write_required(field) {
                return Err(RepoError::RequiredFieldMissing {
                    entity: schema.entity_name(),
                    field: field.name(),
                });
            }
            Ok(None)
        }
        other => Err(RepoError::Mapping(ObjectMappingError::KindMismatch {
            entity: schema.entity_name(),
            field: field.name().to_string(),
            expected: "entity",
            actual: other.kind(),
        })),
    }
}

fn write_required(field: &FieldDescriptor) -> bool {
    field.is_required() || (field.is_primary_key() && !field.is_auto_increment())
}

pub(crate) fn value_to_field(value: Value) -> FieldValue {
    match value {
        Value::Null => FieldValue::Null,
        Value::Integer(v) => FieldValue::Integer(v),
        Value::Real(v) => FieldValue::Text(v.to_string()),
        Value::Text(v) => FieldValue::Text(v),
        Value::Blob(_) => FieldValue::Null,
    }
}

/// Converts a field value to its bindable scalar; `None` marks the unset
/// cases (null or empty text) that write extraction omits.
pub(crate) fn field_to_value(value: &FieldValue) -> Option<Value> {
    match value {
        FieldValue::Null => None,
        FieldValue::Integer(v) => Some(Value::Integer(*v)),
        FieldValue::Text(v) if v.is_empty() => None,
        FieldValue::Text(v) => Some(Value::Text(v.clone())),
        FieldValue::One(_) | FieldValue::Many(_) => None,
    }
}

//! Entity schema model and introspection registry.
//!
//! # Responsibility
//! - Describe an entity type's fields, key, and relationships statically.
//! - Build and memoize one immutable schema per entity type.
//!
//! # Invariants
//! - Every schema has exactly one primary-key field.
//! - Schemas are immutable after the first build and live for the process.
//! - Building a schema never touches the data store.

use crate::entity::{AnyEntity, EntityValues, ObjectMappingError};
use std::error::Error;
use std::fmt::{self, Display, Formatter};

mod field;
mod registry;

pub use field::{DeclaredType, FieldDecl, FieldDescriptor, RelatedRef, RelationshipKind, ScalarType};
pub use registry::schema_of;

/// Immutable description of an entity type.
#[derive(Debug)]
pub struct EntitySchema {
    entity_name: &'static str,
    table: String,
    fields: Vec<FieldDescriptor>,
    primary_key_index: usize,
    construct: fn(EntityValues) -> Result<Box<dyn AnyEntity>, ObjectMappingError>,
}

impl EntitySchema {
    pub(crate) fn new(
        entity_name: &'static str,
        table: String,
        fields: Vec<FieldDescriptor>,
        primary_key_index: usize,
        construct: fn(EntityValues) -> Result<Box<dyn AnyEntity>, ObjectMappingError>,
    ) -> Self {
        Self {
            entity_name,
            table,
            fields,
            primary_key_index,
            construct,
        }
    }

    pub fn entity_name(&self) -> &'static str {
        self.entity_name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// All descriptors in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.name() == name)
    }

    pub fn primary_key(&self) -> &FieldDescriptor {
        &self.fields[self.primary_key_index]
    }

    /// Foreign-key descriptors persisted on this table (excludes one-to-many).
    pub fn foreign_keys(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|field| field.is_to_one())
    }

    /// Fields participating in substring search.
    pub fn searchable_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|field| field.is_searchable())
    }

    pub fn one_to_many_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields
            .iter()
            .filter(|field| field.relationship() == RelationshipKind::OneToMany)
    }

    /// Instantiates the described entity type from mapped values.
    pub(crate) fn construct(
        &self,
        values: EntityValues,
    ) -> Result<Box<dyn AnyEntity>, ObjectMappingError> {
        (self.construct)(values)
    }
}

/// Structural failure detected while building a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaError {
    MissingPrimaryKey {
        entity: &'static str,
    },
    MultiplePrimaryKeys {
        entity: &'static str,
    },
    /// A one-to-many field was marked as the primary key.
    KeyOnCollection {
        entity: &'static str,
        field: &'static str,
    },
    AutoIncrementWithoutKey {
        entity: &'static str,
        field: &'static str,
    },
    NoFields {
        entity: &'static str,
    },
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingPrimaryKey { entity } => {
                write!(f, "entity `{entity}` declares no primary-key field")
            }
            Self::MultiplePrimaryKeys { entity } => {
                write!(f, "entity `{entity}` declares more than one primary-key field")
            }
            Self::KeyOnCollection { entity, field } => write!(
                f,
                "one-to-many field `{entity}.{field}` cannot be the primary key"
            ),
            Self::AutoIncrementWithoutKey { entity, field } => write!(
                f,
                "field `{entity}.{field}` is auto-increment but not the primary key"
            ),
            Self::NoFields { entity } => {
                write!(f, "entity `{entity}` declares no fields")
            }
        }
    }
}

impl Error for SchemaError {}

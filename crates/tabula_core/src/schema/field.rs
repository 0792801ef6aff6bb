//! Field metadata markers and validated descriptors.
//!
//! # Responsibility
//! - Model the declarative markers an entity attaches to each field.
//! - Validate per-field structural invariants when a schema is built.
//!
//! # Invariants
//! - `auto_increment` is only valid on the primary key.
//! - A one-to-many field can never be the primary key.
//! - `related_column` for `*_to_one` fields defaults to `<field>_id`.

use crate::entity::Entity;
use crate::schema::{schema_of, EntitySchema, SchemaError};
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Formatter};
use std::sync::Arc;

/// Bindable scalar kind; drives statement type hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    Integer,
    Text,
}

/// Relationship kind attached to a declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    None,
    ManyToOne,
    OneToOne,
    OneToMany,
}

/// Lazy handle to a related entity type's schema.
///
/// Holds a function pointer into the registry so declaring a relationship
/// never builds the related schema eagerly; mutually-referencing entity
/// types therefore declare cleanly.
#[derive(Clone, Copy)]
pub struct RelatedRef {
    entity_name: &'static str,
    schema: fn() -> Result<Arc<EntitySchema>, SchemaError>,
}

impl RelatedRef {
    pub fn of<E: Entity>() -> Self {
        Self {
            entity_name: E::entity_name(),
            schema: schema_of::<E>,
        }
    }

    pub fn entity_name(&self) -> &'static str {
        self.entity_name
    }

    /// Resolves the related schema through the registry.
    pub fn schema(&self) -> Result<Arc<EntitySchema>, SchemaError> {
        (self.schema)()
    }
}

impl fmt::Debug for RelatedRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "RelatedRef({})", self.entity_name)
    }
}

/// Declared type of a field: a scalar kind or a related entity identity.
#[derive(Debug, Clone, Copy)]
pub enum DeclaredType {
    Integer,
    Text,
    /// `*_to_one` related entity.
    Entity(RelatedRef),
    /// Ordered sequence of the related entity type (one-to-many).
    Collection(RelatedRef),
}

impl DeclaredType {
    /// Scalar bind kind, when the field maps to a column directly.
    pub fn scalar(&self) -> Option<ScalarType> {
        match self {
            Self::Integer => Some(ScalarType::Integer),
            Self::Text => Some(ScalarType::Text),
            Self::Entity(_) | Self::Collection(_) => None,
        }
    }

    pub fn related(&self) -> Option<&RelatedRef> {
        match self {
            Self::Entity(related) | Self::Collection(related) => Some(related),
            Self::Integer | Self::Text => None,
        }
    }
}

/// Declared metadata markers for one entity field.
///
/// Built fluently inside `Entity::declared_fields()`:
///
/// ```ignore
/// FieldDecl::integer("id").primary_key().auto_increment()
/// FieldDecl::text("title").required().searchable()
/// FieldDecl::many_to_one::<Author>("author")
/// FieldDecl::one_to_many::<Chapter>("chapters", "book_id")
/// ```
#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub(crate) name: &'static str,
    pub(crate) declared: DeclaredType,
    pub(crate) relationship: RelationshipKind,
    pub(crate) required: bool,
    pub(crate) primary_key: bool,
    pub(crate) auto_increment: bool,
    pub(crate) searchable: bool,
    pub(crate) related_column: Option<&'static str>,
    pub(crate) default_value: Option<Value>,
}

impl FieldDecl {
    fn new(name: &'static str, declared: DeclaredType, relationship: RelationshipKind) -> Self {
        Self {
            name,
            declared,
            relationship,
            required: false,
            primary_key: false,
            auto_increment: false,
            searchable: false,
            related_column: None,
            default_value: None,
        }
    }

    /// Declares an integer column field.
    pub fn integer(name: &'static str) -> Self {
        Self::new(name, DeclaredType::Integer, RelationshipKind::None)
    }

    /// Declares a text column field.
    pub fn text(name: &'static str) -> Self {
        Self::new(name, DeclaredType::Text, RelationshipKind::None)
    }

    /// Declares a many-to-one related entity field.
    pub fn many_to_one<E: Entity>(name: &'static str) -> Self {
        Self::new(
            name,
            DeclaredType::Entity(RelatedRef::of::<E>()),
            RelationshipKind::ManyToOne,
        )
    }

    /// Declares a one-to-one related entity field.
    pub fn one_to_one<E: Entity>(name: &'static str) -> Self {
        Self::new(
            name,
            DeclaredType::Entity(RelatedRef::of::<E>()),
            RelationshipKind::OneToOne,
        )
    }

    /// Declares a one-to-many child collection field.
    ///
    /// `referenced_column` is the foreign-key column on the child table.
    pub fn one_to_many<E: Entity>(name: &'static str, referenced_column: &'static str) -> Self {
        let mut decl = Self::new(
            name,
            DeclaredType::Collection(RelatedRef::of::<E>()),
            RelationshipKind::OneToMany,
        );
        decl.related_column = Some(referenced_column);
        decl
    }

    /// Marks the field as the primary key.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Marks the primary key as store-assigned; excluded from writes.
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Requires a value on every write.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Includes the field in substring search.
    pub fn searchable(mut self) -> Self {
        self.searchable = true;
        self
    }

    /// Overrides the local foreign-key column name for `*_to_one` fields.
    pub fn column(mut self, name: &'static str) -> Self {
        self.related_column = Some(name);
        self
    }

    /// Declares a fallback value used when a selected row lacks the column.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub(crate) fn into_descriptor(self, entity: &'static str) -> Result<FieldDescriptor, SchemaError> {
        if self.primary_key && self.relationship == RelationshipKind::OneToMany {
            return Err(SchemaError::KeyOnCollection {
                entity,
                field: self.name,
            });
        }
        if self.auto_increment && !self.primary_key {
            return Err(SchemaError::AutoIncrementWithoutKey {
                entity,
                field: self.name,
            });
        }

        let related_column = match self.relationship {
            RelationshipKind::ManyToOne | RelationshipKind::OneToOne => Some(
                self.related_column
                    .map_or_else(|| format!("{}_id", self.name.to_lowercase()), str::to_string),
            ),
            RelationshipKind::OneToMany => self.related_column.map(str::to_string),
            RelationshipKind::None => None,
        };

        Ok(FieldDescriptor {
            name: self.name,
            declared: self.declared,
            relationship: self.relationship,
            required: self.required,
            primary_key: self.primary_key,
            auto_increment: self.auto_increment,
            searchable: self.searchable,
            related_column,
            default_value: self.default_value,
        })
    }
}

/// Validated descriptor for one entity field.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    name: &'static str,
    declared: DeclaredType,
    relationship: RelationshipKind,
    required: bool,
    primary_key: bool,
    auto_increment: bool,
    searchable: bool,
    related_column: Option<String>,
    default_value: Option<Value>,
}

impl FieldDescriptor {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn declared(&self) -> &DeclaredType {
        &self.declared
    }

    pub fn relationship(&self) -> RelationshipKind {
        self.relationship
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn is_auto_increment(&self) -> bool {
        self.auto_increment
    }

    pub fn is_searchable(&self) -> bool {
        self.searchable
    }

    /// Local FK column for `*_to_one`; child-table FK column for one-to-many.
    pub fn related_column(&self) -> Option<&str> {
        self.related_column.as_deref()
    }

    pub fn related_ref(&self) -> Option<&RelatedRef> {
        self.declared.related()
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default_value.as_ref()
    }

    /// Whether the field holds a single related entity persisted locally.
    pub fn is_to_one(&self) -> bool {
        matches!(
            self.relationship,
            RelationshipKind::ManyToOne | RelationshipKind::OneToOne
        )
    }

    /// Scalar kind of the column this field binds to, if any.
    pub fn scalar_type(&self) -> Option<ScalarType> {
        self.declared.scalar()
    }
}

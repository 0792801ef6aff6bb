//! Entity declaration surface and dynamic field values.
//!
//! # Responsibility
//! - Define the `Entity` trait data types implement to become mappable.
//! - Carry field values between rows and entity constructors in a typed,
//!   erased form.
//!
//! # Invariants
//! - `declared_fields()` describes fields in declaration order and is pure.
//! - `from_values` consumes exactly the values the schema produced for the
//!   declared field names; unknown or mismatched values are rejected.

use crate::schema::FieldDecl;
use std::any::Any;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{self, Display, Formatter};

/// A data type mapped to one table.
///
/// Implementations declare their fields and relationship metadata once via
/// [`FieldDecl`] markers; the schema registry inspects that declaration a
/// single time per process and caches the result.
pub trait Entity: Sized + 'static {
    /// Short type name; the default table name is its lowercase form.
    fn entity_name() -> &'static str;

    /// Explicit table-name override.
    fn table_name() -> Option<&'static str> {
        None
    }

    /// Declared field metadata in declaration order.
    fn declared_fields() -> Vec<FieldDecl>;

    /// Builds an instance from mapped column/relation values.
    fn from_values(values: EntityValues) -> Result<Self, ObjectMappingError>;

    /// Reads one declared field from this instance.
    ///
    /// Unknown names return [`FieldValue::Null`].
    fn field(&self, name: &str) -> FieldValue;
}

/// Object-safe view of an [`Entity`], used for nested relation values.
pub trait AnyEntity: 'static {
    fn any_field(&self, name: &str) -> FieldValue;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<E: Entity> AnyEntity for E {
    fn any_field(&self, name: &str) -> FieldValue {
        Entity::field(self, name)
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// One field value in transit between a row and an entity instance.
pub enum FieldValue {
    Null,
    Integer(i64),
    Text(String),
    /// A resolved `*_to_one` related entity.
    One(Box<dyn AnyEntity>),
    /// A resolved one-to-many child collection, in query order.
    Many(Vec<Box<dyn AnyEntity>>),
}

impl FieldValue {
    /// Short kind tag used in mapping diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Integer(_) => "integer",
            Self::Text(_) => "text",
            Self::One(_) => "entity",
            Self::Many(_) => "collection",
        }
    }
}

impl fmt::Debug for FieldValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "Null"),
            Self::Integer(value) => write!(f, "Integer({value})"),
            Self::Text(value) => write!(f, "Text({value:?})"),
            Self::One(_) => write!(f, "One(..)"),
            Self::Many(items) => write!(f, "Many(len={})", items.len()),
        }
    }
}

/// Named field values produced by the mapper for one entity instance.
#[derive(Debug)]
pub struct EntityValues {
    entity: &'static str,
    values: HashMap<String, FieldValue>,
}

impl EntityValues {
    pub(crate) fn new(entity: &'static str) -> Self {
        Self {
            entity,
            values: HashMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, name: &str, value: FieldValue) {
        self.values.insert(name.to_string(), value);
    }

    pub(crate) fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    /// Removes and returns a raw value, if present.
    pub fn take(&mut self, name: &str) -> Option<FieldValue> {
        self.values.remove(name)
    }

    /// Takes a required integer value.
    pub fn take_integer(&mut self, name: &str) -> Result<i64, ObjectMappingError> {
        match self.values.remove(name) {
            Some(FieldValue::Integer(value)) => Ok(value),
            Some(other) => Err(self.mismatch(name, "integer", other.kind())),
            None => Err(self.missing(name)),
        }
    }

    /// Takes an optional integer value; `Null` and absent both map to `None`.
    pub fn take_opt_integer(&mut self, name: &str) -> Result<Option<i64>, ObjectMappingError> {
        match self.values.remove(name) {
            Some(FieldValue::Integer(value)) => Ok(Some(value)),
            Some(FieldValue::Null) | None => Ok(None),
            Some(other) => Err(self.mismatch(name, "integer", other.kind())),
        }
    }

    /// Takes a required text value.
    pub fn take_text(&mut self, name: &str) -> Result<String, ObjectMappingError> {
        match self.values.remove(name) {
            Some(FieldValue::Text(value)) => Ok(value),
            Some(other) => Err(self.mismatch(name, "text", other.kind())),
            None => Err(self.missing(name)),
        }
    }

    /// Takes an optional text value; `Null` and absent both map to `None`.
    pub fn take_opt_text(&mut self, name: &str) -> Result<Option<String>, ObjectMappingError> {
        match self.values.remove(name) {
            Some(FieldValue::Text(value)) => Ok(Some(value)),
            Some(FieldValue::Null) | None => Ok(None),
            Some(other) => Err(self.mismatch(name, "text", other.kind())),
        }
    }

    /// Takes a required related entity and downcasts it to `E`.
    pub fn take_one<E: Entity>(&mut self, name: &str) -> Result<E, ObjectMappingError> {
        match self.take_opt_one::<E>(name)? {
            Some(entity) => Ok(entity),
            None => Err(self.missing(name)),
        }
    }

    /// Takes an optional related entity and downcasts it to `E`.
    pub fn take_opt_one<E: Entity>(&mut self, name: &str) -> Result<Option<E>, ObjectMappingError> {
        match self.values.remove(name) {
            Some(FieldValue::One(boxed)) => match boxed.into_any().downcast::<E>() {
                Ok(entity) => Ok(Some(*entity)),
                Err(_) => Err(self.mismatch(name, E::entity_name(), "entity")),
            },
            Some(FieldValue::Null) | None => Ok(None),
            Some(other) => Err(self.mismatch(name, E::entity_name(), other.kind())),
        }
    }

    /// Takes a one-to-many collection and downcasts every element to `E`.
    pub fn take_many<E: Entity>(&mut self, name: &str) -> Result<Vec<E>, ObjectMappingError> {
        match self.values.remove(name) {
            Some(FieldValue::Many(items)) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match item.into_any().downcast::<E>() {
                        Ok(entity) => out.push(*entity),
                        Err(_) => return Err(self.mismatch(name, E::entity_name(), "entity")),
                    }
                }
                Ok(out)
            }
            Some(FieldValue::Null) | None => Ok(Vec::new()),
            Some(other) => Err(self.mismatch(name, "collection", other.kind())),
        }
    }

    fn missing(&self, field: &str) -> ObjectMappingError {
        ObjectMappingError::MissingField {
            entity: self.entity,
            field: field.to_string(),
        }
    }

    fn mismatch(&self, field: &str, expected: &'static str, actual: &'static str) -> ObjectMappingError {
        ObjectMappingError::KindMismatch {
            entity: self.entity,
            field: field.to_string(),
            expected,
            actual,
        }
    }
}

/// Construction-time mismatch between mapped values and an entity declaration.
#[derive(Debug)]
pub enum ObjectMappingError {
    MissingField {
        entity: &'static str,
        field: String,
    },
    KindMismatch {
        entity: &'static str,
        field: String,
        expected: &'static str,
        actual: &'static str,
    },
}

impl Display for ObjectMappingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField { entity, field } => {
                write!(f, "no mapped value for `{entity}.{field}`")
            }
            Self::KindMismatch {
                entity,
                field,
                expected,
                actual,
            } => write!(
                f,
                "mapped value for `{entity}.{field}` is `{actual}`, expected `{expected}`"
            ),
        }
    }
}

impl Error for ObjectMappingError {}

#[cfg(test)]
mod tests {
    use super::{Entity, EntityValues, FieldValue, ObjectMappingError};
    use crate::schema::FieldDecl;

    #[derive(Debug, PartialEq)]
    struct Probe {
        id: i64,
    }

    impl Entity for Probe {
        fn entity_name() -> &'static str {
            "Probe"
        }

        fn declared_fields() -> Vec<FieldDecl> {
            vec![FieldDecl::integer("id").primary_key()]
        }

        fn from_values(mut values: EntityValues) -> Result<Self, ObjectMappingError> {
            Ok(Self {
                id: values.take_integer("id")?,
            })
        }

        fn field(&self, name: &str) -> FieldValue {
            match name {
                "id" => FieldValue::Integer(self.id),
                _ => FieldValue::Null,
            }
        }
    }

    #[derive(Debug)]
    struct Other;

    impl Entity for Other {
        fn entity_name() -> &'static str {
            "Other"
        }

        fn declared_fields() -> Vec<FieldDecl> {
            vec![FieldDecl::integer("id").primary_key()]
        }

        fn from_values(_values: EntityValues) -> Result<Self, ObjectMappingError> {
            Ok(Self)
        }

        fn field(&self, _name: &str) -> FieldValue {
            FieldValue::Null
        }
    }

    #[test]
    fn take_integer_reports_kind_mismatch() {
        let mut values = EntityValues::new("Probe");
        values.insert("id", FieldValue::Text("seven".to_string()));

        let err = values.take_integer("id").unwrap_err();
        assert!(matches!(err, ObjectMappingError::KindMismatch { .. }));
    }

    #[test]
    fn take_opt_integer_maps_null_and_absent_to_none() {
        let mut values = EntityValues::new("Probe");
        values.insert("id", FieldValue::Null);

        assert_eq!(values.take_opt_integer("id").unwrap(), None);
        assert_eq!(values.take_opt_integer("missing").unwrap(), None);
    }

    #[test]
    fn take_one_downcasts_to_declared_entity() {
        let mut values = EntityValues::new("Probe");
        values.insert("nested", FieldValue::One(Box::new(Probe { id: 9 })));

        let nested: Probe = values.take_one("nested").unwrap();
        assert_eq!(nested, Probe { id: 9 });
    }

    #[test]
    fn take_one_rejects_wrong_entity_type() {
        let mut values = EntityValues::new("Probe");
        values.insert("nested", FieldValue::One(Box::new(Other)));

        let err = values.take_one::<Probe>("nested").unwrap_err();
        assert!(matches!(err, ObjectMappingError::KindMismatch { .. }));
    }

    #[test]
    fn take_many_on_absent_field_is_empty() {
        let mut values = EntityValues::new("Probe");
        let items: Vec<Probe> = values.take_many("children").unwrap();
        assert!(items.is_empty());
    }
}

//! Process-wide schema cache.
//!
//! # Responsibility
//! - Build an entity type's schema from its declared metadata once.
//! - Serve every later lookup from the cache without re-inspection.
//!
//! # Invariants
//! - Cache population is compute-if-absent; a duplicate concurrent build is
//!   harmless because schema contents derive deterministically from static
//!   metadata and the first inserted instance wins.

use crate::entity::{AnyEntity, Entity, EntityValues, ObjectMappingError};
use crate::schema::{EntitySchema, SchemaError};
use once_cell::sync::Lazy;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

static SCHEMA_CACHE: Lazy<RwLock<HashMap<TypeId, Arc<EntitySchema>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Returns the memoized schema for `E`, building it on first use.
///
/// # Errors
/// - [`SchemaError`] when the declared metadata violates a structural
///   invariant; the failure is not cached and repeats on every call.
pub fn schema_of<E: Entity>() -> Result<Arc<EntitySchema>, SchemaError> {
    let key = TypeId::of::<E>();
    if let Some(schema) = read_cache().get(&key) {
        return Ok(Arc::clone(schema));
    }

    // Built outside the lock; losing a build race is fine, contents are
    // identical either way.
    let built = Arc::new(build_schema::<E>()?);
    let mut cache = write_cache();
    Ok(Arc::clone(cache.entry(key).or_insert(built)))
}

fn build_schema<E: Entity>() -> Result<EntitySchema, SchemaError> {
    let entity = E::entity_name();
    let decls = E::declared_fields();
    if decls.is_empty() {
        return Err(SchemaError::NoFields { entity });
    }

    let mut fields = Vec::with_capacity(decls.len());
    let mut primary_key_index = None;
    for (index, decl) in decls.into_iter().enumerate() {
        let descriptor = decl.into_descriptor(entity)?;
        if descriptor.is_primary_key() {
            if primary_key_index.is_some() {
                return Err(SchemaError::MultiplePrimaryKeys { entity });
            }
            primary_key_index = Some(index);
        }
        fields.push(descriptor);
    }

    let Some(primary_key_index) = primary_key_index else {
        return Err(SchemaError::MissingPrimaryKey { entity });
    };

    let table = E::table_name().map_or_else(|| entity.to_lowercase(), str::to_string);

    Ok(EntitySchema::new(
        entity,
        table,
        fields,
        primary_key_index,
        construct_erased::<E>,
    ))
}

fn construct_erased<E: Entity>(
    values: EntityValues,
) -> Result<Box<dyn AnyEntity>, ObjectMappingError> {
    E::from_values(values).map(|entity| Box::new(entity) as Box<dyn AnyEntity>)
}

fn read_cache() -> RwLockReadGuard<'static, HashMap<TypeId, Arc<EntitySchema>>> {
    match SCHEMA_CACHE.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write_cache() -> RwLockWriteGuard<'static, HashMap<TypeId, Arc<EntitySchema>>> {
    match SCHEMA_CACHE.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

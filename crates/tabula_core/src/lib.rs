//! Metadata-driven object-relational mapping core.
//!
//! Application code declares plain data types with field metadata (primary
//! key, foreign keys, searchable, required) via the [`Entity`] trait; a
//! generic [`Repository`] then provides CRUD, pagination, related-entity
//! resolution, and substring search over a single SQLite connection without
//! hand-written SQL.

pub mod db;
pub mod entity;
pub mod logging;
pub mod repo;
pub mod schema;
pub mod sql;

pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use entity::{AnyEntity, Entity, EntityValues, FieldValue, ObjectMappingError};
pub use logging::{default_log_level, init_logging, logging_status};
pub use repo::{BindArg, BoundValue, FetchParams, Page, RepoError, RepoResult, Repository};
pub use schema::{
    schema_of, DeclaredType, EntitySchema, FieldDecl, FieldDescriptor, RelatedRef,
    RelationshipKind, ScalarType, SchemaError,
};
pub use sql::QueryBuilder;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

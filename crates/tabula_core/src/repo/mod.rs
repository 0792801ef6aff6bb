//! Repository layer: generic CRUD, pagination, relation resolution, search.
//!
//! # Responsibility
//! - Expose the repository surface application code binds an entity type to.
//! - Define the error taxonomy for mapping, referential, and store failures.
//!
//! # Invariants
//! - No failure is silently swallowed; the only soft outcomes are "no rows"
//!   reads and omission of optional empty fields during write extraction.
//! - Store-level error messages are preserved verbatim inside [`RepoError::Db`].

use crate::db::DbError;
use crate::entity::ObjectMappingError;
use crate::schema::{ScalarType, SchemaError};
use rusqlite::types::Value;
use serde::Serialize;
use std::error::Error;
use std::fmt::{self, Display, Formatter};

mod engine;
mod mapper;
mod repository;

pub use repository::Repository;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository-level error taxonomy.
#[derive(Debug)]
pub enum RepoError {
    /// The repository cannot be bound to its entity type or table.
    Configuration {
        entity: &'static str,
        message: String,
    },
    Schema(SchemaError),
    /// A required field (or non-auto-increment primary key) carries no value.
    RequiredFieldMissing {
        entity: &'static str,
        field: &'static str,
    },
    /// A write resolved to zero bindable columns.
    NoBindableData { entity: &'static str },
    /// A foreign-key reference does not resolve to an existing row.
    RelatedObjectNotFound {
        entity: &'static str,
        table: String,
        key: String,
    },
    /// Primary-key lookup matched more than one row.
    MultipleResultsForId {
        table: String,
        key: String,
        count: usize,
    },
    /// Relation resolution exceeded the recursion guard, indicating a
    /// cyclic `*_to_one` chain between entity types.
    RelationDepthExceeded { table: String, depth: usize },
    Mapping(ObjectMappingError),
    /// Store-level execution failure; the driver message is kept verbatim.
    Db(DbError),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration { entity, message } => {
                write!(f, "repository for `{entity}` is misconfigured: {message}")
            }
            Self::Schema(err) => write!(f, "{err}"),
            Self::RequiredFieldMissing { entity, field } => {
                write!(f, "required field `{entity}.{field}` carries no value")
            }
            Self::NoBindableData { entity } => {
                write!(f, "entity `{entity}` produced no bindable data to write")
            }
            Self::RelatedObjectNotFound { entity, table, key } => write!(
                f,
                "related `{entity}` row `{key}` does not exist in table `{table}`"
            ),
            Self::MultipleResultsForId { table, key, count } => write!(
                f,
                "{count} rows in `{table}` match primary key `{key}`; expected at most one"
            ),
            Self::RelationDepthExceeded { table, depth } => write!(
                f,
                "relation resolution starting at `{table}` exceeded depth {depth}; \
                 the foreign-key graph is likely cyclic"
            ),
            Self::Mapping(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Schema(err) => Some(err),
            Self::Mapping(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SchemaError> for RepoError {
    fn from(value: SchemaError) -> Self {
        Self::Schema(value)
    }
}

impl From<ObjectMappingError> for RepoError {
    fn from(value: ObjectMappingError) -> Self {
        Self::Mapping(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// One value bound into a write statement; foreign-key objects are already
/// resolved down to their primary-key scalar.
#[derive(Debug, Clone)]
pub struct BoundValue {
    pub column: String,
    pub sql_type: ScalarType,
    pub value: Value,
}

/// Named bind argument: a scalar, or an ordered sequence expanded through
/// the `:<name>:array` convention into individually-bound placeholders.
#[derive(Debug, Clone)]
pub enum BindArg {
    Value(Value),
    List(Vec<Value>),
}

impl BindArg {
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }

    pub fn list<V, I>(values: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

/// Query options for `find`/`find_first`.
///
/// `conditions` is a raw WHERE fragment with named placeholders; every
/// value referenced there must appear in `bind`. Pagination applies when
/// `items_per_page` is set; `page` is 0-indexed and defaults to 0.
#[derive(Debug, Clone, Default)]
pub struct FetchParams {
    pub page: Option<i64>,
    pub items_per_page: Option<i64>,
    pub conditions: Option<String>,
    pub bind: Vec<(String, BindArg)>,
}

/// Bounded result set plus pagination metadata.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub page: i64,
    pub items_per_page: i64,
    pub total_pages: i64,
}

//! Generic repository bound to one entity type and one connection.
//!
//! # Responsibility
//! - Expose find/find_by_id/find_first/find_by_query/save/update/delete
//!   for a bound entity type.
//! - Orchestrate schema lookup, statement building, execution, and mapping.
//!
//! # Invariants
//! - One repository owns exactly one injected connection handle; it is not
//!   internally synchronized, and sharing across concurrent callers is the
//!   caller's responsibility.
//! - No partial call state survives a failure; every operation either
//!   returns a value or a typed error.

use crate::entity::Entity;
use crate::repo::engine;
use crate::repo::mapper;
use crate::repo::{FetchParams, Page, RepoError, RepoResult};
use crate::schema::{schema_of, EntitySchema};
use crate::sql::QueryBuilder;
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params, Connection};
use std::marker::PhantomData;
use std::sync::Arc;

/// Repository engine for entity type `T` over a single connection.
pub struct Repository<'conn, T: Entity> {
    conn: &'conn Connection,
    schema: Arc<EntitySchema>,
    _entity: PhantomData<T>,
}

impl<'conn, T: Entity> std::fmt::Debug for Repository<'conn, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl<'conn, T: Entity> Repository<'conn, T> {
    /// Binds `T` to `conn`, resolving and validating its schema.
    ///
    /// # Errors
    /// - [`RepoError::Schema`] when `T`'s declared metadata is structurally
    ///   invalid.
    /// - [`RepoError::Configuration`] when the mapped table does not exist
    ///   in the target database.
    pub fn new(conn: &'conn Connection) -> RepoResult<Self> {
        let schema = schema_of::<T>()?;

        let present: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1;",
            params![schema.table()],
            |row| row.get(0),
        )?;
        if present == 0 {
            return Err(RepoError::Configuration {
                entity: schema.entity_name(),
                message: format!(
                    "mapped table `{}` does not exist in the target database",
                    schema.table()
                ),
            });
        }

        debug!(
            "event=repo_init module=repo entity={} table={} status=ok",
            schema.entity_name(),
            schema.table()
        );

        Ok(Self {
            conn,
            schema,
            _entity: PhantomData,
        })
    }

    /// Schema the repository is bound to.
    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    /// Filtered, optionally paginated fetch.
    ///
    /// Paged calls compute `total_pages` from a COUNT query sharing the
    /// WHERE clause; a page index past the last page yields an empty data
    /// set, not an error.
    pub fn find(&self, params: &FetchParams) -> RepoResult<Page<T>> {
        let (values, meta) = engine::find_values(
            self.conn,
            &self.schema,
            params.page,
            params.items_per_page,
            params.conditions.as_deref(),
            &params.bind,
            true,
        )?;
        self.into_page(values, meta)
    }

    /// Primary-key lookup.
    ///
    /// Returns `None` for zero rows; more than one row raises
    /// [`RepoError::MultipleResultsForId`] since primary-key uniqueness is
    /// broken at the store.
    pub fn find_by_id(&self, id: impl Into<Value>) -> RepoResult<Option<T>> {
        match engine::find_by_id_values(self.conn, &self.schema, &id.into(), 0)? {
            Some(values) => Ok(Some(T::from_values(values)?)),
            None => Ok(None),
        }
    }

    /// Like [`Repository::find`], limited to a single row.
    pub fn find_first(&self, params: &FetchParams) -> RepoResult<Option<T>> {
        let (values, _) = engine::find_values(
            self.conn,
            &self.schema,
            Some(0),
            Some(1),
            params.conditions.as_deref(),
            &params.bind,
            false,
        )?;
        match values.into_iter().next() {
            Some(values) => Ok(Some(T::from_values(values)?)),
            None => Ok(None),
        }
    }

    /// Substring search across searchable fields, including one level of
    /// direct `*_to_one` relations.
    ///
    /// Returns an empty page without querying when neither the entity nor
    /// its direct relations declare a searchable field.
    pub fn find_by_query(
        &self,
        query: &str,
        page: Option<i64>,
        items_per_page: Option<i64>,
    ) -> RepoResult<Page<T>> {
        let (values, meta) =
            engine::search_values(self.conn, &self.schema, query, page, items_per_page)?;
        self.into_page(values, meta)
    }

    /// Inserts the entity.
    pub fn save(&self, entity: &T) -> RepoResult<()> {
        let bound = mapper::extract_values(self.conn, &self.schema, entity)?;
        let columns: Vec<&str> = bound.iter().map(|value| value.column.as_str()).collect();
        let sql = QueryBuilder::new()
            .insert(self.schema.table(), &columns)
            .build();
        let binds: Vec<(String, Value)> = bound
            .into_iter()
            .map(|value| (format!(":{}", value.column), value.value))
            .collect();
        engine::execute(self.conn, &sql, &binds)?;
        Ok(())
    }

    /// Updates the row keyed by the entity's primary-key value.
    ///
    /// A key matching no row executes as a no-op; the engine does not
    /// distinguish that from success.
    pub fn update(&self, entity: &T) -> RepoResult<()> {
        let bound = mapper::extract_values(self.conn, &self.schema, entity)?;
        let pk = self.schema.primary_key();
        let key = mapper::field_to_value(&entity.field(pk.name())).ok_or(
            RepoError::RequiredFieldMissing {
                entity: self.schema.entity_name(),
                field: pk.name(),
            },
        )?;

        let columns: Vec<&str> = bound.iter().map(|value| value.column.as_str()).collect();
        let sql = QueryBuilder::new()
            .update(self.schema.table(), &columns)
            .where_clause(&format!("{} = :{}", pk.name(), pk.name()))
            .build();

        let mut binds: Vec<(String, Value)> = bound
            .into_iter()
            .map(|value| (format!(":{}", value.column), value.value))
            .collect();
        let pk_placeholder = format!(":{}", pk.name());
        // A non-auto-increment key already sits in the SET list under the
        // same placeholder; one bound value serves both slots.
        if !binds.iter().any(|(name, _)| *name == pk_placeholder) {
            binds.push((pk_placeholder, key));
        }

        engine::execute(self.conn, &sql, &binds)?;
        Ok(())
    }

    /// Deletes the row keyed by `id`.
    ///
    /// Child rows are neither cascaded nor checked here; the store's own
    /// foreign-key enforcement surfaces as [`RepoError::Db`].
    pub fn delete(&self, id: impl Into<Value>) -> RepoResult<()> {
        let pk = self.schema.primary_key();
        let sql = QueryBuilder::new()
            .delete(self.schema.table())
            .where_clause(&format!("{} = :{}", pk.name(), pk.name()))
            .build();
        engine::execute(
            self.conn,
            &sql,
            &[(format!(":{}", pk.name()), id.into())],
        )?;
        Ok(())
    }

    fn into_page(
        &self,
        values: Vec<crate::entity::EntityValues>,
        meta: engine::PageMeta,
    ) -> RepoResult<Page<T>> {
        let mut data = Vec::with_capacity(values.len());
        for entry in values {
            data.push(T::from_values(entry)?);
        }
        Ok(Page {
            data,
            page: meta.page,
            items_per_page: meta.items_per_page,
            total_pages: meta.total_pages,
        })
    }
}

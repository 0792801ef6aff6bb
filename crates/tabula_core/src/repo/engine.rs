//! Dynamic query execution core.
//!
//! # Responsibility
//! - Execute parameterized statements against the injected connection.
//! - Drive schema-directed fetches for any entity type/table pair, so
//!   relation resolution can re-enter the engine for a related type.
//!
//! # Invariants
//! - Identifiers in statement text come only from schema metadata.
//! - Every value reaches the store as a bound parameter, including each
//!   element of an expanded `:<name>:array` sequence.

use crate::entity::EntityValues;
use crate::repo::mapper;
use crate::repo::{BindArg, RepoError, RepoResult};
use crate::schema::EntitySchema;
use crate::sql::QueryBuilder;
use log::error;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use rusqlite::types::Value;
use rusqlite::{Connection, ToSql};
use std::collections::HashMap;

/// Hard cap on nested `*_to_one` resolution; guards cyclic schemas.
pub(crate) const MAX_RESOLVE_DEPTH: usize = 16;

pub(crate) type RowMap = HashMap<String, Value>;

/// Pagination metadata computed alongside a fetch.
pub(crate) struct PageMeta {
    pub(crate) page: i64,
    pub(crate) items_per_page: i64,
    pub(crate) total_pages: i64,
}

static ARRAY_TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r":([A-Za-z_][A-Za-z0-9_]*):array").expect("valid array token regex")
});

/// Runs a SELECT and materializes every row as a column-name → value map.
pub(crate) fn fetch_rows(
    conn: &Connection,
    sql: &str,
    binds: &[(String, Value)],
) -> RepoResult<Vec<RowMap>> {
    let mut stmt = conn.prepare(sql)?;
    let names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(|name| (*name).to_string())
        .collect();
    let refs = bind_refs(binds);
    let mut rows = stmt.query(refs.as_slice())?;

    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut map = RowMap::with_capacity(names.len());
        for (index, name) in names.iter().enumerate() {
            map.insert(name.clone(), row.get::<_, Value>(index)?);
        }
        out.push(map);
    }
    Ok(out)
}

/// Runs a single-value COUNT-style SELECT.
pub(crate) fn fetch_count(
    conn: &Connection,
    sql: &str,
    binds: &[(String, Value)],
) -> RepoResult<i64> {
    let mut stmt = conn.prepare(sql)?;
    let refs = bind_refs(binds);
    let count = stmt.query_row(refs.as_slice(), |row| row.get::<_, i64>(0))?;
    Ok(count)
}

/// Executes a write statement, returning the affected row count.
pub(crate) fn execute(
    conn: &Connection,
    sql: &str,
    binds: &[(String, Value)],
) -> RepoResult<usize> {
    let mut stmt = conn.prepare(sql)?;
    let refs = bind_refs(binds);
    match stmt.execute(refs.as_slice()) {
        Ok(affected) => Ok(affected),
        Err(err) => {
            error!("event=repo_exec module=repo status=error error={err}");
            Err(err.into())
        }
    }
}

/// Schema-directed filtered fetch with optional pagination.
///
/// `with_total` controls whether a COUNT query (sharing the WHERE clause
/// and binds) computes `total_pages`; unpaged calls return a single page.
pub(crate) fn find_values(
    conn: &Connection,
    schema: &EntitySchema,
    page: Option<i64>,
    items_per_page: Option<i64>,
    conditions: Option<&str>,
    bind: &[(String, BindArg)],
    with_total: bool,
) -> RepoResult<(Vec<EntityValues>, PageMeta)> {
    let (where_sql, binds) = match conditions {
        Some(conditions) => {
            let (sql, binds) = expand_conditions(conditions, bind);
            (Some(sql), binds)
        }
        None => (None, Vec::new()),
    };

    let mut builder = QueryBuilder::new().select(None).from(schema.table());
    if let Some(where_sql) = where_sql.as_deref() {
        builder = builder.where_clause(where_sql);
    }
    if let Some(per) = items_per_page {
        builder = builder.paginate(page.unwrap_or(0), per);
    }

    let raw = fetch_rows(conn, &builder.build(), &binds)?;
    let mut rows = Vec::with_capacity(raw.len());
    for row in raw {
        rows.push(mapper::map_row(conn, schema, row, 0)?);
    }

    let meta = match items_per_page {
        Some(per) => {
            let total = if with_total {
                let mut count = QueryBuilder::new()
                    .select(Some(&["COUNT(*)"]))
                    .from(schema.table());
                if let Some(where_sql) = where_sql.as_deref() {
                    count = count.where_clause(where_sql);
                }
                fetch_count(conn, &count.build(), &binds)?
            } else {
                rows.len() as i64
            };
            PageMeta {
                page: page.unwrap_or(0),
                items_per_page: per,
                total_pages: total_pages(total, per),
            }
        }
        None => PageMeta {
            page: 0,
            items_per_page: rows.len() as i64,
            total_pages: 1,
        },
    };

    Ok((rows, meta))
}

/// Primary-key lookup for any schema; `depth` tracks nested resolution.
pub(crate) fn find_by_id_values(
    conn: &Connection,
    schema: &EntitySchema,
    id: &Value,
    depth: usize,
) -> RepoResult<Option<EntityValues>> {
    let pk = schema.primary_key();
    let sql = QueryBuilder::new()
        .select(None)
        .from(schema.table())
        .where_clause(&format!("{} = :{}", pk.name(), pk.name()))
        .build();
    let mut rows = fetch_rows(conn, &sql, &[(format!(":{}", pk.name()), id.clone())])?;

    if rows.len() > 1 {
        return Err(RepoError::MultipleResultsForId {
            table: schema.table().to_string(),
            key: value_display(id),
            count: rows.len(),
        });
    }
    match rows.pop() {
        Some(row) => Ok(Some(mapper::map_row(conn, schema, row, depth)?)),
        None => Ok(None),
    }
}

/// Referential existence probe used before writing a foreign key.
pub(crate) fn exists(conn: &Connection, schema: &EntitySchema, id: &Value) -> RepoResult<bool> {
    let pk = schema.primary_key();
    let sql = QueryBuilder::new()
        .select(Some(&["COUNT(*)"]))
        .from(schema.table())
        .where_clause(&format!("{} = :{}", pk.name(), pk.name()))
        .build();
    let count = fetch_count(conn, &sql, &[(format!(":{}", pk.name()), id.clone())])?;
    Ok(count > 0)
}

/// Substring search across searchable fields, reaching one level into
/// direct `*_to_one` relations through joins.
///
/// The traversal bound is structural: only the entity's own columns and
/// directly-joined relation columns ever appear in the WHERE clause, so
/// matches deeper in the graph are unreachable by construction.
pub(crate) fn search_values(
    conn: &Connection,
    schema: &EntitySchema,
    query: &str,
    page: Option<i64>,
    items_per_page: Option<i64>,
) -> RepoResult<(Vec<EntityValues>, PageMeta)> {
    let table = schema.table();

    let mut conditions: Vec<String> = schema
        .searchable_fields()
        .filter(|field| field.scalar_type().is_some())
        .map(|field| format!("{table}.{} LIKE :query", field.name()))
        .collect();

    let mut from = table.to_string();
    for (index, field) in schema.foreign_keys().enumerate() {
        let Some(related_ref) = field.related_ref() else {
            continue;
        };
        let Some(fk_column) = field.related_column() else {
            continue;
        };
        let related = related_ref.schema()?;
        let searchable: Vec<&'static str> = related
            .searchable_fields()
            .filter(|field| field.scalar_type().is_some())
            .map(|field| field.name())
            .collect();
        if searchable.is_empty() {
            continue;
        }

        let alias = format!("rel{index}");
        from.push_str(&format!(
            " LEFT JOIN {} AS {alias} ON {table}.{fk_column} = {alias}.{}",
            related.table(),
            related.primary_key().name()
        ));
        for name in searchable {
            conditions.push(format!("{alias}.{name} LIKE :query"));
        }
    }

    if conditions.is_empty() {
        return Ok((
            Vec::new(),
            PageMeta {
                page: page.unwrap_or(0),
                items_per_page: items_per_page.unwrap_or(0),
                total_pages: 0,
            },
        ));
    }

    let where_sql = conditions.join(" OR ");
    let select_cols = format!("{table}.*");
    let mut builder = QueryBuilder::new()
        .select(Some(&[select_cols.as_str()]))
        .from(&from)
        .where_clause(&where_sql);
    if let Some(per) = items_per_page {
        builder = builder.paginate(page.unwrap_or(0), per);
    }
    let binds = vec![(":query".to_string(), Value::Text(format!("%{query}%")))];

    let raw = fetch_rows(conn, &builder.build(), &binds)?;
    let mut rows = Vec::with_capacity(raw.len());
    for row in raw {
        rows.push(mapper::map_row(conn, schema, row, 0)?);
    }

    let meta = match items_per_page {
        Some(per) => {
            let count_sql = QueryBuilder::new()
                .select(Some(&["COUNT(*)"]))
                .from(&from)
                .where_clause(&where_sql)
                .build();
            let total = fetch_count(conn, &count_sql, &binds)?;
            PageMeta {
                page: page.unwrap_or(0),
                items_per_page: per,
                total_pages: total_pages(total, per),
            }
        }
        None => PageMeta {
            page: 0,
            items_per_page: rows.len() as i64,
            total_pages: 1,
        },
    };

    Ok((rows, meta))
}

/// Expands `:<name>:array` tokens into per-element placeholders and
/// collects the final named bind list.
pub(crate) fn expand_conditions(
    conditions: &str,
    bind: &[(String, BindArg)],
) -> (String, Vec<(String, Value)>) {
    let mut binds: Vec<(String, Value)> = Vec::new();
    for (name, arg) in bind {
        if let BindArg::Value(value) = arg {
            binds.push((placeholder(name), value.clone()));
        }
    }

    let sql = ARRAY_TOKEN_RE
        .replace_all(conditions, |caps: &Captures<'_>| {
            let name = &caps[1];
            match lookup_list(bind, name) {
                Some(values) => {
                    let mut parts = Vec::with_capacity(values.len());
                    for (index, value) in values.iter().enumerate() {
                        let part = format!(":{name}_{index}");
                        binds.push((part.clone(), value.clone()));
                        parts.push(part);
                    }
                    parts.join(",")
                }
                // Leave unresolved tokens alone; the store rejects them.
                None => caps[0].to_string(),
            }
        })
        .into_owned();

    (sql, binds)
}

fn lookup_list<'a>(bind: &'a [(String, BindArg)], name: &str) -> Option<&'a [Value]> {
    bind.iter().find_map(|(bound, arg)| match arg {
        BindArg::List(values) if bound.trim_start_matches(':') == name => Some(values.as_slice()),
        _ => None,
    })
}

fn placeholder(name: &str) -> String {
    format!(":{}", name.trim_start_matches(':'))
}

fn bind_refs<'a>(binds: &'a [(String, Value)]) -> Vec<(&'a str, &'a dyn ToSql)> {
    binds
        .iter()
        .map(|(name, value)| (name.as_str(), value as &dyn ToSql))
        .collect()
}

fn total_pages(total: i64, items_per_page: i64) -> i64 {
    if items_per_page > 0 {
        (total + items_per_page - 1) / items_per_page
    } else {
        0
    }
}

/// Human-readable key rendering for error messages.
pub(crate) fn value_display(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(v) => v.to_string(),
        Value::Real(v) => v.to_string(),
        Value::Text(v) => v.clone(),
        Value::Blob(v) => format!("<{} bytes>", v.len()),
    }
}

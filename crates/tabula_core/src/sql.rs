//! Fluent SQL fragment assembly.
//!
//! # Responsibility
//! - Assemble statement text from trusted table and column identifiers.
//!
//! # Invariants
//! - Identifiers come only from schema metadata, never from user input.
//! - Values are never interpolated; every value slot is a named
//!   placeholder matching its column name.

/// Chainable statement-text builder; `build()` returns the accumulated SQL.
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    sql: String,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `SELECT <cols|*> `.
    pub fn select(mut self, columns: Option<&[&str]>) -> Self {
        match columns {
            Some(columns) => {
                self.sql.push_str("SELECT ");
                self.sql.push_str(&columns.join(","));
                self.sql.push(' ');
            }
            None => self.sql.push_str("SELECT * "),
        }
        self
    }

    /// Appends `INSERT INTO <table> (<c1>,...) VALUES (:c1,...);`.
    ///
    /// Placeholder names equal column names, one-to-one.
    pub fn insert(mut self, table: &str, columns: &[&str]) -> Self {
        let placeholders = columns
            .iter()
            .map(|column| format!(":{column}"))
            .collect::<Vec<_>>()
            .join(",");
        self.sql.push_str("INSERT INTO ");
        self.sql.push_str(table);
        self.sql.push_str(" (");
        self.sql.push_str(&columns.join(","));
        self.sql.push_str(") VALUES (");
        self.sql.push_str(&placeholders);
        self.sql.push_str(");");
        self
    }

    /// Appends `UPDATE <table> SET <c1> = :c1,<c2> = :c2 `.
    pub fn update(mut self, table: &str, columns: &[&str]) -> Self {
        let assignments = columns
            .iter()
            .map(|column| format!("{column} = :{column}"))
            .collect::<Vec<_>>()
            .join(",");
        self.sql.push_str("UPDATE ");
        self.sql.push_str(table);
        self.sql.push_str(" SET ");
        self.sql.push_str(&assignments);
        self.sql.push(' ');
        self
    }

    /// Appends `DELETE FROM <table> `.
    pub fn delete(mut self, table: &str) -> Self {
        self.sql.push_str("DELETE FROM ");
        self.sql.push_str(table);
        self.sql.push(' ');
        self
    }

    /// Appends `FROM <table> `.
    pub fn from(mut self, table: &str) -> Self {
        self.sql.push_str("FROM ");
        self.sql.push_str(table);
        self.sql.push(' ');
        self
    }

    /// Appends `WHERE <condition> ` verbatim.
    pub fn where_clause(mut self, condition: &str) -> Self {
        self.sql.push_str("WHERE ");
        self.sql.push_str(condition);
        self.sql.push(' ');
        self
    }

    /// Appends `LIMIT <items_per_page> OFFSET <page*items_per_page>`.
    ///
    /// `page` is 0-indexed. Out-of-range values pass through to the store
    /// unvalidated.
    pub fn paginate(mut self, page: i64, items_per_page: i64) -> Self {
        self.sql.push_str("LIMIT ");
        self.sql.push_str(&items_per_page.to_string());
        self.sql.push_str(" OFFSET ");
        self.sql.push_str(&(page * items_per_page).to_string());
        self
    }

    /// Returns the accumulated statement text.
    pub fn build(self) -> String {
        self.sql
    }
}

//! Shared fixture entities and database setup for integration tests.
#![allow(dead_code)]

use rusqlite::Connection;
use serde::Serialize;
use tabula_core::entity::{Entity, EntityValues, FieldValue, ObjectMappingError};
use tabula_core::open_db_in_memory;
use tabula_core::schema::FieldDecl;

const LIBRARY_DDL: &str = "
CREATE TABLE passport (
    id INTEGER PRIMARY KEY,
    code TEXT NOT NULL
);
CREATE TABLE author (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    passport_id INTEGER UNIQUE REFERENCES passport (id)
);
CREATE TABLE book (
    id INTEGER PRIMARY KEY,
    title TEXT NOT NULL,
    author_id INTEGER NOT NULL REFERENCES author (id)
);
CREATE TABLE chapter (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT,
    book_id INTEGER NOT NULL REFERENCES book (id)
);
CREATE TABLE tag (
    id INTEGER NOT NULL,
    label TEXT NOT NULL
);
CREATE TABLE draft (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    note TEXT
);
CREATE TABLE shelf (
    code TEXT NOT NULL,
    label TEXT
);
";

/// Opens an in-memory database with every fixture table created.
pub fn open_library_db() -> Connection {
    let conn = open_db_in_memory().expect("in-memory database should open");
    conn.execute_batch(LIBRARY_DDL)
        .expect("fixture DDL should apply");
    conn
}

/// Identity document; one-to-one target of [`Author`].
#[derive(Debug, Clone, PartialEq)]
pub struct Passport {
    pub id: i64,
    pub code: String,
}

impl Entity for Passport {
    fn entity_name() -> &'static str {
        "Passport"
    }

    fn declared_fields() -> Vec<FieldDecl> {
        vec![
            FieldDecl::integer("id").primary_key(),
            FieldDecl::text("code").required().searchable(),
        ]
    }

    fn from_values(mut values: EntityValues) -> Result<Self, ObjectMappingError> {
        Ok(Self {
            id: values.take_integer("id")?,
            code: values.take_text("code")?,
        })
    }

    fn field(&self, name: &str) -> FieldValue {
        match name {
            "id" => FieldValue::Integer(self.id),
            "code" => FieldValue::Text(self.code.clone()),
            _ => FieldValue::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Author {
    pub id: i64,
    pub name: String,
    pub passport: Option<Passport>,
}

impl Entity for Author {
    fn entity_name() -> &'static str {
        "Author"
    }

    fn declared_fields() -> Vec<FieldDecl> {
        vec![
            FieldDecl::integer("id").primary_key(),
            FieldDecl::text("name").required().searchable(),
            FieldDecl::one_to_one::<Passport>("passport"),
        ]
    }

    fn from_values(mut values: EntityValues) -> Result<Self, ObjectMappingError> {
        Ok(Self {
            id: values.take_integer("id")?,
            name: values.take_text("name")?,
            passport: values.take_opt_one("passport")?,
        })
    }

    fn field(&self, name: &str) -> FieldValue {
        match name {
            "id" => FieldValue::Integer(self.id),
            "name" => FieldValue::Text(self.name.clone()),
            "passport" => self
                .passport
                .clone()
                .map_or(FieldValue::Null, |passport| {
                    FieldValue::One(Box::new(passport))
                }),
            _ => FieldValue::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: Author,
    pub chapters: Vec<Chapter>,
}

impl Entity for Book {
    fn entity_name() -> &'static str {
        "Book"
    }

    fn declared_fields() -> Vec<FieldDecl> {
        vec![
            FieldDecl::integer("id").primary_key(),
            FieldDecl::text("title").required().searchable(),
            FieldDecl::many_to_one::<Author>("author").required(),
            FieldDecl::one_to_many::<Chapter>("chapters", "book_id"),
        ]
    }

    fn from_values(mut values: EntityValues) -> Result<Self, ObjectMappingError> {
        Ok(Self {
            id: values.take_integer("id")?,
            title: values.take_text("title")?,
            author: values.take_one("author")?,
            chapters: values.take_many("chapters")?,
        })
    }

    fn field(&self, name: &str) -> FieldValue {
        match name {
            "id" => FieldValue::Integer(self.id),
            "title" => FieldValue::Text(self.title.clone()),
            "author" => FieldValue::One(Box::new(self.author.clone())),
            "chapters" => FieldValue::Many(
                self.chapters
                    .iter()
                    .cloned()
                    .map(|chapter| Box::new(chapter) as _)
                    .collect(),
            ),
            _ => FieldValue::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chapter {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub book: Book,
}

impl Entity for Chapter {
    fn entity_name() -> &'static str {
        "Chapter"
    }

    fn declared_fields() -> Vec<FieldDecl> {
        vec![
            FieldDecl::integer("id").primary_key().auto_increment(),
            FieldDecl::text("title"),
            FieldDecl::many_to_one::<Book>("book").required(),
        ]
    }

    fn from_values(mut values: EntityValues) -> Result<Self, ObjectMappingError> {
        Ok(Self {
            id: values.take_opt_integer("id")?,
            title: values.take_opt_text("title")?,
            book: values.take_one("book")?,
        })
    }

    fn field(&self, name: &str) -> FieldValue {
        match name {
            "id" => self.id.map_or(FieldValue::Null, FieldValue::Integer),
            "title" => self
                .title
                .clone()
                .map_or(FieldValue::Null, FieldValue::Text),
            "book" => FieldValue::One(Box::new(self.book.clone())),
            _ => FieldValue::Null,
        }
    }
}

/// Flat label row; `tag` is created without a primary-key constraint so
/// uniqueness-violation scenarios stay reachable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tag {
    pub id: i64,
    pub label: String,
}

impl Tag {
    pub fn new(id: i64, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
        }
    }
}

impl Entity for Tag {
    fn entity_name() -> &'static str {
        "Tag"
    }

    fn declared_fields() -> Vec<FieldDecl> {
        vec![
            FieldDecl::integer("id").primary_key(),
            FieldDecl::text("label").required().searchable(),
        ]
    }

    fn from_values(mut values: EntityValues) -> Result<Self, ObjectMappingError> {
        Ok(Self {
            id: values.take_integer("id")?,
            label: values.take_text("label")?,
        })
    }

    fn field(&self, name: &str) -> FieldValue {
        match name {
            "id" => FieldValue::Integer(self.id),
            "label" => FieldValue::Text(self.label.clone()),
            _ => FieldValue::Null,
        }
    }
}

/// Fully optional row shape; declares no searchable fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    pub id: Option<i64>,
    pub note: Option<String>,
}

impl Entity for Draft {
    fn entity_name() -> &'static str {
        "Draft"
    }

    fn declared_fields() -> Vec<FieldDecl> {
        vec![
            FieldDecl::integer("id").primary_key().auto_increment(),
            FieldDecl::text("note"),
        ]
    }

    fn from_values(mut values: EntityValues) -> Result<Self, ObjectMappingError> {
        Ok(Self {
            id: values.take_opt_integer("id")?,
            note: values.take_opt_text("note")?,
        })
    }

    fn field(&self, name: &str) -> FieldValue {
        match name {
            "id" => self.id.map_or(FieldValue::Null, FieldValue::Integer),
            "note" => self
                .note
                .clone()
                .map_or(FieldValue::Null, FieldValue::Text),
            _ => FieldValue::Null,
        }
    }
}

/// Text-keyed row shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Shelf {
    pub code: String,
    pub label: Option<String>,
}

impl Entity for Shelf {
    fn entity_name() -> &'static str {
        "Shelf"
    }

    fn declared_fields() -> Vec<FieldDecl> {
        vec![
            FieldDecl::text("code").primary_key(),
            FieldDecl::text("label"),
        ]
    }

    fn from_values(mut values: EntityValues) -> Result<Self, ObjectMappingError> {
        Ok(Self {
            code: values.take_text("code")?,
            label: values.take_opt_text("label")?,
        })
    }

    fn field(&self, name: &str) -> FieldValue {
        match name {
            "code" => FieldValue::Text(self.code.clone()),
            "label" => self
                .label
                .clone()
                .map_or(FieldValue::Null, FieldValue::Text),
            _ => FieldValue::Null,
        }
    }
}

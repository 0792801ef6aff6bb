mod support;

use support::{open_library_db, Author, Book, Chapter, Passport};
use rusqlite::Connection;
use tabula_core::{RepoError, Repository};

fn seed_author(conn: &Connection, id: i64, name: &str, passport: Option<Passport>) -> Author {
    if let Some(passport) = &passport {
        Repository::<Passport>::new(conn)
            .unwrap()
            .save(passport)
            .unwrap();
    }
    let author = Author {
        id,
        name: name.to_string(),
        passport,
    };
    Repository::<Author>::new(conn)
        .unwrap()
        .save(&author)
        .unwrap();
    author
}

fn seed_book(conn: &Connection, id: i64, title: &str, author: Author) -> Book {
    let book = Book {
        id,
        title: title.to_string(),
        author,
        chapters: Vec::new(),
    };
    Repository::<Book>::new(conn).unwrap().save(&book).unwrap();
    book
}

#[test]
fn many_to_one_relation_resolves_on_load() {
    let conn = open_library_db();
    let author = seed_author(&conn, 1, "Ursula", None);
    seed_book(&conn, 1, "Earthsea", author);

    let repo = Repository::<Book>::new(&conn).unwrap();
    let loaded = repo.find_by_id(1i64).unwrap().unwrap();
    assert_eq!(loaded.author.name, "Ursula");
}

#[test]
fn to_one_chain_resolves_through_nested_levels() {
    let conn = open_library_db();
    let passport = Passport {
        id: 10,
        code: "AA-10".to_string(),
    };
    let author = seed_author(&conn, 1, "Ursula", Some(passport));
    seed_book(&conn, 1, "Earthsea", author);

    let repo = Repository::<Book>::new(&conn).unwrap();
    let loaded = repo.find_by_id(1i64).unwrap().unwrap();
    let passport = loaded.author.passport.expect("passport should resolve");
    assert_eq!(passport.code, "AA-10");
}

#[test]
fn optional_one_to_one_relation_loads_as_none() {
    let conn = open_library_db();
    seed_author(&conn, 1, "Anon", None);

    let repo = Repository::<Author>::new(&conn).unwrap();
    let loaded = repo.find_by_id(1i64).unwrap().unwrap();
    assert_eq!(loaded.passport, None);
}

#[test]
fn one_to_many_children_load_for_the_root_entity() {
    let conn = open_library_db();
    let author = seed_author(&conn, 1, "Ursula", None);
    let book = seed_book(&conn, 1, "Earthsea", author);

    let chapters = Repository::<Chapter>::new(&conn).unwrap();
    for title in ["Warriors in the Mist", "The Shadow"] {
        chapters
            .save(&Chapter {
                id: None,
                title: Some(title.to_string()),
                book: book.clone(),
            })
            .unwrap();
    }

    let repo = Repository::<Book>::new(&conn).unwrap();
    let loaded = repo.find_by_id(1i64).unwrap().unwrap();
    assert_eq!(loaded.chapters.len(), 2);
    assert_eq!(
        loaded.chapters[0].title.as_deref(),
        Some("Warriors in the Mist")
    );

    // The back-reference resolves, but its own child collection stays
    // empty instead of recursing back into the parent.
    assert_eq!(loaded.chapters[0].book.id, 1);
    assert!(loaded.chapters[0].book.chapters.is_empty());
}

#[test]
fn auto_increment_keys_are_assigned_by_the_store() {
    let conn = open_library_db();
    let author = seed_author(&conn, 1, "Ursula", None);
    let book = seed_book(&conn, 1, "Earthsea", author);

    let chapters = Repository::<Chapter>::new(&conn).unwrap();
    for _ in 0..2 {
        chapters
            .save(&Chapter {
                id: None,
                title: None,
                book: book.clone(),
            })
            .unwrap();
    }

    let loaded = Repository::<Book>::new(&conn)
        .unwrap()
        .find_by_id(1i64)
        .unwrap()
        .unwrap();
    let ids: Vec<Option<i64>> = loaded.chapters.iter().map(|chapter| chapter.id).collect();
    assert_eq!(ids, vec![Some(1), Some(2)]);
}

#[test]
fn saving_against_an_unpersisted_relation_writes_nothing() {
    let conn = open_library_db();

    let repo = Repository::<Book>::new(&conn).unwrap();
    let err = repo
        .save(&Book {
            id: 1,
            title: "Orphaned".to_string(),
            author: Author {
                id: 999,
                name: "Nobody".to_string(),
                passport: None,
            },
            chapters: Vec::new(),
        })
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::RelatedObjectNotFound { entity: "Author", .. }
    ));

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM book;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn orphaned_foreign_key_on_read_is_reported() {
    let conn = open_library_db();

    // Plant a dangling reference behind the store's back.
    conn.execute_batch(
        "PRAGMA foreign_keys = OFF;
         INSERT INTO book (id, title, author_id) VALUES (1, 'Dangling', 999);
         PRAGMA foreign_keys = ON;",
    )
    .unwrap();

    let repo = Repository::<Book>::new(&conn).unwrap();
    let err = repo.find_by_id(1i64).unwrap_err();
    assert!(matches!(
        err,
        RepoError::RelatedObjectNotFound { entity: "Author", .. }
    ));
}

#[test]
fn duplicate_one_to_one_target_is_rejected_by_the_store() {
    let conn = open_library_db();
    let passport = Passport {
        id: 10,
        code: "AA-10".to_string(),
    };
    seed_author(&conn, 1, "First", Some(passport.clone()));

    let repo = Repository::<Author>::new(&conn).unwrap();
    let err = repo
        .save(&Author {
            id: 2,
            name: "Second".to_string(),
            passport: Some(passport),
        })
        .unwrap_err();

    match err {
        RepoError::Db(db) => assert!(db.to_string().to_lowercase().contains("unique")),
        other => panic!("expected store error, got: {other}"),
    }
}

#[test]
fn deleting_a_referenced_parent_surfaces_the_store_error() {
    let conn = open_library_db();
    let author = seed_author(&conn, 1, "Ursula", None);
    seed_book(&conn, 1, "Earthsea", author);

    let repo = Repository::<Author>::new(&conn).unwrap();
    let err = repo.delete(1i64).unwrap_err();
    assert!(matches!(err, RepoError::Db(_)));

    // The parent row is still there.
    assert!(repo.find_by_id(1i64).unwrap().is_some());
}

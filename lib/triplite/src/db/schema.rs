//! DDL generation from the ontology.
//!
//! Every database (the main attachment and one per named graph) holds
//! one table per class with columns for its single-valued properties,
//! one two-column table per multi-valued property, and an FTS5 table
//! with one column per full-text indexed property. The `Resource` and
//! `Graph` bookkeeping tables exist in the main database only.

use crate::db::{quoted, DbInterface};
use crate::ontology::Ontology;
use std::fmt::Write;

/// Creates the main-database schema, idempotently.
pub(crate) fn create_main_schema(
    db: &DbInterface,
    ontology: &Ontology,
) -> Result<(), rusqlite::Error> {
    db.connection().execute_batch(
        "CREATE TABLE IF NOT EXISTS Resource (\
             ID INTEGER NOT NULL PRIMARY KEY, \
             Uri TEXT NOT NULL, \
             BlankNode INTEGER NOT NULL DEFAULT 0, \
             UNIQUE (Uri));\n\
         CREATE TABLE IF NOT EXISTS Graph (ID INTEGER NOT NULL PRIMARY KEY);",
    )?;
    create_graph_tables(db, ontology, "main")
}

/// Creates the per-graph tables inside the given database attachment.
pub(crate) fn create_graph_tables(
    db: &DbInterface,
    ontology: &Ontology,
    database: &str,
) -> Result<(), rusqlite::Error> {
    let mut ddl = String::new();
    let database = quoted(database);

    for class_id in ontology.classes() {
        let class = ontology.class(class_id);
        let mut sql = format!(
            "CREATE TABLE IF NOT EXISTS {database}.{} (ID INTEGER NOT NULL PRIMARY KEY",
            quoted(class.name())
        );
        for property_id in ontology.properties() {
            let property = ontology.property(property_id);
            if property.multiple_values() {
                continue;
            }
            let mirrored = property.domain_index_classes().contains(&class_id)
                && property.domain() != class_id;
            if property.domain() == class_id || mirrored {
                let _ = write!(
                    sql,
                    ", {} {}",
                    quoted(property.name()),
                    property.kind().column_type()
                );
            }
        }
        sql.push_str(");\n");
        ddl.push_str(&sql);
    }

    for property_id in ontology.properties() {
        let property = ontology.property(property_id);
        if !property.multiple_values() {
            continue;
        }
        let column = quoted(property.name());
        let _ = write!(
            ddl,
            "CREATE TABLE IF NOT EXISTS {database}.{} (\
                 ID INTEGER NOT NULL, \
                 {column} {} NOT NULL, \
                 UNIQUE (ID, {column}));\n",
            quoted(property.table_name()),
            property.kind().column_type()
        );
    }

    let fts_columns: Vec<String> = ontology
        .properties()
        .filter(|&p| ontology.property(p).fulltext_indexed())
        .map(|p| quoted(ontology.property(p).name()))
        .collect();
    if !fts_columns.is_empty() {
        let _ = write!(
            ddl,
            "CREATE VIRTUAL TABLE IF NOT EXISTS {database}.fts USING fts5({});\n",
            fts_columns.join(", ")
        );
    }

    db.connection().execute_batch(&ddl)
}

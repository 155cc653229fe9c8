//! Full-text index maintenance.
//!
//! The engine drives the index with a two-phase protocol: the old text of
//! every indexed property is deleted when a subject's first indexed
//! property is touched in a transaction, and the new text is written once
//! at flush time. Each subject owns at most one FTS row per database,
//! keyed by its resource id.

use crate::db::{quoted, DbInterface};
use rusqlite::types::Value as SqlValue;

/// Replaces the indexed text of `resource_id`. `properties` and `texts`
/// are aligned.
pub(crate) fn update_text(
    db: &DbInterface,
    database: &str,
    resource_id: i64,
    properties: &[&str],
    texts: &[String],
) -> Result<(), rusqlite::Error> {
    let columns: Vec<String> = properties.iter().map(|p| quoted(p)).collect();
    let placeholders = vec!["?"; properties.len() + 1].join(", ");
    let sql = format!(
        "INSERT OR REPLACE INTO {}.fts (rowid, {}) VALUES ({placeholders})",
        quoted(database),
        columns.join(", ")
    );
    let mut params = Vec::with_capacity(texts.len() + 1);
    params.push(SqlValue::Integer(resource_id));
    params.extend(texts.iter().map(|t| SqlValue::Text(t.clone())));
    db.prepare(&sql)?
        .execute(rusqlite::params_from_iter(params))?;
    Ok(())
}

/// Drops the indexed text of `resource_id`.
///
/// The old text per property is part of the interface contract (an index
/// kept outside the database would need it to locate postings); the
/// SQLite implementation can delete by rowid alone.
pub(crate) fn delete_text(
    db: &DbInterface,
    database: &str,
    resource_id: i64,
    _properties: &[&str],
    _texts: &[String],
) -> Result<(), rusqlite::Error> {
    delete_id(db, database, resource_id)
}

/// Drops every indexed text of `resource_id`.
pub(crate) fn delete_id(
    db: &DbInterface,
    database: &str,
    resource_id: i64,
) -> Result<(), rusqlite::Error> {
    db.prepare(&format!(
        "DELETE FROM {}.fts WHERE rowid = ?",
        quoted(database)
    ))?
    .execute([resource_id])?;
    Ok(())
}

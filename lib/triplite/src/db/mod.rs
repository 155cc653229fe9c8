//! The physical database behind the engine.
//!
//! [`DbInterface`] is a thin layer over a SQLite connection: cached
//! prepared statements, textual transaction control, a pre-transaction
//! free-space check, and one attached database per named graph. The
//! update engine only ever talks to the store through this module, the
//! [`schema`] DDL generator, and the [`fts`] helpers.

pub(crate) mod fts;
pub(crate) mod schema;

use crate::error::UpdateError;
use log::debug;
use rand::Rng;
use rusqlite::{CachedStatement, Connection, OpenFlags};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

/// SQLite page-cache size outside of update transactions.
pub(crate) const CACHE_SIZE_DEFAULT: i64 = 250;
/// SQLite page-cache size while an update transaction is open.
pub(crate) const CACHE_SIZE_UPDATE: i64 = 2000;

/// Updates are refused when the file system has less than this available.
const REQUIRED_FREE_SPACE: u64 = 2 * 1024 * 1024;

/// A connection to the backing store.
pub struct DbInterface {
    conn: Connection,
    path: Option<PathBuf>,
}

impl DbInterface {
    /// Opens a transient in-memory store. Named graphs attached to it are
    /// in-memory as well.
    pub fn open_in_memory() -> Result<Self, UpdateError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn, path: None })
    }

    /// Opens (or creates) a store at `path`. Named graphs live in
    /// sibling `<path>.<hash>.graph` files.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, UpdateError> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;
        // journal_mode reports the resulting mode back, so plain
        // pragma_update would choke on the returned row.
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        Ok(Self {
            conn,
            path: Some(path),
        })
    }

    /// The raw connection, for the query side living outside this crate.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub(crate) fn prepare(&self, sql: &str) -> Result<CachedStatement<'_>, rusqlite::Error> {
        self.conn.prepare_cached(sql)
    }

    pub(crate) fn start_transaction(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch("BEGIN")
    }

    pub(crate) fn end_transaction(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch("COMMIT")
    }

    pub(crate) fn rollback_transaction(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch("ROLLBACK")
    }

    pub(crate) fn set_cache_size(&self, pages: i64) -> Result<(), rusqlite::Error> {
        self.conn.pragma_update(None, "cache_size", pages)
    }

    /// Whether the file system backing the store has room for an update
    /// transaction. In-memory stores always do.
    pub(crate) fn has_enough_space(&self) -> bool {
        let Some(path) = &self.path else {
            return true;
        };
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        match fs2::available_space(dir) {
            Ok(available) => available >= REQUIRED_FREE_SPACE,
            // An unreadable mount point should not block updates.
            Err(e) => {
                debug!("Could not read available space of {}: {e}", dir.display());
                true
            }
        }
    }

    /// Attaches the database holding a named graph, creating it if
    /// needed. The attachment name is the graph URI itself, so flushed
    /// SQL can address `"<graph>"."<table>"` directly.
    pub(crate) fn attach_graph(&self, graph: &str) -> Result<(), rusqlite::Error> {
        let target = match &self.path {
            Some(path) => {
                let mut hasher = DefaultHasher::new();
                graph.hash(&mut hasher);
                let mut file = path.as_os_str().to_owned();
                file.push(format!(".{:016x}.graph", hasher.finish()));
                PathBuf::from(file).to_string_lossy().into_owned()
            }
            None => ":memory:".to_owned(),
        };
        let mut stmt = self
            .conn
            .prepare(&format!("ATTACH DATABASE ? AS {}", quoted(graph)))?;
        stmt.execute([target])?;
        Ok(())
    }

    pub(crate) fn detach_graph(&self, graph: &str) -> Result<(), rusqlite::Error> {
        self.conn
            .execute_batch(&format!("DETACH DATABASE {}", quoted(graph)))
    }

    /// Mints a blank-node URI that is not present in the `Resource`
    /// table.
    pub(crate) fn unused_bnode_uri(&self) -> Result<String, rusqlite::Error> {
        let mut stmt = self.prepare("SELECT ID FROM Resource WHERE Uri = ?")?;
        loop {
            let candidate = format!("urn:bnode:{:032x}", rand::thread_rng().gen::<u128>());
            let exists = stmt.query([&candidate])?.next()?.is_some();
            if !exists {
                return Ok(candidate);
            }
        }
    }
}

/// Quotes an SQL identifier (table, column or attachment name).
pub(crate) fn quoted(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_quoted() {
        assert_eq!(quoted("nmm:Photo"), "\"nmm:Photo\"");
        assert_eq!(quoted("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn bnode_uris_are_fresh() {
        let db = DbInterface::open_in_memory().unwrap();
        db.connection()
            .execute_batch("CREATE TABLE Resource (ID INTEGER PRIMARY KEY, Uri TEXT, BlankNode INTEGER)")
            .unwrap();
        let a = db.unused_bnode_uri().unwrap();
        let b = db.unused_bnode_uri().unwrap();
        assert!(a.starts_with("urn:bnode:"));
        assert_ne!(a, b);
    }
}

//! The per-transaction update buffer and its flusher.
//!
//! Mutations are staged as a three-level mapping `graph → subject →
//! resource draft`. A draft keeps the transaction's view of the
//! subject's values per property (loaded lazily from the store) and a
//! per-table write plan that the flusher turns into the minimum set of
//! `INSERT`/`UPDATE`/`DELETE` statements. Drafts never point back at
//! their graph; the active draft is addressed by graph index and
//! subject key instead.

use crate::db::{self, fts, DbInterface};
use crate::error::UpdateError;
use crate::ontology::{ClassId, Ontology, PropertyId};
use crate::value::{Value, ValueSet};
use rusqlite::ToSql;
use std::collections::HashMap;

/// How many drafted resources the buffer may hold before it is flushed.
pub(crate) const FLUSH_THRESHOLD: usize = 1000;

/// One staged column change. `value` of `None` together with
/// `delete_all_values` wipes the whole column for the subject.
#[derive(Debug)]
pub(crate) struct PropertyChange {
    pub name: String,
    pub value: Option<Value>,
    pub delete_all_values: bool,
}

/// The write plan of one physical table for one subject.
#[derive(Debug)]
pub(crate) struct TableBuffer {
    pub multiple_values: bool,
    pub insert: bool,
    pub delete_row: bool,
    pub delete_value: bool,
    /// The resource id of the class owning the table, for `rdf:type` row
    /// removal on class deletes.
    pub class_id: Option<i64>,
    pub properties: Vec<PropertyChange>,
}

/// The staging area of one `(graph, subject)` pair.
#[derive(Debug)]
pub(crate) struct ResourceBuffer {
    pub subject: String,
    pub id: i64,
    /// The subject has no row in `rdfs:Resource` yet.
    pub create: bool,
    /// Set on the first mutation, together with the `nrl:modified` stamp.
    pub modified: bool,
    /// A full-text indexed property of the subject was touched.
    pub fts_updated: bool,
    pub types: Vec<ClassId>,
    /// The transaction's current value set per touched property.
    pub predicates: HashMap<PropertyId, ValueSet>,
    pub tables: HashMap<String, TableBuffer>,
}

impl ResourceBuffer {
    pub(crate) fn ensure_table(&mut self, name: &str, multiple_values: bool) -> &mut TableBuffer {
        self.tables
            .entry(name.to_owned())
            .or_insert_with(|| TableBuffer {
                multiple_values,
                insert: multiple_values,
                delete_row: false,
                delete_value: false,
                class_id: None,
                properties: Vec::new(),
            })
    }
}

/// All drafts of one graph.
#[derive(Debug)]
pub(crate) struct GraphBuffer {
    /// `None` is the default graph, stored in the "main" database.
    pub name: Option<String>,
    pub id: i64,
    pub resources: HashMap<String, ResourceBuffer>,
}

impl GraphBuffer {
    pub(crate) fn database(&self) -> &str {
        self.name.as_deref().unwrap_or("main")
    }
}

/// The whole per-transaction staging state.
#[derive(Debug, Default)]
pub(crate) struct UpdateBuffer {
    /// URI → resource id, monotone within a transaction.
    pub resource_cache: HashMap<String, i64>,
    pub graphs: Vec<GraphBuffer>,
    pub fts_ever_updated: bool,
    current: Option<(usize, String)>,
}

impl UpdateBuffer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn is_current(&self, graph: Option<&str>, subject: &str) -> bool {
        self.current.as_ref().is_some_and(|(index, current)| {
            self.graphs[*index].name.as_deref() == graph && current.as_str() == subject
        })
    }

    pub(crate) fn set_current(&mut self, graph_index: usize, subject: String) {
        self.current = Some((graph_index, subject));
    }

    pub(crate) fn reset_current(&mut self) {
        self.current = None;
    }

    /// The active draft. Every mutation entry point selects one first.
    pub(crate) fn current(&self) -> &ResourceBuffer {
        let (index, subject) = self.current.as_ref().expect("no resource buffer selected");
        &self.graphs[*index].resources[subject]
    }

    pub(crate) fn current_mut(&mut self) -> &mut ResourceBuffer {
        let (index, subject) = self.current.as_ref().expect("no resource buffer selected");
        self.graphs[*index]
            .resources
            .get_mut(subject)
            .expect("selected resource buffer disappeared")
    }

    pub(crate) fn current_graph(&self) -> &GraphBuffer {
        let (index, _) = self.current.as_ref().expect("no resource buffer selected");
        &self.graphs[*index]
    }

    pub(crate) fn graph_index(&self, name: Option<&str>) -> Option<usize> {
        self.graphs
            .iter()
            .position(|g| g.name.as_deref() == name)
    }

    pub(crate) fn resource_count(&self) -> usize {
        self.graphs.iter().map(|g| g.resources.len()).sum()
    }

    /// Drops the drafts but keeps the resource cache; used after a flush.
    pub(crate) fn take_graphs(&mut self) -> Vec<GraphBuffer> {
        self.current = None;
        std::mem::take(&mut self.graphs)
    }

    /// Clears everything; used on commit and rollback.
    pub(crate) fn clear(&mut self) {
        self.graphs.clear();
        self.resource_cache.clear();
        self.current = None;
        self.fts_ever_updated = false;
    }
}

/// Per-flush constants shared by every emitted row.
pub(crate) struct FlushContext<'a> {
    pub db: &'a DbInterface,
    pub ontology: &'a Ontology,
    /// Wall time captured at `begin`, stamped into `nrl:added`.
    pub resource_time: i64,
    /// Stamped into `nrl:modified` of created rows.
    pub modseq: i64,
}

/// Emits the row-level statements for one draft.
pub(crate) fn flush_resource(
    ctx: &FlushContext<'_>,
    graph: &GraphBuffer,
    resource: &ResourceBuffer,
) -> Result<(), UpdateError> {
    let database = db::quoted(graph.database());

    for (table_name, table) in &resource.tables {
        if table.multiple_values {
            flush_multi_valued(ctx, &database, table_name, table, resource)?;
        } else if table.delete_row {
            flush_row_delete(ctx, &database, table_name, table, resource)?;
        } else {
            flush_single_valued(ctx, &database, table_name, table, resource)?;
        }
    }

    if resource.fts_updated {
        flush_fts(ctx, graph, resource)?;
    }
    Ok(())
}

fn flush_multi_valued(
    ctx: &FlushContext<'_>,
    database: &str,
    table_name: &str,
    table: &TableBuffer,
    resource: &ResourceBuffer,
) -> Result<(), UpdateError> {
    let table_ident = db::quoted(table_name);
    for change in &table.properties {
        let column = db::quoted(&change.name);
        if table.delete_value && change.delete_all_values {
            ctx.db
                .prepare(&format!(
                    "DELETE FROM {database}.{table_ident} WHERE ID = ?"
                ))?
                .execute([resource.id])?;
        } else if table.delete_value {
            ctx.db
                .prepare(&format!(
                    "DELETE FROM {database}.{table_ident} WHERE ID = ? AND {column} = ?"
                ))?
                .execute(rusqlite::params![resource.id, change.value])?;
        } else {
            ctx.db
                .prepare(&format!(
                    "INSERT OR IGNORE INTO {database}.{table_ident} (ID, {column}) VALUES (?, ?)"
                ))?
                .execute(rusqlite::params![resource.id, change.value])?;
        }
    }
    Ok(())
}

/// A class removal: drop the `rdf:type` row, then the class-table row.
fn flush_row_delete(
    ctx: &FlushContext<'_>,
    database: &str,
    table_name: &str,
    table: &TableBuffer,
    resource: &ResourceBuffer,
) -> Result<(), UpdateError> {
    ctx.db
        .prepare(&format!(
            "DELETE FROM {database}.\"rdfs:Resource_rdf:type\" WHERE ID = ? AND \"rdf:type\" = ?"
        ))?
        .execute(rusqlite::params![resource.id, table.class_id])?;
    ctx.db
        .prepare(&format!(
            "DELETE FROM {database}.{} WHERE ID = ?",
            db::quoted(table_name)
        ))?
        .execute([resource.id])?;
    Ok(())
}

fn flush_single_valued(
    ctx: &FlushContext<'_>,
    database: &str,
    table_name: &str,
    table: &TableBuffer,
    resource: &ResourceBuffer,
) -> Result<(), UpdateError> {
    let is_resource_table = table_name == "rdfs:Resource";
    let mut sql;
    if table.insert {
        sql = format!("INSERT INTO {database}.{} (ID", db::quoted(table_name));
        let mut values_sql = "VALUES (?".to_owned();
        if is_resource_table {
            sql.push_str(", \"nrl:added\", \"nrl:modified\"");
            values_sql.push_str(", ?, ?");
        }
        for change in &table.properties {
            sql.push_str(&format!(", {}", db::quoted(&change.name)));
            values_sql.push_str(", ?");
        }
        sql.push_str(&format!(") {values_sql})"));
    } else {
        sql = format!("UPDATE {database}.{} SET ", db::quoted(table_name));
        for (i, change) in table.properties.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str(&format!("{} = ?", db::quoted(&change.name)));
        }
        sql.push_str(" WHERE ID = ?");
    }

    let mut params: Vec<&dyn ToSql> = Vec::with_capacity(table.properties.len() + 3);
    if table.insert {
        params.push(&resource.id);
        if is_resource_table {
            params.push(&ctx.resource_time);
            params.push(&ctx.modseq);
        }
    }
    for change in &table.properties {
        if table.delete_value {
            // Deleting a single-valued property just nulls the column.
            params.push(&rusqlite::types::Null);
        } else {
            params.push(
                change
                    .value
                    .as_ref()
                    .map_or(&rusqlite::types::Null as &dyn ToSql, |v| v),
            );
        }
    }
    if !table.insert {
        params.push(&resource.id);
    }

    ctx.db.prepare(&sql)?.execute(&params[..])?;
    Ok(())
}

/// Rebuilds the subject's full-text row from the buffered value sets.
fn flush_fts(
    ctx: &FlushContext<'_>,
    graph: &GraphBuffer,
    resource: &ResourceBuffer,
) -> Result<(), UpdateError> {
    let mut properties = Vec::new();
    let mut texts = Vec::new();
    for (&property_id, values) in &resource.predicates {
        let property = ctx.ontology.property(property_id);
        if !property.fulltext_indexed() {
            continue;
        }
        let mut text = String::new();
        for value in values {
            if let Some(t) = value.fts_text() {
                text.push_str(t);
                text.push(' ');
            }
        }
        properties.push(property.name());
        texts.push(text);
    }
    if !properties.is_empty() {
        fts::update_text(ctx.db, graph.database(), resource.id, &properties, &texts)?;
    }
    Ok(())
}

//! The transactional update engine.
//!
//! [`Writer`] owns the store connection, the resource-id allocator, the
//! per-transaction update buffer, and the observer lists. Statements are
//! decomposed against the ontology into buffered row changes
//! (subclass closure for `rdf:type`, super-property fanout, domain-index
//! mirroring, single-value conflict detection) and flushed as SQL when
//! the buffer grows past its threshold, on `UPDATE` boundaries, and at
//! commit.
//!
//! One writer means one logical transaction at a time; beginning a
//! second one before commit or rollback is a caller bug and panics.

use crate::buffer::{FlushContext, GraphBuffer, ResourceBuffer, UpdateBuffer, FLUSH_THRESHOLD};
use crate::db::{self, fts, schema, DbInterface};
use crate::error::{LoaderError, UpdateError};
use crate::ontology::{ClassId, Ontology, PropertyId, PropertyKind};
use crate::sparql;
use crate::value::{self, make_object_bytes, Value};
use crate::vocab::{rdf, rdfs};
use log::{debug, warn};
use oxrdf::{NamedOrBlankNode, Term};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Resource ids up to this bound are reserved for ontology entities.
pub const ONTOLOGY_MAX_ID: i64 = 100_000;

/// A statement change reported to insert/delete observers.
#[derive(Debug, Clone)]
pub struct StatementEvent {
    /// 0 for the default graph.
    pub graph_id: i64,
    pub graph: Option<String>,
    pub subject_id: i64,
    pub subject: String,
    pub predicate_id: i64,
    /// 0 when the object is a literal.
    pub object_id: i64,
    pub object: String,
    /// IRIs of the subject's classes at the time of the change.
    pub types: Vec<String>,
}

/// Token returned by callback registration, used for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

type StatementCallback = Box<dyn Fn(&StatementEvent)>;
type TransactionCallback = Box<dyn Fn()>;

struct PropertyInfo {
    table: String,
    field: String,
    kind: PropertyKind,
    multiple: bool,
}

/// The update engine over one store connection.
pub struct Writer {
    db: DbInterface,
    ontology: Ontology,
    buffer: UpdateBuffer,
    in_transaction: bool,
    in_ontology_transaction: bool,
    /// Something in this transaction actually changed stored data.
    has_persistent: bool,
    /// Wall time captured at `begin`, stamped into `nrl:added`.
    resource_time: i64,
    /// 0 until first seeded from the store.
    transaction_modseq: i64,
    max_service_id: i64,
    max_ontology_id: i64,
    known_graphs: HashMap<String, i64>,
    /// Graphs created inside the open transaction.
    pending_graphs: Vec<String>,
    insert_callbacks: Vec<(CallbackId, StatementCallback)>,
    delete_callbacks: Vec<(CallbackId, StatementCallback)>,
    commit_callbacks: Vec<(CallbackId, TransactionCallback)>,
    rollback_callbacks: Vec<(CallbackId, TransactionCallback)>,
    next_callback_id: u64,
}

impl Writer {
    /// Opens the engine: creates the physical schema for `ontology` if
    /// needed and installs the ontology itself as resources, inside an
    /// ontology transaction. Reopening an existing store with the same
    /// ontology is a no-op.
    pub fn new(db: DbInterface, ontology: Ontology) -> Result<Self, UpdateError> {
        let mut writer = Self {
            db,
            ontology,
            buffer: UpdateBuffer::new(),
            in_transaction: false,
            in_ontology_transaction: false,
            has_persistent: false,
            resource_time: 0,
            transaction_modseq: 0,
            max_service_id: 0,
            max_ontology_id: 0,
            known_graphs: HashMap::new(),
            pending_graphs: Vec::new(),
            insert_callbacks: Vec::new(),
            delete_callbacks: Vec::new(),
            commit_callbacks: Vec::new(),
            rollback_callbacks: Vec::new(),
            next_callback_id: 0,
        };
        schema::create_main_schema(&writer.db, &writer.ontology)?;
        writer.load_known_graphs()?;
        writer.install_ontology()?;
        Ok(writer)
    }

    pub fn ontology(&self) -> &Ontology {
        &self.ontology
    }

    /// The underlying store, shared with the (out of crate) query side.
    pub fn database(&self) -> &DbInterface {
        &self.db
    }

    // ------------------------------------------------------------------
    // Transaction lifecycle

    /// Starts an update transaction.
    pub fn begin(&mut self) -> Result<(), UpdateError> {
        assert!(!self.in_transaction, "transaction already open");
        let result = self.begin_inner();
        if result.is_err() {
            self.in_ontology_transaction = false;
        }
        result
    }

    fn begin_inner(&mut self) -> Result<(), UpdateError> {
        if !self.db.has_enough_space() {
            return Err(UpdateError::NoSpace);
        }
        self.resource_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        self.has_persistent = false;
        self.buffer.reset_current();
        self.db.set_cache_size(db::CACHE_SIZE_UPDATE)?;
        self.db.start_transaction()?;
        self.in_transaction = true;
        Ok(())
    }

    /// Starts a transaction that writes ontology entities: ids come from
    /// the ontology pool and `nrl:modified` is pinned to 1.
    pub fn begin_ontology(&mut self) -> Result<(), UpdateError> {
        self.in_ontology_transaction = true;
        self.begin()
    }

    /// Flushes the buffer and commits. Any error on the way rolls the
    /// transaction back before being returned.
    pub fn commit(&mut self) -> Result<(), UpdateError> {
        assert!(self.in_transaction, "no transaction to commit");
        if let Err(e) = self.flush_buffer() {
            self.rollback();
            return Err(e);
        }
        if let Err(e) = self.db.end_transaction() {
            self.rollback();
            return Err(e.into());
        }
        if self.has_persistent && !self.in_ontology_transaction {
            match self.transaction_modseq() {
                Ok(_) => self.transaction_modseq += 1,
                Err(e) => warn!("Could not advance modseq: {e}"),
            }
        }
        self.resource_time = 0;
        self.in_transaction = false;
        self.in_ontology_transaction = false;
        self.pending_graphs.clear();
        if let Err(e) = self.db.set_cache_size(db::CACHE_SIZE_DEFAULT) {
            warn!("Could not restore cache size: {e}");
        }
        self.buffer.clear();
        for (_, callback) in &self.commit_callbacks {
            callback();
        }
        Ok(())
    }

    /// Drops all buffered changes and rolls the transaction back.
    /// Errors on this path are logged, never propagated.
    pub fn rollback(&mut self) {
        assert!(self.in_transaction, "no transaction to roll back");
        self.in_transaction = false;
        self.in_ontology_transaction = false;
        self.buffer.clear();
        if let Err(e) = self.db.rollback_transaction() {
            warn!("Transaction rollback failed: {e}");
        }
        for graph in std::mem::take(&mut self.pending_graphs) {
            self.known_graphs.remove(&graph);
            if let Err(e) = self.db.detach_graph(&graph) {
                warn!("Could not detach graph '{graph}': {e}");
            }
        }
        if let Err(e) = self.db.set_cache_size(db::CACHE_SIZE_DEFAULT) {
            warn!("Could not restore cache size: {e}");
        }
        for (_, callback) in &self.rollback_callbacks {
            callback();
        }
    }

    /// The modseq stamped into `nrl:modified` by this transaction.
    fn transaction_modseq(&mut self) -> Result<i64, UpdateError> {
        if self.transaction_modseq == 0 {
            let max: Option<i64> = self
                .db
                .prepare("SELECT MAX(\"nrl:modified\") FROM \"rdfs:Resource\"")?
                .query_row([], |row| row.get(0))?;
            self.transaction_modseq = max.unwrap_or(0) + 1;
        }
        if self.in_ontology_transaction {
            return Ok(1);
        }
        Ok(self.transaction_modseq)
    }

    // ------------------------------------------------------------------
    // Resource ids

    fn new_resource_id(&mut self) -> Result<i64, UpdateError> {
        if self.in_ontology_transaction {
            if self.max_ontology_id == 0 {
                let max: Option<i64> = self
                    .db
                    .prepare("SELECT MAX(ID) FROM Resource WHERE ID <= ?")?
                    .query_row([ONTOLOGY_MAX_ID], |row| row.get(0))?;
                self.max_ontology_id = max.unwrap_or(0);
            }
            self.max_ontology_id += 1;
            Ok(self.max_ontology_id)
        } else {
            if self.max_service_id == 0 {
                let max: Option<i64> = self
                    .db
                    .prepare("SELECT MAX(ID) FROM Resource")?
                    .query_row([], |row| row.get(0))?;
                self.max_service_id = max.unwrap_or(0).max(ONTOLOGY_MAX_ID);
            }
            self.max_service_id += 1;
            Ok(self.max_service_id)
        }
    }

    /// The id of `uri`, or 0 when the resource does not exist.
    fn query_resource_id(&mut self, uri: &str) -> Result<i64, UpdateError> {
        if let Some(&id) = self.buffer.resource_cache.get(uri) {
            return Ok(id);
        }
        let mut stmt = self.db.prepare("SELECT ID FROM Resource WHERE Uri = ?")?;
        let id = match stmt.query([uri])?.next()? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        drop(stmt);
        if id != 0 {
            self.buffer.resource_cache.insert(uri.to_owned(), id);
        }
        Ok(id)
    }

    /// The id of `uri`, allocating and inserting a `Resource` row if it
    /// does not exist yet.
    fn ensure_resource_id(&mut self, uri: &str) -> Result<(i64, bool), UpdateError> {
        let id = self.query_resource_id(uri)?;
        if id != 0 {
            return Ok((id, false));
        }
        let id = self.new_resource_id()?;
        let blank = uri.starts_with("_:") || uri.starts_with("urn:bnode:");
        self.db
            .prepare("INSERT INTO Resource (ID, Uri, BlankNode) VALUES (?, ?, ?)")?
            .execute(rusqlite::params![id, uri, blank])?;
        self.buffer.resource_cache.insert(uri.to_owned(), id);
        Ok((id, true))
    }

    fn query_resource_uri(&self, id: i64) -> Result<Option<String>, UpdateError> {
        let mut stmt = self.db.prepare("SELECT Uri FROM Resource WHERE ID = ?")?;
        let uri = match stmt.query([id])?.next()? {
            Some(row) => Some(row.get(0)?),
            None => None,
        };
        Ok(uri)
    }

    /// Mints a blank-node URI unused by the store.
    pub(crate) fn generate_bnode(&mut self) -> Result<String, UpdateError> {
        Ok(self.db.unused_bnode_uri()?)
    }

    // ------------------------------------------------------------------
    // Graphs

    fn load_known_graphs(&mut self) -> Result<(), UpdateError> {
        let mut loaded = Vec::new();
        {
            let mut stmt = self.db.prepare(
                "SELECT Resource.Uri, Graph.ID FROM Graph \
                 INNER JOIN Resource ON Resource.ID = Graph.ID",
            )?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                loaded.push((row.get::<_, String>(0)?, row.get::<_, i64>(1)?));
            }
        }
        for (uri, id) in loaded {
            self.db.attach_graph(&uri)?;
            schema::create_graph_tables(&self.db, &self.ontology, &uri)?;
            self.known_graphs.insert(uri, id);
        }
        Ok(())
    }

    /// Makes sure the named graph exists: a `Graph` row, an attached
    /// database, and its schema. Returns the graph id.
    pub fn ensure_graph(&mut self, uri: &str) -> Result<i64, UpdateError> {
        if let Some(&id) = self.known_graphs.get(uri) {
            return Ok(id);
        }
        let (id, _) = self.ensure_resource_id(uri)?;
        self.db.attach_graph(uri)?;
        schema::create_graph_tables(&self.db, &self.ontology, uri)?;
        self.db
            .prepare("INSERT OR IGNORE INTO Graph (ID) VALUES (?)")?
            .execute([id])?;
        self.known_graphs.insert(uri.to_owned(), id);
        if self.in_transaction {
            self.pending_graphs.push(uri.to_owned());
        }
        Ok(id)
    }

    /// Removes the named graph's `Graph` row and detaches its database.
    pub fn delete_graph(&mut self, uri: &str) -> Result<(), UpdateError> {
        if !self.known_graphs.contains_key(uri) {
            return Err(UpdateError::UnknownGraph(uri.to_owned()));
        }
        let id = self.query_resource_id(uri)?;
        self.db
            .prepare("DELETE FROM Graph WHERE ID = ?")?
            .execute([id])?;
        self.known_graphs.remove(uri);
        if let Err(e) = self.db.detach_graph(uri) {
            warn!("Could not detach graph '{uri}': {e}");
        }
        Ok(())
    }

    fn ensure_graph_buffer(&mut self, graph: Option<&str>) -> Result<usize, UpdateError> {
        if let Some(index) = self.buffer.graph_index(graph) {
            return Ok(index);
        }
        let id = match graph {
            Some(name) => self.ensure_graph(name)?,
            None => 0,
        };
        self.buffer.graphs.push(GraphBuffer {
            name: graph.map(ToOwned::to_owned),
            id,
            resources: HashMap::new(),
        });
        Ok(self.buffer.graphs.len() - 1)
    }

    // ------------------------------------------------------------------
    // Draft selection

    fn query_rdf_types(&mut self, database: &str, id: i64) -> Result<Vec<ClassId>, UpdateError> {
        let sql = format!(
            "SELECT \"rdf:type\" FROM {}.\"rdfs:Resource_rdf:type\" WHERE ID = ?",
            db::quoted(database)
        );
        let mut class_ids = Vec::new();
        let mut stmt = self.db.prepare(&sql)?;
        let mut rows = stmt.query([id])?;
        while let Some(row) = rows.next()? {
            let class_resource: i64 = row.get(0)?;
            match self.ontology.class_by_resource_id(class_resource) {
                Some(class) => class_ids.push(class),
                None => warn!("Resource {id} has unknown class {class_resource}"),
            }
        }
        Ok(class_ids)
    }

    /// Makes `(graph, subject)` the active draft, creating it if needed.
    /// Passing a positive `subject_id` skips the id lookup.
    fn resource_buffer_switch(
        &mut self,
        graph: Option<&str>,
        subject: &str,
        subject_id: i64,
    ) -> Result<(), UpdateError> {
        if self.buffer.is_current(graph, subject) {
            return Ok(());
        }
        // Large inserts with thousands of subjects would otherwise pile
        // up in memory.
        self.might_flush()?;
        self.buffer.reset_current();
        let graph_index = self.ensure_graph_buffer(graph)?;
        if !self.buffer.graphs[graph_index]
            .resources
            .contains_key(subject)
        {
            let (id, create) = if subject_id > 0 {
                (subject_id, false)
            } else {
                self.ensure_resource_id(subject)?
            };
            let types = if create {
                Vec::new()
            } else {
                let database = self.buffer.graphs[graph_index].database().to_owned();
                self.query_rdf_types(&database, id)?
            };
            self.buffer.graphs[graph_index].resources.insert(
                subject.to_owned(),
                ResourceBuffer {
                    subject: subject.to_owned(),
                    id,
                    create,
                    modified: false,
                    fts_updated: false,
                    types,
                    predicates: HashMap::new(),
                    tables: HashMap::new(),
                },
            );
        }
        self.buffer.set_current(graph_index, subject.to_owned());
        Ok(())
    }

    // ------------------------------------------------------------------
    // Buffer flushing

    /// Flushes the buffer once it holds [`FLUSH_THRESHOLD`] drafts.
    pub fn might_flush(&mut self) -> Result<(), UpdateError> {
        if self.buffer.resource_count() >= FLUSH_THRESHOLD {
            self.flush_buffer()?;
        }
        Ok(())
    }

    /// Emits the staged row changes of every draft. The drafts are
    /// consumed even if a statement fails; the caller is expected to
    /// roll back in that case.
    pub(crate) fn flush_buffer(&mut self) -> Result<(), UpdateError> {
        if self.buffer.graphs.is_empty() {
            return Ok(());
        }
        let modseq = self.transaction_modseq()?;
        let graphs = self.buffer.take_graphs();
        debug!(
            "Flushing {} buffered resource(s)",
            graphs.iter().map(|g| g.resources.len()).sum::<usize>()
        );
        let ctx = FlushContext {
            db: &self.db,
            ontology: &self.ontology,
            resource_time: self.resource_time,
            modseq,
        };
        for graph in &graphs {
            for resource in graph.resources.values() {
                crate::buffer::flush_resource(&ctx, graph, resource)?;
                if resource.fts_updated {
                    self.buffer.fts_ever_updated = true;
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Write caching

    fn property_info(&self, property: PropertyId) -> PropertyInfo {
        let property = self.ontology.property(property);
        PropertyInfo {
            table: property.table_name().to_owned(),
            field: property.name().to_owned(),
            kind: property.kind(),
            multiple: property.multiple_values(),
        }
    }

    /// Creates the table plan, stamping `nrl:modified` on the draft's
    /// first mutation.
    fn ensure_table(&mut self, table: &str, multiple_values: bool) -> Result<(), UpdateError> {
        if !self.buffer.current().modified {
            self.buffer.current_mut().modified = true;
            let modseq = self.transaction_modseq()?;
            self.cache_insert_value(
                "rdfs:Resource",
                "nrl:modified",
                Value::Integer(modseq),
                false,
            )?;
        }
        self.buffer.current_mut().ensure_table(table, multiple_values);
        Ok(())
    }

    fn cache_insert_value(
        &mut self,
        table: &str,
        field: &str,
        value: Value,
        multiple_values: bool,
    ) -> Result<(), UpdateError> {
        self.ensure_table(table, multiple_values)?;
        self.buffer
            .current_mut()
            .ensure_table(table, multiple_values)
            .properties
            .push(crate::buffer::PropertyChange {
                name: field.to_owned(),
                value: Some(value),
                delete_all_values: false,
            });
        Ok(())
    }

    fn cache_delete_value(
        &mut self,
        table: &str,
        field: &str,
        value: Value,
        multiple_values: bool,
    ) -> Result<(), UpdateError> {
        self.ensure_table(table, multiple_values)?;
        let table = self.buffer.current_mut().ensure_table(table, multiple_values);
        table.delete_value = true;
        table.properties.push(crate::buffer::PropertyChange {
            name: field.to_owned(),
            value: Some(value),
            delete_all_values: false,
        });
        Ok(())
    }

    /// Stages "wipe this column for the subject"; multi-valued
    /// properties only.
    fn cache_delete_all_values(&mut self, table: &str, field: &str) -> Result<(), UpdateError> {
        self.ensure_table(table, true)?;
        let table = self.buffer.current_mut().ensure_table(table, true);
        table.delete_value = true;
        table.properties.push(crate::buffer::PropertyChange {
            name: field.to_owned(),
            value: None,
            delete_all_values: true,
        });
        Ok(())
    }

    fn cache_insert_row(&mut self, table: &str, class_id: i64) -> Result<(), UpdateError> {
        self.ensure_table(table, false)?;
        let table = self.buffer.current_mut().ensure_table(table, false);
        table.class_id = Some(class_id);
        table.insert = true;
        Ok(())
    }

    fn cache_delete_row(&mut self, table: &str, class_id: i64) -> Result<(), UpdateError> {
        self.ensure_table(table, false)?;
        let table = self.buffer.current_mut().ensure_table(table, false);
        table.class_id = Some(class_id);
        table.delete_row = true;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Old values

    fn in_property_domain(&self, property: PropertyId) -> bool {
        let domain = self.ontology.property(property).domain();
        self.buffer.current().types.contains(&domain)
    }

    /// Loads the stored values of `property` into the draft, unless
    /// already there.
    fn load_property_values(&mut self, property: PropertyId) -> Result<(), UpdateError> {
        if self.buffer.current().predicates.contains_key(&property) {
            return Ok(());
        }
        let prop = self.ontology.property(property);
        let kind = prop.kind();
        let sql = format!(
            "SELECT {} FROM {}.{} WHERE ID = ?",
            db::quoted(prop.name()),
            db::quoted(self.buffer.current_graph().database()),
            db::quoted(prop.table_name())
        );
        let (create, id) = {
            let resource = self.buffer.current();
            (resource.create, resource.id)
        };
        let mut values = crate::value::ValueSet::new();
        if !create {
            let mut stmt = self.db.prepare(&sql)?;
            let mut rows = stmt.query([id])?;
            while let Some(row) = rows.next()? {
                if let Some(value) = Value::from_column(kind, row.get_ref(0)?)? {
                    values.push_loaded(value);
                }
            }
        }
        self.buffer.current_mut().predicates.insert(property, values);
        Ok(())
    }

    /// Makes the transaction's value set of `property` available,
    /// checking the property domain and running the full-text
    /// first-touch protocol when needed.
    fn ensure_old_values(&mut self, property: PropertyId) -> Result<(), UpdateError> {
        if self.buffer.current().predicates.contains_key(&property) {
            return Ok(());
        }
        if !self.in_property_domain(property) {
            let resource = self.buffer.current();
            let prop = self.ontology.property(property);
            return Err(UpdateError::Constraint(format!(
                "Subject `{}' is not in domain `{}' of property `{}'",
                resource.subject,
                self.ontology.class(prop.domain()).name(),
                prop.name()
            )));
        }
        if self.ontology.property(property).fulltext_indexed() {
            let first_touch = {
                let resource = self.buffer.current();
                !resource.fts_updated && !resource.create
            };
            if first_touch {
                // First full-text property modified on this subject:
                // read every indexed property and drop the subject's old
                // index text in one go.
                let indexed: Vec<PropertyId> = self
                    .ontology
                    .properties()
                    .filter(|&p| self.ontology.property(p).fulltext_indexed())
                    .collect();
                let mut names = Vec::new();
                let mut texts = Vec::new();
                for p in indexed {
                    if !self.in_property_domain(p) {
                        continue;
                    }
                    self.load_property_values(p)?;
                    let mut text = String::new();
                    for (i, v) in self.buffer.current().predicates[&p].iter().enumerate() {
                        if let Some(t) = v.fts_text() {
                            if i != 0 {
                                text.push(',');
                            }
                            text.push_str(t);
                        }
                    }
                    names.push(self.ontology.property(p).name().to_owned());
                    texts.push(text);
                }
                let (database, id) = {
                    (
                        self.buffer.current_graph().database().to_owned(),
                        self.buffer.current().id,
                    )
                };
                let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
                fts::delete_text(&self.db, &database, id, &name_refs, &texts)?;
                self.buffer.fts_ever_updated = true;
            } else {
                self.load_property_values(property)?;
            }
            self.buffer.current_mut().fts_updated = true;
        } else {
            self.load_property_values(property)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Decomposition

    fn bytes_to_value(&mut self, kind: PropertyKind, object: &[u8]) -> Result<Value, UpdateError> {
        if kind == PropertyKind::Resource {
            let uri = value::object_text(object);
            let (id, _) = self.ensure_resource_id(&uri)?;
            Ok(Value::Resource(id))
        } else {
            Value::parse_literal(kind, object)
        }
    }

    /// Re-encodes a stored value into object bytes, for feeding deletes
    /// back through the statement path.
    fn value_to_bytes(&self, kind: PropertyKind, value: &Value) -> Result<Vec<u8>, UpdateError> {
        Ok(match (kind, value) {
            (PropertyKind::Boolean, Value::Integer(i)) => {
                make_object_bytes(if *i != 0 { "true" } else { "false" }, None)
            }
            (PropertyKind::Date, Value::Integer(seconds)) => {
                let iso = crate::value::DateTime::new(*seconds as f64, 0).to_iso8601()?;
                make_object_bytes(&iso[..10], None)
            }
            (_, Value::Resource(id)) => {
                let uri = self.query_resource_uri(*id)?.ok_or_else(|| {
                    UpdateError::InvalidLiteral(format!("Resource {id} has no URI"))
                })?;
                make_object_bytes(&uri, None)
            }
            (_, Value::LangString(bytes)) => bytes.clone(),
            (_, Value::DateTime(d)) => make_object_bytes(&d.to_iso8601()?, None),
            (_, value) => make_object_bytes(&value.to_string(), None),
        })
    }

    fn process_domain_indexes(
        &mut self,
        property: PropertyId,
        value: &Value,
        delete: bool,
    ) -> Result<(), UpdateError> {
        let classes: Vec<ClassId> = self
            .ontology
            .property(property)
            .domain_index_classes()
            .to_vec();
        if classes.is_empty() {
            return Ok(());
        }
        let field = self.ontology.property(property).name().to_owned();
        for class in classes {
            if !self.buffer.current().types.contains(&class) {
                continue;
            }
            let table = self.ontology.class(class).name().to_owned();
            if delete {
                self.cache_delete_value(&table, &field, value.clone(), false)?;
            } else {
                debug!("Propagating '{field}' value to domain index in '{table}'");
                self.cache_insert_value(&table, &field, value.clone(), false)?;
            }
        }
        Ok(())
    }

    /// Inserts one property value, with super-property fanout and
    /// single-value conflict detection.
    fn insert_metadata_decomposed(
        &mut self,
        property: PropertyId,
        object: &[u8],
    ) -> Result<bool, UpdateError> {
        self.ensure_old_values(property)?;

        let mut change = false;
        let supers: Vec<PropertyId> = self
            .ontology
            .property(property)
            .super_properties()
            .to_vec();
        for super_property in supers {
            self.ensure_old_values(super_property)?;
            let super_multi = self.ontology.property(super_property).multiple_values();
            let super_empty = self.buffer.current().predicates[&super_property].is_empty();
            // A single-valued super property only receives the value
            // when it has none yet.
            if super_multi || super_empty {
                change |= self.insert_metadata_decomposed(super_property, object)?;
            }
        }

        let info = self.property_info(property);
        let value = self.bytes_to_value(info.kind, object)?;

        let (added, overflow) = {
            let values = self
                .buffer
                .current_mut()
                .predicates
                .get_mut(&property)
                .expect("old values were just loaded");
            if values.add(value.clone()) {
                (true, !info.multiple && values.len() > 1)
            } else {
                (false, false)
            }
        };
        if !added {
            return Ok(change);
        }
        if overflow {
            let (old_value, new_value) = {
                let values = &self.buffer.current().predicates[&property];
                (
                    truncated(values.first()),
                    truncated(values.get(1)),
                )
            };
            return Err(UpdateError::Constraint(format!(
                "Unable to insert multiple values for subject `{}' and single valued property `{}' \
                 (old value: '{old_value}', new value: '{new_value}')",
                self.buffer.current().subject,
                info.field
            )));
        }

        self.cache_insert_value(&info.table, &info.field, value.clone(), info.multiple)?;
        if !info.multiple {
            self.process_domain_indexes(property, &value, false)?;
        }
        Ok(true)
    }

    /// Removes one property value and recurses into super properties.
    fn delete_metadata_decomposed(
        &mut self,
        property: PropertyId,
        object: &[u8],
    ) -> Result<bool, UpdateError> {
        let info = self.property_info(property);
        let value = self.bytes_to_value(info.kind, object)?;

        if let Err(e) = self.ensure_old_values(property) {
            // No need to error out when the statement cannot exist.
            debug!("Ignoring unreadable old values of '{}': {e}", info.field);
            return Ok(false);
        }
        let removed = self
            .buffer
            .current_mut()
            .predicates
            .get_mut(&property)
            .expect("old values were just loaded")
            .remove(&value);
        let mut change = false;
        if removed {
            self.cache_delete_value(&info.table, &info.field, value.clone(), info.multiple)?;
            if !info.multiple {
                self.process_domain_indexes(property, &value, true)?;
            }
            change = true;
        }

        let supers: Vec<PropertyId> = self
            .ontology
            .property(property)
            .super_properties()
            .to_vec();
        for super_property in supers {
            change |= self.delete_metadata_decomposed(super_property, object)?;
        }
        Ok(change)
    }

    /// Adds a class (and, first, its whole superclass chain) to the
    /// active draft.
    fn create_service_decomposed(&mut self, class: ClassId) -> Result<(), UpdateError> {
        let supers: Vec<ClassId> = self.ontology.class(class).super_classes().to_vec();
        for super_class in supers {
            self.create_service_decomposed(super_class)?;
        }
        if self.buffer.current().types.contains(&class) {
            // Duplicate statement.
            return Ok(());
        }
        self.buffer.current_mut().types.push(class);

        let (class_name, class_resource, class_iri) = {
            let c = self.ontology.class(class);
            (c.name().to_owned(), c.id(), c.iri().to_owned())
        };
        self.cache_insert_row(&class_name, class_resource)?;
        self.cache_insert_value(
            "rdfs:Resource_rdf:type",
            "rdf:type",
            Value::Resource(class_resource),
            true,
        )?;
        let rdf_type_id = self.ontology.property(self.ontology.rdf_type()).id();
        self.dispatch_insert_callbacks(rdf_type_id, class_resource, &class_iri);

        // A freshly gained class may mirror property values that already
        // exist on the subject.
        let domain_indexes: Vec<PropertyId> = self.ontology.class(class).domain_indexes().to_vec();
        for property in domain_indexes {
            let field = self.ontology.property(property).name().to_owned();
            if let Err(e) = self.ensure_old_values(property) {
                warn!("Couldn't get old values for property '{field}': {e}");
                continue;
            }
            let first = {
                let values = &self.buffer.current().predicates[&property];
                debug_assert!(values.len() <= 1, "domain index property with several values");
                values.first().cloned()
            };
            if let Some(value) = first {
                debug!("Propagating '{field}' value to domain index in '{class_name}'");
                self.cache_insert_value(&class_name, &field, value, false)?;
            }
        }
        Ok(())
    }

    fn has_fts_properties(&self) -> bool {
        self.ontology
            .properties()
            .any(|p| self.ontology.property(p).fulltext_indexed())
    }

    /// Removes a class from the active draft, including every property
    /// value in the class's domain and every subclass the subject has.
    /// `single_type` skips the subclass query on the whole-subject path.
    fn delete_resource_type_full(
        &mut self,
        class: ClassId,
        single_type: bool,
    ) -> Result<(), UpdateError> {
        let (database, resource_id) = {
            (
                self.buffer.current_graph().database().to_owned(),
                self.buffer.current().id,
            )
        };
        if !single_type {
            if class == self.ontology.rdfs_resource() && self.buffer.current().tables.is_empty() {
                // Deleting the whole subject: drop its full-text entry
                // and every type directly, skipping subclass queries.
                if self.has_fts_properties() {
                    fts::delete_id(&self.db, &database, resource_id)?;
                }
                loop {
                    let Some(&last) = self.buffer.current().types.last() else {
                        break;
                    };
                    self.delete_resource_type_full(last, true)?;
                }
                return Ok(());
            }

            if !self.buffer.current().types.contains(&class) {
                return Ok(());
            }

            // Subclasses the subject has must go before the class itself.
            let class_iri = self.ontology.class(class).iri().to_owned();
            let sql = format!(
                "SELECT type.\"rdf:type\" FROM {}.\"rdfs:Resource_rdf:type\" AS type \
                 INNER JOIN \"main\".\"rdfs:Class_rdfs:subClassOf\" AS subclass \
                 ON (type.\"rdf:type\" = subclass.ID) \
                 WHERE type.ID = ? AND subclass.\"rdfs:subClassOf\" = \
                 (SELECT ID FROM Resource WHERE Uri = ?)",
                db::quoted(&database)
            );
            let subclasses: Vec<ClassId> = {
                let mut stmt = self.db.prepare(&sql)?;
                let mut rows = stmt.query(rusqlite::params![resource_id, class_iri])?;
                let mut subclasses = Vec::new();
                while let Some(row) = rows.next()? {
                    if let Some(subclass) = self.ontology.class_by_resource_id(row.get(0)?) {
                        subclasses.push(subclass);
                    }
                }
                subclasses
            };
            for subclass in subclasses {
                self.delete_resource_type_full(subclass, false)?;
            }
        }

        // Delete all property values in this class's domain.
        let properties: Vec<PropertyId> = self
            .ontology
            .properties()
            .filter(|&p| self.ontology.property(p).domain() == class)
            .collect();
        for property in properties {
            let info = self.property_info(property);
            self.ensure_old_values(property)?;
            let values: Vec<Value> = self.buffer.current().predicates[&property]
                .iter()
                .cloned()
                .collect();
            for value in values.into_iter().rev() {
                self.buffer
                    .current_mut()
                    .predicates
                    .get_mut(&property)
                    .expect("old values were just loaded")
                    .remove(&value);
                self.cache_delete_value(&info.table, &info.field, value.clone(), info.multiple)?;
                if !info.multiple {
                    self.process_domain_indexes(property, &value, true)?;
                }
            }
        }

        let (class_name, class_resource, class_iri) = {
            let c = self.ontology.class(class);
            (c.name().to_owned(), c.id(), c.iri().to_owned())
        };
        self.cache_delete_row(&class_name, class_resource)?;
        let rdf_type_id = self.ontology.property(self.ontology.rdf_type()).id();
        self.dispatch_delete_callbacks(rdf_type_id, class_resource, &class_iri);
        self.buffer.current_mut().types.retain(|&c| c != class);
        Ok(())
    }

    /// The `UPDATE` collapse helper: wipes current values of
    /// single-valued properties along the super-property chain.
    fn delete_single_valued(
        &mut self,
        property: PropertyId,
        super_is_single_valued: bool,
    ) -> Result<(), UpdateError> {
        let info = self.property_info(property);
        if super_is_single_valued && info.multiple {
            // A multi-valued child under a single-valued parent is
            // wiped whole.
            self.cache_delete_all_values(&info.table, &info.field)?;
        } else if !info.multiple {
            match self.ensure_old_values(property) {
                Ok(()) => {
                    let first = {
                        let values = &self.buffer.current().predicates[&property];
                        if values.len() == 1 {
                            values.first().cloned()
                        } else {
                            None
                        }
                    };
                    if let Some(value) = first {
                        self.cache_delete_value(&info.table, &info.field, value, false)?;
                    }
                }
                // No need to error out when the statement does not exist.
                Err(e) => debug!("Ignoring unreadable old values of '{}': {e}", info.field),
            }
        }
        let supers: Vec<PropertyId> = self
            .ontology
            .property(property)
            .super_properties()
            .to_vec();
        for super_property in supers {
            self.delete_single_valued(super_property, super_is_single_valued)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Statement API

    /// Inserts one statement, dispatching on the property type.
    pub fn insert(
        &mut self,
        graph: Option<&str>,
        subject: &str,
        predicate: &str,
        object: &[u8],
    ) -> Result<(), UpdateError> {
        let property = self
            .ontology
            .property_by_iri(predicate)
            .ok_or_else(|| UpdateError::UnknownProperty(predicate.to_owned()))?;
        if self.ontology.property(property).kind() == PropertyKind::Resource {
            self.insert_with_uri(graph, subject, predicate, object)
        } else {
            self.insert_with_string(graph, subject, predicate, object)
        }
    }

    /// Inserts a statement whose object is a URI; the property must be
    /// resource-typed.
    pub fn insert_with_uri(
        &mut self,
        graph: Option<&str>,
        subject: &str,
        predicate: &str,
        object: &[u8],
    ) -> Result<(), UpdateError> {
        assert!(self.in_transaction, "insert outside of a transaction");
        let property = self
            .ontology
            .property_by_iri(predicate)
            .ok_or_else(|| UpdateError::UnknownProperty(predicate.to_owned()))?;
        if self.ontology.property(property).kind() != PropertyKind::Resource {
            return Err(UpdateError::Type(format!(
                "Property '{predicate}' does not accept URIs"
            )));
        }
        self.has_persistent = true;
        self.resource_buffer_switch(graph, subject, 0)?;

        let object_str = value::object_text(object).into_owned();
        if property == self.ontology.rdf_type() {
            // rdf:type is handled specially to cope with inference and
            // the per-class rows.
            let class = self
                .ontology
                .class_by_iri(&object_str)
                .ok_or_else(|| UpdateError::UnknownClass(object_str.clone()))?;
            self.create_service_decomposed(class)?;
        } else {
            let change = self.insert_metadata_decomposed(property, object)?;
            if change {
                let predicate_id = self.ontology.property(property).id();
                let object_id = self.query_resource_id(&object_str)?;
                self.dispatch_insert_callbacks(predicate_id, object_id, &object_str);
            }
        }
        Ok(())
    }

    /// Inserts a statement whose object is a literal; the property must
    /// not be resource-typed.
    pub fn insert_with_string(
        &mut self,
        graph: Option<&str>,
        subject: &str,
        predicate: &str,
        object: &[u8],
    ) -> Result<(), UpdateError> {
        assert!(self.in_transaction, "insert outside of a transaction");
        let property = self
            .ontology
            .property_by_iri(predicate)
            .ok_or_else(|| UpdateError::UnknownProperty(predicate.to_owned()))?;
        if self.ontology.property(property).kind() == PropertyKind::Resource {
            return Err(UpdateError::Type(format!(
                "Property '{predicate}' only accepts URIs"
            )));
        }
        self.has_persistent = true;
        self.resource_buffer_switch(graph, subject, 0)?;

        let change = self.insert_metadata_decomposed(property, object)?;
        if change {
            let predicate_id = self.ontology.property(property).id();
            let object_str = value::object_text(object);
            // Always a literal, so no object id.
            self.dispatch_insert_callbacks(predicate_id, 0, &object_str);
        }
        Ok(())
    }

    /// Deletes one statement. A subject unknown to the store is a no-op.
    pub fn delete(
        &mut self,
        graph: Option<&str>,
        subject: &str,
        predicate: &str,
        object: &[u8],
    ) -> Result<(), UpdateError> {
        assert!(self.in_transaction, "delete outside of a transaction");
        let subject_id = self.query_resource_id(subject)?;
        if subject_id == 0 {
            return Ok(());
        }
        self.resource_buffer_switch(graph, subject, subject_id)?;

        let object_str = value::object_text(object).into_owned();
        if predicate == rdf::TYPE.as_str() {
            let class = self
                .ontology
                .class_by_iri(&object_str)
                .ok_or_else(|| UpdateError::UnknownClass(object_str.clone()))?;
            self.has_persistent = true;
            self.delete_resource_type_full(class, false)?;
        } else {
            let property = self
                .ontology
                .property_by_iri(predicate)
                .ok_or_else(|| UpdateError::UnknownProperty(predicate.to_owned()))?;
            self.has_persistent = true;
            let change = self.delete_metadata_decomposed(property, object)?;
            if change {
                let predicate_id = self.ontology.property(property).id();
                self.dispatch_delete_callbacks(predicate_id, 0, &object_str);
            }
        }
        Ok(())
    }

    /// Deletes every value of `(subject, predicate)`. A subject unknown
    /// to the store is a no-op.
    pub fn delete_all(
        &mut self,
        graph: Option<&str>,
        subject: &str,
        predicate: &str,
    ) -> Result<(), UpdateError> {
        assert!(self.in_transaction, "delete outside of a transaction");
        let subject_id = self.query_resource_id(subject)?;
        if subject_id == 0 {
            return Ok(());
        }
        self.resource_buffer_switch(graph, subject, subject_id)?;
        let property = self
            .ontology
            .property_by_iri(predicate)
            .ok_or_else(|| UpdateError::UnknownProperty(predicate.to_owned()))?;
        let kind = self.ontology.property(property).kind();
        self.ensure_old_values(property)?;
        let values: Vec<Value> = self.buffer.current().predicates[&property]
            .iter()
            .cloned()
            .collect();
        for value in values {
            let object = self.value_to_bytes(kind, &value)?;
            self.delete(graph, subject, predicate, &object)?;
        }
        Ok(())
    }

    /// `UPDATE` semantics: overwrite the singleton value of `predicate`,
    /// or wipe all of its values when `object` is `None`.
    pub fn update(
        &mut self,
        graph: Option<&str>,
        subject: &str,
        predicate: &str,
        object: Option<&[u8]>,
    ) -> Result<(), UpdateError> {
        assert!(self.in_transaction, "update outside of a transaction");
        let property = self
            .ontology
            .property_by_iri(predicate)
            .ok_or_else(|| UpdateError::UnknownProperty(predicate.to_owned()))?;
        match object {
            None => {
                if property == self.ontology.rdf_type() {
                    return Err(UpdateError::Unsupported(format!(
                        "Using 'null' with '{predicate}' is not supported"
                    )));
                }
                // Flush upfront so a null,x,null,y,z sequence sees
                // consistent state.
                self.flush_buffer()?;
                let (subject_id, _) = self.ensure_resource_id(subject)?;
                self.resource_buffer_switch(graph, subject, subject_id)?;
                let info = self.property_info(property);
                self.cache_delete_all_values(&info.table, &info.field)?;
            }
            Some(object) => {
                let (subject_id, _) = self.ensure_resource_id(subject)?;
                self.resource_buffer_switch(graph, subject, subject_id)?;
                let single = !self.ontology.property(property).multiple_values();
                self.delete_single_valued(property, single)?;
                self.flush_buffer()?;
                if self.ontology.property(property).kind() == PropertyKind::Resource {
                    self.insert_with_uri(graph, subject, predicate, object)?;
                } else {
                    self.insert_with_string(graph, subject, predicate, object)?;
                }
            }
        }
        self.flush_buffer()
    }

    // ------------------------------------------------------------------
    // SPARQL and Turtle entry points

    /// Parses and executes a SPARQL update inside its own transaction.
    pub fn update_sparql(&mut self, update: &str) -> Result<(), UpdateError> {
        self.update_sparql_internal(update).map(|_| ())
    }

    /// Like [`update_sparql`](Self::update_sparql), additionally
    /// returning the blank-node label → minted URI map of the batch.
    pub fn update_sparql_blank(
        &mut self,
        update: &str,
    ) -> Result<BTreeMap<String, String>, UpdateError> {
        self.update_sparql_internal(update)
    }

    fn update_sparql_internal(
        &mut self,
        update: &str,
    ) -> Result<BTreeMap<String, String>, UpdateError> {
        debug!("[SPARQL] {}", update.replace('\n', " "));
        self.begin()?;
        match sparql::execute_update(self, update) {
            Ok(bnodes) => {
                self.commit()?;
                Ok(bnodes)
            }
            Err(e) => {
                self.rollback();
                Err(e)
            }
        }
    }

    /// Streams a Turtle file into the given graph, within the open
    /// transaction. Blank-node labels are scoped to the file.
    pub fn load_turtle(&mut self, path: &Path, graph: Option<&str>) -> Result<(), LoaderError> {
        let file = File::open(path)?;
        let mut bnodes: HashMap<String, String> = HashMap::new();
        for triple in oxttl::TurtleParser::new().for_reader(BufReader::new(file)) {
            let triple = triple?;
            let subject = match &triple.subject {
                NamedOrBlankNode::NamedNode(n) => n.as_str().to_owned(),
                NamedOrBlankNode::BlankNode(b) => {
                    self.bnode_uri(&mut bnodes, b.as_str()).map_err(LoaderError::Update)?
                }
            };
            let predicate = triple.predicate.as_str();
            match &triple.object {
                Term::NamedNode(n) => {
                    let object = make_object_bytes(n.as_str(), None);
                    self.insert_with_uri(graph, &subject, predicate, &object)?;
                }
                Term::BlankNode(b) => {
                    let uri = self
                        .bnode_uri(&mut bnodes, b.as_str())
                        .map_err(LoaderError::Update)?;
                    let object = make_object_bytes(&uri, None);
                    self.insert_with_uri(graph, &subject, predicate, &object)?;
                }
                Term::Literal(literal) => {
                    let object = make_object_bytes(literal.value(), literal.language());
                    self.insert_with_string(graph, &subject, predicate, &object)?;
                }
                _ => {
                    return Err(LoaderError::Update(UpdateError::Unsupported(
                        "Only named node, blank node and literal objects are supported".to_owned(),
                    )))
                }
            }
            self.might_flush().map_err(LoaderError::Update)?;
        }
        Ok(())
    }

    pub(crate) fn bnode_uri(
        &mut self,
        bnodes: &mut HashMap<String, String>,
        label: &str,
    ) -> Result<String, UpdateError> {
        if let Some(uri) = bnodes.get(label) {
            return Ok(uri.clone());
        }
        let uri = self.generate_bnode()?;
        bnodes.insert(label.to_owned(), uri.clone());
        Ok(uri)
    }

    // ------------------------------------------------------------------
    // Ontology installation

    fn install_ontology(&mut self) -> Result<(), UpdateError> {
        self.begin_ontology()?;
        match self.install_ontology_statements() {
            Ok(()) => self.commit(),
            Err(e) => {
                self.rollback();
                Err(e)
            }
        }
    }

    fn install_ontology_statements(&mut self) -> Result<(), UpdateError> {
        let classes: Vec<ClassId> = self.ontology.classes().collect();
        let properties: Vec<PropertyId> = self.ontology.properties().collect();

        // Resource ids first, so rdf:type rows reference the right ids.
        for &class in &classes {
            let iri = self.ontology.class(class).iri().to_owned();
            let (id, _) = self.ensure_resource_id(&iri)?;
            self.ontology.assign_class_id(class, id);
        }
        for &property in &properties {
            let iri = self.ontology.property(property).iri().to_owned();
            let (id, _) = self.ensure_resource_id(&iri)?;
            self.ontology.assign_property_id(property, id);
        }

        let rdfs_class = make_object_bytes(rdfs::CLASS.as_str(), None);
        for &class in &classes {
            let (iri, supers) = {
                let c = self.ontology.class(class);
                (c.iri().to_owned(), c.super_classes().to_vec())
            };
            self.insert_with_uri(None, &iri, rdf::TYPE.as_str(), &rdfs_class)?;
            for super_class in supers {
                let super_iri = self.ontology.class(super_class).iri().to_owned();
                self.insert_with_uri(
                    None,
                    &iri,
                    rdfs::SUB_CLASS_OF.as_str(),
                    &make_object_bytes(&super_iri, None),
                )?;
            }
        }

        let rdf_property = make_object_bytes(rdf::PROPERTY.as_str(), None);
        for &property in &properties {
            let (iri, supers) = {
                let p = self.ontology.property(property);
                (p.iri().to_owned(), p.super_properties().to_vec())
            };
            self.insert_with_uri(None, &iri, rdf::TYPE.as_str(), &rdf_property)?;
            for super_property in supers {
                let super_iri = self.ontology.property(super_property).iri().to_owned();
                self.insert_with_uri(
                    None,
                    &iri,
                    rdfs::SUB_PROPERTY_OF.as_str(),
                    &make_object_bytes(&super_iri, None),
                )?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Observers

    fn allocate_callback_id(&mut self) -> CallbackId {
        self.next_callback_id += 1;
        CallbackId(self.next_callback_id)
    }

    /// Registers an observer fired on every successful statement insert.
    /// Observers must not call back into the writer.
    pub fn add_insert_callback(&mut self, callback: impl Fn(&StatementEvent) + 'static) -> CallbackId {
        let id = self.allocate_callback_id();
        self.insert_callbacks.push((id, Box::new(callback)));
        id
    }

    pub fn remove_insert_callback(&mut self, id: CallbackId) -> bool {
        let before = self.insert_callbacks.len();
        self.insert_callbacks.retain(|(i, _)| *i != id);
        self.insert_callbacks.len() != before
    }

    /// Registers an observer fired on every successful statement delete.
    pub fn add_delete_callback(&mut self, callback: impl Fn(&StatementEvent) + 'static) -> CallbackId {
        let id = self.allocate_callback_id();
        self.delete_callbacks.push((id, Box::new(callback)));
        id
    }

    pub fn remove_delete_callback(&mut self, id: CallbackId) -> bool {
        let before = self.delete_callbacks.len();
        self.delete_callbacks.retain(|(i, _)| *i != id);
        self.delete_callbacks.len() != before
    }

    /// Registers an observer fired after a successful commit.
    pub fn add_commit_callback(&mut self, callback: impl Fn() + 'static) -> CallbackId {
        let id = self.allocate_callback_id();
        self.commit_callbacks.push((id, Box::new(callback)));
        id
    }

    pub fn remove_commit_callback(&mut self, id: CallbackId) -> bool {
        let before = self.commit_callbacks.len();
        self.commit_callbacks.retain(|(i, _)| *i != id);
        self.commit_callbacks.len() != before
    }

    /// Registers an observer fired after every rollback.
    pub fn add_rollback_callback(&mut self, callback: impl Fn() + 'static) -> CallbackId {
        let id = self.allocate_callback_id();
        self.rollback_callbacks.push((id, Box::new(callback)));
        id
    }

    pub fn remove_rollback_callback(&mut self, id: CallbackId) -> bool {
        let before = self.rollback_callbacks.len();
        self.rollback_callbacks.retain(|(i, _)| *i != id);
        self.rollback_callbacks.len() != before
    }

    fn statement_event(&self, predicate_id: i64, object_id: i64, object: &str) -> StatementEvent {
        let resource = self.buffer.current();
        let graph = self.buffer.current_graph();
        StatementEvent {
            graph_id: graph.id,
            graph: graph.name.clone(),
            subject_id: resource.id,
            subject: resource.subject.clone(),
            predicate_id,
            object_id,
            object: object.to_owned(),
            types: resource
                .types
                .iter()
                .map(|&c| self.ontology.class(c).iri().to_owned())
                .collect(),
        }
    }

    fn dispatch_insert_callbacks(&self, predicate_id: i64, object_id: i64, object: &str) {
        if self.insert_callbacks.is_empty() {
            return;
        }
        let event = self.statement_event(predicate_id, object_id, object);
        for (_, callback) in &self.insert_callbacks {
            callback(&event);
        }
    }

    fn dispatch_delete_callbacks(&self, predicate_id: i64, object_id: i64, object: &str) {
        if self.delete_callbacks.is_empty() {
            return;
        }
        let event = self.statement_event(predicate_id, object_id, object);
        for (_, callback) in &self.delete_callbacks {
            callback(&event);
        }
    }
}

fn truncated(value: Option<&Value>) -> String {
    value
        .map(|v| v.to_string().chars().take(255).collect())
        .unwrap_or_default()
}

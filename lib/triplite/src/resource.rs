//! In-memory resource trees.
//!
//! A [`Resource`] describes one subject and its property values, where a
//! value may be another resource; [`Writer::update_resource`] writes the
//! whole tree in one pass. Subjects without an identifier and `_:`
//! labels become fresh blank nodes, scoped to one `update_resource`
//! call, so the same label written twice in one call denotes one node.

use crate::error::UpdateError;
use crate::value::{make_object_bytes, DateTime};
use crate::vocab::rdf;
use crate::writer::Writer;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// One value of a resource property.
#[derive(Debug, Clone)]
pub enum ResourceValue {
    Boolean(bool),
    Integer(i64),
    Double(f64),
    String(String),
    LangString { value: String, language: String },
    DateTime(DateTime),
    /// A reference by URI; `_:` prefixed URIs are blank-node labels.
    Uri(String),
    /// A nested resource, written before the statement referencing it.
    Resource(Arc<Resource>),
}

#[derive(Debug, Clone)]
struct PropertyEntry {
    predicate: String,
    /// Replace all stored values instead of adding to them.
    overwrite: bool,
    values: Vec<ResourceValue>,
}

/// A subject and its property values, possibly nested.
#[derive(Debug, Clone, Default)]
pub struct Resource {
    identifier: Option<String>,
    properties: Vec<PropertyEntry>,
}

impl Resource {
    /// A resource named by IRI, or by a `_:` blank-node label.
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: Some(identifier.into()),
            properties: Vec::new(),
        }
    }

    /// An anonymous resource; a blank node is minted for it on write.
    pub fn blank() -> Self {
        Self::default()
    }

    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    fn entry_mut(&mut self, predicate: &str) -> &mut PropertyEntry {
        if let Some(i) = self
            .properties
            .iter()
            .position(|e| e.predicate == predicate)
        {
            return &mut self.properties[i];
        }
        self.properties.push(PropertyEntry {
            predicate: predicate.to_owned(),
            overwrite: false,
            values: Vec::new(),
        });
        self.properties.last_mut().expect("entry was just pushed")
    }

    /// Adds a value to `predicate`, keeping the stored ones.
    pub fn add(&mut self, predicate: &str, value: ResourceValue) -> &mut Self {
        self.entry_mut(predicate).values.push(value);
        self
    }

    /// Sets `predicate` to exactly this value, overwriting stored ones
    /// on write.
    pub fn set(&mut self, predicate: &str, value: ResourceValue) -> &mut Self {
        let entry = self.entry_mut(predicate);
        entry.overwrite = true;
        entry.values = vec![value];
        self
    }
}

impl Writer {
    /// Writes a resource tree into the given graph, within the open
    /// transaction.
    pub fn update_resource(
        &mut self,
        graph: Option<&str>,
        resource: &Resource,
    ) -> Result<(), UpdateError> {
        let mut visited = HashSet::new();
        let mut bnodes = HashMap::new();
        let mut anonymous = HashMap::new();
        self.update_resource_single(graph, resource, &mut visited, &mut bnodes, &mut anonymous)
    }

    fn resource_subject(
        &mut self,
        resource: &Resource,
        bnodes: &mut HashMap<String, String>,
        anonymous: &mut HashMap<*const Resource, String>,
    ) -> Result<String, UpdateError> {
        match resource.identifier() {
            Some(id) if !id.starts_with("_:") => Ok(id.to_owned()),
            Some(label) => self.bnode_uri(bnodes, label),
            None => {
                let key = resource as *const Resource;
                if let Some(uri) = anonymous.get(&key) {
                    return Ok(uri.clone());
                }
                let uri = self.generate_bnode()?;
                anonymous.insert(key, uri.clone());
                Ok(uri)
            }
        }
    }

    fn update_resource_single(
        &mut self,
        graph: Option<&str>,
        resource: &Resource,
        visited: &mut HashSet<*const Resource>,
        bnodes: &mut HashMap<String, String>,
        anonymous: &mut HashMap<*const Resource, String>,
    ) -> Result<(), UpdateError> {
        if !visited.insert(resource as *const Resource) {
            return Ok(());
        }
        let subject = self.resource_subject(resource, bnodes, anonymous)?;
        // A blank subject is a whole new insertion, nothing to reset.
        let subject_is_blank = resource
            .identifier()
            .is_none_or(|id| id.starts_with("_:"));

        // rdf:type goes first so the other property writes see the
        // right domain.
        for type_pass in [true, false] {
            for entry in &resource.properties {
                if (entry.predicate == rdf::TYPE.as_str()) != type_pass {
                    continue;
                }
                if entry.overwrite && !subject_is_blank {
                    self.delete_all(graph, &subject, &entry.predicate)?;
                    // Reinserted values must not meet their own deletes
                    // in the buffer.
                    self.flush_buffer()?;
                }
                for value in &entry.values {
                    if let ResourceValue::Resource(child) = value {
                        self.update_resource_single(
                            graph,
                            child.as_ref(),
                            visited,
                            bnodes,
                            anonymous,
                        )?;
                    }
                    let object = self.resource_value_bytes(value, bnodes, anonymous)?;
                    self.insert(graph, &subject, &entry.predicate, &object)?;
                }
            }
        }
        Ok(())
    }

    fn resource_value_bytes(
        &mut self,
        value: &ResourceValue,
        bnodes: &mut HashMap<String, String>,
        anonymous: &mut HashMap<*const Resource, String>,
    ) -> Result<Vec<u8>, UpdateError> {
        Ok(match value {
            ResourceValue::Boolean(b) => {
                make_object_bytes(if *b { "true" } else { "false" }, None)
            }
            ResourceValue::Integer(i) => make_object_bytes(&i.to_string(), None),
            ResourceValue::Double(d) => make_object_bytes(&d.to_string(), None),
            ResourceValue::String(s) => make_object_bytes(s, None),
            ResourceValue::LangString { value, language } => {
                make_object_bytes(value, Some(language))
            }
            ResourceValue::DateTime(d) => make_object_bytes(&d.to_iso8601()?, None),
            ResourceValue::Uri(uri) => {
                if uri.starts_with("_:") {
                    make_object_bytes(&self.bnode_uri(bnodes, uri)?, None)
                } else {
                    make_object_bytes(uri, None)
                }
            }
            ResourceValue::Resource(child) => {
                let subject = self.resource_subject(child.as_ref(), bnodes, anonymous)?;
                make_object_bytes(&subject, None)
            }
        })
    }
}

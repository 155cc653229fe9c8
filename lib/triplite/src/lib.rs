#![doc = include_str!("../README.md")]
#![doc(test(attr(deny(warnings))))]

mod buffer;
pub mod db;
pub mod error;
pub mod ontology;
pub mod resource;
mod sparql;
pub mod value;
pub mod vocab;
mod writer;

pub use crate::db::DbInterface;
pub use crate::error::{LoaderError, OntologyError, UpdateError};
pub use crate::ontology::{
    ClassId, ClassSpec, Ontology, OntologyBuilder, PropertyId, PropertyKind, PropertySpec,
};
pub use crate::resource::{Resource, ResourceValue};
pub use crate::value::{make_object_bytes, DateTime, Value, ValueSet};
pub use crate::writer::{CallbackId, StatementEvent, Writer, ONTOLOGY_MAX_ID};

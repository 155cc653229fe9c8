use std::io;
use thiserror::Error;

/// An error raised while applying updates to the store.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum UpdateError {
    /// A domain violation or an attempt to give a single-valued property a second value.
    #[error("{0}")]
    Constraint(String),
    /// The class IRI is not part of the ontology.
    #[error("Class '{0}' not found in the ontology")]
    UnknownClass(String),
    /// The property IRI is not part of the ontology.
    #[error("Property '{0}' not found in the ontology")]
    UnknownProperty(String),
    /// The named graph does not exist.
    #[error("Graph '{0}' not found")]
    UnknownGraph(String),
    /// A URI was given to a literal property or a literal to a resource property.
    #[error("{0}")]
    Type(String),
    /// The operation is syntactically valid but not executable by this engine.
    #[error("{0}")]
    Unsupported(String),
    /// The file system backing the store is out of space.
    #[error("There is not enough space on the file system for update operations")]
    NoSpace,
    /// A literal could not be converted to the property's value type.
    #[error("{0}")]
    InvalidLiteral(String),
    /// A SPARQL update failed to parse.
    #[error(transparent)]
    Parse(#[from] spargebra::SparqlSyntaxError),
    /// Error from the backing store.
    #[error(transparent)]
    Database(#[from] rusqlite::Error),
}

/// An error raised while loading a Turtle file into the store.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// An error raised while reading the file.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// An error raised by the Turtle parser.
    #[error(transparent)]
    Parsing(#[from] oxttl::TurtleParseError),
    /// An error raised while applying the parsed statements.
    #[error(transparent)]
    Update(#[from] UpdateError),
}

/// An error raised while assembling an [`Ontology`](crate::ontology::Ontology).
#[derive(Debug, Error)]
pub enum OntologyError {
    /// A class or property references a class IRI that was never declared.
    #[error("Class '{0}' is not declared")]
    UnknownClass(String),
    /// A class or property references a property IRI that was never declared.
    #[error("Property '{0}' is not declared")]
    UnknownProperty(String),
    /// The same IRI was declared twice.
    #[error("'{0}' is declared twice")]
    Duplicate(String),
    /// A declaration combination the schema mapping cannot express.
    #[error("{0}")]
    Invalid(String),
}

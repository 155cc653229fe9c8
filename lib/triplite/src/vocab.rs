//! IRI constants for the vocabularies the engine touches.

pub mod rdf {
    //! [RDF](https://www.w3.org/TR/rdf11-concepts/) vocabulary.
    use oxrdf::NamedNodeRef;

    /// The class of RDF properties.
    pub const PROPERTY: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/1999/02/22-rdf-syntax-ns#Property");
    /// The subject is an instance of a class.
    pub const TYPE: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/1999/02/22-rdf-syntax-ns#type");
}

pub mod rdfs {
    //! [RDFS](https://www.w3.org/TR/rdf-schema/) vocabulary.
    use oxrdf::NamedNodeRef;

    /// The class of classes.
    pub const CLASS: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/2000/01/rdf-schema#Class");
    /// The class resource, everything.
    pub const RESOURCE: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/2000/01/rdf-schema#Resource");
    /// The subject is a subclass of a class.
    pub const SUB_CLASS_OF: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/2000/01/rdf-schema#subClassOf");
    /// The subject is a subproperty of a property.
    pub const SUB_PROPERTY_OF: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/2000/01/rdf-schema#subPropertyOf");
}

pub mod nrl {
    //! Bookkeeping vocabulary stamped on every stored resource.
    use oxrdf::NamedNodeRef;

    /// Wall-clock time at which the resource row was created.
    pub const ADDED: NamedNodeRef<'_> = NamedNodeRef::new_unchecked(
        "http://tracker.api.gnome.org/ontology/v3/nrl#added",
    );
    /// Modification sequence number of the last transaction touching the resource.
    pub const MODIFIED: NamedNodeRef<'_> = NamedNodeRef::new_unchecked(
        "http://tracker.api.gnome.org/ontology/v3/nrl#modified",
    );
}

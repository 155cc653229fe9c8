//! The read-only ontology the decomposer works against.
//!
//! Classes and properties live in arenas and reference each other through
//! [`ClassId`] / [`PropertyId`] handles, so the update path can hold a
//! shared `&Ontology` while mutating its own buffers. An ontology always
//! contains the rdfs/nrl core (`rdfs:Resource`, `rdfs:Class`,
//! `rdf:Property`, `rdf:type`, `rdfs:subClassOf`, `rdfs:subPropertyOf`,
//! `nrl:added`, `nrl:modified`); user vocabularies are layered on top
//! through [`OntologyBuilder`].

use crate::error::OntologyError;
use crate::vocab::{nrl, rdf, rdfs};
use std::collections::HashMap;

/// Handle of a class inside an [`Ontology`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(u32);

/// Handle of a property inside an [`Ontology`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PropertyId(u32);

/// The value space of a property, which also decides the column type of
/// its backing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    String,
    LangString,
    Integer,
    Boolean,
    Double,
    Date,
    DateTime,
    Resource,
}

impl PropertyKind {
    pub(crate) fn column_type(self) -> &'static str {
        match self {
            Self::String | Self::LangString => "TEXT",
            Self::Double => "REAL",
            // Datetimes are stored as an integer timestamp unless an
            // offset or fractional seconds force ISO 8601 text; INTEGER
            // affinity keeps such text untouched.
            Self::Integer
            | Self::Boolean
            | Self::Date
            | Self::DateTime
            | Self::Resource => "INTEGER",
        }
    }

    fn is_text(self) -> bool {
        matches!(self, Self::String | Self::LangString)
    }
}

/// An ontology class, backed by one table per graph holding its
/// single-valued properties.
#[derive(Debug)]
pub struct Class {
    iri: String,
    name: String,
    id: i64,
    super_classes: Vec<ClassId>,
    domain_indexes: Vec<PropertyId>,
}

impl Class {
    pub fn iri(&self) -> &str {
        &self.iri
    }

    /// The table name of the class.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The resource id of the class, assigned when the ontology is
    /// installed into a store.
    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn super_classes(&self) -> &[ClassId] {
        &self.super_classes
    }

    /// Properties of other classes mirrored into this class's table.
    pub fn domain_indexes(&self) -> &[PropertyId] {
        &self.domain_indexes
    }
}

/// An ontology property.
#[derive(Debug)]
pub struct Property {
    iri: String,
    name: String,
    kind: PropertyKind,
    id: i64,
    domain: ClassId,
    multiple_values: bool,
    fulltext_indexed: bool,
    super_properties: Vec<PropertyId>,
    domain_index_classes: Vec<ClassId>,
    table_name: String,
}

impl Property {
    pub fn iri(&self) -> &str {
        &self.iri
    }

    /// The column name of the property.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PropertyKind {
        self.kind
    }

    /// The resource id of the property, assigned at install time.
    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn domain(&self) -> ClassId {
        self.domain
    }

    pub fn multiple_values(&self) -> bool {
        self.multiple_values
    }

    pub fn fulltext_indexed(&self) -> bool {
        self.fulltext_indexed
    }

    pub fn super_properties(&self) -> &[PropertyId] {
        &self.super_properties
    }

    /// Classes whose tables mirror this property as a domain index.
    pub fn domain_index_classes(&self) -> &[ClassId] {
        &self.domain_index_classes
    }

    /// The home table: the domain class table for single-valued
    /// properties, a dedicated two-column table otherwise.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }
}

/// An immutable class and property registry.
#[derive(Debug)]
pub struct Ontology {
    classes: Vec<Class>,
    properties: Vec<Property>,
    classes_by_iri: HashMap<String, ClassId>,
    properties_by_iri: HashMap<String, PropertyId>,
    classes_by_id: HashMap<i64, ClassId>,
    rdf_type: PropertyId,
    rdfs_resource: ClassId,
}

impl Ontology {
    pub fn class(&self, id: ClassId) -> &Class {
        &self.classes[id.0 as usize]
    }

    pub fn property(&self, id: PropertyId) -> &Property {
        &self.properties[id.0 as usize]
    }

    pub fn class_by_iri(&self, iri: &str) -> Option<ClassId> {
        self.classes_by_iri.get(iri).copied()
    }

    pub fn property_by_iri(&self, iri: &str) -> Option<PropertyId> {
        self.properties_by_iri.get(iri).copied()
    }

    pub fn classes(&self) -> impl Iterator<Item = ClassId> + '_ {
        (0..self.classes.len()).map(|i| ClassId(i as u32))
    }

    pub fn properties(&self) -> impl Iterator<Item = PropertyId> + '_ {
        (0..self.properties.len()).map(|i| PropertyId(i as u32))
    }

    pub(crate) fn rdf_type(&self) -> PropertyId {
        self.rdf_type
    }

    pub(crate) fn rdfs_resource(&self) -> ClassId {
        self.rdfs_resource
    }

    /// Resolves a class from the resource id stored in `rdf:type` rows.
    pub(crate) fn class_by_resource_id(&self, id: i64) -> Option<ClassId> {
        self.classes_by_id.get(&id).copied()
    }

    /// Binds arena entries to their store resource ids at install time.
    pub(crate) fn assign_class_id(&mut self, class: ClassId, id: i64) {
        self.classes[class.0 as usize].id = id;
        self.classes_by_id.insert(id, class);
    }

    pub(crate) fn assign_property_id(&mut self, property: PropertyId, id: i64) {
        self.properties[property.0 as usize].id = id;
    }
}

/// Declaration of a class for [`OntologyBuilder`].
#[derive(Debug, Clone)]
pub struct ClassSpec {
    iri: String,
    name: String,
    super_classes: Vec<String>,
    domain_indexes: Vec<String>,
}

impl ClassSpec {
    /// `name` is the table name, conventionally the prefixed form of the
    /// IRI (`"nmm:Photo"`).
    pub fn new(iri: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            iri: iri.into(),
            name: name.into(),
            super_classes: Vec::new(),
            domain_indexes: Vec::new(),
        }
    }

    pub fn super_class(mut self, iri: impl Into<String>) -> Self {
        self.super_classes.push(iri.into());
        self
    }

    /// Mirrors the given single-valued property of another class into
    /// this class's table.
    pub fn domain_index(mut self, property_iri: impl Into<String>) -> Self {
        self.domain_indexes.push(property_iri.into());
        self
    }
}

/// Declaration of a property for [`OntologyBuilder`].
#[derive(Debug, Clone)]
pub struct PropertySpec {
    iri: String,
    name: String,
    kind: PropertyKind,
    domain: String,
    multiple_values: bool,
    fulltext_indexed: bool,
    super_properties: Vec<String>,
}

impl PropertySpec {
    pub fn new(
        iri: impl Into<String>,
        name: impl Into<String>,
        kind: PropertyKind,
        domain_iri: impl Into<String>,
    ) -> Self {
        Self {
            iri: iri.into(),
            name: name.into(),
            kind,
            domain: domain_iri.into(),
            multiple_values: false,
            fulltext_indexed: false,
            super_properties: Vec::new(),
        }
    }

    pub fn multiple_values(mut self) -> Self {
        self.multiple_values = true;
        self
    }

    pub fn fulltext_indexed(mut self) -> Self {
        self.fulltext_indexed = true;
        self
    }

    pub fn super_property(mut self, iri: impl Into<String>) -> Self {
        self.super_properties.push(iri.into());
        self
    }
}

/// Assembles an [`Ontology`], resolving IRI references into arena handles
/// and validating the declarations against what the schema mapping can
/// express.
#[derive(Debug)]
pub struct OntologyBuilder {
    classes: Vec<ClassSpec>,
    properties: Vec<PropertySpec>,
}

impl Default for OntologyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OntologyBuilder {
    pub fn new() -> Self {
        let mut builder = Self {
            classes: Vec::new(),
            properties: Vec::new(),
        };
        builder
            .class(ClassSpec::new(rdfs::RESOURCE.as_str(), "rdfs:Resource"))
            .class(
                ClassSpec::new(rdfs::CLASS.as_str(), "rdfs:Class")
                    .super_class(rdfs::RESOURCE.as_str()),
            )
            .class(
                ClassSpec::new(rdf::PROPERTY.as_str(), "rdf:Property")
                    .super_class(rdfs::RESOURCE.as_str()),
            )
            .property(
                PropertySpec::new(
                    rdf::TYPE.as_str(),
                    "rdf:type",
                    PropertyKind::Resource,
                    rdfs::RESOURCE.as_str(),
                )
                .multiple_values(),
            )
            .property(PropertySpec::new(
                nrl::ADDED.as_str(),
                "nrl:added",
                PropertyKind::DateTime,
                rdfs::RESOURCE.as_str(),
            ))
            .property(PropertySpec::new(
                nrl::MODIFIED.as_str(),
                "nrl:modified",
                PropertyKind::Integer,
                rdfs::RESOURCE.as_str(),
            ))
            .property(
                PropertySpec::new(
                    rdfs::SUB_CLASS_OF.as_str(),
                    "rdfs:subClassOf",
                    PropertyKind::Resource,
                    rdfs::CLASS.as_str(),
                )
                .multiple_values(),
            )
            .property(
                PropertySpec::new(
                    rdfs::SUB_PROPERTY_OF.as_str(),
                    "rdfs:subPropertyOf",
                    PropertyKind::Resource,
                    rdf::PROPERTY.as_str(),
                )
                .multiple_values(),
            );
        builder
    }

    pub fn class(&mut self, spec: ClassSpec) -> &mut Self {
        self.classes.push(spec);
        self
    }

    pub fn property(&mut self, spec: PropertySpec) -> &mut Self {
        self.properties.push(spec);
        self
    }

    pub fn build(self) -> Result<Ontology, OntologyError> {
        let mut classes_by_iri = HashMap::new();
        for (i, spec) in self.classes.iter().enumerate() {
            if classes_by_iri
                .insert(spec.iri.clone(), ClassId(i as u32))
                .is_some()
            {
                return Err(OntologyError::Duplicate(spec.iri.clone()));
            }
        }
        let mut properties_by_iri = HashMap::new();
        for (i, spec) in self.properties.iter().enumerate() {
            if properties_by_iri
                .insert(spec.iri.clone(), PropertyId(i as u32))
                .is_some()
            {
                return Err(OntologyError::Duplicate(spec.iri.clone()));
            }
        }

        let class_ref = |iri: &str| {
            classes_by_iri
                .get(iri)
                .copied()
                .ok_or_else(|| OntologyError::UnknownClass(iri.to_owned()))
        };
        let property_ref = |iri: &str| {
            properties_by_iri
                .get(iri)
                .copied()
                .ok_or_else(|| OntologyError::UnknownProperty(iri.to_owned()))
        };

        let mut classes = Vec::with_capacity(self.classes.len());
        for spec in &self.classes {
            classes.push(Class {
                iri: spec.iri.clone(),
                name: spec.name.clone(),
                id: 0,
                super_classes: spec
                    .super_classes
                    .iter()
                    .map(|iri| class_ref(iri))
                    .collect::<Result<_, _>>()?,
                domain_indexes: spec
                    .domain_indexes
                    .iter()
                    .map(|iri| property_ref(iri))
                    .collect::<Result<_, _>>()?,
            });
        }

        let mut properties = Vec::with_capacity(self.properties.len());
        for spec in &self.properties {
            let domain = class_ref(&spec.domain)?;
            let domain_name = &self.classes[domain.0 as usize].name;
            if spec.fulltext_indexed && !spec.kind.is_text() {
                return Err(OntologyError::Invalid(format!(
                    "Full-text indexed property '{}' must be a text property",
                    spec.iri
                )));
            }
            properties.push(Property {
                iri: spec.iri.clone(),
                name: spec.name.clone(),
                kind: spec.kind,
                id: 0,
                domain,
                multiple_values: spec.multiple_values,
                fulltext_indexed: spec.fulltext_indexed,
                super_properties: spec
                    .super_properties
                    .iter()
                    .map(|iri| property_ref(iri))
                    .collect::<Result<_, _>>()?,
                domain_index_classes: Vec::new(),
                table_name: if spec.multiple_values {
                    format!("{}_{}", domain_name, spec.name)
                } else {
                    domain_name.clone()
                },
            });
        }

        // Invert class domain-index declarations onto the properties.
        for (i, class) in classes.iter().enumerate() {
            for &property in &class.domain_indexes {
                let property = &mut properties[property.0 as usize];
                if property.multiple_values {
                    return Err(OntologyError::Invalid(format!(
                        "Domain index on '{}' needs a single-valued property, '{}' is multi-valued",
                        class.iri, property.iri
                    )));
                }
                property.domain_index_classes.push(ClassId(i as u32));
            }
        }

        let rdfs_resource = class_ref(rdfs::RESOURCE.as_str())?;
        let rdf_type = property_ref(rdf::TYPE.as_str())?;

        let ontology = Ontology {
            classes,
            properties,
            classes_by_iri,
            properties_by_iri,
            classes_by_id: HashMap::new(),
            rdf_type,
            rdfs_resource,
        };

        // Every class must reach rdfs:Resource, otherwise its instances
        // would never get a bookkeeping row.
        for class in ontology.classes() {
            if class == rdfs_resource {
                continue;
            }
            let mut stack = vec![class];
            let mut reached = false;
            let mut seen = vec![false; ontology.classes.len()];
            while let Some(current) = stack.pop() {
                if current == rdfs_resource {
                    reached = true;
                    break;
                }
                if std::mem::replace(&mut seen[current.0 as usize], true) {
                    continue;
                }
                stack.extend_from_slice(ontology.class(current).super_classes());
            }
            if !reached {
                return Err(OntologyError::Invalid(format!(
                    "Class '{}' is not a subclass of rdfs:Resource",
                    ontology.class(class).iri
                )));
            }
        }

        Ok(ontology)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_is_always_present() {
        let ontology = OntologyBuilder::new().build().unwrap();
        let resource = ontology.class_by_iri(rdfs::RESOURCE.as_str()).unwrap();
        assert_eq!(ontology.class(resource).name(), "rdfs:Resource");
        assert!(ontology.property_by_iri(nrl::MODIFIED.as_str()).is_some());
        assert_eq!(
            ontology.property(ontology.rdf_type()).table_name(),
            "rdfs:Resource_rdf:type"
        );
    }

    #[test]
    fn multi_valued_properties_get_their_own_table() {
        let mut builder = OntologyBuilder::new();
        builder
            .class(ClassSpec::new("urn:T", "t:T").super_class(rdfs::RESOURCE.as_str()))
            .property(
                PropertySpec::new("urn:tag", "t:tag", PropertyKind::String, "urn:T")
                    .multiple_values(),
            );
        let ontology = builder.build().unwrap();
        let tag = ontology.property_by_iri("urn:tag").unwrap();
        assert_eq!(ontology.property(tag).table_name(), "t:T_t:tag");
    }

    #[test]
    fn dangling_references_are_rejected() {
        let mut builder = OntologyBuilder::new();
        builder.class(ClassSpec::new("urn:T", "t:T").super_class("urn:Missing"));
        assert!(matches!(
            builder.build(),
            Err(OntologyError::UnknownClass(_))
        ));
    }

    #[test]
    fn unrooted_classes_are_rejected() {
        let mut builder = OntologyBuilder::new();
        builder.class(ClassSpec::new("urn:Island", "t:Island"));
        assert!(matches!(builder.build(), Err(OntologyError::Invalid(_))));
    }

    #[test]
    fn domain_index_must_be_single_valued() {
        let mut builder = OntologyBuilder::new();
        builder
            .class(ClassSpec::new("urn:A", "t:A").super_class(rdfs::RESOURCE.as_str()))
            .class(
                ClassSpec::new("urn:B", "t:B")
                    .super_class("urn:A")
                    .domain_index("urn:tag"),
            )
            .property(
                PropertySpec::new("urn:tag", "t:tag", PropertyKind::String, "urn:A")
                    .multiple_values(),
            );
        assert!(matches!(builder.build(), Err(OntologyError::Invalid(_))));
    }
}

//! End-to-end tests of the update engine against an in-memory store
//! with a photo/media fixture ontology.

use rusqlite::OptionalExtension;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use triplite::{
    make_object_bytes, ClassSpec, DateTime, DbInterface, OntologyBuilder, PropertyKind,
    PropertySpec, Resource, ResourceValue, StatementEvent, UpdateError, Writer,
};

const RDFS_RESOURCE: &str = "http://www.w3.org/2000/01/rdf-schema#Resource";
const NIE: &str = "http://www.semanticdesktop.org/ontologies/2007/01/19/nie#";
const NFO: &str = "http://www.semanticdesktop.org/ontologies/2007/03/22/nfo#";
const NMM: &str = "http://www.tracker-project.org/temp/nmm#";

const PREFIXES: &str = "\
    PREFIX rdfs: <http://www.w3.org/2000/01/rdf-schema#>\n\
    PREFIX nie: <http://www.semanticdesktop.org/ontologies/2007/01/19/nie#>\n\
    PREFIX nfo: <http://www.semanticdesktop.org/ontologies/2007/03/22/nfo#>\n\
    PREFIX nmm: <http://www.tracker-project.org/temp/nmm#>\n";

/// 2022-12-04T01:01:01Z
const PHOTO_DATE: i64 = 1_670_115_661;

const PHOTO_INSERT_SPARQL: &str = "INSERT DATA { <ex:a> a nmm:Photo ; \
     nfo:codec 'png' ; nfo:horizontalResolution 123 ; \
     nmm:exposureTime 0.12345678901 ; \
     nfo:interlaceMode false ; \
     nie:contentCreated '2022-12-04T01:01:01Z' }";

fn nie(name: &str) -> String {
    format!("{NIE}{name}")
}

fn nfo(name: &str) -> String {
    format!("{NFO}{name}")
}

fn nmm(name: &str) -> String {
    format!("{NMM}{name}")
}

fn fixture_ontology() -> triplite::Ontology {
    let mut builder = OntologyBuilder::new();
    builder
        .class(
            ClassSpec::new(nie("InformationElement"), "nie:InformationElement")
                .super_class(RDFS_RESOURCE),
        )
        .class(ClassSpec::new(nfo("Media"), "nfo:Media").super_class(nie("InformationElement")))
        .class(ClassSpec::new(nfo("Visual"), "nfo:Visual").super_class(nfo("Media")))
        .class(
            ClassSpec::new(nfo("Image"), "nfo:Image")
                .super_class(nfo("Visual"))
                .domain_index(nie("contentCreated")),
        )
        .class(ClassSpec::new(nmm("Photo"), "nmm:Photo").super_class(nfo("Image")))
        .property(PropertySpec::new(
            nie("informationElementDate"),
            "nie:informationElementDate",
            PropertyKind::DateTime,
            nie("InformationElement"),
        ))
        .property(
            PropertySpec::new(
                nie("contentCreated"),
                "nie:contentCreated",
                PropertyKind::DateTime,
                nie("InformationElement"),
            )
            .super_property(nie("informationElementDate")),
        )
        .property(
            PropertySpec::new(
                nie("title"),
                "nie:title",
                PropertyKind::String,
                nie("InformationElement"),
            )
            .fulltext_indexed(),
        )
        .property(
            PropertySpec::new(
                nie("keyword"),
                "nie:keyword",
                PropertyKind::String,
                nie("InformationElement"),
            )
            .multiple_values()
            .fulltext_indexed(),
        )
        .property(PropertySpec::new(
            nie("comment"),
            "nie:comment",
            PropertyKind::LangString,
            nie("InformationElement"),
        ))
        .property(
            PropertySpec::new(
                nie("relatedTo"),
                "nie:relatedTo",
                PropertyKind::Resource,
                nie("InformationElement"),
            )
            .multiple_values(),
        )
        .property(PropertySpec::new(
            nfo("codec"),
            "nfo:codec",
            PropertyKind::String,
            nfo("Media"),
        ))
        .property(PropertySpec::new(
            nfo("interlaceMode"),
            "nfo:interlaceMode",
            PropertyKind::Boolean,
            nfo("Visual"),
        ))
        .property(PropertySpec::new(
            nfo("horizontalResolution"),
            "nfo:horizontalResolution",
            PropertyKind::Integer,
            nfo("Visual"),
        ))
        .property(PropertySpec::new(
            nmm("exposureTime"),
            "nmm:exposureTime",
            PropertyKind::Double,
            nmm("Photo"),
        ));
    builder.build().unwrap()
}

fn open_writer() -> Writer {
    Writer::new(DbInterface::open_in_memory().unwrap(), fixture_ontology()).unwrap()
}

fn update(writer: &mut Writer, sparql: &str) {
    writer
        .update_sparql(&format!("{PREFIXES}{sparql}"))
        .unwrap();
}

fn resource_id(writer: &Writer, uri: &str) -> Option<i64> {
    writer
        .database()
        .connection()
        .query_row("SELECT ID FROM Resource WHERE Uri = ?", [uri], |row| {
            row.get(0)
        })
        .optional()
        .unwrap()
}

fn count(writer: &Writer, sql: &str, params: impl rusqlite::Params) -> i64 {
    writer
        .database()
        .connection()
        .query_row(sql, params, |row| row.get(0))
        .unwrap()
}

fn single<T: rusqlite::types::FromSql>(
    writer: &Writer,
    sql: &str,
    params: impl rusqlite::Params,
) -> Option<T> {
    writer
        .database()
        .connection()
        .query_row(sql, params, |row| row.get(0))
        .optional()
        .unwrap()
}

fn type_count(writer: &Writer, id: i64) -> i64 {
    count(
        writer,
        "SELECT COUNT(*) FROM \"rdfs:Resource_rdf:type\" WHERE ID = ?",
        [id],
    )
}

fn modseq_of(writer: &Writer, id: i64) -> i64 {
    single(
        writer,
        "SELECT \"nrl:modified\" FROM \"rdfs:Resource\" WHERE ID = ?",
        [id],
    )
    .unwrap()
}

#[test]
fn inserts_a_photo_with_typed_values() {
    let mut writer = open_writer();
    update(&mut writer, PHOTO_INSERT_SPARQL);

    let id = resource_id(&writer, "ex:a").unwrap();
    // The whole superclass chain is materialized.
    assert_eq!(type_count(&writer, id), 6);
    assert_eq!(
        single::<String>(&writer, "SELECT \"nfo:codec\" FROM \"nfo:Media\" WHERE ID = ?", [id]),
        Some("png".to_owned())
    );
    assert_eq!(
        single::<i64>(
            &writer,
            "SELECT \"nfo:horizontalResolution\" FROM \"nfo:Visual\" WHERE ID = ?",
            [id]
        ),
        Some(123)
    );
    assert_eq!(
        single::<i64>(
            &writer,
            "SELECT \"nfo:interlaceMode\" FROM \"nfo:Visual\" WHERE ID = ?",
            [id]
        ),
        Some(0)
    );
    // Doubles survive bit-identically.
    assert_eq!(
        single::<f64>(
            &writer,
            "SELECT \"nmm:exposureTime\" FROM \"nmm:Photo\" WHERE ID = ?",
            [id]
        ),
        Some(0.12345678901)
    );
    // A UTC datetime with no fraction is stored as a plain timestamp.
    assert_eq!(
        single::<i64>(
            &writer,
            "SELECT \"nie:contentCreated\" FROM \"nie:InformationElement\" WHERE ID = ?",
            [id]
        ),
        Some(PHOTO_DATE)
    );
    // Single-valued super property receives the value too.
    assert_eq!(
        single::<i64>(
            &writer,
            "SELECT \"nie:informationElementDate\" FROM \"nie:InformationElement\" WHERE ID = ?",
            [id]
        ),
        Some(PHOTO_DATE)
    );
    // nfo:Image carries the domain-indexed copy.
    assert_eq!(
        single::<i64>(
            &writer,
            "SELECT \"nie:contentCreated\" FROM \"nfo:Image\" WHERE ID = ?",
            [id]
        ),
        Some(PHOTO_DATE)
    );
    let added: i64 = single(
        &writer,
        "SELECT \"nrl:added\" FROM \"rdfs:Resource\" WHERE ID = ?",
        [id],
    )
    .unwrap();
    assert!(added > 0);
    assert!(modseq_of(&writer, id) >= 1);
}

#[test]
fn every_transaction_stamps_one_modseq() {
    let mut writer = open_writer();
    update(&mut writer, "INSERT DATA { <ex:a> a nmm:Photo }");
    let first = modseq_of(&writer, resource_id(&writer, "ex:a").unwrap());

    // An empty transaction burns no modseq.
    writer.begin().unwrap();
    writer.commit().unwrap();

    update(&mut writer, "INSERT DATA { <ex:b> a nmm:Photo }");
    let second = modseq_of(&writer, resource_id(&writer, "ex:b").unwrap());
    assert_eq!(second, first + 1);
}

#[test]
fn repeated_inserts_are_idempotent() {
    let mut writer = open_writer();
    update(&mut writer, PHOTO_INSERT_SPARQL);
    update(&mut writer, PHOTO_INSERT_SPARQL);

    let id = resource_id(&writer, "ex:a").unwrap();
    assert_eq!(type_count(&writer, id), 6);
    assert_eq!(
        count(&writer, "SELECT COUNT(*) FROM \"nmm:Photo\" WHERE ID = ?", [id]),
        1
    );
}

#[test]
fn deleting_a_superclass_removes_its_subclasses() {
    let mut writer = open_writer();
    update(&mut writer, PHOTO_INSERT_SPARQL);
    let id = resource_id(&writer, "ex:a").unwrap();

    update(&mut writer, "DELETE DATA { <ex:a> a nfo:Media }");
    // Only rdfs:Resource and nie:InformationElement stay.
    assert_eq!(type_count(&writer, id), 2);
    assert_eq!(
        count(&writer, "SELECT COUNT(*) FROM \"nmm:Photo\" WHERE ID = ?", [id]),
        0
    );
    assert_eq!(
        count(&writer, "SELECT COUNT(*) FROM \"nfo:Media\" WHERE ID = ?", [id]),
        0
    );
}

#[test]
fn insert_and_whole_subject_delete_in_one_batch() {
    let mut writer = open_writer();
    update(
        &mut writer,
        "INSERT DATA { <ex:b> a nmm:Photo ; nfo:codec 'png' } ; \
         DELETE DATA { <ex:b> a rdfs:Resource }",
    );

    let id = resource_id(&writer, "ex:b").unwrap();
    assert_eq!(type_count(&writer, id), 0);
    assert_eq!(
        count(&writer, "SELECT COUNT(*) FROM \"rdfs:Resource\" WHERE ID = ?", [id]),
        0
    );
    assert_eq!(
        count(&writer, "SELECT COUNT(*) FROM \"nmm:Photo\" WHERE ID = ?", [id]),
        0
    );
}

#[test]
fn second_value_on_a_single_valued_property_is_rejected() {
    let mut writer = open_writer();
    update(&mut writer, PHOTO_INSERT_SPARQL);
    let err = writer
        .update_sparql(&format!(
            "{PREFIXES}INSERT DATA {{ <ex:a> nfo:codec 'jpg' }}"
        ))
        .unwrap_err();
    assert!(matches!(err, UpdateError::Constraint(_)));

    // The failed transaction was rolled back, the old value stays.
    let id = resource_id(&writer, "ex:a").unwrap();
    assert_eq!(
        single::<String>(&writer, "SELECT \"nfo:codec\" FROM \"nfo:Media\" WHERE ID = ?", [id]),
        Some("png".to_owned())
    );
}

#[test]
fn single_valued_conflict_rolls_back_the_whole_subject() {
    let mut writer = open_writer();
    let err = writer
        .update_sparql(&format!(
            "{PREFIXES}INSERT DATA {{ <ex:c> a nmm:Photo ; nfo:codec 'png' ; nfo:codec 'jpg' }}"
        ))
        .unwrap_err();
    assert!(matches!(err, UpdateError::Constraint(_)));
    assert_eq!(resource_id(&writer, "ex:c"), None);
}

#[test]
fn multi_valued_properties_have_set_semantics() {
    let mut writer = open_writer();
    let keyword_id = {
        let ontology = writer.ontology();
        ontology
            .property(ontology.property_by_iri(&nie("keyword")).unwrap())
            .id()
    };

    let events: Rc<RefCell<Vec<StatementEvent>>> = Rc::default();
    let sink = Rc::clone(&events);
    writer.add_insert_callback(move |event| sink.borrow_mut().push(event.clone()));
    let deletions: Rc<RefCell<Vec<StatementEvent>>> = Rc::default();
    let sink = Rc::clone(&deletions);
    writer.add_delete_callback(move |event| sink.borrow_mut().push(event.clone()));

    update(
        &mut writer,
        "INSERT DATA { <ex:a> a nmm:Photo ; nie:keyword 'sunset' ; nie:keyword 'sunset' }",
    );
    let id = resource_id(&writer, "ex:a").unwrap();
    assert_eq!(
        count(
            &writer,
            "SELECT COUNT(*) FROM \"nie:InformationElement_nie:keyword\" WHERE ID = ?",
            [id]
        ),
        1
    );
    let keyword_events: Vec<_> = events
        .borrow()
        .iter()
        .filter(|e| e.predicate_id == keyword_id)
        .cloned()
        .collect();
    assert_eq!(keyword_events.len(), 1);
    assert_eq!(keyword_events[0].object, "sunset");
    assert_eq!(keyword_events[0].subject, "ex:a");
    assert!(keyword_events[0].types.contains(&nmm("Photo")));

    update(&mut writer, "DELETE DATA { <ex:a> nie:keyword 'sunset' }");
    assert_eq!(
        count(
            &writer,
            "SELECT COUNT(*) FROM \"nie:InformationElement_nie:keyword\" WHERE ID = ?",
            [id]
        ),
        0
    );
    assert_eq!(
        deletions
            .borrow()
            .iter()
            .filter(|e| e.predicate_id == keyword_id)
            .count(),
        1
    );
}

#[test]
fn gaining_a_domain_index_class_mirrors_existing_values() {
    let mut writer = open_writer();
    update(
        &mut writer,
        "INSERT DATA { <ex:m> a nfo:Media ; nie:contentCreated '2022-12-04T01:01:01Z' }",
    );
    let id = resource_id(&writer, "ex:m").unwrap();
    assert_eq!(
        count(&writer, "SELECT COUNT(*) FROM \"nfo:Image\" WHERE ID = ?", [id]),
        0
    );

    update(&mut writer, "INSERT DATA { <ex:m> a nfo:Image }");
    assert_eq!(
        single::<i64>(
            &writer,
            "SELECT \"nie:contentCreated\" FROM \"nfo:Image\" WHERE ID = ?",
            [id]
        ),
        Some(PHOTO_DATE)
    );
}

#[test]
fn full_text_index_follows_updates_and_deletes() {
    let mut writer = open_writer();
    update(
        &mut writer,
        "INSERT DATA { <ex:a> a nmm:Photo ; nie:title 'hello world' ; nie:keyword 'sunset' }",
    );
    assert_eq!(count(&writer, "SELECT COUNT(*) FROM fts WHERE fts MATCH ?", ["hello"]), 1);
    assert_eq!(count(&writer, "SELECT COUNT(*) FROM fts WHERE fts MATCH ?", ["sunset"]), 1);

    // Overwriting the title leaves exactly one entry for the new text.
    writer.begin().unwrap();
    writer
        .update(
            None,
            "ex:a",
            &nie("title"),
            Some(&make_object_bytes("goodbye", None)),
        )
        .unwrap();
    writer.commit().unwrap();
    assert_eq!(count(&writer, "SELECT COUNT(*) FROM fts WHERE fts MATCH ?", ["hello"]), 0);
    assert_eq!(count(&writer, "SELECT COUNT(*) FROM fts WHERE fts MATCH ?", ["goodbye"]), 1);
    assert_eq!(count(&writer, "SELECT COUNT(*) FROM fts WHERE fts MATCH ?", ["sunset"]), 1);

    // Deleting every value erases the subject's text.
    writer.begin().unwrap();
    writer.delete_all(None, "ex:a", &nie("title")).unwrap();
    writer.commit().unwrap();
    assert_eq!(count(&writer, "SELECT COUNT(*) FROM fts WHERE fts MATCH ?", ["goodbye"]), 0);
    assert_eq!(count(&writer, "SELECT COUNT(*) FROM fts WHERE fts MATCH ?", ["sunset"]), 1);
}

#[test]
fn blank_node_labels_are_scoped_to_one_batch() {
    let mut writer = open_writer();

    // Same label twice in one batch: one subject.
    let bnodes = writer
        .update_sparql_blank(&format!(
            "{PREFIXES}INSERT DATA {{ _:b a nmm:Photo . _:b nfo:codec 'png' }}"
        ))
        .unwrap();
    assert_eq!(bnodes.len(), 1);
    assert!(bnodes.values().all(|uri| uri.starts_with("urn:bnode:")));
    let blank_photos = "SELECT COUNT(*) FROM \"nmm:Photo\" \
         INNER JOIN Resource ON Resource.ID = \"nmm:Photo\".ID \
         WHERE Resource.BlankNode = 1";
    assert_eq!(count(&writer, blank_photos, []), 1);

    // Same label in a second batch: a fresh subject.
    writer
        .update_sparql_blank(&format!("{PREFIXES}INSERT DATA {{ _:b a nmm:Photo }}"))
        .unwrap();
    assert_eq!(count(&writer, blank_photos, []), 2);
}

#[test]
fn parse_errors_roll_back_the_whole_batch() {
    let mut writer = open_writer();
    let err = writer
        .update_sparql(&format!(
            "{PREFIXES}INSERT DATA {{ <ex:r1> a nmm:Photo }} ; INSERT garbage"
        ))
        .unwrap_err();
    assert!(matches!(err, UpdateError::Parse(_)));
    assert_eq!(resource_id(&writer, "ex:r1"), None);
}

#[test]
fn unknown_classes_and_properties_are_refused() {
    let mut writer = open_writer();
    let err = writer
        .update_sparql("INSERT DATA { <ex:u> a <urn:NoSuchClass> }")
        .unwrap_err();
    assert!(matches!(err, UpdateError::UnknownClass(_)));

    let err = writer
        .update_sparql("INSERT DATA { <ex:u> <urn:noSuchProperty> 'x' }")
        .unwrap_err();
    assert!(matches!(err, UpdateError::UnknownProperty(_)));
    assert_eq!(resource_id(&writer, "ex:u"), None);
}

#[test]
fn uri_and_literal_objects_must_match_the_property_type() {
    let mut writer = open_writer();
    update(&mut writer, "INSERT DATA { <ex:a> a nmm:Photo }");

    writer.begin().unwrap();
    let err = writer
        .insert_with_uri(None, "ex:a", &nfo("codec"), &make_object_bytes("ex:o", None))
        .unwrap_err();
    assert!(matches!(err, UpdateError::Type(_)));
    let err = writer
        .insert_with_string(None, "ex:a", &nie("relatedTo"), &make_object_bytes("x", None))
        .unwrap_err();
    assert!(matches!(err, UpdateError::Type(_)));
    writer.rollback();
}

#[test]
fn property_domains_are_enforced() {
    let mut writer = open_writer();
    update(&mut writer, "INSERT DATA { <ex:i> a nie:InformationElement }");

    writer.begin().unwrap();
    let err = writer
        .insert(None, "ex:i", &nfo("codec"), &make_object_bytes("png", None))
        .unwrap_err();
    assert!(matches!(err, UpdateError::Constraint(_)));
    writer.rollback();
}

#[test]
fn resource_valued_properties_round_trip_through_delete_all() {
    let mut writer = open_writer();
    update(
        &mut writer,
        "INSERT DATA { <ex:a> a nmm:Photo . <ex:b> a nmm:Photo . \
         <ex:a> nie:relatedTo <ex:b> }",
    );
    let a = resource_id(&writer, "ex:a").unwrap();
    let b = resource_id(&writer, "ex:b").unwrap();
    assert_eq!(
        single::<i64>(
            &writer,
            "SELECT \"nie:relatedTo\" FROM \"nie:InformationElement_nie:relatedTo\" WHERE ID = ?",
            [a]
        ),
        Some(b)
    );

    writer.begin().unwrap();
    writer.delete_all(None, "ex:a", &nie("relatedTo")).unwrap();
    writer.commit().unwrap();
    assert_eq!(
        count(
            &writer,
            "SELECT COUNT(*) FROM \"nie:InformationElement_nie:relatedTo\" WHERE ID = ?",
            [a]
        ),
        0
    );
}

#[test]
fn update_with_null_wipes_a_multi_valued_property() {
    let mut writer = open_writer();
    update(
        &mut writer,
        "INSERT DATA { <ex:a> a nmm:Photo ; nie:keyword 'one' ; nie:keyword 'two' }",
    );
    let id = resource_id(&writer, "ex:a").unwrap();

    writer.begin().unwrap();
    writer.update(None, "ex:a", &nie("keyword"), None).unwrap();
    writer.commit().unwrap();
    assert_eq!(
        count(
            &writer,
            "SELECT COUNT(*) FROM \"nie:InformationElement_nie:keyword\" WHERE ID = ?",
            [id]
        ),
        0
    );
}

#[test]
fn update_of_rdf_type_with_null_is_unsupported() {
    let mut writer = open_writer();
    writer.begin().unwrap();
    let err = writer
        .update(
            None,
            "ex:a",
            "http://www.w3.org/1999/02/22-rdf-syntax-ns#type",
            None,
        )
        .unwrap_err();
    assert!(matches!(err, UpdateError::Unsupported(_)));
    writer.rollback();
}

#[test]
fn update_overwrites_the_singleton_value() {
    let mut writer = open_writer();
    update(&mut writer, PHOTO_INSERT_SPARQL);
    let id = resource_id(&writer, "ex:a").unwrap();

    writer.begin().unwrap();
    writer
        .update(None, "ex:a", &nfo("codec"), Some(&make_object_bytes("jpg", None)))
        .unwrap();
    writer.commit().unwrap();
    assert_eq!(
        single::<String>(&writer, "SELECT \"nfo:codec\" FROM \"nfo:Media\" WHERE ID = ?", [id]),
        Some("jpg".to_owned())
    );
}

#[test]
fn langtagged_strings_keep_their_tag() {
    let mut writer = open_writer();
    update(
        &mut writer,
        "INSERT DATA { <ex:a> a nmm:Photo ; nie:comment 'bonjour'@fr }",
    );
    let id = resource_id(&writer, "ex:a").unwrap();
    let stored: Vec<u8> = single(
        &writer,
        "SELECT \"nie:comment\" FROM \"nie:InformationElement\" WHERE ID = ?",
        [id],
    )
    .unwrap();
    assert_eq!(stored, make_object_bytes("bonjour", Some("fr")));

    // Deleting needs the same langtag to match.
    update(&mut writer, "DELETE DATA { <ex:a> nie:comment 'bonjour'@en }");
    assert!(single::<Option<Vec<u8>>>(
        &writer,
        "SELECT \"nie:comment\" FROM \"nie:InformationElement\" WHERE ID = ?",
        [id]
    )
    .unwrap()
    .is_some());
    update(&mut writer, "DELETE DATA { <ex:a> nie:comment 'bonjour'@fr }");
    assert!(single::<Option<Vec<u8>>>(
        &writer,
        "SELECT \"nie:comment\" FROM \"nie:InformationElement\" WHERE ID = ?",
        [id]
    )
    .unwrap()
    .is_none());
}

fn photo_resource(
    uri: &str,
    codec: &str,
    interlaced: bool,
    resolution: i64,
    exposure: f64,
) -> Resource {
    let mut resource = Resource::new(uri);
    resource
        .set(
            "http://www.w3.org/1999/02/22-rdf-syntax-ns#type",
            ResourceValue::Uri(nmm("Photo")),
        )
        .set(&nfo("codec"), ResourceValue::String(codec.to_owned()))
        .set(&nfo("interlaceMode"), ResourceValue::Boolean(interlaced))
        .set(
            &nfo("horizontalResolution"),
            ResourceValue::Integer(resolution),
        )
        .set(&nmm("exposureTime"), ResourceValue::Double(exposure))
        .set(
            &nie("contentCreated"),
            ResourceValue::DateTime(DateTime::from_iso8601("2022-12-04T01:01:01Z").unwrap()),
        );
    resource
}

#[test]
fn the_second_write_of_a_resource_wins_within_one_batch() {
    let mut writer = open_writer();
    writer.begin().unwrap();
    writer
        .update_resource(None, &photo_resource("ex:d", "png", true, 234, 1.23456789012))
        .unwrap();
    writer
        .update_resource(None, &photo_resource("ex:d", "png", false, 123, 0.12345678901))
        .unwrap();
    writer.commit().unwrap();

    let id = resource_id(&writer, "ex:d").unwrap();
    assert_eq!(
        single::<i64>(
            &writer,
            "SELECT \"nfo:horizontalResolution\" FROM \"nfo:Visual\" WHERE ID = ?",
            [id]
        ),
        Some(123)
    );
    assert_eq!(
        single::<i64>(
            &writer,
            "SELECT \"nfo:interlaceMode\" FROM \"nfo:Visual\" WHERE ID = ?",
            [id]
        ),
        Some(0)
    );
    assert_eq!(
        single::<f64>(
            &writer,
            "SELECT \"nmm:exposureTime\" FROM \"nmm:Photo\" WHERE ID = ?",
            [id]
        ),
        Some(0.12345678901)
    );
}

#[test]
fn nested_resources_are_written_before_their_reference() {
    let mut writer = open_writer();
    let mut child = Resource::new("_:child");
    child.set(
        "http://www.w3.org/1999/02/22-rdf-syntax-ns#type",
        ResourceValue::Uri(nmm("Photo")),
    );
    let child = Arc::new(child);

    let mut parent = Resource::new("ex:parent");
    parent
        .set(
            "http://www.w3.org/1999/02/22-rdf-syntax-ns#type",
            ResourceValue::Uri(nmm("Photo")),
        )
        // The same node twice, once nested and once by label.
        .add(&nie("relatedTo"), ResourceValue::Resource(Arc::clone(&child)))
        .add(&nie("relatedTo"), ResourceValue::Uri("_:child".to_owned()));

    writer.begin().unwrap();
    writer.update_resource(None, &parent).unwrap();
    writer.commit().unwrap();

    let id = resource_id(&writer, "ex:parent").unwrap();
    // Both references resolve to one blank node, and set semantics
    // collapse them into one row.
    assert_eq!(
        count(
            &writer,
            "SELECT COUNT(*) FROM \"nie:InformationElement_nie:relatedTo\" WHERE ID = ?",
            [id]
        ),
        1
    );
    assert_eq!(
        count(
            &writer,
            "SELECT COUNT(*) FROM \"nmm:Photo\" INNER JOIN Resource \
             ON Resource.ID = \"nmm:Photo\".ID WHERE Resource.BlankNode = 1",
            []
        ),
        1
    );
}

#[test]
fn named_graphs_get_their_own_database() {
    let mut writer = open_writer();
    update(
        &mut writer,
        "INSERT DATA { GRAPH <http://example.com/g> { <ex:s> a nmm:Photo ; nfo:codec 'png' } }",
    );

    let id = resource_id(&writer, "ex:s").unwrap();
    assert_eq!(
        count(
            &writer,
            "SELECT COUNT(*) FROM \"http://example.com/g\".\"nmm:Photo\" WHERE ID = ?",
            [id]
        ),
        1
    );
    // The default graph is untouched.
    assert_eq!(
        count(&writer, "SELECT COUNT(*) FROM \"nmm:Photo\" WHERE ID = ?", [id]),
        0
    );
    assert_eq!(count(&writer, "SELECT COUNT(*) FROM Graph", []), 1);
}

#[test]
fn graphs_can_be_created_and_dropped() {
    let mut writer = open_writer();
    writer
        .update_sparql("CREATE GRAPH <http://example.com/g>")
        .unwrap();
    assert_eq!(count(&writer, "SELECT COUNT(*) FROM Graph", []), 1);

    writer
        .update_sparql("DROP GRAPH <http://example.com/g>")
        .unwrap();
    assert_eq!(count(&writer, "SELECT COUNT(*) FROM Graph", []), 0);

    let err = writer
        .update_sparql("DROP GRAPH <http://example.com/missing>")
        .unwrap_err();
    assert!(matches!(err, UpdateError::UnknownGraph(_)));
    writer
        .update_sparql("DROP SILENT GRAPH <http://example.com/missing>")
        .unwrap();
}

#[test]
fn turtle_files_stream_into_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("photo.ttl");
    std::fs::write(
        &path,
        format!(
            "@prefix nmm: <{NMM}> .\n\
             @prefix nie: <{NIE}> .\n\
             <ex:t> a nmm:Photo ;\n\
                 nie:title \"hello turtle\" ;\n\
                 nie:comment \"bonjour\"@fr .\n"
        ),
    )
    .unwrap();

    let mut writer = open_writer();
    writer.begin().unwrap();
    writer.load_turtle(&path, None).unwrap();
    writer.commit().unwrap();

    let id = resource_id(&writer, "ex:t").unwrap();
    assert_eq!(
        single::<String>(
            &writer,
            "SELECT \"nie:title\" FROM \"nie:InformationElement\" WHERE ID = ?",
            [id]
        ),
        Some("hello turtle".to_owned())
    );
    assert_eq!(
        single::<Vec<u8>>(
            &writer,
            "SELECT \"nie:comment\" FROM \"nie:InformationElement\" WHERE ID = ?",
            [id]
        ),
        Some(make_object_bytes("bonjour", Some("fr")))
    );
    assert_eq!(count(&writer, "SELECT COUNT(*) FROM fts WHERE fts MATCH ?", ["turtle"]), 1);
}

#[test]
fn commit_and_rollback_observers_fire() {
    let mut writer = open_writer();
    let commits = Rc::new(RefCell::new(0));
    let rollbacks = Rc::new(RefCell::new(0));
    let sink = Rc::clone(&commits);
    let commit_id = writer.add_commit_callback(move || *sink.borrow_mut() += 1);
    let sink = Rc::clone(&rollbacks);
    writer.add_rollback_callback(move || *sink.borrow_mut() += 1);

    update(&mut writer, "INSERT DATA { <ex:a> a nmm:Photo }");
    assert_eq!(*commits.borrow(), 1);
    assert_eq!(*rollbacks.borrow(), 0);

    writer.begin().unwrap();
    writer.rollback();
    assert_eq!(*commits.borrow(), 1);
    assert_eq!(*rollbacks.borrow(), 1);

    assert!(writer.remove_commit_callback(commit_id));
    writer.begin().unwrap();
    writer.commit().unwrap();
    assert_eq!(*commits.borrow(), 1);
}

#[test]
fn file_backed_stores_reopen_with_the_same_ontology() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.db");
    {
        let mut writer =
            Writer::new(DbInterface::open(&path).unwrap(), fixture_ontology()).unwrap();
        update(&mut writer, PHOTO_INSERT_SPARQL);
    }

    let writer = Writer::new(DbInterface::open(&path).unwrap(), fixture_ontology()).unwrap();
    let id = resource_id(&writer, "ex:a").unwrap();
    assert_eq!(type_count(&writer, id), 6);
    // Reinstalling the ontology did not duplicate or restamp anything.
    let photo = resource_id(&writer, &nmm("Photo")).unwrap();
    assert!(photo <= triplite::ONTOLOGY_MAX_ID);
    assert_eq!(modseq_of(&writer, photo), 1);
}

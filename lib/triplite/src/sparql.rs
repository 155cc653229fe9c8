//! Translation of parsed SPARQL updates into the statement API.
//!
//! Parsing is `spargebra`'s job; this module walks the resulting
//! operations and feeds ground quads to the writer. Only data forms are
//! executable — pattern-based updates would need the query engine,
//! which lives outside this crate.

use crate::error::UpdateError;
use crate::value::make_object_bytes;
use crate::writer::Writer;
use oxrdf::{NamedOrBlankNode, Term};
use spargebra::algebra::GraphTarget;
use spargebra::term::{GraphName, GroundQuad, GroundTerm, Quad};
use spargebra::{GraphUpdateOperation, SparqlParser};
use std::collections::{BTreeMap, HashMap};

/// Executes an update inside the writer's open transaction and returns
/// the blank-node label → minted URI map of the batch.
pub(crate) fn execute_update(
    writer: &mut Writer,
    update: &str,
) -> Result<BTreeMap<String, String>, UpdateError> {
    let update = SparqlParser::new().parse_update(update)?;
    let mut bnodes: HashMap<String, String> = HashMap::new();
    for operation in update.operations {
        match operation {
            GraphUpdateOperation::InsertData { data } => {
                for quad in &data {
                    insert_quad(writer, quad, &mut bnodes)?;
                    writer.might_flush()?;
                }
            }
            GraphUpdateOperation::DeleteData { data } => {
                // Deletes must observe the inserts staged earlier in
                // this batch.
                writer.flush_buffer()?;
                for quad in &data {
                    delete_quad(writer, quad)?;
                    writer.might_flush()?;
                }
            }
            GraphUpdateOperation::Create { graph, .. } => {
                writer.ensure_graph(graph.as_str())?;
            }
            GraphUpdateOperation::Drop {
                graph: GraphTarget::NamedNode(graph),
                silent,
            } => {
                if let Err(e) = writer.delete_graph(graph.as_str()) {
                    if !silent {
                        return Err(e);
                    }
                }
            }
            _ => {
                return Err(UpdateError::Unsupported(
                    "Only INSERT DATA, DELETE DATA, CREATE and DROP are supported".to_owned(),
                ))
            }
        }
    }
    Ok(bnodes.into_iter().collect())
}

fn graph_name(graph: &GraphName) -> Option<&str> {
    match graph {
        GraphName::NamedNode(n) => Some(n.as_str()),
        GraphName::DefaultGraph => None,
    }
}

fn insert_quad(
    writer: &mut Writer,
    quad: &Quad,
    bnodes: &mut HashMap<String, String>,
) -> Result<(), UpdateError> {
    let graph = graph_name(&quad.graph_name).map(ToOwned::to_owned);
    let subject = match &quad.subject {
        NamedOrBlankNode::NamedNode(n) => n.as_str().to_owned(),
        NamedOrBlankNode::BlankNode(b) => writer.bnode_uri(bnodes, b.as_str())?,
    };
    let predicate = quad.predicate.as_str();
    match &quad.object {
        Term::NamedNode(n) => writer.insert_with_uri(
            graph.as_deref(),
            &subject,
            predicate,
            &make_object_bytes(n.as_str(), None),
        ),
        Term::BlankNode(b) => {
            let uri = writer.bnode_uri(bnodes, b.as_str())?;
            writer.insert_with_uri(
                graph.as_deref(),
                &subject,
                predicate,
                &make_object_bytes(&uri, None),
            )
        }
        Term::Literal(literal) => writer.insert_with_string(
            graph.as_deref(),
            &subject,
            predicate,
            &make_object_bytes(literal.value(), literal.language()),
        ),
        _ => Err(UpdateError::Unsupported(
            "Only named node, blank node and literal objects are supported".to_owned(),
        )),
    }
}

fn delete_quad(writer: &mut Writer, quad: &GroundQuad) -> Result<(), UpdateError> {
    let graph = graph_name(&quad.graph_name).map(ToOwned::to_owned);
    let subject = quad.subject.as_str().to_owned();
    let predicate = quad.predicate.as_str();
    match &quad.object {
        GroundTerm::NamedNode(n) => writer.delete(
            graph.as_deref(),
            &subject,
            predicate,
            &make_object_bytes(n.as_str(), None),
        ),
        GroundTerm::Literal(literal) => writer.delete(
            graph.as_deref(),
            &subject,
            predicate,
            &make_object_bytes(literal.value(), literal.language()),
        ),
        _ => Err(UpdateError::Unsupported(
            "Only named node and literal objects can be deleted".to_owned(),
        )),
    }
}

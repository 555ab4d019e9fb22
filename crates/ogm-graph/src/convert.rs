//! Conversion of neo4rs rows into untyped [`RawGraph`] data.
//!
//! Rows may carry nodes, relations, or lists of either (as produced by
//! `nodes(p)` / `relationships(p)`). Elements are de-duplicated by their
//! store-internal id; relations are attached to their endpoint nodes once all
//! rows have been seen.

use std::collections::BTreeMap;

use ogm_core::{Properties, PropertyValue, RawGraph, RawNode, RawRelation};

/// Read a scalar property from a neo4rs node or relation.
macro_rules! scalar {
    ($entity:expr, $key:expr) => {
        $entity
            .get::<bool>($key)
            .map(PropertyValue::Bool)
            .or_else(|_| $entity.get::<i64>($key).map(PropertyValue::Int))
            .or_else(|_| $entity.get::<f64>($key).map(PropertyValue::Float))
            .or_else(|_| $entity.get::<String>($key).map(PropertyValue::String))
            .ok()
    };
}

struct PendingRelation {
    rel_type: String,
    properties: Properties,
    start: i64,
    end: i64,
}

/// Accumulates graph elements across the rows of one result.
#[derive(Default)]
pub struct RawGraphBuilder {
    nodes: BTreeMap<i64, RawNode>,
    relations: BTreeMap<i64, PendingRelation>,
}

impl RawGraphBuilder {
    /// Collect every graph value found in `columns` of `row`.
    pub fn add_row(&mut self, row: &neo4rs::Row, columns: &[String]) {
        for column in columns {
            let column = column.as_str();
            if let Ok(node) = row.get::<neo4rs::Node>(column) {
                self.add_node(&node);
            } else if let Ok(rel) = row.get::<neo4rs::Relation>(column) {
                self.add_relation(&rel);
            } else if let Ok(nodes) = row.get::<Vec<neo4rs::Node>>(column) {
                nodes.iter().for_each(|n| self.add_node(n));
            } else if let Ok(rels) = row.get::<Vec<neo4rs::Relation>>(column) {
                rels.iter().for_each(|r| self.add_relation(r));
            } else {
                tracing::trace!(column, "Column holds no graph value");
            }
        }
    }

    pub fn add_node(&mut self, node: &neo4rs::Node) {
        self.nodes.entry(node.id()).or_insert_with(|| {
            let mut properties = Properties::new();
            for key in node.keys() {
                match scalar!(node, key) {
                    Some(value) => {
                        properties.insert(key.to_string(), value);
                    }
                    None => tracing::debug!(key, "Skipping non-scalar node property"),
                }
            }
            RawNode {
                labels: node.labels().into_iter().map(str::to_string).collect(),
                properties,
            }
        });
    }

    pub fn add_relation(&mut self, rel: &neo4rs::Relation) {
        self.relations.entry(rel.id()).or_insert_with(|| {
            let mut properties = Properties::new();
            for key in rel.keys() {
                match scalar!(rel, key) {
                    Some(value) => {
                        properties.insert(key.to_string(), value);
                    }
                    None => tracing::debug!(key, "Skipping non-scalar relation property"),
                }
            }
            PendingRelation {
                rel_type: rel.typ().to_string(),
                properties,
                start: rel.start_node_id(),
                end: rel.end_node_id(),
            }
        });
    }

    /// Attach endpoints and produce the raw graph.
    ///
    /// Relations whose endpoints were not part of the result are dropped.
    pub fn finish(self) -> RawGraph {
        let mut relations = Vec::with_capacity(self.relations.len());
        for (id, pending) in self.relations {
            match (self.nodes.get(&pending.start), self.nodes.get(&pending.end)) {
                (Some(start), Some(end)) => relations.push(RawRelation {
                    rel_type: pending.rel_type,
                    properties: pending.properties,
                    start: start.clone(),
                    end: end.clone(),
                }),
                _ => tracing::warn!(
                    relation = id,
                    rel_type = %pending.rel_type,
                    "Dropping relation whose endpoints were not returned"
                ),
            }
        }

        RawGraph {
            nodes: self.nodes.into_values().collect(),
            relations,
        }
    }
}

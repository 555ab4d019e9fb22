//! Untyped graph data as returned by a session, before type resolution.

use serde::{Deserialize, Serialize};

use crate::types::{EntityId, LabelSet, Properties, PropertyValue, ID_KEY};

/// A node as the store reports it: labels plus raw properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawNode {
    pub labels: LabelSet,
    pub properties: Properties,
}

impl RawNode {
    /// The mapped identity, if the node carries one.
    pub fn entity_id(&self) -> Option<EntityId> {
        match self.properties.get(ID_KEY) {
            Some(PropertyValue::String(s)) => Some(EntityId(s.clone())),
            _ => None,
        }
    }
}

/// A relation as the store reports it, with both endpoint nodes attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRelation {
    pub rel_type: String,
    pub properties: Properties,
    pub start: RawNode,
    pub end: RawNode,
}

impl RawRelation {
    pub fn entity_id(&self) -> Option<EntityId> {
        match self.properties.get(ID_KEY) {
            Some(PropertyValue::String(s)) => Some(EntityId(s.clone())),
            _ => None,
        }
    }
}

/// Every node and relation collected from one result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawGraph {
    pub nodes: Vec<RawNode>,
    pub relations: Vec<RawRelation>,
}

impl RawGraph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.relations.is_empty()
    }
}

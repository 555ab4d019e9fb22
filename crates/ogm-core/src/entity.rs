//! Nodes and relations as mapped onto the property graph.
//!
//! Entities are plain values. A relation never owns its endpoints; it records
//! the ids of the two nodes it connects, and lookups go through the
//! [`StagedGraph`] that holds them.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{OgmError, Result};
use crate::staged::StagedGraph;
use crate::types::{label_set, EntityId, LabelSet, Properties, PropertyValue, ID_KEY};

// ── Typed application entities ───────────────────────────────────

/// An application struct that maps onto a graph node.
///
/// Fields are serialized into the node's property map and must be scalars.
/// `None` fields are omitted.
pub trait NodeEntity: Serialize + DeserializeOwned {
    /// Declared type name.
    const TYPE_NAME: &'static str;

    /// Explicit static labels. `None` means the type name is the only label.
    fn labels() -> Option<LabelSet> {
        None
    }

    fn static_labels() -> LabelSet {
        Self::labels().unwrap_or_else(|| label_set([Self::TYPE_NAME]))
    }
}

/// An application struct that maps onto a typed graph relation.
pub trait RelationEntity: Serialize + DeserializeOwned {
    const TYPE_NAME: &'static str;
}

// ── Node ─────────────────────────────────────────────────────────

/// A typed graph node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    id: Option<EntityId>,
    type_name: String,
    static_labels: LabelSet,
    dyn_labels: LabelSet,
    properties: Properties,
}

impl Node {
    /// A new, unstaged node whose only static label is its type name.
    pub fn new(type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        let static_labels = label_set([type_name.clone()]);
        Self::with_labels(type_name, static_labels)
    }

    /// A new, unstaged node with an explicit static label set.
    pub fn with_labels(type_name: impl Into<String>, static_labels: LabelSet) -> Self {
        Self {
            id: None,
            type_name: type_name.into(),
            static_labels,
            dyn_labels: LabelSet::new(),
            properties: Properties::new(),
        }
    }

    /// Rebuild a node from stored state.
    pub(crate) fn from_parts(
        id: Option<EntityId>,
        type_name: String,
        static_labels: LabelSet,
        dyn_labels: LabelSet,
        properties: Properties,
    ) -> Self {
        Self {
            id,
            type_name,
            static_labels,
            dyn_labels,
            properties,
        }
    }

    /// Map a typed application struct onto an unstaged node.
    pub fn from_entity<T: NodeEntity>(entity: &T) -> Result<Self> {
        let mut node = Self::with_labels(T::TYPE_NAME, T::static_labels());
        node.properties = properties_from_serialize(entity)?;
        Ok(node)
    }

    /// Rebuild the typed application struct from this node's properties.
    pub fn to_entity<T: NodeEntity>(&self) -> Result<T> {
        if self.type_name != T::TYPE_NAME {
            return Err(OgmError::TypeMismatch {
                expected: T::TYPE_NAME.to_string(),
                found: self.type_name.clone(),
            });
        }
        properties_to_deserialize(&self.properties)
    }

    pub fn id(&self) -> Option<&EntityId> {
        self.id.as_ref()
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn static_labels(&self) -> &LabelSet {
        &self.static_labels
    }

    pub fn dyn_labels(&self) -> &LabelSet {
        &self.dyn_labels
    }

    /// Static labels united with dynamic labels.
    pub fn labels(&self) -> LabelSet {
        self.static_labels.union(&self.dyn_labels).cloned().collect()
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// Set a property. The identity key is reserved and ignored.
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<PropertyValue>) {
        let key = key.into();
        if key != ID_KEY {
            self.properties.insert(key, value.into());
        }
    }

    pub fn remove_property(&mut self, key: &str) -> Option<PropertyValue> {
        self.properties.remove(key)
    }

    // ── Dynamic labels ───────────────────────────────────────────

    /// Add a dynamic (object-specific) label. Returns false if the node
    /// already carries it, statically or dynamically.
    pub fn add_label(&mut self, label: impl Into<String>) -> bool {
        let label = label.into();
        if self.static_labels.contains(&label) {
            return false;
        }
        self.dyn_labels.insert(label)
    }

    pub fn add_labels<I, S>(&mut self, labels: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for label in labels {
            self.add_label(label);
        }
    }

    /// Remove a dynamic label. Static labels are never touched.
    pub fn remove_label(&mut self, label: &str) -> bool {
        self.dyn_labels.remove(label)
    }

    pub fn remove_labels<'a, I>(&mut self, labels: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for label in labels {
            self.dyn_labels.remove(label);
        }
    }

    // ── Staging ──────────────────────────────────────────────────

    /// Stage creation of this node in `graph`, assigning its id.
    pub fn create(&mut self, graph: &mut StagedGraph) -> Result<EntityId> {
        graph.create_node(self)
    }

    /// Stage an update of this node's labels and properties.
    pub fn update(&self, graph: &mut StagedGraph) -> Result<()> {
        graph.set_node(self)
    }

    /// Stage deletion of this node.
    pub fn delete(&self, graph: &mut StagedGraph) -> Result<()> {
        graph.delete_node(self)
    }

    /// Build an unstaged relation from this node to `end`.
    pub fn connect_to(&self, end: &Node, relation_type: impl Into<String>) -> Relation {
        Relation::between(relation_type, self, end)
    }

    /// Build an unstaged relation from `start` to this node.
    pub fn connect_from(&self, start: &Node, relation_type: impl Into<String>) -> Relation {
        Relation::between(relation_type, start, self)
    }

    pub(crate) fn assign_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }
}

// ── Relation ─────────────────────────────────────────────────────

/// A typed, directed relation between two node identities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    id: Option<EntityId>,
    rel_type: String,
    node_a: Option<EntityId>,
    node_b: Option<EntityId>,
    properties: Properties,
}

impl Relation {
    /// A new, unstaged relation from `node_a` to `node_b`.
    ///
    /// Endpoint ids are captured now; an endpoint that has not been created
    /// yet stays unresolved and the relation cannot be staged.
    pub fn between(rel_type: impl Into<String>, node_a: &Node, node_b: &Node) -> Self {
        Self::between_ids(rel_type, node_a.id().cloned(), node_b.id().cloned())
    }

    pub fn between_ids(
        rel_type: impl Into<String>,
        node_a: Option<EntityId>,
        node_b: Option<EntityId>,
    ) -> Self {
        Self {
            id: None,
            rel_type: rel_type.into(),
            node_a,
            node_b,
            properties: Properties::new(),
        }
    }

    pub(crate) fn from_parts(
        id: Option<EntityId>,
        rel_type: String,
        node_a: Option<EntityId>,
        node_b: Option<EntityId>,
        properties: Properties,
    ) -> Self {
        Self {
            id,
            rel_type,
            node_a,
            node_b,
            properties,
        }
    }

    /// Map a typed application struct onto an unstaged relation.
    pub fn from_entity<T: RelationEntity>(entity: &T, node_a: &Node, node_b: &Node) -> Result<Self> {
        let mut relation = Self::between(T::TYPE_NAME, node_a, node_b);
        relation.properties = properties_from_serialize(entity)?;
        Ok(relation)
    }

    pub fn to_entity<T: RelationEntity>(&self) -> Result<T> {
        if self.rel_type != T::TYPE_NAME {
            return Err(OgmError::TypeMismatch {
                expected: T::TYPE_NAME.to_string(),
                found: self.rel_type.clone(),
            });
        }
        properties_to_deserialize(&self.properties)
    }

    pub fn id(&self) -> Option<&EntityId> {
        self.id.as_ref()
    }

    pub fn rel_type(&self) -> &str {
        &self.rel_type
    }

    pub fn node_a(&self) -> Option<&EntityId> {
        self.node_a.as_ref()
    }

    pub fn node_b(&self) -> Option<&EntityId> {
        self.node_b.as_ref()
    }

    /// Both endpoint ids, or [`OgmError::UnresolvedEndpoint`].
    pub fn endpoints(&self) -> Result<(&EntityId, &EntityId)> {
        let a = self.node_a.as_ref().ok_or_else(|| self.unresolved("node_a"))?;
        let b = self.node_b.as_ref().ok_or_else(|| self.unresolved("node_b"))?;
        Ok((a, b))
    }

    /// Whether either endpoint is `node_id`.
    pub fn touches(&self, node_id: &EntityId) -> bool {
        self.node_a.as_ref() == Some(node_id) || self.node_b.as_ref() == Some(node_id)
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<PropertyValue>) {
        let key = key.into();
        if key != ID_KEY {
            self.properties.insert(key, value.into());
        }
    }

    pub fn remove_property(&mut self, key: &str) -> Option<PropertyValue> {
        self.properties.remove(key)
    }

    pub fn create(&mut self, graph: &mut StagedGraph) -> Result<EntityId> {
        graph.create_relation(self)
    }

    pub fn update(&self, graph: &mut StagedGraph) -> Result<()> {
        graph.set_relation(self)
    }

    pub fn delete(&self, graph: &mut StagedGraph) -> Result<()> {
        graph.delete_relation(self)
    }

    pub(crate) fn assign_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }

    fn unresolved(&self, endpoint: &'static str) -> OgmError {
        OgmError::UnresolvedEndpoint {
            relation_type: self.rel_type.clone(),
            endpoint,
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────

fn properties_from_serialize<T: Serialize>(entity: &T) -> Result<Properties> {
    let value = serde_json::to_value(entity)?;
    let serde_json::Value::Object(map) = value else {
        return Err(OgmError::UnsupportedProperty {
            key: "<root>".to_string(),
        });
    };

    let mut props = Properties::new();
    for (key, value) in map {
        if value.is_null() || key == ID_KEY {
            continue;
        }
        match PropertyValue::from_json(&value) {
            Some(v) => {
                props.insert(key, v);
            }
            None => return Err(OgmError::UnsupportedProperty { key }),
        }
    }
    Ok(props)
}

fn properties_to_deserialize<T: DeserializeOwned>(props: &Properties) -> Result<T> {
    let map: serde_json::Map<String, serde_json::Value> = props
        .iter()
        .map(|(k, v)| (k.clone(), v.to_json()))
        .collect();
    Ok(serde_json::from_value(serde_json::Value::Object(map))?)
}

//! Type registry: label sets and relation type names mapped to entity types.
//!
//! The registry is an explicit value built once during setup and then passed
//! to every resolve and read call. Node types are inferred from raw label
//! sets by maximum intersection; relation types are looked up by exact name.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::entity::{Node, NodeEntity, Relation, RelationEntity};
use crate::error::{OgmError, Result};
use crate::raw::{RawNode, RawRelation};
use crate::types::{label_set, validate_name, LabelSet, ID_KEY};

/// Registered node type: name plus the static labels that identify it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDescriptor {
    pub type_name: String,
    pub labels: LabelSet,
}

impl NodeDescriptor {
    /// Descriptor whose only static label is the type name.
    pub fn new(type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        Self {
            labels: label_set([type_name.clone()]),
            type_name,
        }
    }

    /// Descriptor with an explicit static label set. An empty set falls back
    /// to the type name.
    pub fn with_labels(type_name: impl Into<String>, labels: LabelSet) -> Self {
        let mut descriptor = Self::new(type_name);
        if !labels.is_empty() {
            descriptor.labels = labels;
        }
        descriptor
    }

    /// A fresh, unstaged node of this type.
    pub fn instantiate(&self) -> Node {
        Node::with_labels(self.type_name.clone(), self.labels.clone())
    }
}

/// Registered relation type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDescriptor {
    pub type_name: String,
}

impl RelationDescriptor {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
        }
    }
}

/// A resolved relation together with its resolved endpoint nodes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedRelation {
    pub relation: Relation,
    pub start: Node,
    pub end: Node,
}

#[derive(Debug, Default, Clone)]
pub struct TypeRegistry {
    nodes_by_labels: BTreeMap<LabelSet, NodeDescriptor>,
    // Ordered by type name so inference ties resolve to the smallest name.
    nodes_by_name: BTreeMap<String, LabelSet>,
    relations: BTreeMap<String, RelationDescriptor>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Registration ─────────────────────────────────────────────

    pub fn register_node(&mut self, descriptor: NodeDescriptor) -> Result<()> {
        validate_name(&descriptor.type_name)?;
        for label in &descriptor.labels {
            validate_name(label)?;
        }
        if let Some(existing) = self.nodes_by_labels.get(&descriptor.labels) {
            return Err(OgmError::DuplicateLabelSet {
                labels: descriptor.labels.clone(),
                existing: existing.type_name.clone(),
            });
        }
        if self.nodes_by_name.contains_key(&descriptor.type_name) {
            return Err(OgmError::DuplicateTypeName(descriptor.type_name));
        }

        tracing::debug!(
            type_name = %descriptor.type_name,
            labels = ?descriptor.labels,
            "Registered node type"
        );
        self.nodes_by_name
            .insert(descriptor.type_name.clone(), descriptor.labels.clone());
        self.nodes_by_labels
            .insert(descriptor.labels.clone(), descriptor);
        Ok(())
    }

    pub fn register_relation(&mut self, descriptor: RelationDescriptor) -> Result<()> {
        validate_name(&descriptor.type_name)?;
        if self.relations.contains_key(&descriptor.type_name) {
            return Err(OgmError::DuplicateTypeName(descriptor.type_name));
        }

        tracing::debug!(type_name = %descriptor.type_name, "Registered relation type");
        self.relations
            .insert(descriptor.type_name.clone(), descriptor);
        Ok(())
    }

    /// Register a typed node struct.
    pub fn register<T: NodeEntity>(&mut self) -> Result<()> {
        self.register_node(NodeDescriptor::with_labels(
            T::TYPE_NAME,
            T::labels().unwrap_or_default(),
        ))
    }

    /// Register a typed relation struct.
    pub fn register_relation_type<T: RelationEntity>(&mut self) -> Result<()> {
        self.register_relation(RelationDescriptor::new(T::TYPE_NAME))
    }

    // ── Lookups ──────────────────────────────────────────────────

    pub fn node_type(&self, type_name: &str) -> Option<&NodeDescriptor> {
        self.nodes_by_name
            .get(type_name)
            .and_then(|labels| self.nodes_by_labels.get(labels))
    }

    pub fn relation_type(&self, type_name: &str) -> Option<&RelationDescriptor> {
        self.relations.get(type_name)
    }

    pub fn node_types(&self) -> impl Iterator<Item = &NodeDescriptor> {
        self.nodes_by_name
            .values()
            .filter_map(|labels| self.nodes_by_labels.get(labels))
    }

    pub fn relation_types(&self) -> impl Iterator<Item = &RelationDescriptor> {
        self.relations.values()
    }

    // ── Resolution ───────────────────────────────────────────────

    /// Pick the node type with the largest label intersection.
    ///
    /// Among equal intersections the type with fewer static labels missing
    /// from `labels` wins, then the lexicographically smallest type name.
    /// Returns the descriptor and the residual (dynamic) labels.
    pub fn infer_node_type(&self, labels: &LabelSet) -> Result<(&NodeDescriptor, LabelSet)> {
        let mut best: Option<(&NodeDescriptor, usize, usize)> = None;
        for descriptor in self.node_types() {
            let overlap = descriptor.labels.intersection(labels).count();
            if overlap == 0 {
                continue;
            }
            let missing = descriptor.labels.len() - overlap;
            // Strict comparison: names are visited in order, so the first
            // candidate of an equal rank keeps the smallest name.
            let better = match best {
                None => true,
                Some((_, best_overlap, best_missing)) => {
                    overlap > best_overlap || (overlap == best_overlap && missing < best_missing)
                }
            };
            if better {
                best = Some((descriptor, overlap, missing));
            }
        }

        let (descriptor, _, _) =
            best.ok_or_else(|| OgmError::UnresolvableType(format!("labels {labels:?}")))?;
        let residual = labels.difference(&descriptor.labels).cloned().collect();
        Ok((descriptor, residual))
    }

    /// Convert a raw node into a typed node.
    pub fn resolve_node(&self, raw: &RawNode) -> Result<Node> {
        let (descriptor, dyn_labels) = self.infer_node_type(&raw.labels)?;
        let mut properties = raw.properties.clone();
        properties.remove(ID_KEY);

        Ok(Node::from_parts(
            raw.entity_id(),
            descriptor.type_name.clone(),
            descriptor.labels.clone(),
            dyn_labels,
            properties,
        ))
    }

    /// Convert a raw relation into a typed relation, resolving both endpoints.
    pub fn resolve_relation(&self, raw: &RawRelation) -> Result<ResolvedRelation> {
        let descriptor = self
            .relations
            .get(&raw.rel_type)
            .ok_or_else(|| OgmError::UnresolvableType(format!("relation type {}", raw.rel_type)))?;

        let start = self.resolve_node(&raw.start)?;
        let end = self.resolve_node(&raw.end)?;

        let mut properties = raw.properties.clone();
        properties.remove(ID_KEY);

        let relation = Relation::from_parts(
            raw.entity_id(),
            descriptor.type_name.clone(),
            start.id().cloned(),
            end.id().cloned(),
            properties,
        );
        relation.endpoints()?;

        Ok(ResolvedRelation {
            relation,
            start,
            end,
        })
    }
}

//! In-memory staged graph: current node/relation state plus the ordered list
//! of mutations not yet written to the store.
//!
//! Staging never touches the store. [`StagedGraph::flush`] replays the pending
//! mutations, in the order they were staged, inside a single transaction.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::entity::{Node, Relation};
use crate::error::{OgmError, Result};
use crate::session::GraphSession;
use crate::statements;
use crate::types::{validate_name, EntityId, IdGenerator, UuidV7Generator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

/// Snapshot of the entity a mutation applies to, taken when it was staged.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "target", content = "entity", rename_all = "lowercase")]
pub enum MutationTarget {
    Node(Node),
    Relation(Relation),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mutation {
    pub kind: MutationKind,
    pub target: MutationTarget,
}

/// Outcome of a successful flush.
#[derive(Debug, Clone, Serialize)]
pub struct FlushReport {
    /// Number of statements executed and committed.
    pub statements: usize,
    pub committed_at: DateTime<Utc>,
}

/// Not safe for concurrent mutation: build a changeset serially, then flush.
pub struct StagedGraph {
    nodes: BTreeMap<EntityId, Node>,
    relations: BTreeMap<EntityId, Relation>,
    pending: Vec<Mutation>,
    ids: Box<dyn IdGenerator>,
}

impl Default for StagedGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StagedGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagedGraph")
            .field("nodes", &self.nodes)
            .field("relations", &self.relations)
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl StagedGraph {
    /// An empty graph with UUIDv7 id generation.
    pub fn new() -> Self {
        Self::with_id_generator(UuidV7Generator)
    }

    pub fn with_id_generator(ids: impl IdGenerator + 'static) -> Self {
        Self {
            nodes: BTreeMap::new(),
            relations: BTreeMap::new(),
            pending: Vec::new(),
            ids: Box::new(ids),
        }
    }

    /// A graph representing persisted state: populated, nothing pending.
    pub fn from_entities(
        nodes: impl IntoIterator<Item = Node>,
        relations: impl IntoIterator<Item = Relation>,
    ) -> Self {
        let mut graph = Self::new();
        for node in nodes {
            match node.id().cloned() {
                Some(id) => {
                    graph.nodes.insert(id, node);
                }
                None => tracing::warn!(type_name = %node.type_name(), "Skipping node without identity"),
            }
        }
        for relation in relations {
            match relation.id().cloned() {
                Some(id) => {
                    graph.relations.insert(id, relation);
                }
                None => tracing::warn!(rel_type = %relation.rel_type(), "Skipping relation without identity"),
            }
        }
        graph
    }

    // ── Accessors ────────────────────────────────────────────────

    pub fn node(&self, id: &EntityId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn relation(&self, id: &EntityId) -> Option<&Relation> {
        self.relations.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn relations(&self) -> impl Iterator<Item = &Relation> {
        self.relations.values()
    }

    /// Relations in this graph with `node_id` as either endpoint.
    pub fn relations_of<'a>(&'a self, node_id: &'a EntityId) -> impl Iterator<Item = &'a Relation> {
        self.relations.values().filter(move |r| r.touches(node_id))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }

    pub fn pending(&self) -> &[Mutation] {
        &self.pending
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    // ── Node mutations ───────────────────────────────────────────

    /// Assign a fresh id to `node`, track it and stage its creation.
    pub fn create_node(&mut self, node: &mut Node) -> Result<EntityId> {
        if let Some(id) = node.id() {
            return Err(OgmError::AlreadyIdentified(id.clone()));
        }
        check_labels(node)?;
        let id = self.ids.next_id();
        node.assign_id(id.clone());
        self.nodes.insert(id.clone(), node.clone());
        self.stage(MutationKind::Create, MutationTarget::Node(node.clone()));
        Ok(id)
    }

    /// Overwrite the tracked node and stage an update.
    pub fn set_node(&mut self, node: &Node) -> Result<()> {
        let id = tracked(node.id(), &self.nodes)?;
        check_labels(node)?;
        self.nodes.insert(id, node.clone());
        self.stage(MutationKind::Update, MutationTarget::Node(node.clone()));
        Ok(())
    }

    /// Stop tracking the node and stage its deletion.
    ///
    /// Relations in this graph that reference the node are left in place.
    pub fn delete_node(&mut self, node: &Node) -> Result<()> {
        let id = tracked(node.id(), &self.nodes)?;
        self.nodes.remove(&id);
        self.stage(MutationKind::Delete, MutationTarget::Node(node.clone()));
        Ok(())
    }

    // ── Relation mutations ───────────────────────────────────────

    pub fn create_relation(&mut self, relation: &mut Relation) -> Result<EntityId> {
        if let Some(id) = relation.id() {
            return Err(OgmError::AlreadyIdentified(id.clone()));
        }
        validate_name(relation.rel_type())?;
        relation.endpoints()?;
        let id = self.ids.next_id();
        relation.assign_id(id.clone());
        self.relations.insert(id.clone(), relation.clone());
        self.stage(MutationKind::Create, MutationTarget::Relation(relation.clone()));
        Ok(id)
    }

    pub fn set_relation(&mut self, relation: &Relation) -> Result<()> {
        validate_name(relation.rel_type())?;
        relation.endpoints()?;
        let id = tracked(relation.id(), &self.relations)?;
        self.relations.insert(id, relation.clone());
        self.stage(MutationKind::Update, MutationTarget::Relation(relation.clone()));
        Ok(())
    }

    pub fn delete_relation(&mut self, relation: &Relation) -> Result<()> {
        validate_name(relation.rel_type())?;
        relation.endpoints()?;
        let id = tracked(relation.id(), &self.relations)?;
        self.relations.remove(&id);
        self.stage(MutationKind::Delete, MutationTarget::Relation(relation.clone()));
        Ok(())
    }

    // ── Flush ────────────────────────────────────────────────────

    /// Write every pending mutation through `session` in one transaction.
    ///
    /// Statements run strictly in staging order. If any statement (or the
    /// commit) fails the transaction is rolled back, the pending list is kept
    /// and [`OgmError::TransactionFailure`] is returned; nothing is retried.
    /// On success the pending list is cleared and the tracked state becomes
    /// the new baseline.
    pub async fn flush<S>(&mut self, session: &S) -> Result<FlushReport>
    where
        S: GraphSession + ?Sized,
    {
        if self.pending.is_empty() {
            return Ok(FlushReport {
                statements: 0,
                committed_at: Utc::now(),
            });
        }

        let batch = self
            .pending
            .iter()
            .map(statements::for_mutation)
            .collect::<Result<Vec<_>>>()?;

        let mut txn = session.begin().await?;
        for (index, statement) in batch.iter().enumerate() {
            tracing::debug!(index, kind = ?self.pending[index].kind, "Executing staged mutation");

            if let Err(source) = txn.run(statement).await {
                tracing::warn!(index, error = %source, "Statement failed, rolling back");
                if let Err(e) = txn.rollback().await {
                    tracing::warn!(error = %e, "Rollback failed");
                }
                return Err(OgmError::TransactionFailure { index, source });
            }
        }

        let count = self.pending.len();
        txn.commit()
            .await
            .map_err(|source| OgmError::TransactionFailure {
                index: count,
                source,
            })?;

        self.pending.clear();
        tracing::info!(statements = count, "Flushed staged graph");
        Ok(FlushReport {
            statements: count,
            committed_at: Utc::now(),
        })
    }

    fn stage(&mut self, kind: MutationKind, target: MutationTarget) {
        tracing::debug!(?kind, pending = self.pending.len() + 1, "Staged mutation");
        self.pending.push(Mutation { kind, target });
    }
}

/// Labels are interpolated into statement text, so they are checked before
/// anything is queued.
fn check_labels(node: &Node) -> Result<()> {
    node.labels().iter().try_for_each(|label| validate_name(label))
}

fn tracked<T>(id: Option<&EntityId>, map: &BTreeMap<EntityId, T>) -> Result<EntityId> {
    match id {
        Some(id) if map.contains_key(id) => Ok(id.clone()),
        Some(id) => Err(OgmError::NotStaged(id.to_string())),
        None => Err(OgmError::NotStaged("entity has no identity".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sequential ids for deterministic assertions.
    struct Counter(u32);

    impl IdGenerator for Counter {
        fn next_id(&mut self) -> EntityId {
            self.0 += 1;
            EntityId(format!("id-{:04}", self.0))
        }
    }

    fn graph() -> StagedGraph {
        StagedGraph::with_id_generator(Counter(0))
    }

    #[test]
    fn create_assigns_id_and_stages() {
        let mut g = graph();
        let mut node = Node::new("Person");
        let id = node.create(&mut g).unwrap();

        assert_eq!(id, EntityId::from("id-0001"));
        assert_eq!(node.id(), Some(&id));
        assert_eq!(g.node(&id), Some(&node));
        assert_eq!(g.pending().len(), 1);
        assert_eq!(g.pending()[0].kind, MutationKind::Create);
    }

    #[test]
    fn identity_is_assigned_once() {
        let mut g = graph();
        let mut node = Node::new("Person");
        node.create(&mut g).unwrap();
        assert!(matches!(
            node.create(&mut g),
            Err(OgmError::AlreadyIdentified(_))
        ));
    }

    #[test]
    fn update_and_delete_require_tracking() {
        let mut g = graph();
        let node = Node::new("Person");
        assert!(matches!(node.update(&mut g), Err(OgmError::NotStaged(_))));
        assert!(matches!(node.delete(&mut g), Err(OgmError::NotStaged(_))));

        let mut other = graph();
        let mut foreign = Node::new("Person");
        foreign.create(&mut other).unwrap();
        assert!(matches!(foreign.update(&mut g), Err(OgmError::NotStaged(_))));
        assert!(g.pending().is_empty());
    }

    #[test]
    fn update_overwrites_without_changing_id() {
        let mut g = graph();
        let mut node = Node::new("Person");
        let id = node.create(&mut g).unwrap();

        node.set_property("name", "Grace");
        node.add_label("Admin");
        node.update(&mut g).unwrap();

        let tracked = g.node(&id).unwrap();
        assert_eq!(tracked.id(), Some(&id));
        assert_eq!(tracked.property("name").and_then(|v| v.as_str()), Some("Grace"));
        assert!(tracked.dyn_labels().contains("Admin"));
        assert_eq!(g.pending()[1].kind, MutationKind::Update);
    }

    #[test]
    fn pending_holds_snapshots() {
        let mut g = graph();
        let mut node = Node::new("Person");
        node.set_property("v", 1i64);
        node.create(&mut g).unwrap();
        node.set_property("v", 2i64);
        node.update(&mut g).unwrap();

        let MutationTarget::Node(first) = &g.pending()[0].target else {
            panic!("expected node mutation");
        };
        assert_eq!(first.property("v").and_then(|v| v.as_i64()), Some(1));
    }

    #[test]
    fn relations_require_identified_endpoints() {
        let mut g = graph();
        let mut a = Node::new("Person");
        let b = Node::new("Person");
        a.create(&mut g).unwrap();

        let mut rel = a.connect_to(&b, "Knows");
        assert!(matches!(
            rel.create(&mut g),
            Err(OgmError::UnresolvedEndpoint { endpoint: "node_b", .. })
        ));
        assert!(rel.id().is_none());
        assert_eq!(g.relation_count(), 0);
        assert_eq!(g.pending().len(), 1);
    }

    #[test]
    fn node_deletion_does_not_cascade() {
        let mut g = graph();
        let mut a = Node::new("Person");
        let mut b = Node::new("Person");
        let a_id = a.create(&mut g).unwrap();
        b.create(&mut g).unwrap();
        let mut rel = a.connect_to(&b, "Knows");
        let rel_id = rel.create(&mut g).unwrap();

        a.delete(&mut g).unwrap();

        assert!(g.node(&a_id).is_none());
        assert!(g.relation(&rel_id).is_some());
        assert_eq!(g.relations_of(&a_id).count(), 1);
    }

    #[test]
    fn relation_lifecycle() {
        let mut g = graph();
        let mut a = Node::new("Person");
        let mut b = Node::new("Person");
        a.create(&mut g).unwrap();
        b.create(&mut g).unwrap();

        let mut rel = a.connect_to(&b, "Knows");
        let id = rel.create(&mut g).unwrap();
        rel.set_property("since", 2001i64);
        rel.update(&mut g).unwrap();
        assert_eq!(
            g.relation(&id).and_then(|r| r.property("since")).and_then(|v| v.as_i64()),
            Some(2001)
        );
        rel.delete(&mut g).unwrap();
        assert!(g.relation(&id).is_none());
        assert!(matches!(rel.delete(&mut g), Err(OgmError::NotStaged(_))));

        let kinds: Vec<_> = g.pending().iter().map(|m| m.kind).collect();
        assert_eq!(
            kinds,
            vec![
                MutationKind::Create,
                MutationKind::Create,
                MutationKind::Create,
                MutationKind::Update,
                MutationKind::Delete,
            ]
        );
    }

    #[test]
    fn invalid_labels_are_rejected_before_queueing() {
        let mut g = graph();
        let mut node = Node::new("Person");
        node.add_label("has space");
        assert!(matches!(node.create(&mut g), Err(OgmError::InvalidName(_))));
        assert!(node.id().is_none());
        assert!(!g.has_pending());
        assert_eq!(g.node_count(), 0);

        node.remove_label("has space");
        node.create(&mut g).unwrap();
        node.add_label("Bad-Label");
        assert!(matches!(node.update(&mut g), Err(OgmError::InvalidName(_))));
        assert_eq!(g.pending().len(), 1);
        let tracked = g.node(node.id().unwrap()).unwrap();
        assert!(tracked.dyn_labels().is_empty());
    }

    #[test]
    fn invalid_relation_types_are_rejected_before_queueing() {
        let mut g = graph();
        let mut a = Node::new("Person");
        let mut b = Node::new("Person");
        a.create(&mut g).unwrap();
        b.create(&mut g).unwrap();

        let mut rel = a.connect_to(&b, "Bad Type");
        assert!(matches!(rel.create(&mut g), Err(OgmError::InvalidName(_))));
        assert!(rel.id().is_none());
        assert_eq!(g.relation_count(), 0);
        assert_eq!(g.pending().len(), 2);
    }

    #[test]
    fn entities_read_from_store_start_clean() {
        let mut node = Node::new("Person");
        node.assign_id(EntityId::from("stored"));
        let g = StagedGraph::from_entities([node, Node::new("Person")], []);
        assert_eq!(g.node_count(), 1);
        assert!(!g.has_pending());
    }
}

//! Registry-driven reads: run a statement through a session and resolve the
//! raw result into typed entities.

use crate::entity::{Node, Relation};
use crate::error::{OgmError, Result};
use crate::raw::RawGraph;
use crate::registry::{ResolvedRelation, TypeRegistry};
use crate::session::GraphSession;
use crate::staged::StagedGraph;
use crate::statements::{self, Statement};
use crate::types::EntityId;

impl TypeRegistry {
    /// Look up a node by id. `Ok(None)` when the store has no such node.
    pub async fn get_node_by_id<S>(&self, session: &S, id: &EntityId) -> Result<Option<Node>>
    where
        S: GraphSession + ?Sized,
    {
        let raw = session.fetch_graph(&statements::node_by_id(id)).await?;
        let found = raw
            .nodes
            .iter()
            .find(|n| n.entity_id().as_ref() == Some(id));

        match found {
            Some(raw_node) => {
                let node = self.resolve_node(raw_node)?;
                tracing::debug!(%id, type_name = %node.type_name(), "Read node");
                Ok(Some(node))
            }
            None => Ok(None),
        }
    }

    /// Look up a relation by id, with both endpoints resolved.
    pub async fn get_relation_by_id<S>(
        &self,
        session: &S,
        id: &EntityId,
    ) -> Result<Option<ResolvedRelation>>
    where
        S: GraphSession + ?Sized,
    {
        let raw = session.fetch_graph(&statements::relation_by_id(id)).await?;
        let found = raw
            .relations
            .iter()
            .find(|r| r.entity_id().as_ref() == Some(id));

        match found {
            Some(raw_rel) => {
                let resolved = self.resolve_relation(raw_rel)?;
                tracing::debug!(%id, rel_type = %resolved.relation.rel_type(), "Read relation");
                Ok(Some(resolved))
            }
            None => Ok(None),
        }
    }

    /// Run an arbitrary read statement and resolve everything it returned.
    pub async fn read<S>(&self, session: &S, statement: &Statement) -> Result<StagedGraph>
    where
        S: GraphSession + ?Sized,
    {
        let raw = session.fetch_graph(statement).await?;
        self.resolve_graph(&raw)
    }

    /// Read the neighbourhood of `base_node` reachable within `max_depth`
    /// hops over `relation_types` (any type when empty).
    pub async fn read_subgraph<S>(
        &self,
        session: &S,
        base_node: &Node,
        relation_types: &[&str],
        max_depth: u32,
    ) -> Result<StagedGraph>
    where
        S: GraphSession + ?Sized,
    {
        let base = base_node
            .id()
            .ok_or_else(|| OgmError::NotStaged("base node has no identity".to_string()))?;
        for rel_type in relation_types {
            if self.relation_type(rel_type).is_none() {
                return Err(OgmError::UnresolvableType(format!("relation type {rel_type}")));
            }
        }

        let statement = statements::subgraph(base, relation_types, max_depth);
        let raw = session.fetch_graph(&statement).await?;
        let graph = self.resolve_graph(&raw)?;
        tracing::debug!(
            base = %base,
            max_depth,
            nodes = graph.node_count(),
            relations = graph.relation_count(),
            "Read subgraph"
        );
        Ok(graph)
    }

    /// Resolve a raw result into a staged graph with nothing pending.
    pub fn resolve_graph(&self, raw: &RawGraph) -> Result<StagedGraph> {
        let mut nodes: Vec<Node> = raw
            .nodes
            .iter()
            .map(|n| self.resolve_node(n))
            .collect::<Result<_>>()?;

        let mut relations: Vec<Relation> = Vec::with_capacity(raw.relations.len());
        for raw_rel in &raw.relations {
            match self.resolve_relation(raw_rel) {
                Ok(resolved) => {
                    nodes.push(resolved.start);
                    nodes.push(resolved.end);
                    relations.push(resolved.relation);
                }
                // Dropped like identity-less nodes.
                Err(OgmError::UnresolvedEndpoint { endpoint, .. }) => {
                    tracing::warn!(
                        rel_type = %raw_rel.rel_type,
                        endpoint,
                        "Skipping relation whose endpoint has no identity"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Ok(StagedGraph::from_entities(nodes, relations))
    }
}

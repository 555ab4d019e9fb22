//! Cypher statement generation for staged mutations and registry reads.
//!
//! Values always travel as parameters. Labels and relation type names are
//! structural and are interpolated into the text, so each one is validated
//! as it is rendered. Property keys are backtick-quoted and their values
//! bound to positional parameters `p0`, `p1`, ...

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::entity::{Node, Relation};
use crate::error::{OgmError, Result};
use crate::staged::{Mutation, MutationKind, MutationTarget};
use crate::types::{validate_name, EntityId, LabelSet, Properties, PropertyValue, ID_KEY};

/// A parameterized statement ready to hand to a session.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub text: String,
    pub params: BTreeMap<String, PropertyValue>,
    /// Result columns to collect graph values from.
    pub returns: Vec<String>,
}

impl Statement {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: BTreeMap::new(),
            returns: Vec::new(),
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Declare the result columns that carry nodes, relations or lists of them.
    pub fn returning<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.returns = columns.into_iter().map(Into::into).collect();
        self
    }
}

/// Build the statement that applies one staged mutation.
pub fn for_mutation(mutation: &Mutation) -> Result<Statement> {
    match (&mutation.kind, &mutation.target) {
        (MutationKind::Create, MutationTarget::Node(n)) => create_node(n),
        (MutationKind::Update, MutationTarget::Node(n)) => set_node(n),
        (MutationKind::Delete, MutationTarget::Node(n)) => delete_node(n),
        (MutationKind::Create, MutationTarget::Relation(r)) => create_relation(r),
        (MutationKind::Update, MutationTarget::Relation(r)) => set_relation(r),
        (MutationKind::Delete, MutationTarget::Relation(r)) => delete_relation(r),
    }
}

// ── Node statements ──────────────────────────────────────────────

pub fn create_node(node: &Node) -> Result<Statement> {
    let id = staged_id(node.id())?;
    let labels = label_clause(&node.labels())?;
    let (props, params) = property_map(node.properties());

    let mut stmt = Statement::new(format!("CREATE (n{labels} {props})"));
    stmt.params = params;
    Ok(stmt.param(ID_KEY, id))
}

/// Clear every stored label, reassign static and dynamic labels, then replace
/// the whole property map.
pub fn set_node(node: &Node) -> Result<Statement> {
    let id = staged_id(node.id())?;
    let labels = label_clause(&node.labels())?;
    let (props, params) = property_map(node.properties());

    let mut stmt = Statement::new(format!(
        "MATCH (n {{{ID_KEY}: ${ID_KEY}}})
         CALL apoc.create.removeLabels(n, labels(n)) YIELD node
         SET node{labels}
         SET node = {props}"
    ));
    stmt.params = params;
    Ok(stmt.param(ID_KEY, id))
}

pub fn delete_node(node: &Node) -> Result<Statement> {
    let id = staged_id(node.id())?;
    Ok(Statement::new(format!(
        "MATCH (n {{{ID_KEY}: ${ID_KEY}}})
         DETACH DELETE n"
    ))
    .param(ID_KEY, id))
}

// ── Relation statements ──────────────────────────────────────────

pub fn create_relation(relation: &Relation) -> Result<Statement> {
    let id = staged_id(relation.id())?;
    let (a, b) = relation.endpoints()?;
    let rel_type = relation.rel_type();
    validate_name(rel_type)?;
    let (props, params) = property_map(relation.properties());

    let mut stmt = Statement::new(format!(
        "MATCH (a {{{ID_KEY}: $uuid_a}}), (b {{{ID_KEY}: $uuid_b}})
         CREATE (a)-[c:{rel_type} {props}]->(b)"
    ));
    stmt.params = params;
    Ok(stmt
        .param(ID_KEY, id)
        .param("uuid_a", a)
        .param("uuid_b", b))
}

pub fn set_relation(relation: &Relation) -> Result<Statement> {
    let id = staged_id(relation.id())?;
    let rel_type = relation.rel_type();
    validate_name(rel_type)?;
    let (props, params) = property_map(relation.properties());

    let mut stmt = Statement::new(format!(
        "MATCH ()-[c:{rel_type} {{{ID_KEY}: ${ID_KEY}}}]->()
         SET c = {props}"
    ));
    stmt.params = params;
    Ok(stmt.param(ID_KEY, id))
}

pub fn delete_relation(relation: &Relation) -> Result<Statement> {
    let id = staged_id(relation.id())?;
    let rel_type = relation.rel_type();
    validate_name(rel_type)?;
    Ok(Statement::new(format!(
        "MATCH ()-[c:{rel_type} {{{ID_KEY}: ${ID_KEY}}}]->()
         DELETE c"
    ))
    .param(ID_KEY, id))
}

// ── Read statements ──────────────────────────────────────────────

pub fn node_by_id(id: &EntityId) -> Statement {
    Statement::new(format!(
        "MATCH (n {{{ID_KEY}: ${ID_KEY}}})
         RETURN n LIMIT 1"
    ))
    .param(ID_KEY, id)
    .returning(["n"])
}

pub fn relation_by_id(id: &EntityId) -> Statement {
    Statement::new(format!(
        "MATCH (a)-[c {{{ID_KEY}: ${ID_KEY}}}]->(b)
         RETURN c, a, b LIMIT 1"
    ))
    .param(ID_KEY, id)
    .returning(["c", "a", "b"])
}

/// Undirected traversal of at most `max_depth` hops over `relation_types`
/// (any type when empty). The base node is always returned.
pub fn subgraph(base: &EntityId, relation_types: &[&str], max_depth: u32) -> Statement {
    if max_depth == 0 {
        return Statement::new(format!(
            "MATCH (a {{{ID_KEY}: ${ID_KEY}}})
             RETURN a"
        ))
        .param(ID_KEY, base)
        .returning(["a"]);
    }

    let types = if relation_types.is_empty() {
        String::new()
    } else {
        format!(":{}", relation_types.join("|"))
    };
    Statement::new(format!(
        "MATCH (a {{{ID_KEY}: ${ID_KEY}}})
         OPTIONAL MATCH p = (a)-[{types}*1..{max_depth}]-(b)
         RETURN a, nodes(p) AS nodes, relationships(p) AS rels"
    ))
    .param(ID_KEY, base)
    .returning(["a", "nodes", "rels"])
}

// ── Helpers ──────────────────────────────────────────────────────

fn staged_id(id: Option<&EntityId>) -> Result<&EntityId> {
    id.ok_or_else(|| OgmError::NotStaged("entity has no identity".to_string()))
}

/// `:A:B` for interpolation; every label must be a valid name.
fn label_clause(labels: &LabelSet) -> Result<String> {
    let mut out = String::new();
    for label in labels {
        validate_name(label)?;
        let _ = write!(out, ":{label}");
    }
    Ok(out)
}

/// Render `{uuid: $uuid, `k0`: $p0, ...}` and the matching parameters.
fn property_map(props: &Properties) -> (String, BTreeMap<String, PropertyValue>) {
    let mut text = format!("{{{ID_KEY}: ${ID_KEY}");
    let mut params = BTreeMap::new();
    for (i, (key, value)) in props.iter().enumerate() {
        let param = format!("p{i}");
        let _ = write!(text, ", {}: ${param}", quote_key(key));
        params.insert(param, value.clone());
    }
    text.push('}');
    (text, params)
}

fn quote_key(key: &str) -> String {
    format!("`{}`", key.replace('`', "``"))
}

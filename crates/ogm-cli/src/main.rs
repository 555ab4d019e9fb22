//! CLI entry point for the `ogm` tool.
//!
//! Reads go through the type registry built from the `model` config section;
//! results are written as JSON to stdout, logs to stderr.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

use ogm_core::{
    EntityId, GraphSession, Node, NodeDescriptor, PropertyValue, Relation, RelationDescriptor,
    StagedGraph, Statement, TypeRegistry,
};
use ogm_graph::{GraphClient, OgmConfig};

#[derive(Parser)]
#[command(name = "ogm")]
#[command(about = "Typed access to a Neo4j property graph")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file prefix (default: ogm).
    #[arg(short, long, default_value = "ogm", global = true)]
    config: String,
}

#[derive(Subcommand)]
enum Command {
    /// Check that the database is reachable.
    Ping,
    /// Fetch a single node by id.
    Node {
        #[arg(long)]
        id: String,
    },
    /// Fetch a single relation and its endpoints by id.
    Relation {
        #[arg(long)]
        id: String,
    },
    /// Read the neighbourhood of a node.
    Subgraph {
        /// Base node ID.
        #[arg(long)]
        id: String,
        /// Relation types to follow (any type when omitted).
        #[arg(long, value_delimiter = ',')]
        types: Vec<String>,
        #[arg(long, default_value_t = 1)]
        depth: u32,
    },
    /// Run a read query and resolve the returned nodes and relations.
    Query {
        cypher: String,
        /// Query parameter as key=value; repeatable.
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, PropertyValue)>,
        /// Result columns holding nodes, relations or lists of them.
        #[arg(long, value_delimiter = ',', default_value = "n")]
        returns: Vec<String>,
    },
    /// Create two people who know each other, then read them back.
    Demo,
}

/// JSON view of a staged graph.
#[derive(Serialize)]
struct GraphOutput<'a> {
    nodes: Vec<&'a Node>,
    relations: Vec<&'a Relation>,
}

impl<'a> From<&'a StagedGraph> for GraphOutput<'a> {
    fn from(graph: &'a StagedGraph) -> Self {
        Self {
            nodes: graph.nodes().collect(),
            relations: graph.relations().collect(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let cli = Cli::parse();

    let config = OgmConfig::load(&cli.config).context("loading configuration")?;
    let mut registry = config.model.build_registry()?;
    let client = GraphClient::connect(&config.neo4j).await?;

    match cli.command {
        Command::Ping => {
            client.verify_connectivity().await?;
            println!("{}", serde_json::json!({ "status": "ok", "uri": config.neo4j.uri }));
        }
        Command::Node { id } => {
            let node = registry.get_node_by_id(&client, &EntityId::from(id)).await?;
            println!("{}", serde_json::to_string(&node)?);
        }
        Command::Relation { id } => {
            let relation = registry
                .get_relation_by_id(&client, &EntityId::from(id))
                .await?;
            println!("{}", serde_json::to_string(&relation)?);
        }
        Command::Subgraph { id, types, depth } => {
            let id = EntityId::from(id);
            let Some(base) = registry.get_node_by_id(&client, &id).await? else {
                bail!("no node with id {id}");
            };
            let types: Vec<&str> = types.iter().map(String::as_str).collect();
            let graph = registry.read_subgraph(&client, &base, &types, depth).await?;
            println!("{}", serde_json::to_string(&GraphOutput::from(&graph))?);
        }
        Command::Query {
            cypher,
            params,
            returns,
        } => {
            let statement = params
                .into_iter()
                .fold(Statement::new(cypher), |s, (k, v)| s.param(k, v))
                .returning(returns);
            let graph = registry.read(&client, &statement).await?;
            println!("{}", serde_json::to_string(&GraphOutput::from(&graph))?);
        }
        Command::Demo => {
            ensure_demo_types(&mut registry)?;
            let graph = run_demo(&registry, &client).await?;
            println!("{}", serde_json::to_string(&GraphOutput::from(&graph))?);
        }
    }

    Ok(())
}

/// Parse `key=value`, reading the value as JSON when it is a scalar and as a
/// plain string otherwise.
fn parse_param(raw: &str) -> Result<(String, PropertyValue), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))?;
    if key.is_empty() {
        return Err(format!("empty parameter name in `{raw}`"));
    }
    let value = serde_json::from_str::<serde_json::Value>(value)
        .ok()
        .and_then(|v| PropertyValue::from_json(&v))
        .unwrap_or_else(|| PropertyValue::from(value));
    Ok((key.to_string(), value))
}

fn ensure_demo_types(registry: &mut TypeRegistry) -> anyhow::Result<()> {
    if registry.node_type("Person").is_none() {
        registry.register_node(NodeDescriptor::new("Person"))?;
    }
    if registry.relation_type("Knows").is_none() {
        registry.register_relation(RelationDescriptor::new("Knows"))?;
    }
    Ok(())
}

async fn run_demo(registry: &TypeRegistry, client: &GraphClient) -> anyhow::Result<StagedGraph> {
    let mut graph = StagedGraph::new();

    let person = registry
        .node_type("Person")
        .context("Person type is not registered")?;
    let mut alice = person.instantiate();
    alice.set_property("name", "Alice");
    let mut bob = person.instantiate();
    bob.set_property("name", "Bob");
    alice.create(&mut graph)?;
    bob.create(&mut graph)?;

    let mut knows = alice.connect_to(&bob, "Knows");
    knows.set_property("since", 2019i64);
    knows.create(&mut graph)?;

    let report = graph.flush(client).await?;
    tracing::info!(statements = report.statements, "Demo graph written");

    Ok(registry.read_subgraph(client, &alice, &["Knows"], 1).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_parse_scalars_and_strings() {
        assert_eq!(parse_param("n=3").unwrap(), ("n".into(), PropertyValue::Int(3)));
        assert_eq!(parse_param("f=true").unwrap().1, PropertyValue::Bool(true));
        assert_eq!(parse_param("x=1.5").unwrap().1, PropertyValue::Float(1.5));
        assert_eq!(
            parse_param("name=Ada").unwrap().1,
            PropertyValue::String("Ada".into())
        );
        assert_eq!(
            parse_param("q=\"42\"").unwrap().1,
            PropertyValue::String("42".into())
        );
        assert_eq!(parse_param("eq=a=b").unwrap().1, PropertyValue::String("a=b".into()));
    }

    #[test]
    fn params_without_key_are_rejected() {
        assert!(parse_param("novalue").is_err());
        assert!(parse_param("=1").is_err());
    }

    #[test]
    fn demo_types_are_added_once() {
        let mut registry = TypeRegistry::new();
        ensure_demo_types(&mut registry).unwrap();
        ensure_demo_types(&mut registry).unwrap();
        let person = registry.node_type("Person").unwrap().instantiate();
        assert_eq!(person.type_name(), "Person");
        assert!(person.id().is_none());
        assert!(registry.relation_type("Knows").is_some());
    }

    #[test]
    fn cli_parses_subgraph_types() {
        let cli = Cli::parse_from(["ogm", "subgraph", "--id", "x", "--types", "Knows,Likes"]);
        match cli.command {
            Command::Subgraph { types, depth, .. } => {
                assert_eq!(types, vec!["Knows", "Likes"]);
                assert_eq!(depth, 1);
            }
            _ => panic!("expected subgraph"),
        }
    }
}

//! Neo4j connection management and the session adapter.

use async_trait::async_trait;
use neo4rs::{query, ConfigBuilder, Graph, Query, Txn};
use serde::Deserialize;

use ogm_core::{GraphSession, GraphTransaction, PropertyValue, RawGraph, SessionError, Statement};

use crate::convert::RawGraphBuilder;

/// Errors from graph operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Neo4j connection error: {0}")]
    Connection(String),

    #[error("Neo4j query error: {0}")]
    Query(#[from] neo4rs::Error),

    #[error("Conversion error: {0}")]
    Conversion(String),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
}

impl From<GraphError> for SessionError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::Connection(msg) => SessionError::Connection(msg),
            GraphError::Conversion(msg) => SessionError::Conversion(msg),
            other => SessionError::Execution(Box::new(other)),
        }
    }
}

/// Configuration for connecting to Neo4j.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub max_connections: u32,
    pub fetch_size: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: "neo4j".to_string(),
            database: "neo4j".to_string(),
            max_connections: 16,
            fetch_size: 256,
        }
    }
}

/// Pooled Neo4j client implementing [`GraphSession`].
///
/// Clone is cheap (inner Arc).
#[derive(Clone)]
pub struct GraphClient {
    graph: Graph,
}

impl GraphClient {
    /// Connect to Neo4j with the given configuration.
    pub async fn connect(config: &GraphConfig) -> Result<Self, GraphError> {
        let neo_config = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .db(config.database.as_str())
            .max_connections(config.max_connections as usize)
            .fetch_size(config.fetch_size)
            .build()
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        let graph = Graph::connect(neo_config)
            .await
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        tracing::info!(uri = %config.uri, database = %config.database, "Connected to Neo4j");
        Ok(Self { graph })
    }

    /// Execute a write-only statement outside any staged changeset.
    pub async fn run(&self, statement: &Statement) -> Result<(), GraphError> {
        self.graph.run(to_query(statement)).await?;
        Ok(())
    }

    /// Execute a read statement and collect all rows.
    pub async fn query_rows(&self, statement: &Statement) -> Result<Vec<neo4rs::Row>, GraphError> {
        let mut stream = self.graph.execute(to_query(statement)).await?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await? {
            rows.push(row);
        }
        Ok(rows)
    }
}

#[async_trait]
impl GraphSession for GraphClient {
    async fn verify_connectivity(&self) -> Result<(), SessionError> {
        self.graph
            .run(query("RETURN 1"))
            .await
            .map_err(|e| SessionError::Connection(e.to_string()))
    }

    async fn begin(&self) -> Result<Box<dyn GraphTransaction>, SessionError> {
        let txn = self.graph.start_txn().await.map_err(GraphError::from)?;
        Ok(Box::new(Neo4jTransaction { txn }))
    }

    async fn fetch_graph(&self, statement: &Statement) -> Result<RawGraph, SessionError> {
        let rows = self.query_rows(statement).await?;
        let mut builder = RawGraphBuilder::default();
        for row in &rows {
            builder.add_row(row, &statement.returns);
        }
        let raw = builder.finish();
        tracing::debug!(
            rows = rows.len(),
            nodes = raw.nodes.len(),
            relations = raw.relations.len(),
            "Fetched graph"
        );
        Ok(raw)
    }
}

/// An open Neo4j transaction.
pub struct Neo4jTransaction {
    txn: Txn,
}

#[async_trait]
impl GraphTransaction for Neo4jTransaction {
    async fn run(&mut self, statement: &Statement) -> Result<(), SessionError> {
        self.txn
            .run(to_query(statement))
            .await
            .map_err(|e| GraphError::from(e).into())
    }

    async fn commit(self: Box<Self>) -> Result<(), SessionError> {
        self.txn
            .commit()
            .await
            .map_err(|e| GraphError::from(e).into())
    }

    async fn rollback(self: Box<Self>) -> Result<(), SessionError> {
        self.txn
            .rollback()
            .await
            .map_err(|e| GraphError::from(e).into())
    }
}

/// Convert a generated statement into a neo4rs query with bound parameters.
pub fn to_query(statement: &Statement) -> Query {
    statement
        .params
        .iter()
        .fold(query(&statement.text), |q, (key, value)| match value {
            PropertyValue::Bool(b) => q.param(key, *b),
            PropertyValue::Int(i) => q.param(key, *i),
            PropertyValue::Float(f) => q.param(key, *f),
            PropertyValue::String(s) => q.param(key, s.clone()),
        })
}

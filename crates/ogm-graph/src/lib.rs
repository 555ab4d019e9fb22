//! ogm-graph: Neo4j backend for the object-graph mapper.
//!
//! Implements the `ogm-core` session traits on top of a pooled `neo4rs`
//! client, converts result rows into raw graph data for type resolution,
//! and loads connection and model configuration.

pub mod client;
pub mod config;
pub mod convert;

pub use client::{GraphClient, GraphConfig, GraphError, Neo4jTransaction};
pub use config::{ModelConfig, NodeTypeConfig, OgmConfig};

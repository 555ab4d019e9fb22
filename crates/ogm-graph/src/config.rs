//! Layered configuration: an optional `<prefix>.toml` file overridden by
//! `OGM__`-prefixed environment variables.
//!
//! ```toml
//! [neo4j]
//! uri = "bolt://localhost:7687"
//! password = "secret"
//!
//! [[model.nodes]]
//! name = "Person"
//!
//! [[model.nodes]]
//! name = "Employee"
//! labels = ["Person", "Staff"]
//!
//! [model]
//! relations = ["Knows"]
//! ```

use serde::de::DeserializeOwned;
use serde::Deserialize;

use ogm_core::{label_set, NodeDescriptor, OgmError, RelationDescriptor, TypeRegistry};

use crate::client::{GraphConfig, GraphError};

/// Everything loaded from the config sources.
#[derive(Debug, Clone, Default)]
pub struct OgmConfig {
    pub neo4j: GraphConfig,
    pub model: ModelConfig,
}

/// Entity types to register at startup.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub nodes: Vec<NodeTypeConfig>,
    pub relations: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeTypeConfig {
    pub name: String,
    /// Explicit static labels; the type name when empty.
    #[serde(default)]
    pub labels: Vec<String>,
}

impl ModelConfig {
    /// Register every configured type into a fresh registry.
    pub fn build_registry(&self) -> Result<TypeRegistry, OgmError> {
        let mut registry = TypeRegistry::new();
        for node in &self.nodes {
            registry.register_node(NodeDescriptor::with_labels(
                node.name.as_str(),
                label_set(node.labels.iter().cloned()),
            ))?;
        }
        for relation in &self.relations {
            registry.register_relation(RelationDescriptor::new(relation.as_str()))?;
        }
        Ok(registry)
    }
}

impl OgmConfig {
    /// Load from `<file_prefix>.toml` (optional) and `OGM__*` variables.
    pub fn load(file_prefix: &str) -> Result<Self, GraphError> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("OGM")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(Self {
            neo4j: section(&cfg, "neo4j")?,
            model: section(&cfg, "model")?,
        })
    }
}

/// Deserialize one section, falling back to its default when absent.
fn section<T: DeserializeOwned + Default>(cfg: &config::Config, key: &str) -> Result<T, GraphError> {
    match cfg.get::<T>(key) {
        Ok(value) => Ok(value),
        Err(config::ConfigError::NotFound(_)) => Ok(T::default()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("absent");
        let cfg = OgmConfig::load(prefix.to_str().unwrap()).unwrap();
        assert!(cfg.model.nodes.is_empty());
        assert_eq!(cfg.neo4j.fetch_size, 256);
    }

    #[test]
    fn file_sections_are_loaded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("ogm.toml"),
            r#"
[neo4j]
uri = "bolt://graph.internal:7687"
max_connections = 4

[model]
relations = ["Knows", "WorksAt"]

[[model.nodes]]
name = "Person"

[[model.nodes]]
name = "Employee"
labels = ["Person", "Staff"]
"#,
        )
        .unwrap();

        let prefix = dir.path().join("ogm");
        let cfg = OgmConfig::load(prefix.to_str().unwrap()).unwrap();
        assert_eq!(cfg.neo4j.uri, "bolt://graph.internal:7687");
        assert_eq!(cfg.neo4j.max_connections, 4);
        assert_eq!(cfg.neo4j.user, "neo4j");

        let registry = cfg.model.build_registry().unwrap();
        assert_eq!(
            registry.node_type("Employee").unwrap().labels,
            label_set(["Person", "Staff"])
        );
        assert_eq!(registry.node_type("Person").unwrap().labels, label_set(["Person"]));
        assert!(registry.relation_type("WorksAt").is_some());
    }

    #[test]
    fn conflicting_model_is_rejected() {
        let model = ModelConfig {
            nodes: vec![
                NodeTypeConfig {
                    name: "Person".into(),
                    labels: vec![],
                },
                NodeTypeConfig {
                    name: "Human".into(),
                    labels: vec!["Person".into()],
                },
            ],
            relations: vec![],
        };
        assert!(matches!(
            model.build_registry(),
            Err(OgmError::DuplicateLabelSet { .. })
        ));
    }
}

//! ogm-core: object-graph mapping for property-graph stores.
//!
//! This crate holds everything that does not talk to a database directly:
//! - Nodes and relations with static labels, dynamic labels and scalar properties
//! - The type registry that infers node types from label sets
//! - The staged graph that buffers create/update/delete mutations
//! - Cypher statement generation for each mutation
//! - The session traits a driver adapter implements, and flush/read on top of them

pub mod entity;
pub mod error;
pub mod raw;
pub mod reader;
pub mod registry;
pub mod session;
pub mod staged;
pub mod statements;
pub mod types;

pub use entity::{Node, NodeEntity, Relation, RelationEntity};
pub use error::{OgmError, SessionError};
pub use raw::{RawGraph, RawNode, RawRelation};
pub use registry::{NodeDescriptor, RelationDescriptor, ResolvedRelation, TypeRegistry};
pub use session::{GraphSession, GraphTransaction};
pub use staged::{FlushReport, Mutation, MutationKind, MutationTarget, StagedGraph};
pub use statements::Statement;
pub use types::{label_set, EntityId, IdGenerator, LabelSet, Properties, PropertyValue};

//! The seam between the mapping layer and a graph database driver.

use async_trait::async_trait;

use crate::error::SessionError;
use crate::raw::RawGraph;
use crate::statements::Statement;

/// A connection to a property-graph store.
#[async_trait]
pub trait GraphSession: Send + Sync {
    /// Check that the store is reachable before use.
    async fn verify_connectivity(&self) -> Result<(), SessionError>;

    /// Open an explicit transaction scope.
    async fn begin(&self) -> Result<Box<dyn GraphTransaction>, SessionError>;

    /// Run a read statement and collect every node and relation found in the
    /// columns named by [`Statement::returns`].
    async fn fetch_graph(&self, statement: &Statement) -> Result<RawGraph, SessionError>;
}

/// An open transaction. Dropping it without committing discards its work.
#[async_trait]
pub trait GraphTransaction: Send {
    async fn run(&mut self, statement: &Statement) -> Result<(), SessionError>;

    async fn commit(self: Box<Self>) -> Result<(), SessionError>;

    async fn rollback(self: Box<Self>) -> Result<(), SessionError>;
}

//! Graph store abstraction.
//!
//! The dispatcher only talks to a [`GraphStore`]: it checks out a
//! [`GraphSession`] per request, runs queries on it, and hands the session
//! back through [`run_scoped`], which commits on success, rolls back on
//! failure and always releases the session.
//!
//! Store values arrive already classified as [`RawValue`](crate::graph::RawValue);
//! each backend does that discrimination once at its boundary.

pub mod neo4j;
#[cfg(test)]
pub mod scripted;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::graph::{CypherQuery, RawRecord};

pub use neo4j::Neo4jStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("{0}")]
    Query(String),

    #[error("failed to release session: {0}")]
    Release(String),
}

/// A source of sessions against one database.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Check out a session. The caller owns it until `finish` is called or
    /// it is dropped.
    async fn open_session(&self) -> Result<Box<dyn GraphSession>, StoreError>;

    /// Round-trip to the server; used once at startup.
    async fn verify_connectivity(&self) -> Result<(), StoreError>;

    /// Close the underlying connection pool.
    async fn close(&self);
}

/// One unit of work against the store.
///
/// Dropping a session without calling `finish` releases it without
/// committing.
#[async_trait]
pub trait GraphSession: Send {
    async fn run(&mut self, query: &CypherQuery) -> Result<Vec<RawRecord>, StoreError>;

    /// Commit when `commit` is true, roll back otherwise, then release.
    async fn finish(self: Box<Self>, commit: bool) -> Result<(), StoreError>;
}

/// Run `queries` in order inside one session and return one result set per
/// query.
///
/// The session is released on every path. A failing query rolls the session
/// back and its error is the one reported, even if the rollback also fails.
pub async fn run_scoped<S>(
    store: &S,
    queries: &[CypherQuery],
) -> Result<Vec<Vec<RawRecord>>, StoreError>
where
    S: GraphStore + ?Sized,
{
    let mut session = store.open_session().await?;

    let mut results = Vec::with_capacity(queries.len());
    let mut failure = None;
    for query in queries {
        debug!(query = %query.text, params = query.params.len(), "running query");
        match session.run(query).await {
            Ok(records) => results.push(records),
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }

    match failure {
        None => {
            session.finish(true).await?;
            Ok(results)
        }
        Some(err) => {
            if let Err(release_err) = session.finish(false).await {
                warn!(error = %release_err, "rollback after failed query also failed");
            }
            Err(err)
        }
    }
}

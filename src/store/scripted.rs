//! Scripted in-memory store for tests.
//!
//! Each call to `run` pops the next scripted response. Executed queries are
//! recorded and open sessions counted, so tests can assert what reached the
//! store and that every session was released.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::{GraphSession, GraphStore, StoreError};
use crate::graph::{CypherQuery, RawRecord};

#[derive(Default)]
struct Shared {
    responses: Mutex<VecDeque<Result<Vec<RawRecord>, String>>>,
    executed: Mutex<Vec<CypherQuery>>,
    open: AtomicUsize,
    opened: AtomicUsize,
    committed: AtomicUsize,
    rolled_back: AtomicUsize,
}

#[derive(Clone, Default)]
pub struct ScriptedStore {
    shared: Arc<Shared>,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the records the next query returns.
    pub fn respond(&self, records: Vec<RawRecord>) -> &Self {
        self.shared
            .responses
            .lock()
            .unwrap()
            .push_back(Ok(records));
        self
    }

    /// Queue a store failure for the next query.
    pub fn fail(&self, message: &str) -> &Self {
        self.shared
            .responses
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
        self
    }

    pub fn executed(&self) -> Vec<CypherQuery> {
        self.shared.executed.lock().unwrap().clone()
    }

    pub fn open_sessions(&self) -> usize {
        self.shared.open.load(Ordering::SeqCst)
    }

    pub fn sessions_opened(&self) -> usize {
        self.shared.opened.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.shared.committed.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.shared.rolled_back.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GraphStore for ScriptedStore {
    async fn open_session(&self) -> Result<Box<dyn GraphSession>, StoreError> {
        self.shared.open.fetch_add(1, Ordering::SeqCst);
        self.shared.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            shared: Arc::clone(&self.shared),
        }))
    }

    async fn verify_connectivity(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn close(&self) {}
}

struct ScriptedSession {
    shared: Arc<Shared>,
}

#[async_trait]
impl GraphSession for ScriptedSession {
    async fn run(&mut self, query: &CypherQuery) -> Result<Vec<RawRecord>, StoreError> {
        self.shared.executed.lock().unwrap().push(query.clone());
        let next = self.shared.responses.lock().unwrap().pop_front();
        match next {
            Some(Ok(records)) => Ok(records),
            Some(Err(message)) => Err(StoreError::Query(message)),
            None => Ok(Vec::new()),
        }
    }

    async fn finish(self: Box<Self>, commit: bool) -> Result<(), StoreError> {
        if commit {
            self.shared.committed.fetch_add(1, Ordering::SeqCst);
        } else {
            self.shared.rolled_back.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl Drop for ScriptedSession {
    fn drop(&mut self) {
        self.shared.open.fetch_sub(1, Ordering::SeqCst);
    }
}

//! # Connector Protocol
//!
//! A [`Connector`] is a uniform asynchronous CRUD façade over one named remote
//! resource. The transport behind it (HTTP, GraphQL, an in-process actor) is
//! not the engine's concern; actions only ever see `read/create/update/delete`.
//!
//! Connectors come in two shapes, both registered in a [`ConnectorSet`]:
//!
//! - **collection** connectors, looked up by name (`connectors.get("entries")`);
//! - **entry** connectors, built per identifier by a factory
//!   (`connectors.entry("entry", "42")`), which captures the id at construction.

use crate::envelope::{Envelope, Payload};
use crate::error::{ActionError, ConnectorError};
use crate::request::Request;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub type ConnectorResult = Result<Envelope<Payload>, ConnectorError>;

/// Asynchronous CRUD over one resource.
///
/// Failures must be reported, never swallowed: the engine hands them to the
/// caller of the action untouched.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn read(&self, req: &Request) -> ConnectorResult;
    async fn create(&self, req: &Request) -> ConnectorResult;
    async fn update(&self, req: &Request) -> ConnectorResult;
    async fn delete(&self, req: &Request) -> ConnectorResult;
}

/// Builds an entry connector bound to one identifier.
pub type EntryFactory = Arc<dyn Fn(&str) -> Arc<dyn Connector> + Send + Sync>;

/// Named connectors available to actions.
///
/// Shared read-only by every action invocation; cloning only clones `Arc`s.
#[derive(Clone, Default)]
pub struct ConnectorSet {
    collections: BTreeMap<String, Arc<dyn Connector>>,
    entries: BTreeMap<String, EntryFactory>,
}

impl ConnectorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, name: impl Into<String>, connector: impl Connector + 'static) -> Self {
        self.with_shared(name, Arc::new(connector))
    }

    pub fn with_shared(mut self, name: impl Into<String>, connector: Arc<dyn Connector>) -> Self {
        self.collections.insert(name.into(), connector);
        self
    }

    pub fn with_entry<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&str) -> Arc<dyn Connector> + Send + Sync + 'static,
    {
        self.entries.insert(name.into(), Arc::new(factory));
        self
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Connector>, ActionError> {
        self.collections
            .get(name)
            .cloned()
            .ok_or_else(|| ActionError::UnknownConnector(name.to_owned()))
    }

    pub fn entry(&self, name: &str, id: &str) -> Result<Arc<dyn Connector>, ActionError> {
        self.entries
            .get(name)
            .map(|factory| factory(id))
            .ok_or_else(|| ActionError::UnknownConnector(name.to_owned()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.collections.contains_key(name) || self.entries.contains_key(name)
    }
}

impl fmt::Debug for ConnectorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorSet")
            .field("collections", &self.collections.keys().collect::<Vec<_>>())
            .field("entries", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

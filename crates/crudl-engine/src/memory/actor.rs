//! # Resource Actor
//!
//! The server half of an in-memory resource. It owns an ordered record map and
//! processes its messages one at a time in its own task, so the store needs no
//! lock.
//!
//! ```rust
//! use crudl_engine::memory::ResourceActor;
//! use crudl_engine::envelope::record;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() {
//!     // 1. Create
//!     let (actor, client) = ResourceActor::new("tags", 8);
//!
//!     // 2. Run
//!     tokio::spawn(actor.run());
//!
//!     // 3. Use
//!     let created = client.create(record(json!({"name": "rust"}))).await.unwrap();
//!     assert_eq!(created["id"], 1);
//! }
//! ```
//!
//! ## Operations
//!
//! * **Create**: assigns the next id, stores the record with an `id` column.
//! * **Get**: a clone of the record, or `None`.
//! * **List**: filters, sorts and pages a snapshot of the records.
//! * **Update**: merges the new columns over the stored record (`id` is kept).
//! * **Delete**: removes and returns the record.
//!
//! Create and Update run the optional record check first; a rejected record is
//! answered with [`ConnectorError::ValidationFailed`] and not stored.

use super::client::ResourceClient;
use super::message::{Page, Query, ResourceRequest};
use super::query::{matches_all, sort};
use crate::envelope::{Pagination, Record};
use crate::error::{ConnectorError, ValidationErrors};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Server-side validation of a complete record.
pub type RecordCheck = Arc<dyn Fn(&Record) -> Option<ValidationErrors> + Send + Sync>;

pub struct ResourceActor {
    name: String,
    receiver: mpsc::Receiver<ResourceRequest>,
    store: BTreeMap<u64, Record>,
    next_id: u64,
    check: Option<RecordCheck>,
}

impl ResourceActor {
    /// Creates the actor and its client.
    ///
    /// `buffer_size` is the mailbox capacity; a full mailbox makes callers wait.
    pub fn new(name: impl Into<String>, buffer_size: usize) -> (Self, ResourceClient) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let actor = Self {
            name: name.into(),
            receiver,
            store: BTreeMap::new(),
            next_id: 1,
            check: None,
        };
        (actor, ResourceClient::new(sender))
    }

    pub fn with_check<F>(mut self, check: F) -> Self
    where
        F: Fn(&Record) -> Option<ValidationErrors> + Send + Sync + 'static,
    {
        self.check = Some(Arc::new(check));
        self
    }

    /// Loads fixture records. A numeric `id` column is kept, anything else
    /// gets the next free id.
    pub fn seed(mut self, records: impl IntoIterator<Item = Record>) -> Self {
        for mut record in records {
            let id = match record.get("id").and_then(Value::as_u64) {
                Some(id) => id,
                None => self.next_id,
            };
            self.next_id = self.next_id.max(id + 1);
            record.insert("id".into(), Value::from(id));
            self.store.insert(id, record);
        }
        self
    }

    /// Runs the event loop until every client is dropped.
    pub async fn run(mut self) {
        let resource = self.name.clone();
        let resource = resource.as_str();
        info!(resource, size = self.store.len(), "Actor started");

        while let Some(msg) = self.receiver.recv().await {
            match msg {
                ResourceRequest::Create { data, respond_to } => {
                    debug!(resource, ?data, "Create");
                    let id = self.next_id;
                    let mut record = data;
                    record.insert("id".into(), Value::from(id));
                    if let Err(e) = self.checked(&record) {
                        warn!(resource, error = %e, "Create rejected");
                        let _ = respond_to.send(Err(e));
                        continue;
                    }
                    self.next_id += 1;
                    self.store.insert(id, record.clone());
                    info!(resource, id, size = self.store.len(), "Created");
                    let _ = respond_to.send(Ok(record));
                }
                ResourceRequest::Get { id, respond_to } => {
                    let record = self.store.get(&id).cloned();
                    let found = record.is_some();
                    debug!(resource, id, found, "Get");
                    let _ = respond_to.send(Ok(record));
                }
                ResourceRequest::List { query, respond_to } => {
                    let page = self.list(&query);
                    debug!(resource, filters = query.filters.len(), total = page.total, "List");
                    let _ = respond_to.send(Ok(page));
                }
                ResourceRequest::Update {
                    id,
                    data,
                    respond_to,
                } => {
                    debug!(resource, id, ?data, "Update");
                    let Some(current) = self.store.get(&id) else {
                        warn!(resource, id, "Not found");
                        let _ = respond_to.send(Err(ConnectorError::NotFound(id.to_string())));
                        continue;
                    };
                    let mut record = current.clone();
                    record.extend(data);
                    record.insert("id".into(), Value::from(id));
                    if let Err(e) = self.checked(&record) {
                        warn!(resource, id, error = %e, "Update rejected");
                        let _ = respond_to.send(Err(e));
                        continue;
                    }
                    self.store.insert(id, record.clone());
                    info!(resource, id, "Updated");
                    let _ = respond_to.send(Ok(record));
                }
                ResourceRequest::Delete { id, respond_to } => {
                    debug!(resource, id, "Delete");
                    match self.store.remove(&id) {
                        Some(record) => {
                            info!(resource, id, size = self.store.len(), "Deleted");
                            let _ = respond_to.send(Ok(record));
                        }
                        None => {
                            warn!(resource, id, "Not found");
                            let _ = respond_to.send(Err(ConnectorError::NotFound(id.to_string())));
                        }
                    }
                }
            }
        }

        info!(resource, size = self.store.len(), "Shutdown");
    }

    fn checked(&self, record: &Record) -> Result<(), ConnectorError> {
        match self.check.as_ref().and_then(|check| check(record)) {
            Some(errors) if !errors.is_empty() => Err(ConnectorError::ValidationFailed(errors)),
            _ => Ok(()),
        }
    }

    fn list(&self, query: &Query) -> Page {
        let mut records: Vec<Record> = self
            .store
            .values()
            .filter(|record| matches_all(record, &query.filters))
            .cloned()
            .collect();
        sort(&mut records, &query.sorting);

        let total = records.len();
        let Some(page_size) = query.page_size else {
            return Page {
                records,
                total,
                pagination: None,
            };
        };
        let page = query.page.max(1);
        let records = records
            .into_iter()
            .skip((page - 1).saturating_mul(page_size))
            .take(page_size)
            .collect();
        Page {
            records,
            total,
            pagination: Some(Pagination::new(page, page_size, total)),
        }
    }
}

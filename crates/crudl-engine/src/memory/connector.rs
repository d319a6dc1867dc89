//! Connectors over in-memory resources.
//!
//! - [`MemoryConnector`]: the collection (`read` = filtered, sorted, paged list;
//!   `create`).
//! - [`MemoryEntry`]: one record bound by id (`read`, `update`, `delete`).
//! - [`OptionsConnector`]: a read-only view of a collection as select options.
//!
//! Writes require an authenticated user.

use super::client::ResourceClient;
use super::message::Query;
use crate::connector::{Connector, ConnectorResult};
use crate::envelope::{Envelope, Record};
use crate::error::ConnectorError;
use crate::request::{value_key, Request};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

fn require_user(req: &Request) -> Result<(), ConnectorError> {
    if req.auth().is_anonymous() {
        return Err(ConnectorError::Unauthorized("anonymous users cannot write".into()));
    }
    Ok(())
}

fn unsupported(operation: &str, target: &str) -> ConnectorError {
    ConnectorError::Transport(format!("{operation} is not supported by {target} connectors"))
}

#[derive(Debug, Clone)]
pub struct MemoryConnector {
    client: ResourceClient,
    page_size: Option<usize>,
}

impl MemoryConnector {
    pub fn new(client: ResourceClient) -> Self {
        Self {
            client,
            page_size: None,
        }
    }

    /// Pages list reads by `page_size` records.
    pub fn paginated(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Factory for entry connectors of the same resource.
    pub fn entries(&self) -> impl Fn(&str) -> Arc<dyn Connector> + Send + Sync + 'static {
        let client = self.client.clone();
        move |id: &str| -> Arc<dyn Connector> {
            Arc::new(MemoryEntry {
                client: client.clone(),
                id: id.to_owned(),
            })
        }
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn read(&self, req: &Request) -> ConnectorResult {
        let page = self.client.list(Query::from_request(req, self.page_size)).await?;
        Ok(Envelope::many(page.records)
            .with_total(Some(page.total))
            .with_pagination(page.pagination))
    }

    async fn create(&self, req: &Request) -> ConnectorResult {
        require_user(req)?;
        let record = self.client.create(req.data().clone()).await?;
        Ok(Envelope::one(record))
    }

    async fn update(&self, _req: &Request) -> ConnectorResult {
        Err(unsupported("update", "collection"))
    }

    async fn delete(&self, _req: &Request) -> ConnectorResult {
        Err(unsupported("delete", "collection"))
    }
}

/// One record of a resource, bound to its id at construction.
#[derive(Debug, Clone)]
pub struct MemoryEntry {
    client: ResourceClient,
    id: String,
}

impl MemoryEntry {
    pub fn new(client: ResourceClient, id: impl Into<String>) -> Self {
        Self {
            client,
            id: id.into(),
        }
    }

    /// Ids the store cannot hold can never be found.
    fn id(&self) -> Result<u64, ConnectorError> {
        self.id
            .parse()
            .map_err(|_| ConnectorError::NotFound(self.id.clone()))
    }
}

#[async_trait]
impl Connector for MemoryEntry {
    async fn read(&self, _req: &Request) -> ConnectorResult {
        let id = self.id()?;
        match self.client.get(id).await? {
            Some(record) => Ok(Envelope::one(record)),
            None => Err(ConnectorError::NotFound(self.id.clone())),
        }
    }

    async fn create(&self, _req: &Request) -> ConnectorResult {
        Err(unsupported("create", "entry"))
    }

    async fn update(&self, req: &Request) -> ConnectorResult {
        require_user(req)?;
        let id = self.id()?;
        Ok(Envelope::one(self.client.update(id, req.data().clone()).await?))
    }

    async fn delete(&self, req: &Request) -> ConnectorResult {
        require_user(req)?;
        let id = self.id()?;
        Ok(Envelope::one(self.client.delete(id).await?))
    }
}

/// Reads a whole resource as `{"options": [{"value", "label"}]}`.
#[derive(Debug, Clone)]
pub struct OptionsConnector {
    client: ResourceClient,
    value: String,
    label: String,
}

impl OptionsConnector {
    pub fn new(client: ResourceClient, value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            client,
            value: value.into(),
            label: label.into(),
        }
    }

    fn option(&self, record: &Record) -> Value {
        let label = match record.get(&self.label) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => value_key(other),
            None => String::new(),
        };
        json!({
            "value": record.get(&self.value).cloned().unwrap_or(Value::Null),
            "label": label,
        })
    }
}

#[async_trait]
impl Connector for OptionsConnector {
    async fn read(&self, req: &Request) -> ConnectorResult {
        let page = self.client.list(Query::from_request(req, None)).await?;
        let options: Vec<Value> = page.records.iter().map(|r| self.option(r)).collect();
        let mut props = Record::new();
        props.insert("options".into(), Value::Array(options));
        Ok(Envelope::one(props).with_total(Some(page.total)))
    }

    async fn create(&self, _req: &Request) -> ConnectorResult {
        Err(unsupported("create", "options"))
    }

    async fn update(&self, _req: &Request) -> ConnectorResult {
        Err(unsupported("update", "options"))
    }

    async fn delete(&self, _req: &Request) -> ConnectorResult {
        Err(unsupported("delete", "options"))
    }
}

//! # Resource Client
//!
//! The sending half of a [`ResourceActor`](super::ResourceActor).

use super::message::{Page, Query, ResourceRequest};
use crate::envelope::Record;
use crate::error::ConnectorError;
use tokio::sync::{mpsc, oneshot};

/// Async API over one in-memory resource.
///
/// Holds only a sender, so cloning is inexpensive and clones can be shared
/// across tasks and connectors. A closed actor shows up as a
/// [`ConnectorError::Transport`], like any other unreachable backend.
#[derive(Debug, Clone)]
pub struct ResourceClient {
    sender: mpsc::Sender<ResourceRequest>,
}

impl ResourceClient {
    pub fn new(sender: mpsc::Sender<ResourceRequest>) -> Self {
        Self { sender }
    }

    pub async fn create(&self, data: Record) -> Result<Record, ConnectorError> {
        let (respond_to, response) = oneshot::channel();
        self.send(ResourceRequest::Create { data, respond_to }).await?;
        response.await.map_err(|_| dropped())?
    }

    pub async fn get(&self, id: u64) -> Result<Option<Record>, ConnectorError> {
        let (respond_to, response) = oneshot::channel();
        self.send(ResourceRequest::Get { id, respond_to }).await?;
        response.await.map_err(|_| dropped())?
    }

    pub async fn list(&self, query: Query) -> Result<Page, ConnectorError> {
        let (respond_to, response) = oneshot::channel();
        self.send(ResourceRequest::List { query, respond_to }).await?;
        response.await.map_err(|_| dropped())?
    }

    pub async fn update(&self, id: u64, data: Record) -> Result<Record, ConnectorError> {
        let (respond_to, response) = oneshot::channel();
        self.send(ResourceRequest::Update {
            id,
            data,
            respond_to,
        })
        .await?;
        response.await.map_err(|_| dropped())?
    }

    pub async fn delete(&self, id: u64) -> Result<Record, ConnectorError> {
        let (respond_to, response) = oneshot::channel();
        self.send(ResourceRequest::Delete { id, respond_to }).await?;
        response.await.map_err(|_| dropped())?
    }

    async fn send(&self, msg: ResourceRequest) -> Result<(), ConnectorError> {
        tracing::trace!("Sending request");
        self.sender
            .send(msg)
            .await
            .map_err(|_| ConnectorError::Transport("Actor closed".into()))
    }
}

fn dropped() -> ConnectorError {
    ConnectorError::Transport("Actor dropped response channel".into())
}

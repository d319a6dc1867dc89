//! # Store Messages
//!
//! The messages a [`ResourceClient`](super::ResourceClient) sends to its
//! [`ResourceActor`](super::ResourceActor). Each one carries a oneshot sender
//! the actor answers on.

use crate::envelope::{Pagination, Record};
use crate::error::ConnectorError;
use crate::request::{Filter, Request, Sort};
use tokio::sync::oneshot;

/// Type alias for the one-shot response channel used by resource actors.
pub type Response<T> = oneshot::Sender<Result<T, ConnectorError>>;

/// Selection, ordering and paging of a list read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub sorting: Vec<Sort>,
    /// 1-based page; ignored when `page_size` is `None`.
    pub page: usize,
    pub page_size: Option<usize>,
}

impl Query {
    pub fn from_request(req: &Request, page_size: Option<usize>) -> Self {
        Self {
            filters: req.filters().to_vec(),
            sorting: req.sorting().to_vec(),
            page: req.page().unwrap_or(1).max(1),
            page_size,
        }
    }
}

/// One page of matching records.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub records: Vec<Record>,
    /// Matching records before paging.
    pub total: usize,
    pub pagination: Option<Pagination>,
}

#[derive(Debug)]
pub enum ResourceRequest {
    Create {
        data: Record,
        respond_to: Response<Record>,
    },
    Get {
        id: u64,
        respond_to: Response<Option<Record>>,
    },
    List {
        query: Query,
        respond_to: Response<Page>,
    },
    Update {
        id: u64,
        data: Record,
        respond_to: Response<Record>,
    },
    Delete {
        id: u64,
        respond_to: Response<Record>,
    },
}

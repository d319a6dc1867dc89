//! # Response Envelope
//!
//! Every connector call resolves to an [`Envelope`]: the payload plus the
//! metadata derived from the response (total count, pagination). Envelopes are
//! never mutated in place. The `set_*` methods return a new envelope, which is
//! what lets pipeline stages compose without touching the value they were given.

use crate::error::ConnectorError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single record as exchanged with connectors.
pub type Record = serde_json::Map<String, Value>;

/// Connector payloads are either one record or a sequence of records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Many(Vec<Record>),
    One(Record),
}

impl Payload {
    pub fn len(&self) -> usize {
        match self {
            Payload::Many(records) => records.len(),
            Payload::One(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Payload::Many(records) if records.is_empty())
    }
}

/// Page position of a paginated collection read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// 1-based page number.
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

impl Pagination {
    pub fn new(page: usize, page_size: usize, total: usize) -> Self {
        let total_pages = if page_size == 0 {
            0
        } else {
            total.div_ceil(page_size)
        };
        Self {
            page,
            page_size,
            total_pages,
        }
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }
}

/// Result payload plus response metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    total: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pagination: Option<Pagination>,
}

impl<T> Envelope<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            total: None,
            pagination: None,
        }
    }

    pub fn with_total(mut self, total: Option<usize>) -> Self {
        self.total = total;
        self
    }

    pub fn with_pagination(mut self, pagination: Option<Pagination>) -> Self {
        self.pagination = pagination;
        self
    }

    pub fn data(&self) -> &T {
        &self.data
    }

    pub fn into_data(self) -> T {
        self.data
    }

    pub fn total(&self) -> Option<usize> {
        self.total
    }

    pub fn pagination(&self) -> Option<Pagination> {
        self.pagination
    }

    /// Returns a new envelope carrying `data` and this envelope's metadata.
    pub fn set_data<U>(&self, data: U) -> Envelope<U> {
        Envelope {
            data,
            total: self.total,
            pagination: self.pagination,
        }
    }

    /// Returns a new envelope whose data is derived from this one's.
    pub fn map_data<U>(&self, f: impl FnOnce(&T) -> U) -> Envelope<U> {
        self.set_data(f(&self.data))
    }

    pub fn set_total(&self, total: Option<usize>) -> Self
    where
        T: Clone,
    {
        self.set_data(self.data.clone()).with_total(total)
    }

    pub fn set_pagination(&self, pagination: Option<Pagination>) -> Self
    where
        T: Clone,
    {
        self.set_data(self.data.clone()).with_pagination(pagination)
    }
}

impl Envelope<Payload> {
    pub fn one(record: Record) -> Self {
        Self::new(Payload::One(record))
    }

    pub fn many(records: Vec<Record>) -> Self {
        let total = records.len();
        Self::new(Payload::Many(records)).with_total(Some(total))
    }

    /// Narrows the payload to a single record.
    pub fn into_one(self) -> Result<Envelope<Record>, ConnectorError> {
        let Envelope {
            data,
            total,
            pagination,
        } = self;
        match data {
            Payload::One(record) => Ok(Envelope {
                data: record,
                total,
                pagination,
            }),
            Payload::Many(_) => Err(ConnectorError::Transport(
                "expected a single record, got a collection".into(),
            )),
        }
    }

    /// Narrows the payload to a sequence of records.
    pub fn into_many(self) -> Result<Envelope<Vec<Record>>, ConnectorError> {
        let Envelope {
            data,
            total,
            pagination,
        } = self;
        match data {
            Payload::Many(records) => Ok(Envelope {
                data: records,
                total,
                pagination,
            }),
            Payload::One(_) => Err(ConnectorError::Transport(
                "expected a collection, got a single record".into(),
            )),
        }
    }
}

/// Builds a [`Record`] from a JSON object. Anything else yields an empty record.
pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

//! # Mock Connector
//!
//! [`MockConnector`] implements the same [`Connector`] protocol as a real
//! connector but answers from a queue of expectations. It lets you test
//! actions, props producers and whole views without a store behind them.
//!
//! | Feature | MockConnector | Memory store |
//! |---------|---------------|--------------|
//! | **State** | None (scripted responses) | Real records |
//! | **Error injection** | Easy (`return_err`) | Needs specific state |
//! | **Interleavings** | `respond_with(receiver)` | Scheduler dependent |
//!
//! ```rust
//! use crudl_engine::mock::MockConnector;
//! use crudl_engine::{Connector, Envelope, Request};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mock = MockConnector::new();
//!     mock.expect_read().return_ok(Envelope::many(vec![]));
//!
//!     let res = mock.read(&Request::default()).await.unwrap();
//!     assert!(res.data().is_empty());
//!     mock.verify();
//! }
//! ```
//!
//! Every call is recorded (operation, bound entry id, request), so a test can
//! also assert that a connector was *not* called, e.g. when validation blocks
//! a save.

use crate::connector::{Connector, ConnectorResult};
use crate::envelope::{Envelope, Payload};
use crate::error::ConnectorError;
use crate::request::Request;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::oneshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Create,
    Update,
    Delete,
}

/// One recorded connector call.
#[derive(Debug, Clone)]
pub struct Call {
    pub operation: Operation,
    /// The id an entry connector was bound to, `None` for collection calls.
    pub id: Option<String>,
    pub request: Request,
}

enum Response {
    Ready(ConnectorResult),
    Deferred(oneshot::Receiver<ConnectorResult>),
}

struct Expectation {
    operation: Operation,
    response: Response,
}

/// A connector with expectation tracking for fluent testing.
///
/// Clones share the same expectation queue and call log.
#[derive(Clone, Default)]
pub struct MockConnector {
    expectations: Arc<Mutex<VecDeque<Expectation>>>,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect_read(&self) -> ExpectationBuilder {
        self.expect(Operation::Read)
    }

    pub fn expect_create(&self) -> ExpectationBuilder {
        self.expect(Operation::Create)
    }

    pub fn expect_update(&self) -> ExpectationBuilder {
        self.expect(Operation::Update)
    }

    pub fn expect_delete(&self) -> ExpectationBuilder {
        self.expect(Operation::Delete)
    }

    fn expect(&self, operation: Operation) -> ExpectationBuilder {
        ExpectationBuilder {
            operation,
            expectations: Arc::clone(&self.expectations),
        }
    }

    /// Every call seen so far, in arrival order.
    pub fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Factory for entry connectors sharing this mock's queue and call log.
    pub fn entry_factory(&self) -> impl Fn(&str) -> Arc<dyn Connector> + Send + Sync + 'static {
        let mock = self.clone();
        move |id: &str| -> Arc<dyn Connector> {
            Arc::new(MockEntry {
                mock: mock.clone(),
                id: id.to_owned(),
            })
        }
    }

    /// Verifies that all expectations were met.
    pub fn verify(&self) {
        let remaining = self
            .expectations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        if remaining > 0 {
            panic!("Not all expectations were met. {remaining} remaining");
        }
    }

    async fn respond(&self, operation: Operation, id: Option<String>, req: &Request) -> ConnectorResult {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Call {
                operation,
                id,
                request: req.clone(),
            });

        // Release the lock before awaiting a deferred response.
        let expectation = self
            .expectations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();

        match expectation {
            Some(Expectation { operation: expected, response }) if expected == operation => {
                match response {
                    Response::Ready(result) => result,
                    Response::Deferred(receiver) => receiver.await.unwrap_or_else(|_| {
                        Err(ConnectorError::Transport("deferred response dropped".into()))
                    }),
                }
            }
            Some(Expectation { operation: expected, .. }) => {
                panic!("Unexpected request: expected {expected:?}, got {operation:?}")
            }
            None => panic!("Unexpected request: no expectation left for {operation:?}"),
        }
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn read(&self, req: &Request) -> ConnectorResult {
        self.respond(Operation::Read, None, req).await
    }

    async fn create(&self, req: &Request) -> ConnectorResult {
        self.respond(Operation::Create, None, req).await
    }

    async fn update(&self, req: &Request) -> ConnectorResult {
        self.respond(Operation::Update, None, req).await
    }

    async fn delete(&self, req: &Request) -> ConnectorResult {
        self.respond(Operation::Delete, None, req).await
    }
}

struct MockEntry {
    mock: MockConnector,
    id: String,
}

#[async_trait]
impl Connector for MockEntry {
    async fn read(&self, req: &Request) -> ConnectorResult {
        self.mock.respond(Operation::Read, Some(self.id.clone()), req).await
    }

    async fn create(&self, req: &Request) -> ConnectorResult {
        self.mock.respond(Operation::Create, Some(self.id.clone()), req).await
    }

    async fn update(&self, req: &Request) -> ConnectorResult {
        self.mock.respond(Operation::Update, Some(self.id.clone()), req).await
    }

    async fn delete(&self, req: &Request) -> ConnectorResult {
        self.mock.respond(Operation::Delete, Some(self.id.clone()), req).await
    }
}

/// Builder for one expected call.
pub struct ExpectationBuilder {
    operation: Operation,
    expectations: Arc<Mutex<VecDeque<Expectation>>>,
}

impl ExpectationBuilder {
    /// Sets the expectation to return a successful result.
    pub fn return_ok(self, envelope: Envelope<Payload>) {
        self.push(Response::Ready(Ok(envelope)));
    }

    /// Sets the expectation to return an error.
    pub fn return_err(self, error: ConnectorError) {
        self.push(Response::Ready(Err(error)));
    }

    /// Holds the call open until a result is sent on the paired sender.
    pub fn respond_with(self, receiver: oneshot::Receiver<ConnectorResult>) {
        self.push(Response::Deferred(receiver));
    }

    fn push(self, response: Response) {
        self.expectations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Expectation {
                operation: self.operation,
                response,
            });
    }
}

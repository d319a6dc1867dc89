//! # CRUDL Engine
//!
//! A declarative engine for admin interfaces. An admin is described as data
//! (views, fields, actions) and the engine executes it: it dispatches actions
//! to connectors, reshapes their responses, keeps dependent form fields in
//! sync and validates input before anything is written.
//!
//! ## Architecture Overview
//!
//! 1. **Transport** ([`connector`], [`envelope`], [`request`]): a uniform async
//!    CRUD protocol over named resources. Every call takes a [`Request`] and
//!    yields an [`Envelope`] or a [`ConnectorError`].
//! 2. **Actions** ([`action`], [`crud`], [`pipeline`], [`resolver`]): named
//!    operations (`list`, `get`, `add`, `save`, `delete`, `search`, `select`)
//!    composed from connector calls and pure transform stages, dispatched by
//!    the [`ActionResolver`].
//! 3. **Forms** ([`field`], [`graph`], [`form`], [`validation`]): field specs,
//!    the acyclic watch graph between them, and the form state that cascades
//!    value changes and applies async props in last-writer-wins order.
//! 4. **Views** ([`view`]): list, change and add views with fieldsets, tabs and
//!    filters, registered by route.
//!
//! Supporting pieces: an actor-backed in-memory store ([`memory`]), a mock
//! connector for tests ([`mock`]), configuration ([`config`]) and logging
//! setup ([`tracing`](mod@tracing)).
//!
//! ## Quick Start
//!
//! ```rust
//! use crudl_engine::{crud, ActionMap, ActionName, ActionResolver, ConnectorSet, Request};
//! use crudl_engine::memory::{MemoryConnector, ResourceActor};
//! use crudl_engine::view::{ListView, RouteTemplate};
//!
//! #[tokio::main]
//! async fn main() {
//!     let (actor, client) = ResourceActor::new("entries", 8);
//!     tokio::spawn(actor.run());
//!
//!     let connectors = ConnectorSet::new().with("entries", MemoryConnector::new(client));
//!     let view = ListView::new(
//!         RouteTemplate::parse("entries").unwrap(),
//!         "Blog Entries",
//!         ActionMap::new().with(ActionName::List, crud::list("entries")),
//!     );
//!
//!     let resolver = ActionResolver::new(connectors);
//!     let out = resolver.invoke(&view, ActionName::List, Request::default()).await.unwrap();
//!     assert_eq!(out.as_data().unwrap().total(), Some(0));
//! }
//! ```

pub mod action;
pub mod config;
pub mod connector;
pub mod crud;
pub mod envelope;
pub mod error;
pub mod field;
pub mod form;
pub mod graph;
pub mod memory;
pub mod mock;
pub mod pipeline;
pub mod request;
pub mod resolver;
pub mod tracing;
pub mod validation;
pub mod view;

pub use action::{action, ActionFn, ActionMap, ActionName, ActionOutput, ActionResult, Choice};
pub use config::EngineConfig;
pub use connector::{Connector, ConnectorResult, ConnectorSet};
pub use envelope::{Envelope, Pagination, Payload, Record};
pub use error::{ActionError, ConfigError, ConnectorError, ErrorKind, ValidationErrors};
pub use field::{FieldKind, FieldSpec, FilterSpec, Watch};
pub use form::{FormController, FormState};
pub use graph::DependencyGraph;
pub use pipeline::Pipeline;
pub use request::{AuthInfo, Direction, Filter, Request, Sort};
pub use resolver::{ActionResolver, ActionSource};

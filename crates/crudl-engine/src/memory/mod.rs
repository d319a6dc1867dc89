//! # In-Memory Resources
//!
//! An actor-backed store for running an admin without a backend: each
//! resource is a [`ResourceActor`] owning its records, reached through a
//! cloneable [`ResourceClient`], and exposed to actions through the
//! connectors in this module.
//!
//! ```text
//! action -> MemoryConnector -> ResourceClient --mpsc--> ResourceActor
//!                                            <-oneshot-
//! ```

mod actor;
mod client;
mod connector;
mod message;
mod query;

pub use actor::{RecordCheck, ResourceActor};
pub use client::ResourceClient;
pub use connector::{MemoryConnector, MemoryEntry, OptionsConnector};
pub use message::{Page, Query, ResourceRequest, Response};
pub use query::{compare, matches_all, sort};

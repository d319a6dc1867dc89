//! # Admin Lifecycle
//!
//! Starts the blog's resource actors, wires their clients into connectors
//! and views, and shuts everything down again.
//!
//! ## Startup
//!
//! 1. **Actors**: one [`ResourceActor`](crudl_engine::memory::ResourceActor)
//!    per resource, seeded from [`fixtures`](crate::fixtures) and guarded by
//!    its record check.
//! 2. **Connectors**: collection, entry and options connectors over the
//!    actor clients.
//! 3. **Views**: the entries collection is registered, which builds every
//!    dependency graph once. A bad watch fails startup here, not on first use.
//!
//! ## Graceful Shutdown
//!
//! Actors stop when the last client of their resource is dropped:
//!
//! 1. **Drop connectors and clients**, closing the sender side of every mailbox.
//! 2. **Actors drain** what is queued and log their final size.
//! 3. **Await** every actor task.
//!
//! Clones of the [`ConnectorSet`](crudl_engine::ConnectorSet) held elsewhere
//! (a running [`FormController`](crudl_engine::FormController) with async
//! props, for example) keep their actors alive, so drop them first.

pub mod blog_admin;

pub use blog_admin::*;

//! # Blog Admin
//!
//! A complete admin for a blog, declared with `crudl_engine` and served from
//! in-memory resources.
//!
//! - **[entries]**: the entries collection (list, change and add views).
//! - **[connectors]**: named connectors over the blog resources, plus their
//!   server-side record checks.
//! - **[fixtures]**: seed records.
//! - **[menu]**: the navigation menu.
//! - **[lifecycle]**: starts and stops the resource actors.

pub mod connectors;
pub mod entries;
pub mod fixtures;
pub mod lifecycle;
pub mod menu;

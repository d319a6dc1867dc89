//! # Blog Connectors
//!
//! Wires the in-memory blog resources into the named connectors the entry
//! views use:
//!
//! | Name | Shape | Backing resource |
//! |------|-------|------------------|
//! | `entries`, `entry` | collection, entry | entries |
//! | `sections`, `categories`, `category` | collection, entry | sections, categories |
//! | `tags`, `tag` | collection, entry | tags |
//! | `links`, `link` | collection, entry | links |
//! | `*_options` | options (read-only) | sections, categories, tags, users |
//!
//! The record checks below are the server-side rules of the resources. They
//! run inside the actors, after (and independent of) the form validation of
//! the views.

use crudl_engine::memory::{MemoryConnector, OptionsConnector, ResourceClient};
use crudl_engine::request::is_blank;
use crudl_engine::validation::REQUIRED_MESSAGE;
use crudl_engine::{ConnectorSet, Record, ValidationErrors};
use serde_json::Value;

/// Clients of every blog resource.
#[derive(Debug, Clone)]
pub struct BlogClients {
    pub entries: ResourceClient,
    pub sections: ResourceClient,
    pub categories: ResourceClient,
    pub tags: ResourceClient,
    pub links: ResourceClient,
    pub users: ResourceClient,
}

pub fn connectors(clients: &BlogClients, page_size: usize) -> ConnectorSet {
    let entries = MemoryConnector::new(clients.entries.clone()).paginated(page_size);
    let categories = MemoryConnector::new(clients.categories.clone());
    let tags = MemoryConnector::new(clients.tags.clone());
    let links = MemoryConnector::new(clients.links.clone());

    ConnectorSet::new()
        .with_entry("entry", entries.entries())
        .with("entries", entries)
        .with("sections", MemoryConnector::new(clients.sections.clone()))
        .with_entry("category", categories.entries())
        .with("categories", categories)
        .with_entry("tag", tags.entries())
        .with("tags", tags)
        .with_entry("link", links.entries())
        .with("links", links)
        .with("sections_options", OptionsConnector::new(clients.sections.clone(), "id", "name"))
        .with("categories_options", OptionsConnector::new(clients.categories.clone(), "id", "name"))
        .with("tags_options", OptionsConnector::new(clients.tags.clone(), "id", "name"))
        .with("users_options", OptionsConnector::new(clients.users.clone(), "username", "username"))
}

fn require(record: &Record, fields: &[&str]) -> Option<ValidationErrors> {
    let errors = fields
        .iter()
        .filter(|field| record.get(**field).is_none_or(is_blank))
        .fold(ValidationErrors::new(), |errors, field| errors.with_field(*field, REQUIRED_MESSAGE));
    (!errors.is_empty()).then_some(errors)
}

/// Entries need a title, a date and a section, although the forms do not
/// mark the section as required.
pub fn entry_check(record: &Record) -> Option<ValidationErrors> {
    require(record, &["title", "date", "section"])
}

pub fn link_check(record: &Record) -> Option<ValidationErrors> {
    let mut errors = require(record, &["url", "entry"]).unwrap_or_default();
    if let Some(Value::String(url)) = record.get("url") {
        if !url.is_empty() && !(url.starts_with("http://") || url.starts_with("https://")) {
            errors.insert("url", "Enter a valid URL.");
        }
    }
    (!errors.is_empty()).then_some(errors)
}

pub fn named_check(record: &Record) -> Option<ValidationErrors> {
    require(record, &["name"])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crudl_engine::envelope::record;
    use serde_json::json;

    #[test]
    fn entry_check_requires_section() {
        let errors = entry_check(&record(json!({"title": "t", "date": "2024-01-01", "section": ""}))).unwrap();
        assert_eq!(errors.field("section"), Some(REQUIRED_MESSAGE));
        assert_eq!(errors.field("title"), None);
        assert!(entry_check(&record(json!({"title": "t", "date": "2024-01-01", "section": 1}))).is_none());
    }

    #[test]
    fn link_check_rejects_relative_urls() {
        let errors = link_check(&record(json!({"url": "docs/book", "entry": 1}))).unwrap();
        assert_eq!(errors.field("url"), Some("Enter a valid URL."));
        assert!(link_check(&record(json!({"url": "https://crates.io", "entry": 1}))).is_none());
    }
}

//! Navigation menu: groups of items, each pointing at a collection's list
//! view and, when it has one, its add view.

use crudl_engine::view::{Collection, ViewRegistry};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuItem {
    pub label: String,
    pub list_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub add_path: Option<String>,
}

impl MenuItem {
    pub fn for_collection(label: impl Into<String>, collection: &Collection) -> Self {
        Self {
            label: label.into(),
            list_path: collection.list.route.render(None),
            add_path: collection.add.as_ref().map(|add| add.route.render(None)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuGroup {
    pub label: String,
    pub items: Vec<MenuItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Menu {
    pub groups: Vec<MenuGroup>,
}

impl Menu {
    /// Adds a group of `(label, collection)` items. Collections that are not
    /// registered are left out, and so is a group left with no items.
    pub fn group(mut self, label: impl Into<String>, registry: &ViewRegistry, items: &[(&str, &str)]) -> Self {
        let items: Vec<MenuItem> = items
            .iter()
            .filter_map(|(item, name)| registry.collection(name).map(|c| MenuItem::for_collection(*item, c)))
            .collect();
        if !items.is_empty() {
            self.groups.push(MenuGroup {
                label: label.into(),
                items,
            });
        }
        self
    }
}

pub fn blog_menu(registry: &ViewRegistry) -> Menu {
    Menu::default()
        .group(
            "Blog Application",
            registry,
            &[("Entries", "entries"), ("Sections", "sections")],
        )
        .group("Admin", registry, &[("Users", "users")])
}

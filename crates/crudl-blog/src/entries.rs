//! # Blog Entries
//!
//! The `entries` collection: list view with filters, change view with three
//! fieldsets and a Links tab, and an add view that shares the change view's
//! fieldsets and validator.
//!
//! ## Cascading category
//!
//! `category` watches `section`. Changing the section clears the category,
//! makes it read-only while no section is chosen, and scopes the category
//! `search` to the chosen section. Without a section the search yields no
//! candidates instead of failing.

use crudl_engine::action::{action, ActionOutput, Choice};
use crudl_engine::crud::{self, choice_of, Search};
use crudl_engine::field::{to_props, FieldKind, FieldSpec, FilterSpec, Props, PropsFuture, Watch};
use crudl_engine::pipeline::{with_column, Pipeline};
use crudl_engine::request::{is_blank, value_key};
use crudl_engine::view::{AddView, ChangeView, Collection, Fieldset, ListField, ListView, Render, RouteTemplate, TabView};
use crudl_engine::{
    ActionError, ActionFn, ActionMap, ActionName, ConfigError, ConnectorSet, Direction, Record, Request,
    ValidationErrors,
};
use serde_json::{json, Value};
use std::sync::Arc;

pub const CATEGORY_OR_TAGS: &str = "Either `Category` or `Tags` is required.";
pub const ONLINE_REQUIRES_TEXT: &str = "The summary is required with status \"Online\".";
pub const DATE_FORMAT_MESSAGE: &str = "Please enter a date (YYYY-MM-DD).";

const CATEGORY_HELP: &str = "Select a category";
const CATEGORY_LOCKED_HELP: &str = "In order to select a category, you have to select a section first";

pub fn collection() -> Result<Collection, ConfigError> {
    let change = change_view()?;
    let add = add_view(&change)?;
    Ok(Collection {
        name: "entries".into(),
        list: list_view()?,
        change,
        add: Some(add),
    })
}

// --- List ---

pub fn list_view() -> Result<ListView, ConfigError> {
    let view = ListView::new(
        RouteTemplate::parse("entries")?,
        "Blog Entries",
        ActionMap::new().with(ActionName::List, list_entries()),
    )
    .fields(vec![
        ListField::new("id", "ID"),
        ListField::new("section", "Section").key("section_name").sortable(),
        ListField::new("category", "Category").key("category_name").sortable(),
        ListField::new("title", "Title").main().sortable(),
        ListField::new("status", "Status").key("status_name").sortable(),
        ListField::new("date", "Date").sortable().sorted(Direction::Descending, 2),
        ListField::new("sticky", "Sticky")
            .render(Render::Boolean)
            .sortable()
            .sorted(Direction::Descending, 1),
        ListField::new("is_owner", "Owner").render(Render::Boolean),
        ListField::new("counter_links", "No. Links").render(Render::Number),
        ListField::new("counter_tags", "No. Tags").render(Render::Number),
    ])
    .filters(filters())
    .search("search");
    Ok(view)
}

/// Reads entries and adds the columns that depend on the caller.
fn list_entries() -> ActionFn {
    action(|req: Request, connectors: ConnectorSet| async move {
        let user = req.auth().user.clone();
        let pipeline = Pipeline::new()
            .map(with_column("is_owner", move |row| {
                json!(row.get("owner").and_then(Value::as_str) == Some(user.as_str()))
            }))
            .map(with_column("counter_tags", |row| {
                json!(row.get("tags").and_then(Value::as_array).map_or(0, Vec::len))
            }));
        let entries = connectors.get("entries")?;
        let rows = pipeline.run(entries.read(&req)).await?;
        Ok::<_, ActionError>(ActionOutput::from(rows))
    })
}

fn status_options() -> Props {
    to_props(json!({
        "options": [
            {"value": "0", "label": "Draft"},
            {"value": "1", "label": "Online"},
        ]
    }))
}

/// Props that lock `category` until a section is chosen.
fn category_lock(section: &Value) -> Props {
    let locked = is_blank(section);
    to_props(json!({
        "readOnly": locked,
        "helpText": if locked { CATEGORY_LOCKED_HELP } else { CATEGORY_HELP },
    }))
}

/// Props read from an options connector.
fn options_props(name: &'static str) -> impl Fn(Request, ConnectorSet) -> PropsFuture + Send + Sync + 'static {
    move |req: Request, connectors: ConnectorSet| -> PropsFuture {
        Box::pin(async move {
            let res = connectors.get(name)?.read(&req).await?;
            Ok::<_, ActionError>(res.into_one()?.into_data())
        })
    }
}

/// `YYYY-MM-DD` by shape only; the calendar is not checked.
pub fn is_date_shaped(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}

pub fn filters() -> Vec<FilterSpec> {
    vec![
        FieldSpec::new("section", FieldKind::Select)
            .label("Section")
            .props_with(options_props("sections_options")),
        FieldSpec::new("category", FieldKind::Select)
            .label("Category")
            .watch(Watch::on("section").set_props(category_lock))
            .props_with(options_props("categories_options")),
        FieldSpec::new("status", FieldKind::Select)
            .label("Status")
            .props(status_options()),
        FieldSpec::new("date_gt", FieldKind::Date)
            .label("Published after")
            .validate(|value, _| match value {
                Value::String(s) if !s.is_empty() && !is_date_shaped(s) => Some(DATE_FORMAT_MESSAGE.to_string()),
                _ => None,
            }),
        FieldSpec::new("sticky", FieldKind::Select).label("Sticky").props(to_props(json!({
            "options": [
                {"value": "true", "label": "True"},
                {"value": "false", "label": "False"},
            ],
            "helpText": "Note: We use Select in order to distinguish false and none.",
        }))),
        FieldSpec::new("search_summary", FieldKind::Search).label("Search (Summary)"),
    ]
}

// --- Change ---

fn text_required_when_online(value: &Value, values: &Record) -> Option<String> {
    let online = values.get("status").map(value_key).as_deref() == Some("1");
    (online && is_blank(value)).then(|| ONLINE_REQUIRES_TEXT.to_string())
}

fn category_or_tags(values: &Record) -> Option<ValidationErrors> {
    let missing = |name: &str| values.get(name).is_none_or(is_blank);
    (missing("category") && missing("tags")).then(|| ValidationErrors::form(CATEGORY_OR_TAGS))
}

fn category_label(row: &Record) -> Choice {
    let name = row.get("name").map(value_key).unwrap_or_default();
    let slug = row.get("slug").map(value_key).unwrap_or_default();
    Choice::new(
        row.get("id").cloned().unwrap_or(Value::Null),
        format!("<b>{name}</b> ({slug})"),
    )
}

fn sections_props(req: Request, connectors: ConnectorSet) -> PropsFuture {
    Box::pin(async move {
        let sections = connectors.get("sections")?.read(&req).await?.into_many()?;
        let to_choice = choice_of("id", "name");
        let options: Vec<Choice> = sections.data().iter().map(|s| to_choice(s)).collect();
        Ok::<_, ActionError>(to_props(json!({
            "helpText": "Select a section",
            "options": options,
        })))
    })
}

pub fn fieldsets() -> Vec<Fieldset> {
    vec![
        Fieldset::new(vec![
            FieldSpec::new("id", FieldKind::Hidden),
            FieldSpec::new("title", FieldKind::Text).label("Title").required(true),
            FieldSpec::new("status", FieldKind::Select)
                .label("Status")
                .required(true)
                .initial("0")
                .props(status_options()),
            FieldSpec::new("section", FieldKind::Select)
                .label("Section")
                .props_with(sections_props),
            FieldSpec::new("category", FieldKind::Autocomplete)
                .label("Category")
                .props(to_props(json!({"showAll": true, "helpText": CATEGORY_HELP})))
                .watch(Watch::on("section").set_value("").set_props(category_lock))
                .action(ActionName::Select, crud::select("category", choice_of("id", "name")))
                .action(
                    ActionName::Search,
                    Search::new("categories")
                        .query_filter("name")
                        .cascade("section", "section")
                        .choice(Arc::new(category_label))
                        .into_action(),
                ),
        ]),
        Fieldset::titled(
            "Content",
            true,
            vec![
                FieldSpec::new("date", FieldKind::Date)
                    .label("Date")
                    .required(true)
                    .initial_with(|_| json!(chrono::Local::now().format("%Y-%m-%d").to_string())),
                FieldSpec::new("sticky", FieldKind::Checkbox).label("Sticky"),
                FieldSpec::new("summary", FieldKind::Textarea)
                    .label("Summary")
                    .validate(text_required_when_online),
                FieldSpec::new("body", FieldKind::Textarea)
                    .label("Body")
                    .validate(text_required_when_online),
                FieldSpec::new("tags", FieldKind::AutocompleteMultiple)
                    .label("Tags")
                    .props(to_props(json!({"showAll": false, "helpText": "Select a tag"})))
                    .action(
                        ActionName::Search,
                        Search::new("tags_options")
                            .query_filter("name")
                            .lowercase_query()
                            .into_action(),
                    )
                    .action(ActionName::Select, crud::select("tag", choice_of("id", "name"))),
            ],
        ),
        Fieldset::titled(
            "Internal",
            false,
            vec![
                FieldSpec::new("createdate", FieldKind::Datetime)
                    .label("Date (Create)")
                    .read_only(true),
                FieldSpec::new("updatedate", FieldKind::Datetime)
                    .label("Date (Update)")
                    .read_only(true),
                FieldSpec::new("owner", FieldKind::Select)
                    .label("Owner")
                    .read_only(true)
                    .initial_with(|req| json!(req.auth().user))
                    .props_with(options_props("users_options")),
            ],
        ),
    ]
}

pub fn change_view() -> Result<ChangeView, ConfigError> {
    let view = ChangeView::new(
        RouteTemplate::parse("entries/:id")?,
        "Blog Entry",
        ActionMap::new()
            .with(ActionName::Get, crud::get("entry"))
            .with(ActionName::Delete, crud::delete("entry"))
            .with(ActionName::Save, crud::save("entry")),
        fieldsets(),
    )
    .validator(category_or_tags)
    .tab(links_tab());
    Ok(view)
}

// --- Links tab ---

/// Numeric ids stay numbers so they compare like the stored column.
fn id_value(id: &str) -> Value {
    id.parse::<u64>().map(Value::from).unwrap_or_else(|_| Value::from(id))
}

fn list_links() -> ActionFn {
    action(|req: Request, connectors: ConnectorSet| async move {
        let entry = id_value(req.require_id()?);
        let links = connectors.get("links")?.read(&req.filter("entry", entry)).await?;
        Ok::<_, ActionError>(ActionOutput::from(links))
    })
}

/// Writes to the link addressed by `data.id`; tab items are not routed.
fn write_link(name: ActionName) -> ActionFn {
    action(move |req: Request, connectors: ConnectorSet| async move {
        let id = req
            .data()
            .get("id")
            .filter(|id| !is_blank(id))
            .map(value_key)
            .ok_or_else(|| ActionError::InvalidRequest("link id missing from data".into()))?;
        let link = connectors.entry("link", &id)?;
        let res = match name {
            ActionName::Delete => link.delete(&req).await?,
            _ => link.update(&req).await?,
        };
        Ok::<_, ActionError>(ActionOutput::from(res))
    })
}

pub fn links_tab() -> TabView {
    TabView::new(
        "Links",
        ActionMap::new()
            .with(ActionName::List, list_links())
            .with(ActionName::Add, crud::add("links"))
            .with(ActionName::Save, write_link(ActionName::Save))
            .with(ActionName::Delete, write_link(ActionName::Delete)),
        vec![
            FieldSpec::new("url", FieldKind::Url)
                .label("URL")
                .required(true)
                .props(to_props(json!({"link": true}))),
            FieldSpec::new("title", FieldKind::Text).label("Title"),
            FieldSpec::new("id", FieldKind::Hidden),
            FieldSpec::new("entry", FieldKind::Hidden)
                .initial_with(|req| req.id().map(id_value).unwrap_or(Value::Null)),
        ],
    )
    .item_title("{url}")
}

// --- Add ---

pub fn add_view(change: &ChangeView) -> Result<AddView, ConfigError> {
    Ok(AddView::from_change(
        change,
        RouteTemplate::parse("entries/new")?,
        "New Blog Entry",
        ActionMap::new().with(ActionName::Add, crud::add("entries")),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_shape() {
        assert!(is_date_shaped("2024-03-01"));
        assert!(is_date_shaped("2024-13-45"));
        assert!(!is_date_shaped("2024-3-1"));
        assert!(!is_date_shaped("01.03.2024"));
    }

    #[test]
    fn category_lock_follows_section() {
        let locked = category_lock(&Value::Null);
        assert_eq!(locked["readOnly"], true);
        assert_eq!(locked["helpText"], CATEGORY_LOCKED_HELP);
        let open = category_lock(&json!(2));
        assert_eq!(open["readOnly"], false);
        assert_eq!(open["helpText"], CATEGORY_HELP);
    }

    #[test]
    fn summary_and_body_are_required_when_online() {
        let online = crudl_engine::envelope::record(json!({"status": "1"}));
        let draft = crudl_engine::envelope::record(json!({"status": "0"}));
        assert_eq!(
            text_required_when_online(&json!(""), &online).as_deref(),
            Some(ONLINE_REQUIRES_TEXT)
        );
        assert_eq!(text_required_when_online(&json!(""), &draft), None);
        assert_eq!(text_required_when_online(&json!("text"), &online), None);
    }

    #[test]
    fn views_build_and_share_fieldsets() {
        let collection = collection().unwrap();
        let add = collection.add.as_ref().unwrap();
        assert!(add.fieldsets.shares_with(&collection.change.fieldsets));
        assert_eq!(collection.change.tab_named("Links").unwrap().item_title.as_deref(), Some("{url}"));
        assert_eq!(collection.list.default_sorting().len(), 2);
    }
}

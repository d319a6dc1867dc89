//! # View Composition
//!
//! Views are plain data: routes, titles, columns, fieldsets, tabs and action
//! maps. They are assembled once at startup, checked when registered, and
//! shared read-only afterwards.
//!
//! ## Sharing
//!
//! Fieldsets live in a [`SharedFieldsets`] handle. An add view built with
//! [`AddView::from_change`] holds the *same* handle (and the same validator
//! `Arc`) as its change view, so an edit made through either one is what both
//! see on their next read.
//!
//! ## Routes
//!
//! A [`RouteTemplate`] has at most one positional parameter (`entries/:id`).
//! When a path matches several routes, literal ones (`entries/new`) win.

use crate::action::{ActionMap, ActionName};
use crate::envelope::Record;
use crate::error::{ConfigError, ValidationErrors};
use crate::field::{FieldSpec, FilterSpec};
use crate::form::FormState;
use crate::graph::DependencyGraph;
use crate::request::{value_key, Direction, Request, Sort};
use crate::resolver::{ActionSource, FormRules};
use crate::validation::FormValidator;
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTemplate {
    raw: String,
    segments: Vec<Segment>,
}

/// A path matched against a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub id: Option<String>,
}

impl RouteTemplate {
    pub fn parse(template: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidRoute(template.to_owned());
        let trimmed = template.trim_matches('/');
        if trimmed.is_empty() {
            return Err(invalid());
        }
        let mut segments = Vec::new();
        for part in trimmed.split('/') {
            match part.strip_prefix(':') {
                Some("") => return Err(invalid()),
                Some(name) => segments.push(Segment::Param(name.to_owned())),
                None if part.is_empty() => return Err(invalid()),
                None => segments.push(Segment::Literal(part.to_owned())),
            }
        }
        if segments.iter().filter(|s| matches!(s, Segment::Param(_))).count() > 1 {
            return Err(invalid());
        }
        Ok(Self {
            raw: trimmed.to_owned(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_literal(&self) -> bool {
        self.param().is_none()
    }

    pub fn param(&self) -> Option<&str> {
        self.segments.iter().find_map(|s| match s {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    pub fn matches(&self, path: &str) -> Option<RouteMatch> {
        let parts: Vec<&str> = path.trim_matches('/').split('/').collect();
        if parts.len() != self.segments.len() {
            return None;
        }
        let mut id = None;
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) if literal == part => {}
                Segment::Param(_) if !part.is_empty() => id = Some(part.to_owned()),
                _ => return None,
            }
        }
        Some(RouteMatch { id })
    }

    /// Fills the parameter with `id`; literal templates ignore it.
    pub fn render(&self, id: Option<&str>) -> String {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(literal) => literal.as_str(),
                Segment::Param(name) => id.unwrap_or(name.as_str()),
            })
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl fmt::Display for RouteTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// How a list cell is rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Render {
    #[default]
    Text,
    Boolean,
    Number,
}

/// One list column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListField {
    pub name: String,
    /// Record key to display, when it differs from `name`.
    pub key: Option<String>,
    pub label: String,
    pub sortable: bool,
    pub sorted: Option<Direction>,
    pub sort_priority: Option<u32>,
    pub main: bool,
    pub render: Render,
}

impl ListField {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: None,
            label: label.into(),
            sortable: false,
            sorted: None,
            sort_priority: None,
            main: false,
            render: Render::Text,
        }
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    pub fn sorted(mut self, direction: Direction, priority: u32) -> Self {
        self.sortable = true;
        self.sorted = Some(direction);
        self.sort_priority = Some(priority);
        self
    }

    pub fn main(mut self) -> Self {
        self.main = true;
        self
    }

    pub fn render(mut self, render: Render) -> Self {
        self.render = render;
        self
    }

    pub fn display_key(&self) -> &str {
        self.key.as_deref().unwrap_or(&self.name)
    }
}

/// The full-text search box of a list view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSpec {
    pub name: String,
}

/// An ordered, optionally titled group of fields.
#[derive(Debug, Clone)]
pub struct Fieldset {
    pub title: Option<String>,
    pub expanded: bool,
    pub fields: Vec<FieldSpec>,
}

impl Fieldset {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self {
            title: None,
            expanded: true,
            fields,
        }
    }

    pub fn titled(title: impl Into<String>, expanded: bool, fields: Vec<FieldSpec>) -> Self {
        Self {
            title: Some(title.into()),
            expanded,
            fields,
        }
    }
}

/// Fieldsets shared by reference between views.
#[derive(Clone)]
pub struct SharedFieldsets(Arc<ArcSwap<Vec<Fieldset>>>);

impl SharedFieldsets {
    pub fn new(fieldsets: Vec<Fieldset>) -> Self {
        Self(Arc::new(ArcSwap::from_pointee(fieldsets)))
    }

    pub fn load(&self) -> Arc<Vec<Fieldset>> {
        self.0.load_full()
    }

    /// Replaces the fieldsets with `f(current)`; every sharer sees the result.
    pub fn update<F>(&self, f: F)
    where
        F: Fn(&[Fieldset]) -> Vec<Fieldset>,
    {
        self.0.rcu(|current| f(current.as_slice()));
    }

    /// Rewrites one field in place.
    pub fn update_field<F>(&self, name: &str, f: F) -> Result<(), ConfigError>
    where
        F: Fn(&FieldSpec) -> FieldSpec,
    {
        if self.field(name).is_none() {
            return Err(ConfigError::UnknownField(name.to_owned()));
        }
        self.update(|fieldsets| {
            fieldsets
                .iter()
                .map(|fieldset| Fieldset {
                    fields: fieldset
                        .fields
                        .iter()
                        .map(|field| if field.name() == name { f(field) } else { field.clone() })
                        .collect(),
                    ..fieldset.clone()
                })
                .collect()
        });
        Ok(())
    }

    /// All fields in fieldset order.
    pub fn fields(&self) -> Vec<FieldSpec> {
        self.load().iter().flat_map(|fs| fs.fields.iter().cloned()).collect()
    }

    pub fn field(&self, name: &str) -> Option<FieldSpec> {
        self.load()
            .iter()
            .flat_map(|fs| fs.fields.iter())
            .find(|field| field.name() == name)
            .cloned()
    }

    pub fn shares_with(&self, other: &SharedFieldsets) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn graph(&self) -> Result<Arc<DependencyGraph>, ConfigError> {
        DependencyGraph::build(self.fields()).map(Arc::new)
    }
}

impl fmt::Debug for SharedFieldsets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SharedFieldsets").field(&self.load()).finish()
    }
}

/// A sub-resource of a change view, scoped to the parent record's id.
#[derive(Clone)]
pub struct TabView {
    pub title: String,
    pub actions: ActionMap,
    pub fields: Vec<FieldSpec>,
    pub item_title: Option<String>,
}

impl TabView {
    pub fn new(title: impl Into<String>, actions: ActionMap, fields: Vec<FieldSpec>) -> Self {
        Self {
            title: title.into(),
            actions,
            fields,
            item_title: None,
        }
    }

    pub fn item_title(mut self, template: impl Into<String>) -> Self {
        self.item_title = Some(template.into());
        self
    }

    /// Renders the item title template (`{url}`) for one record.
    pub fn title_for(&self, record: &Record) -> Option<String> {
        let template = self.item_title.as_ref()?;
        let mut out = String::with_capacity(template.len());
        let mut rest = template.as_str();
        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let Some(end) = rest[start..].find('}') else {
                break;
            };
            let key = &rest[start + 1..start + end];
            out.push_str(&record.get(key).map(value_key).unwrap_or_default());
            rest = &rest[start + end + 1..];
        }
        out.push_str(rest);
        Some(out)
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name() == name)
    }

    pub fn graph(&self) -> Result<Arc<DependencyGraph>, ConfigError> {
        DependencyGraph::build(self.fields.clone()).map(Arc::new)
    }

    /// Opens the form for a new item under the parent addressed by `req`.
    pub fn form(&self, req: &Request) -> Result<FormState, ConfigError> {
        Ok(FormState::new(self.graph()?, req))
    }
}

impl ActionSource for TabView {
    fn target(&self) -> String {
        format!("tab:{}", self.title)
    }

    fn actions(&self) -> &ActionMap {
        &self.actions
    }

    fn rules(&self) -> Option<FormRules> {
        Some(FormRules {
            fields: self.fields.clone(),
            validator: None,
        })
    }
}

#[derive(Clone)]
pub struct ListView {
    pub route: RouteTemplate,
    pub title: String,
    pub actions: ActionMap,
    pub fields: Vec<ListField>,
    pub filters: Vec<FilterSpec>,
    pub search: Option<SearchSpec>,
}

impl ListView {
    pub fn new(route: RouteTemplate, title: impl Into<String>, actions: ActionMap) -> Self {
        Self {
            route,
            title: title.into(),
            actions,
            fields: Vec::new(),
            filters: Vec::new(),
            search: None,
        }
    }

    pub fn fields(mut self, fields: Vec<ListField>) -> Self {
        self.fields = fields;
        self
    }

    pub fn filters(mut self, filters: Vec<FilterSpec>) -> Self {
        self.filters = filters;
        self
    }

    pub fn search(mut self, name: impl Into<String>) -> Self {
        self.search = Some(SearchSpec { name: name.into() });
        self
    }

    /// Ordering from the `sorted` columns, lowest priority number first.
    pub fn default_sorting(&self) -> Vec<Sort> {
        let mut sorted: Vec<_> = self
            .fields
            .iter()
            .filter_map(|f| f.sorted.map(|direction| (f.sort_priority.unwrap_or(u32::MAX), f, direction)))
            .collect();
        sorted.sort_by_key(|(priority, _, _)| *priority);
        sorted
            .into_iter()
            .map(|(_, field, direction)| Sort::new(field.name.clone(), direction))
            .collect()
    }

    pub fn filter(&self, name: &str) -> Option<&FilterSpec> {
        self.filters.iter().find(|f| f.name() == name)
    }

    pub fn filter_graph(&self) -> Result<Arc<DependencyGraph>, ConfigError> {
        DependencyGraph::build(self.filters.clone()).map(Arc::new)
    }

    /// Opens the filter bar as a form, so filter watches run like field watches.
    pub fn filter_form(&self, req: &Request) -> Result<FormState, ConfigError> {
        Ok(FormState::new(self.filter_graph()?, req))
    }
}

impl ActionSource for ListView {
    fn target(&self) -> String {
        self.route.to_string()
    }

    fn actions(&self) -> &ActionMap {
        &self.actions
    }

    fn prepare(&self, name: ActionName, req: Request) -> Request {
        if name != ActionName::List || !req.sorting().is_empty() {
            return req;
        }
        self.default_sorting().into_iter().fold(req, Request::with_sort)
    }
}

#[derive(Clone)]
pub struct ChangeView {
    pub route: RouteTemplate,
    pub title: String,
    pub actions: ActionMap,
    pub fieldsets: SharedFieldsets,
    pub validator: Option<FormValidator>,
    pub tabs: Vec<TabView>,
}

impl ChangeView {
    pub fn new(route: RouteTemplate, title: impl Into<String>, actions: ActionMap, fieldsets: Vec<Fieldset>) -> Self {
        Self {
            route,
            title: title.into(),
            actions,
            fieldsets: SharedFieldsets::new(fieldsets),
            validator: None,
            tabs: Vec::new(),
        }
    }

    pub fn validator<F>(mut self, f: F) -> Self
    where
        F: Fn(&Record) -> Option<ValidationErrors> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(f));
        self
    }

    pub fn tab(mut self, tab: TabView) -> Self {
        self.tabs.push(tab);
        self
    }

    pub fn tab_named(&self, title: &str) -> Option<&TabView> {
        self.tabs.iter().find(|t| t.title == title)
    }

    /// Opens the change form over `record`.
    pub fn form(&self, req: &Request, record: Record) -> Result<FormState, ConfigError> {
        Ok(FormState::new(self.fieldsets.graph()?, req).with_values(record))
    }
}

impl ActionSource for ChangeView {
    fn target(&self) -> String {
        self.route.to_string()
    }

    fn actions(&self) -> &ActionMap {
        &self.actions
    }

    fn rules(&self) -> Option<FormRules> {
        Some(FormRules {
            fields: self.fieldsets.fields(),
            validator: self.validator.clone(),
        })
    }
}

#[derive(Clone)]
pub struct AddView {
    pub route: RouteTemplate,
    pub title: String,
    pub actions: ActionMap,
    pub fieldsets: SharedFieldsets,
    pub validator: Option<FormValidator>,
}

impl AddView {
    /// An add view over the change view's fieldsets and validator (shared, not copied).
    pub fn from_change(change: &ChangeView, route: RouteTemplate, title: impl Into<String>, actions: ActionMap) -> Self {
        Self {
            route,
            title: title.into(),
            actions,
            fieldsets: change.fieldsets.clone(),
            validator: change.validator.clone(),
        }
    }

    /// Opens an empty form with initial values produced from `req`.
    pub fn form(&self, req: &Request) -> Result<FormState, ConfigError> {
        Ok(FormState::new(self.fieldsets.graph()?, req))
    }
}

impl ActionSource for AddView {
    fn target(&self) -> String {
        self.route.to_string()
    }

    fn actions(&self) -> &ActionMap {
        &self.actions
    }

    fn rules(&self) -> Option<FormRules> {
        Some(FormRules {
            fields: self.fieldsets.fields(),
            validator: self.validator.clone(),
        })
    }
}

/// The list, change and add views of one resource.
#[derive(Clone)]
pub struct Collection {
    pub name: String,
    pub list: ListView,
    pub change: ChangeView,
    pub add: Option<AddView>,
}

impl Collection {
    fn routes(&self) -> Vec<&RouteTemplate> {
        let mut routes = vec![&self.list.route, &self.change.route];
        routes.extend(self.add.as_ref().map(|add| &add.route));
        routes
    }

    /// Builds every dependency graph once, so bad watches fail at startup.
    fn check(&self) -> Result<(), ConfigError> {
        self.list.filter_graph()?;
        self.change.fieldsets.graph()?;
        if let Some(add) = &self.add {
            add.fieldsets.graph()?;
        }
        for tab in &self.change.tabs {
            tab.graph()?;
        }
        Ok(())
    }
}

/// A view found for a path.
#[derive(Clone, Copy)]
pub enum ViewRef<'a> {
    List(&'a ListView),
    Change(&'a ChangeView),
    Add(&'a AddView),
}

impl ViewRef<'_> {
    pub fn title(&self) -> &str {
        match self {
            ViewRef::List(v) => &v.title,
            ViewRef::Change(v) => &v.title,
            ViewRef::Add(v) => &v.title,
        }
    }

    pub fn route(&self) -> &RouteTemplate {
        match self {
            ViewRef::List(v) => &v.route,
            ViewRef::Change(v) => &v.route,
            ViewRef::Add(v) => &v.route,
        }
    }
}

impl ActionSource for ViewRef<'_> {
    fn target(&self) -> String {
        self.route().to_string()
    }

    fn actions(&self) -> &ActionMap {
        match self {
            ViewRef::List(v) => &v.actions,
            ViewRef::Change(v) => &v.actions,
            ViewRef::Add(v) => &v.actions,
        }
    }

    fn rules(&self) -> Option<FormRules> {
        match self {
            ViewRef::List(v) => v.rules(),
            ViewRef::Change(v) => v.rules(),
            ViewRef::Add(v) => v.rules(),
        }
    }

    fn prepare(&self, name: ActionName, req: Request) -> Request {
        match self {
            ViewRef::List(v) => v.prepare(name, req),
            ViewRef::Change(v) => v.prepare(name, req),
            ViewRef::Add(v) => v.prepare(name, req),
        }
    }
}

/// All registered collections, queryable by name or by path.
#[derive(Clone, Default)]
pub struct ViewRegistry {
    collections: Vec<Collection>,
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, collection: Collection) -> Result<(), ConfigError> {
        collection.check()?;
        let mut taken: Vec<&RouteTemplate> = self.collections.iter().flat_map(Collection::routes).collect();
        for route in collection.routes() {
            if taken.iter().any(|t| t.as_str() == route.as_str()) {
                return Err(ConfigError::DuplicateRoute(route.to_string()));
            }
            taken.push(route);
        }
        self.collections.push(collection);
        Ok(())
    }

    pub fn collection(&self, name: &str) -> Option<&Collection> {
        self.collections.iter().find(|c| c.name == name)
    }

    pub fn collections(&self) -> &[Collection] {
        &self.collections
    }

    /// Finds the view for `path`, preferring literal routes.
    pub fn resolve(&self, path: &str) -> Option<(ViewRef<'_>, RouteMatch)> {
        let views = self.collections.iter().flat_map(|c| {
            let mut views = vec![ViewRef::List(&c.list), ViewRef::Change(&c.change)];
            views.extend(c.add.as_ref().map(ViewRef::Add));
            views
        });
        let (literal, parameterised): (Vec<_>, Vec<_>) = views.partition(|v| v.route().is_literal());
        literal
            .into_iter()
            .chain(parameterised)
            .find_map(|view| view.route().matches(path).map(|m| (view, m)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::record;
    use crate::field::{to_props, FieldKind, PropsSource, Watch};
    use serde_json::json;

    fn route(template: &str) -> RouteTemplate {
        RouteTemplate::parse(template).unwrap()
    }

    fn change_view() -> ChangeView {
        ChangeView::new(
            route("entries/:id"),
            "Blog Entry",
            ActionMap::new(),
            vec![Fieldset::new(vec![
                FieldSpec::new("section", FieldKind::Select),
                FieldSpec::new("category", FieldKind::Autocomplete)
                    .props(to_props(json!({"showAll": true})))
                    .watch(Watch::on("section").set_value("")),
            ])],
        )
        .validator(|_| None)
    }

    fn collection(name: &str, change: ChangeView) -> Collection {
        let add = AddView::from_change(&change, route(&format!("{name}/new")), "New", ActionMap::new());
        Collection {
            name: name.into(),
            list: ListView::new(route(name), "List", ActionMap::new()),
            change,
            add: Some(add),
        }
    }

    #[test]
    fn route_templates_allow_one_param() {
        assert_eq!(route("entries/:id").param(), Some("id"));
        assert!(route("/entries/").is_literal());
        assert!(RouteTemplate::parse("a/:x/:y").is_err());
        assert!(RouteTemplate::parse("a//b").is_err());
        assert!(RouteTemplate::parse("").is_err());

        let r = route("entries/:id");
        assert_eq!(r.matches("entries/12"), Some(RouteMatch { id: Some("12".into()) }));
        assert_eq!(r.matches("entries"), None);
        assert_eq!(r.render(Some("12")), "entries/12");
    }

    #[test]
    fn add_view_shares_fieldsets_by_reference() {
        let change = change_view();
        let add = AddView::from_change(&change, route("entries/new"), "New Blog Entry", ActionMap::new());
        assert!(add.fieldsets.shares_with(&change.fieldsets));
        assert!(Arc::ptr_eq(add.validator.as_ref().unwrap(), change.validator.as_ref().unwrap()));

        change
            .fieldsets
            .update_field("category", |f| f.replace_props(PropsSource::Fixed(to_props(json!({"showAll": false})))))
            .unwrap();

        let seen = add.fieldsets.field("category").unwrap();
        assert_eq!(seen.props_source().fixed().unwrap()["showAll"], false);
    }

    #[test]
    fn literal_routes_win() {
        let mut registry = ViewRegistry::new();
        registry.register(collection("entries", change_view())).unwrap();

        let (view, m) = registry.resolve("entries/new").unwrap();
        assert!(matches!(view, ViewRef::Add(_)));
        assert_eq!(m.id, None);

        let (view, m) = registry.resolve("entries/5").unwrap();
        assert!(matches!(view, ViewRef::Change(_)));
        assert_eq!(m.id.as_deref(), Some("5"));
        assert!(registry.resolve("nope/1/2").is_none());
    }

    #[test]
    fn register_rejects_bad_graphs_and_duplicate_routes() {
        let cyclic = ChangeView::new(
            route("posts/:id"),
            "Post",
            ActionMap::new(),
            vec![Fieldset::new(vec![
                FieldSpec::new("a", FieldKind::Text).watch(Watch::on("b")),
                FieldSpec::new("b", FieldKind::Text).watch(Watch::on("a")),
            ])],
        );
        let mut registry = ViewRegistry::new();
        assert!(matches!(
            registry.register(collection("posts", cyclic)),
            Err(ConfigError::Cycle(_))
        ));

        registry.register(collection("entries", change_view())).unwrap();
        assert_eq!(
            registry.register(collection("entries", change_view())).err(),
            Some(ConfigError::DuplicateRoute("entries".into()))
        );
    }

    #[test]
    fn register_rejects_routes_repeated_within_a_collection() {
        let mut clashing = collection("entries", change_view());
        clashing.add = Some(AddView::from_change(
            &clashing.change,
            route("entries"),
            "New",
            ActionMap::new(),
        ));

        let mut registry = ViewRegistry::new();
        assert_eq!(
            registry.register(clashing).err(),
            Some(ConfigError::DuplicateRoute("entries".into()))
        );
        assert!(registry.collections().is_empty());
    }

    #[test]
    fn default_sorting_follows_priority() {
        let list = ListView::new(route("entries"), "Entries", ActionMap::new()).fields(vec![
            ListField::new("title", "Title").main().sortable(),
            ListField::new("date", "Date").sorted(Direction::Descending, 2),
            ListField::new("sticky", "Sticky").sorted(Direction::Descending, 1).render(Render::Boolean),
        ]);
        let fields: Vec<_> = list.default_sorting().into_iter().map(|s| s.field).collect();
        assert_eq!(fields, ["sticky", "date"]);

        let prepared = list.prepare(ActionName::List, Request::default());
        assert_eq!(prepared.sorting().len(), 2);
        let explicit = Request::default().with_sort(Sort::new("title", Direction::Ascending));
        assert_eq!(list.prepare(ActionName::List, explicit).sorting().len(), 1);
    }

    #[test]
    fn tab_item_titles_render_from_records() {
        let tab = TabView::new("Links", ActionMap::new(), vec![]).item_title("{url}");
        assert_eq!(
            tab.title_for(&record(json!({"url": "https://example.org"}))).as_deref(),
            Some("https://example.org")
        );
        let plain = TabView::new("Links", ActionMap::new(), vec![]);
        assert_eq!(plain.title_for(&record(json!({}))), None);
    }
}

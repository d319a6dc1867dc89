use crudl_engine::crud::{self, choice_of, Search};
use crudl_engine::envelope::record;
use crudl_engine::field::{to_props, FieldKind, FieldSpec, Watch};
use crudl_engine::form::Applied;
use crudl_engine::memory::{MemoryConnector, OptionsConnector, ResourceActor, ResourceClient};
use crudl_engine::mock::MockConnector;
use crudl_engine::pipeline::{with_column, Pipeline};
use crudl_engine::view::{AddView, ChangeView, Collection, Fieldset, ListField, ListView, RouteTemplate, ViewRef, ViewRegistry};
use crudl_engine::{
    ActionError, ActionMap, ActionName, ActionResolver, AuthInfo, ConnectorError, ConnectorSet, Direction, ErrorKind,
    FormController, Payload, Record, Request, ValidationErrors,
};
use serde_json::{json, Value};

// --- Fixtures ---

fn spawn(name: &str, records: Vec<Value>) -> ResourceClient {
    let (actor, client) = ResourceActor::new(name, 16);
    tokio::spawn(actor.seed(records.into_iter().map(record)).run());
    client
}

fn connectors() -> ConnectorSet {
    let notes = spawn(
        "notes",
        vec![
            json!({"title": "Ownership", "owner": "admin", "pinned": false, "date": "2024-01-02", "folder": 1}),
            json!({"title": "Borrowing", "owner": "editor", "pinned": true, "date": "2024-01-01", "folder": 2}),
            json!({"title": "Lifetimes", "owner": "admin", "pinned": false, "date": "2024-01-03", "folder": 1}),
        ],
    );
    let folders = spawn("folders", vec![json!({"name": "Rust"}), json!({"name": "Tokio"})]);
    let labels = spawn(
        "labels",
        vec![
            json!({"name": "intro", "folder": 1}),
            json!({"name": "advanced", "folder": 1}),
            json!({"name": "runtime", "folder": 2}),
        ],
    );

    let notes = MemoryConnector::new(notes).paginated(2);
    ConnectorSet::new()
        .with_entry("note", notes.entries())
        .with("notes", notes)
        .with("folders_options", OptionsConnector::new(folders, "id", "name"))
        .with("labels", MemoryConnector::new(labels))
}

fn route(template: &str) -> RouteTemplate {
    RouteTemplate::parse(template).unwrap()
}

fn admin() -> Request {
    Request::new(AuthInfo::user("admin"))
}

fn note_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::new("title", FieldKind::Text).required(true),
        FieldSpec::new("folder", FieldKind::Select),
        FieldSpec::new("label", FieldKind::Autocomplete)
            .watch(Watch::on("folder").set_value(""))
            .action(
                ActionName::Search,
                Search::new("labels")
                    .query_filter("name")
                    .cascade("folder", "folder")
                    .choice(choice_of("id", "name"))
                    .into_action(),
            ),
    ]
}

fn notes_collection() -> Collection {
    let list = ListView::new(
        route("notes"),
        "Notes",
        ActionMap::new().with(
            ActionName::List,
            crud::list_with(
                "notes",
                Pipeline::new().map(with_column("is_admin", |row| json!(row["owner"] == "admin"))),
            ),
        ),
    )
    .fields(vec![
        ListField::new("title", "Title").main().sortable(),
        ListField::new("date", "Date").sorted(Direction::Descending, 2),
        ListField::new("pinned", "Pinned").sorted(Direction::Descending, 1),
    ]);

    let change = ChangeView::new(
        route("notes/:id"),
        "Note",
        ActionMap::new()
            .with(ActionName::Get, crud::get("note"))
            .with(ActionName::Save, crud::save("note"))
            .with(ActionName::Delete, crud::delete("note")),
        vec![Fieldset::new(note_fields())],
    )
    .validator(|values: &Record| {
        (values.get("folder").is_none() && values.get("label").is_none())
            .then(|| ValidationErrors::form("Either `Folder` or `Label` is required."))
    });

    let add = AddView::from_change(
        &change,
        route("notes/new"),
        "New Note",
        ActionMap::new().with(ActionName::Add, crud::add("notes")),
    );

    Collection {
        name: "notes".into(),
        list,
        change,
        add: Some(add),
    }
}

fn titles(payload: &Payload) -> Vec<String> {
    let Payload::Many(rows) = payload else { panic!("expected a list") };
    rows.iter().map(|r| r["title"].as_str().unwrap_or_default().to_string()).collect()
}

// --- Tests ---

#[tokio::test]
async fn list_applies_default_ordering_pipeline_and_paging() {
    let mut registry = ViewRegistry::new();
    registry.register(notes_collection()).unwrap();
    let resolver = ActionResolver::new(connectors());

    let (view, _) = registry.resolve("notes").unwrap();
    assert!(matches!(view, ViewRef::List(_)));

    let out = resolver.invoke(&view, ActionName::List, admin()).await.unwrap();
    let page = out.as_data().unwrap();
    assert_eq!(page.total(), Some(3));
    assert!(page.pagination().unwrap().has_next());
    // pinned first, then newest
    assert_eq!(titles(page.data()), ["Borrowing", "Lifetimes"]);

    let Payload::Many(rows) = page.data() else { unreachable!() };
    assert_eq!(rows[0]["is_admin"], false);
    assert_eq!(rows[1]["is_admin"], true);
}

#[tokio::test]
async fn add_save_get_delete_round_through_the_store() {
    let mut registry = ViewRegistry::new();
    registry.register(notes_collection()).unwrap();
    let resolver = ActionResolver::new(connectors());

    let (add, m) = registry.resolve("notes/new").unwrap();
    assert!(matches!(add, ViewRef::Add(_)));
    assert_eq!(m.id, None);

    let created = resolver
        .invoke(
            &add,
            ActionName::Add,
            admin().with_data(record(json!({"title": "Pinning", "folder": 2}))),
        )
        .await
        .unwrap();
    let id = created.as_data().unwrap().clone().into_one().unwrap().into_data()["id"].to_string();
    assert_eq!(id, "4");

    let (change, m) = registry.resolve(&format!("notes/{id}")).unwrap();
    let req = admin().with_id(m.id.unwrap());
    resolver
        .invoke(
            &change,
            ActionName::Save,
            req.clone().with_data(record(json!({"title": "Pin", "folder": 2}))),
        )
        .await
        .unwrap();
    let read = resolver.invoke(&change, ActionName::Get, req.clone()).await.unwrap();
    let Payload::One(note) = read.as_data().unwrap().data() else { panic!("expected a record") };
    assert_eq!(note["title"], "Pin");

    resolver.invoke(&change, ActionName::Delete, req.clone()).await.unwrap();
    let err = resolver.invoke(&change, ActionName::Get, req).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn invalid_save_never_reaches_the_connector() {
    let mock = MockConnector::new();
    let connectors = ConnectorSet::new().with_entry("note", mock.entry_factory());
    let resolver = ActionResolver::new(connectors);
    let collection = notes_collection();

    let err = resolver
        .invoke(
            &collection.change,
            ActionName::Save,
            admin().with_id("1").with_data(record(json!({"title": ""}))),
        )
        .await
        .unwrap_err();

    let ActionError::Validation(errors) = err else { panic!("expected validation errors") };
    assert_eq!(errors.field("title"), Some("This field is required."));
    assert_eq!(errors.form_message(), Some("Either `Folder` or `Label` is required."));
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn anonymous_writes_surface_as_unauthorized() {
    let resolver = ActionResolver::new(connectors());
    let collection = notes_collection();
    let add = collection.add.unwrap();

    let err = resolver
        .invoke(
            &add,
            ActionName::Add,
            Request::default().with_data(record(json!({"title": "x", "folder": 1}))),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::Connector(ConnectorError::Unauthorized(_))));
}

#[tokio::test]
async fn cascading_search_is_empty_until_folder_is_chosen() {
    let resolver = ActionResolver::new(connectors());
    let label = notes_fields_label();

    let empty = resolver
        .invoke(&label, ActionName::Search, admin().with_data(record(json!({"query": ""}))))
        .await
        .unwrap();
    assert_eq!(empty.as_choices(), Some(&[][..]));

    let scoped = resolver
        .invoke(
            &label,
            ActionName::Search,
            admin()
                .with_data(record(json!({"query": "ADV"})))
                .with_context(record(json!({"folder": 1}))),
        )
        .await
        .unwrap();
    let choices = scoped.as_choices().unwrap();
    assert_eq!(choices.len(), 1);
    assert_eq!(choices[0].label, "advanced");
}

fn notes_fields_label() -> FieldSpec {
    note_fields().into_iter().find(|f| f.name() == "label").unwrap()
}

#[tokio::test]
async fn form_controller_resets_dependents_and_loads_options() {
    let connectors = connectors();
    let folder_hint = FieldSpec::new("hint", FieldKind::Text).watch(Watch::on("folder").set_props_async({
        let connectors = connectors.clone();
        move |folder: Value| {
            let connectors = connectors.clone();
            async move {
                let options = connectors.get("folders_options")?.read(&Request::default()).await?;
                let props = options.into_one()?.into_data();
                let name = props["options"]
                    .as_array()
                    .and_then(|opts| opts.iter().find(|o| o["value"] == folder))
                    .map(|o| o["label"].clone())
                    .unwrap_or(Value::Null);
                Ok::<_, ActionError>(to_props(json!({"helpText": name})))
            }
        }
    }));

    let mut fields = note_fields();
    fields[1] = fields[1].clone().props_with(|req, connectors| async move {
        let options = connectors.get("folders_options")?.read(&req).await?;
        Ok::<_, ActionError>(options.into_one()?.into_data())
    });
    fields.push(folder_hint);

    let change = ChangeView::new(route("notes/:id"), "Note", ActionMap::new(), vec![Fieldset::new(fields)]);
    let state = change
        .form(&admin(), record(json!({"title": "Ownership", "folder": 1, "label": 2})))
        .unwrap();
    let form = FormController::new(state);
    form.load_props(&admin(), &connectors).await.unwrap();
    assert_eq!(form.props("folder").await["options"].as_array().map(Vec::len), Some(2));

    let handles = form.change("folder", json!(2)).await.unwrap();
    for handle in handles {
        assert_eq!(handle.await.unwrap(), Applied::Current);
    }
    let values = form.values().await;
    assert_eq!(values["label"], "");
    assert_eq!(form.props("hint").await["helpText"], "Tokio");
}

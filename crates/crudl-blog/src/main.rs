use crudl_blog::lifecycle::BlogAdmin;
use crudl_engine::envelope::record;
use crudl_engine::tracing::setup_tracing;
use crudl_engine::{ActionName, AuthInfo, EngineConfig, Request};
use serde_json::json;
use tracing::{info, warn, Instrument};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = EngineConfig::load("crudl.toml")?;
    setup_tracing(&config);

    info!(?config, "Starting blog admin");
    let admin = BlogAdmin::start(&config)?;
    let auth = Request::new(AuthInfo::user("admin"));

    let menu = serde_json::to_string(&admin.menu)?;
    info!(%menu, "Menu");

    // List entries, sticky first, then newest
    let span = tracing::info_span!("list_entries");
    let page = admin
        .invoke("entries", ActionName::List, auth.clone())
        .instrument(span)
        .await?;
    if let Some(page) = page.as_data() {
        info!(total = ?page.total(), rows = page.data().len(), "Entries listed");
    }

    // Category candidates stay empty until a section is chosen
    let category = admin
        .collection("entries")
        .and_then(|c| c.change.fieldsets.field("category"))
        .ok_or("category field missing")?;
    let search = auth.clone().with_data(record(json!({"query": ""})));
    let none = admin.resolver.invoke(&category, ActionName::Search, search.clone()).await?;
    let some = admin
        .resolver
        .invoke(
            &category,
            ActionName::Search,
            search.with_context(record(json!({"section": 1}))),
        )
        .await?;
    info!(
        without_section = none.as_choices().map_or(0, <[_]>::len),
        with_section = some.as_choices().map_or(0, <[_]>::len),
        "Category search"
    );

    // An online entry without summary is rejected before reaching the store
    let draft = record(json!({"title": "Hello", "status": "1", "date": "2024-06-01", "section": 1, "tags": [1]}));
    let span = tracing::info_span!("add_entry");
    async {
        match admin
            .invoke("entries/new", ActionName::Add, auth.clone().with_data(draft.clone()))
            .await
        {
            Ok(_) => info!("Entry added"),
            Err(e) => warn!(error = %e, "Entry rejected"),
        }
        let mut fixed = draft;
        fixed.insert("summary".into(), json!("A first post."));
        fixed.insert("body".into(), json!("Hello, world."));
        let created = admin
            .invoke("entries/new", ActionName::Add, auth.clone().with_data(fixed))
            .await?;
        info!(?created, "Entry added");
        Ok::<_, crudl_engine::ActionError>(())
    }
    .instrument(span)
    .await?;

    admin.shutdown().await?;
    info!("Blog admin stopped");
    Ok(())
}

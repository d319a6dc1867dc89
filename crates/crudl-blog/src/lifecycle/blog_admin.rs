use crate::connectors::{connectors, entry_check, link_check, named_check, BlogClients};
use crate::menu::{blog_menu, Menu};
use crate::{entries, fixtures};
use crudl_engine::action::ActionResult;
use crudl_engine::memory::{ResourceActor, ResourceClient};
use crudl_engine::view::{Collection, ViewRegistry};
use crudl_engine::{
    ActionError, ActionName, ActionResolver, ConfigError, ConnectorSet, EngineConfig, Record, Request, ValidationErrors,
};
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Errors raised while starting or stopping the admin.
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("Invalid admin configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Actor task failed: {0}")]
    ActorFailed(String),
}

type Check = fn(&Record) -> Option<ValidationErrors>;

/// The running blog admin: resource actors, connectors, views and menu.
///
/// # Example
///
/// ```ignore
/// let admin = BlogAdmin::start(&EngineConfig::default())?;
/// let page = admin.invoke("entries", ActionName::List, Request::new(AuthInfo::user("admin"))).await?;
/// admin.shutdown().await?;
/// ```
pub struct BlogAdmin {
    pub clients: BlogClients,
    pub resolver: ActionResolver,
    pub registry: ViewRegistry,
    pub menu: Menu,
    handles: Vec<JoinHandle<()>>,
}

impl BlogAdmin {
    /// Spawns every resource actor and registers the views.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: &EngineConfig) -> Result<Self, AdminError> {
        let mut registry = ViewRegistry::new();
        registry.register(entries::collection()?)?;
        let menu = blog_menu(&registry);

        let mut handles = Vec::new();
        let mut spawn = |name: &str, records: Vec<Record>, check: Option<Check>| -> ResourceClient {
            let (actor, client) = ResourceActor::new(name, config.actor_buffer);
            let actor = actor.seed(records);
            let actor = match check {
                Some(check) => actor.with_check(check),
                None => actor,
            };
            handles.push(tokio::spawn(actor.run()));
            client
        };

        let clients = BlogClients {
            entries: spawn("entries", fixtures::entries(), Some(entry_check)),
            sections: spawn("sections", fixtures::sections(), Some(named_check)),
            categories: spawn("categories", fixtures::categories(), Some(named_check)),
            tags: spawn("tags", fixtures::tags(), Some(named_check)),
            links: spawn("links", fixtures::links(), Some(link_check)),
            users: spawn("users", fixtures::users(), None),
        };
        let resolver = ActionResolver::new(connectors(&clients, config.page_size));

        info!(
            actors = handles.len(),
            collections = registry.collections().len(),
            page_size = config.page_size,
            "Admin started"
        );
        Ok(Self {
            clients,
            resolver,
            registry,
            menu,
            handles,
        })
    }

    pub fn connectors(&self) -> &ConnectorSet {
        self.resolver.connectors()
    }

    pub fn collection(&self, name: &str) -> Option<&Collection> {
        self.registry.collection(name)
    }

    /// Runs action `name` of the view routed at `path`; a path parameter
    /// becomes the request id.
    pub async fn invoke(&self, path: &str, name: ActionName, req: Request) -> ActionResult {
        let (view, matched) = self
            .registry
            .resolve(path)
            .ok_or_else(|| ActionError::InvalidRequest(format!("no view at `{path}`")))?;
        let req = match matched.id {
            Some(id) => req.with_id(id),
            None => req,
        };
        self.resolver.invoke(&view, name, req).await
    }

    /// Runs action `name` of tab `tab` under the change view of `collection`.
    pub async fn invoke_tab(&self, collection: &str, tab: &str, name: ActionName, req: Request) -> ActionResult {
        let tab = self
            .collection(collection)
            .and_then(|c| c.change.tab_named(tab))
            .ok_or_else(|| ActionError::InvalidRequest(format!("no tab `{tab}` in `{collection}`")))?;
        self.resolver.invoke(tab, name, req).await
    }

    /// Drops every client and waits for the actors to finish.
    pub async fn shutdown(self) -> Result<(), AdminError> {
        info!("Shutting down admin...");

        drop(self.resolver);
        drop(self.clients);

        for handle in self.handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Actor task failed");
                return Err(AdminError::ActorFailed(e.to_string()));
            }
        }

        info!("Admin shutdown complete.");
        Ok(())
    }
}

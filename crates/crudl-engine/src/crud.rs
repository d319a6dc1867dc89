//! # Standard Actions
//!
//! Builders for the actions most views need, expressed over named connectors:
//!
//! | Builder | Connector call |
//! |---------|----------------|
//! | [`list`] / [`list_with`] | `connectors.get(resource).read(req)` |
//! | [`get`] | `connectors.entry(name, req.id).read(req)` |
//! | [`add`] | `connectors.get(resource).create(req)` |
//! | [`save`] | `connectors.entry(name, req.id).update(req)` |
//! | [`delete`] | `connectors.entry(name, req.id).delete(req)` |
//! | [`select`] | one `entry(name, id).read` per selected id, concurrently |
//! | [`Search`] | `connectors.get(resource).read(req.filter(..))` |
//!
//! Anything more specific is written as a closure with [`action`].

use crate::action::{action, ActionFn, ActionOutput, Choice};
use crate::connector::ConnectorSet;
use crate::envelope::{Envelope, Payload, Record};
use crate::error::{ActionError, ConnectorError};
use crate::pipeline::Pipeline;
use crate::request::{value_key, Request};
use futures::future::try_join_all;
use serde_json::Value;
use std::sync::Arc;

pub type ChoiceFn = Arc<dyn Fn(&Record) -> Choice + Send + Sync>;

pub fn list(resource: impl Into<String>) -> ActionFn {
    list_with(resource, Pipeline::new())
}

/// `list` whose rows pass through `pipeline` before reaching the caller.
pub fn list_with(resource: impl Into<String>, pipeline: Pipeline) -> ActionFn {
    let resource = resource.into();
    action(move |req, connectors| {
        let resource = resource.clone();
        let pipeline = pipeline.clone();
        async move {
            let connector = connectors.get(&resource)?;
            let rows = pipeline.run(connector.read(&req)).await?;
            Ok::<_, ActionError>(ActionOutput::from(rows))
        }
    })
}

pub fn get(entry: impl Into<String>) -> ActionFn {
    let entry = entry.into();
    action(move |req, connectors| {
        let entry = entry.clone();
        async move {
            let connector = connectors.entry(&entry, req.require_id()?)?;
            Ok::<_, ActionError>(ActionOutput::from(connector.read(&req).await?))
        }
    })
}

pub fn add(resource: impl Into<String>) -> ActionFn {
    let resource = resource.into();
    action(move |req, connectors| {
        let resource = resource.clone();
        async move {
            let connector = connectors.get(&resource)?;
            Ok::<_, ActionError>(ActionOutput::from(connector.create(&req).await?))
        }
    })
}

/// Updates the record identified by the request id.
pub fn save(entry: impl Into<String>) -> ActionFn {
    let entry = entry.into();
    action(move |req, connectors| {
        let entry = entry.clone();
        async move {
            let connector = connectors.entry(&entry, req.require_id()?)?;
            Ok::<_, ActionError>(ActionOutput::from(connector.update(&req).await?))
        }
    })
}

pub fn delete(entry: impl Into<String>) -> ActionFn {
    let entry = entry.into();
    action(move |req, connectors| {
        let entry = entry.clone();
        async move {
            let connector = connectors.entry(&entry, req.require_id()?)?;
            Ok::<_, ActionError>(ActionOutput::from(connector.delete(&req).await?))
        }
    })
}

/// `{value: record[value], label: record[label]}`.
pub fn choice_of(value: &'static str, label: &'static str) -> ChoiceFn {
    Arc::new(move |record: &Record| {
        let label = match record.get(label) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };
        Choice::new(record.get(value).cloned().unwrap_or(Value::Null), label)
    })
}

/// Resolves `req.data.selection` to choices, one entry read per id.
///
/// All reads run concurrently; the output keeps the selection order and the
/// whole action fails if any single read fails.
pub fn select(entry: impl Into<String>, to_choice: ChoiceFn) -> ActionFn {
    let entry = entry.into();
    action(move |req, connectors| {
        let entry = entry.clone();
        let to_choice = Arc::clone(&to_choice);
        async move {
            let selection = req.selection()?;
            let req = &req;
            let lookups = selection.iter().map(|id| {
                let connector = connectors.entry(&entry, &value_key(id));
                let to_choice = Arc::clone(&to_choice);
                async move {
                    let record = connector?.read(req).await?.into_one()?;
                    Ok::<_, ActionError>(to_choice(record.data()))
                }
            });
            let choices = try_join_all(lookups).await?;
            let total = choices.len();
            Ok::<_, ActionError>(ActionOutput::from(Envelope::new(choices).with_total(Some(total))))
        }
    })
}

/// Builder for autocomplete `search` actions.
///
/// ```rust
/// use crudl_engine::crud::{choice_of, Search};
///
/// // categories matching the query, within the section chosen in the form
/// let search = Search::new("categories")
///     .query_filter("name")
///     .cascade("section", "section")
///     .choice(choice_of("id", "name"))
///     .into_action();
/// ```
#[derive(Clone)]
pub struct Search {
    resource: String,
    query_filter: Option<String>,
    lowercase: bool,
    cascades: Vec<(String, String)>,
    to_choice: ChoiceFn,
}

impl Search {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            query_filter: None,
            lowercase: false,
            cascades: Vec::new(),
            to_choice: choice_of("id", "name"),
        }
    }

    /// Passes `req.data.query` to the connector as filter `name`.
    pub fn query_filter(mut self, name: impl Into<String>) -> Self {
        self.query_filter = Some(name.into());
        self
    }

    pub fn lowercase_query(mut self) -> Self {
        self.lowercase = true;
        self
    }

    /// Filters by the sibling value `context`, which must be set.
    ///
    /// While it is unset the action fails with `MissingContext`, which the
    /// resolver turns into an empty candidate list.
    pub fn cascade(mut self, context: impl Into<String>, filter: impl Into<String>) -> Self {
        self.cascades.push((context.into(), filter.into()));
        self
    }

    pub fn choice(mut self, to_choice: ChoiceFn) -> Self {
        self.to_choice = to_choice;
        self
    }

    async fn run(&self, req: Request, connectors: ConnectorSet) -> Result<ActionOutput, ActionError> {
        let mut scoped = req.clone();
        if let Some(filter) = &self.query_filter {
            let query = if self.lowercase {
                req.query().to_lowercase()
            } else {
                req.query().to_owned()
            };
            scoped = scoped.filter(filter.as_str(), query);
        }
        for (context, filter) in &self.cascades {
            let value = req.require_context(context)?.clone();
            scoped = scoped.filter(filter.as_str(), value);
        }

        let connector = connectors.get(&self.resource)?;
        let envelope = connector.read(&scoped).await?;
        let choices = match envelope.data() {
            Payload::Many(rows) => rows.iter().map(|row| (self.to_choice)(row)).collect(),
            Payload::One(props) => options_of(props)?,
        };
        Ok(envelope.set_data(choices).into())
    }

    pub fn into_action(self) -> ActionFn {
        let search = Arc::new(self);
        action(move |req, connectors| {
            let search = Arc::clone(&search);
            async move { search.run(req, connectors).await }
        })
    }
}

/// Reads the `options` list of an options-shaped record.
pub fn options_of(props: &Record) -> Result<Vec<Choice>, ActionError> {
    let options = props.get("options").cloned().unwrap_or(Value::Array(Vec::new()));
    serde_json::from_value(options)
        .map_err(|e| ConnectorError::Transport(format!("malformed options: {e}")).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::record;
    use crate::mock::{MockConnector, Operation};
    use crate::pipeline::with_column;
    use serde_json::json;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn save_targets_the_request_id() {
        let mock = MockConnector::new();
        mock.expect_update().return_ok(Envelope::one(record(json!({"id": 3}))));
        let connectors = ConnectorSet::new().with_entry("entry", mock.entry_factory());

        let out = save("entry")(Request::default().with_id("3"), connectors).await.unwrap();
        assert!(out.as_data().is_some());
        let calls = mock.calls();
        assert_eq!((calls[0].operation, calls[0].id.as_deref()), (Operation::Update, Some("3")));
    }

    #[tokio::test]
    async fn get_without_id_never_calls_the_connector() {
        let mock = MockConnector::new();
        let connectors = ConnectorSet::new().with_entry("entry", mock.entry_factory());
        let err = get("entry")(Request::default(), connectors).await.unwrap_err();
        assert!(matches!(err, ActionError::InvalidRequest(_)));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn list_with_runs_the_pipeline() {
        let mock = MockConnector::new();
        mock.expect_read().return_ok(Envelope::many(vec![record(json!({"owner": "admin"}))]));
        let connectors = ConnectorSet::new().with("entries", mock.clone());
        let pipeline = Pipeline::new().map(with_column("seen", |_| json!(true)));

        let out = list_with("entries", pipeline)(Request::default(), connectors).await.unwrap();
        let Some(Payload::Many(rows)) = out.as_data().map(Envelope::data) else {
            panic!("expected rows")
        };
        assert_eq!(rows[0]["seen"], true);
    }

    #[tokio::test]
    async fn select_preserves_order_under_reversed_completion() {
        let mock = MockConnector::new();
        let (tx1, rx1) = oneshot::channel();
        let (tx2, rx2) = oneshot::channel();
        mock.expect_read().respond_with(rx1);
        mock.expect_read().respond_with(rx2);
        let connectors = ConnectorSet::new().with_entry("tag", mock.entry_factory());
        let req = Request::default().with_data(record(json!({"selection": [{"value": 1}, {"value": 2}]})));

        let running = tokio::spawn(select("tag", choice_of("id", "name"))(req, connectors));
        // The second lookup completes first.
        tx2.send(Ok(Envelope::one(record(json!({"id": 2, "name": "rust"}))))).unwrap();
        tx1.send(Ok(Envelope::one(record(json!({"id": 1, "name": "async"}))))).unwrap();

        let out = running.await.unwrap().unwrap();
        let labels: Vec<_> = out.as_choices().unwrap().iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, ["async", "rust"]);
    }

    #[tokio::test]
    async fn select_fails_as_a_whole() {
        let mock = MockConnector::new();
        mock.expect_read().return_ok(Envelope::one(record(json!({"id": 1, "name": "a"}))));
        mock.expect_read().return_err(ConnectorError::NotFound("9".into()));
        let connectors = ConnectorSet::new().with_entry("tag", mock.entry_factory());
        let req = Request::default().with_data(record(json!({"selection": [1, 9]})));

        let err = select("tag", choice_of("id", "name"))(req, connectors).await.unwrap_err();
        assert_eq!(err, ActionError::Connector(ConnectorError::NotFound("9".into())));
    }

    #[tokio::test]
    async fn search_requires_its_cascade_context() {
        let mock = MockConnector::new();
        let connectors = ConnectorSet::new().with("categories", mock.clone());
        let search = Search::new("categories").query_filter("name").cascade("section", "section").into_action();

        let err = search(Request::default(), connectors).await.unwrap_err();
        assert!(err.is_missing_context());
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn search_reads_options_payloads() {
        let mock = MockConnector::new();
        mock.expect_read().return_ok(Envelope::one(record(
            json!({"options": [{"value": 1, "label": "rust"}]}),
        )));
        let connectors = ConnectorSet::new().with("tags_options", mock.clone());
        let search = Search::new("tags_options").query_filter("name").lowercase_query().into_action();
        let req = Request::default().with_data(record(json!({"query": "RU"})));

        let out = search(req, connectors).await.unwrap();
        assert_eq!(out.as_choices().unwrap(), [Choice::new(1, "rust")]);
        assert_eq!(mock.calls()[0].request.filters()[0].value, json!("ru"));
    }
}

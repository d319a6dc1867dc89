//! # Form State
//!
//! [`FormState`] holds the live values and props of one open form and applies
//! the watches of its [`DependencyGraph`] when a value changes.
//!
//! ## Change propagation
//!
//! `change(field, value)` is synchronous. It only returns the asynchronous work
//! it could not finish (pending `set_props` resolutions) to the caller:
//!
//! 1. If the new value equals the current one nothing happens.
//! 2. The field's generation is bumped.
//! 3. Every dependent watching it, in declaration order, gets its `set_value`
//!    applied. A dependent whose value really changed is queued as a change of
//!    its own; one that already held that value is not.
//! 4. Ready props are merged right away; pending ones are handed back as
//!    [`PendingProps`] tagged with the source generation.
//!
//! ## Stale resolutions
//!
//! A [`PendingProps`] may resolve long after the watched field has moved on.
//! [`FormState::apply`] compares the generation it was started with against
//! the current one and drops the result when they differ. Completion order of
//! the futures does not matter, only which change started them.
//!
//! [`FormController`] drives this with tokio: the state lives behind an async
//! mutex and every pending resolution is spawned as its own task.

use crate::connector::ConnectorSet;
use crate::envelope::Record;
use crate::error::{ActionError, ValidationErrors};
use crate::field::{Props, PropsFuture, Reaction};
use crate::graph::DependencyGraph;
use crate::request::Request;
use crate::validation::{validate_values, FormValidator};
use futures::future::try_join_all;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// A `set_props` resolution still in flight.
pub struct PendingProps {
    pub dependent: String,
    pub source: String,
    /// Index of the watch within the dependent's watches.
    pub watch: usize,
    pub generation: u64,
    future: PropsFuture,
}

impl PendingProps {
    pub async fn resolve(self) -> ResolvedProps {
        ResolvedProps {
            dependent: self.dependent,
            source: self.source,
            watch: self.watch,
            generation: self.generation,
            result: self.future.await,
        }
    }
}

impl fmt::Debug for PendingProps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingProps")
            .field("dependent", &self.dependent)
            .field("source", &self.source)
            .field("watch", &self.watch)
            .field("generation", &self.generation)
            .finish()
    }
}

#[derive(Debug)]
pub struct ResolvedProps {
    pub dependent: String,
    pub source: String,
    pub watch: usize,
    pub generation: u64,
    pub result: Result<Props, ActionError>,
}

/// What happened to a resolution handed to [`FormState::apply`].
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    Current,
    /// The watched field changed again since; the result was dropped.
    Stale,
    Failed(ActionError),
}

/// Outcome of one `change` call.
#[derive(Debug, Default)]
pub struct ChangeReport {
    /// Fields whose value changed, the originating field first.
    pub changed: Vec<String>,
    pub pending: Vec<PendingProps>,
}

impl ChangeReport {
    pub fn is_noop(&self) -> bool {
        self.changed.is_empty()
    }
}

#[derive(Clone)]
pub struct FormState {
    graph: Arc<DependencyGraph>,
    values: Record,
    base_props: HashMap<String, Props>,
    /// Latest `set_props` result per dependent, keyed by watch index.
    reactive_props: HashMap<String, BTreeMap<usize, Props>>,
    generations: HashMap<String, u64>,
}

impl FormState {
    /// Opens a form: initial values are produced from `req`, fixed props are
    /// installed, loaded props are left for [`FormState::load_props`].
    pub fn new(graph: Arc<DependencyGraph>, req: &Request) -> Self {
        let mut values = Record::new();
        let mut base_props = HashMap::new();
        for field in graph.fields() {
            if let Some(initial) = field.initial_value() {
                values.insert(field.name().to_owned(), initial.produce(req));
            }
            if let Some(props) = field.props_source().fixed() {
                base_props.insert(field.name().to_owned(), props.clone());
            }
        }
        Self {
            graph,
            values,
            base_props,
            reactive_props: HashMap::new(),
            generations: HashMap::new(),
        }
    }

    /// Seeds values (e.g. a record read for a change view) without running
    /// any watch.
    pub fn with_values(mut self, values: Record) -> Self {
        self.values.extend(values);
        self
    }

    pub fn graph(&self) -> &Arc<DependencyGraph> {
        &self.graph
    }

    pub fn values(&self) -> &Record {
        &self.values
    }

    pub fn value(&self, name: &str) -> &Value {
        self.values.get(name).unwrap_or(&Value::Null)
    }

    /// Effective props: loaded/fixed props overlaid with the latest result of
    /// each watch, in declaration order.
    pub fn props(&self, name: &str) -> Props {
        let mut props = self.base_props.get(name).cloned().unwrap_or_default();
        for reactive in self.reactive_props.get(name).into_iter().flat_map(BTreeMap::values) {
            props.extend(reactive.clone());
        }
        props
    }

    pub fn generation(&self, source: &str) -> u64 {
        self.generations.get(source).copied().unwrap_or(0)
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.graph
            .field(name)
            .is_some_and(|field| field.required_flag().evaluate(&self.values))
    }

    /// A field is read-only by configuration or because a watch said so.
    pub fn is_read_only(&self, name: &str) -> bool {
        let configured = self
            .graph
            .field(name)
            .is_some_and(|field| field.read_only_flag().evaluate(&self.values));
        configured || self.props(name).get("readOnly") == Some(&Value::Bool(true))
    }

    /// Sets `field` to `value` and runs the watches that depend on it.
    pub fn change(&mut self, field: &str, value: Value) -> Result<ChangeReport, ActionError> {
        if !self.graph.contains(field) {
            return Err(ActionError::UnknownField(field.to_owned()));
        }
        let mut report = ChangeReport::default();
        if self.value(field) == &value {
            debug!(field, "Value unchanged");
            return Ok(report);
        }
        self.values.insert(field.to_owned(), value);

        let graph = Arc::clone(&self.graph);
        let mut queue = VecDeque::from([field.to_owned()]);
        while let Some(source) = queue.pop_front() {
            let generation = self.bump(&source);
            let current = self.value(&source).clone();

            for (dependent, index, watch) in graph.reactions(&source) {
                let name = dependent.name();
                if let Some(next) = watch.value() {
                    if self.value(name) != next {
                        self.values.insert(name.to_owned(), next.clone());
                        queue.push_back(name.to_owned());
                    }
                }
                match watch.react(&current) {
                    Some(Reaction::Ready(props)) => self.set_reactive(name, index, props),
                    Some(Reaction::Pending(future)) => report.pending.push(PendingProps {
                        dependent: name.to_owned(),
                        source: source.clone(),
                        watch: index,
                        generation,
                        future,
                    }),
                    None => {}
                }
            }
            report.changed.push(source);
        }

        debug!(field, changed = report.changed.len(), pending = report.pending.len(), "Change applied");
        Ok(report)
    }

    /// Applies a finished resolution if its source has not moved on.
    pub fn apply(&mut self, resolved: ResolvedProps) -> Applied {
        let current = self.generation(&resolved.source);
        if resolved.generation != current {
            debug!(
                dependent = %resolved.dependent,
                source = %resolved.source,
                generation = resolved.generation,
                current,
                "Discarding stale props"
            );
            return Applied::Stale;
        }
        match resolved.result {
            Ok(props) => {
                self.set_reactive(&resolved.dependent, resolved.watch, props);
                Applied::Current
            }
            Err(e) => {
                warn!(dependent = %resolved.dependent, error = %e, "Props resolution failed");
                Applied::Failed(e)
            }
        }
    }

    /// Re-evaluates every `set_props` against the current values, so the
    /// initial presentation matches the dependency state.
    pub fn refresh(&mut self) -> Vec<PendingProps> {
        let graph = Arc::clone(&self.graph);
        let mut pending = Vec::new();
        for field in graph.fields() {
            for (index, watch) in field.watches().iter().enumerate() {
                let current = self.value(watch.source()).clone();
                match watch.react(&current) {
                    Some(Reaction::Ready(props)) => self.set_reactive(field.name(), index, props),
                    Some(Reaction::Pending(future)) => pending.push(PendingProps {
                        dependent: field.name().to_owned(),
                        source: watch.source().to_owned(),
                        watch: index,
                        generation: self.generation(watch.source()),
                        future,
                    }),
                    None => {}
                }
            }
        }
        pending
    }

    /// Resolves the props sources of all fields concurrently.
    pub async fn load_props(&mut self, req: &Request, connectors: &ConnectorSet) -> Result<(), ActionError> {
        let loaded = resolve_props(&self.graph, req, connectors).await?;
        self.base_props = loaded;
        Ok(())
    }

    pub fn validate(&self, form: Option<&FormValidator>) -> Result<(), ValidationErrors> {
        validate_values(self.graph.fields(), form, &self.values)
    }

    fn bump(&mut self, source: &str) -> u64 {
        let generation = self.generations.entry(source.to_owned()).or_insert(0);
        *generation += 1;
        *generation
    }

    fn set_reactive(&mut self, name: &str, watch: usize, props: Props) {
        self.reactive_props.entry(name.to_owned()).or_default().insert(watch, props);
    }
}

impl fmt::Debug for FormState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormState")
            .field("values", &self.values)
            .field("generations", &self.generations)
            .finish()
    }
}

async fn resolve_props(
    graph: &DependencyGraph,
    req: &Request,
    connectors: &ConnectorSet,
) -> Result<HashMap<String, Props>, ActionError> {
    let loads = graph.fields().iter().map(|field| async move {
        let props = field
            .props_source()
            .resolve(req.clone(), connectors.clone())
            .await?;
        Ok::<_, ActionError>((field.name().to_owned(), props))
    });
    Ok(try_join_all(loads).await?.into_iter().collect())
}

/// Async driver around a shared [`FormState`].
///
/// Pending props are resolved on their own tasks; each applies itself through
/// the generation check when it finishes, so the caller never has to order them.
#[derive(Clone)]
pub struct FormController {
    state: Arc<Mutex<FormState>>,
}

impl FormController {
    pub fn new(state: FormState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Changes a value and spawns the resulting props resolutions.
    pub async fn change(&self, field: &str, value: Value) -> Result<Vec<JoinHandle<Applied>>, ActionError> {
        let report = self.state.lock().await.change(field, value)?;
        Ok(report.pending.into_iter().map(|p| self.spawn(p)).collect())
    }

    pub async fn refresh(&self) -> Vec<JoinHandle<Applied>> {
        let pending = self.state.lock().await.refresh();
        pending.into_iter().map(|p| self.spawn(p)).collect()
    }

    /// Loads props without holding the lock across connector calls.
    pub async fn load_props(&self, req: &Request, connectors: &ConnectorSet) -> Result<(), ActionError> {
        let graph = Arc::clone(self.state.lock().await.graph());
        let loaded = resolve_props(&graph, req, connectors).await?;
        self.state.lock().await.base_props = loaded;
        Ok(())
    }

    pub async fn snapshot(&self) -> FormState {
        self.state.lock().await.clone()
    }

    pub async fn values(&self) -> Record {
        self.state.lock().await.values().clone()
    }

    pub async fn props(&self, name: &str) -> Props {
        self.state.lock().await.props(name)
    }

    fn spawn(&self, pending: PendingProps) -> JoinHandle<Applied> {
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let resolved = pending.resolve().await;
            state.lock().await.apply(resolved)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::record;
    use crate::field::{to_props, FieldKind, FieldSpec, Watch};
    use crate::request::AuthInfo;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::oneshot;

    fn graph(fields: Vec<FieldSpec>) -> Arc<DependencyGraph> {
        Arc::new(DependencyGraph::build(fields).unwrap())
    }

    fn read_only_hint(section: &Value) -> Props {
        to_props(json!({"readOnly": section.as_str().map_or(true, str::is_empty)}))
    }

    #[test]
    fn initial_values_and_fixed_props() {
        let form = FormState::new(
            graph(vec![
                FieldSpec::new("status", FieldKind::Select)
                    .initial("0")
                    .props(to_props(json!({"options": []}))),
                FieldSpec::new("owner", FieldKind::Select).initial_with(|req| json!(req.auth().user)),
            ]),
            &Request::new(AuthInfo::user("admin")),
        );
        assert_eq!(form.value("status"), &json!("0"));
        assert_eq!(form.value("owner"), &json!("admin"));
        assert!(form.props("status").contains_key("options"));
    }

    #[test]
    fn set_value_and_sync_props_apply_immediately() {
        let mut form = FormState::new(
            graph(vec![
                FieldSpec::new("section", FieldKind::Select),
                FieldSpec::new("category", FieldKind::Autocomplete)
                    .watch(Watch::on("section").set_value("").set_props(read_only_hint)),
            ]),
            &Request::default(),
        )
        .with_values(record(json!({"category": 4})));

        let report = form.change("section", json!("1")).unwrap();
        assert_eq!(report.changed, ["section", "category"]);
        assert!(report.pending.is_empty());
        assert_eq!(form.value("category"), &json!(""));
        assert!(!form.is_read_only("category"));

        form.change("section", json!("")).unwrap();
        assert!(form.is_read_only("category"));
    }

    #[test]
    fn equal_values_do_not_cascade() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        let mut form = FormState::new(
            graph(vec![
                FieldSpec::new("section", FieldKind::Select),
                FieldSpec::new("category", FieldKind::Select).watch(Watch::on("section").set_value("")),
                FieldSpec::new("hint", FieldKind::Text).watch(Watch::on("category").set_props(move |_| {
                    counted.fetch_add(1, Ordering::SeqCst);
                    Props::new()
                })),
            ]),
            &Request::default(),
        )
        .with_values(record(json!({"section": "1", "category": ""})));

        // category already holds "", so its dependents must not run.
        form.change("section", json!("2")).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert!(form.change("section", json!("2")).unwrap().is_noop());
        assert_eq!(form.generation("section"), 1);
    }

    #[tokio::test]
    async fn stale_resolution_is_discarded_regardless_of_arrival_order() {
        let mut form = FormState::new(
            graph(vec![
                FieldSpec::new("section", FieldKind::Select),
                FieldSpec::new("category", FieldKind::Autocomplete).watch(
                    Watch::on("section")
                        .set_props_async(|section| async move { Ok::<_, ActionError>(to_props(json!({"for": section}))) }),
                ),
            ]),
            &Request::default(),
        );

        let first = form.change("section", json!("A")).unwrap().pending.pop().unwrap();
        let second = form.change("section", json!("B")).unwrap().pending.pop().unwrap();

        // The newer resolution lands first, then the older one arrives late.
        assert_eq!(form.apply(second.resolve().await), Applied::Current);
        assert_eq!(form.apply(first.resolve().await), Applied::Stale);
        assert_eq!(form.props("category")["for"], "B");
    }

    fn section_hint(section: &Value) -> Props {
        if *section == "A" {
            to_props(json!({"warning": "only for A"}))
        } else {
            to_props(json!({"for": section}))
        }
    }

    #[test]
    fn newer_reaction_replaces_earlier_props() {
        let mut form = FormState::new(
            graph(vec![
                FieldSpec::new("section", FieldKind::Select),
                FieldSpec::new("category", FieldKind::Autocomplete)
                    .props(to_props(json!({"placeholder": "Pick one"})))
                    .watch(Watch::on("section").set_props(section_hint)),
            ]),
            &Request::default(),
        );

        form.change("section", json!("A")).unwrap();
        form.change("section", json!("B")).unwrap();

        assert_eq!(
            form.props("category"),
            to_props(json!({"placeholder": "Pick one", "for": "B"}))
        );
    }

    #[tokio::test]
    async fn async_reaction_replaces_earlier_props() {
        let mut form = FormState::new(
            graph(vec![
                FieldSpec::new("section", FieldKind::Select),
                FieldSpec::new("category", FieldKind::Autocomplete).watch(Watch::on("section").set_props_async(
                    |section| async move { Ok::<_, ActionError>(section_hint(&section)) },
                )),
            ]),
            &Request::default(),
        );

        let first = form.change("section", json!("A")).unwrap().pending.pop().unwrap();
        assert_eq!(form.apply(first.resolve().await), Applied::Current);
        let second = form.change("section", json!("B")).unwrap().pending.pop().unwrap();
        assert_eq!(form.apply(second.resolve().await), Applied::Current);

        assert_eq!(form.props("category"), to_props(json!({"for": "B"})));
    }

    #[test]
    fn each_watch_keeps_its_own_contribution() {
        let mut form = FormState::new(
            graph(vec![
                FieldSpec::new("section", FieldKind::Select),
                FieldSpec::new("status", FieldKind::Select),
                FieldSpec::new("category", FieldKind::Autocomplete)
                    .watch(Watch::on("section").set_props(section_hint))
                    .watch(Watch::on("status").set_props(|status: &Value| to_props(json!({"status": status})))),
            ]),
            &Request::default(),
        );

        form.change("status", json!("1")).unwrap();
        form.change("section", json!("A")).unwrap();
        form.change("section", json!("C")).unwrap();

        assert_eq!(form.props("category"), to_props(json!({"for": "C", "status": "1"})));
    }

    #[tokio::test]
    async fn controller_keeps_latest_under_delayed_responses() {
        let (tx_a, rx_a) = oneshot::channel::<Props>();
        let (tx_b, rx_b) = oneshot::channel::<Props>();
        let receivers = Arc::new(std::sync::Mutex::new(VecDeque::from([rx_a, rx_b])));

        let state = FormState::new(
            graph(vec![
                FieldSpec::new("section", FieldKind::Select),
                FieldSpec::new("category", FieldKind::Autocomplete).watch(Watch::on("section").set_props_async(
                    move |_| {
                        let rx = receivers.lock().unwrap().pop_front().unwrap();
                        async move { rx.await.map_err(|_| ActionError::InvalidRequest("dropped".into())) }
                    },
                )),
            ]),
            &Request::default(),
        );
        let controller = FormController::new(state);

        let a = controller.change("section", json!("A")).await.unwrap();
        let b = controller.change("section", json!("B")).await.unwrap();

        tx_b.send(to_props(json!({"for": "B"}))).unwrap();
        assert_eq!(b.into_iter().next().unwrap().await.unwrap(), Applied::Current);
        tx_a.send(to_props(json!({"for": "A"}))).unwrap();
        assert_eq!(a.into_iter().next().unwrap().await.unwrap(), Applied::Stale);

        assert_eq!(controller.props("category").await["for"], "B");
    }

    #[test]
    fn unknown_field_is_rejected() {
        let mut form = FormState::new(graph(vec![]), &Request::default());
        assert_eq!(
            form.change("nope", json!(1)).unwrap_err(),
            ActionError::UnknownField("nope".into())
        );
    }
}

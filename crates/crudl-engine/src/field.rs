//! # Field Specs
//!
//! A [`FieldSpec`] describes one form field (or list filter): its kind, whether
//! it is required or read-only, where its initial value and presentation props
//! come from, how it validates, and which other fields it watches.
//!
//! Everything that the configuration can compute is a closure behind an `Arc`,
//! so specs are cheap to clone and are shared read-only once built.
//!
//! ```rust
//! use crudl_engine::field::{FieldKind, FieldSpec, Watch};
//! use crudl_engine::field::to_props;
//! use serde_json::json;
//!
//! let category = FieldSpec::new("category", FieldKind::Autocomplete)
//!     .label("Category")
//!     .watch(
//!         Watch::on("section")
//!             .set_value("")
//!             .set_props(|section| to_props(json!({"readOnly": section == ""}))),
//!     );
//!
//! assert_eq!(category.watches()[0].source(), "section");
//! ```

use crate::action::{ActionFn, ActionMap, ActionName};
use crate::connector::ConnectorSet;
use crate::envelope::Record;
use crate::error::ActionError;
use crate::request::Request;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

/// Presentation properties handed to the rendering layer (`options`,
/// `helpText`, `readOnly`, ...).
pub type Props = Record;

/// Builds [`Props`] from a JSON object literal.
pub fn to_props(value: Value) -> Props {
    crate::envelope::record(value)
}

/// The closed set of input kinds the rendering layer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    #[serde(alias = "String")]
    Text,
    Select,
    Autocomplete,
    AutocompleteMultiple,
    Date,
    Datetime,
    Checkbox,
    Textarea,
    #[serde(rename = "URL")]
    Url,
    #[serde(rename = "hidden")]
    Hidden,
    /// Free-text search input, used by list filters.
    Search,
}

impl FieldKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::Text => "Text",
            FieldKind::Select => "Select",
            FieldKind::Autocomplete => "Autocomplete",
            FieldKind::AutocompleteMultiple => "AutocompleteMultiple",
            FieldKind::Date => "Date",
            FieldKind::Datetime => "Datetime",
            FieldKind::Checkbox => "Checkbox",
            FieldKind::Textarea => "Textarea",
            FieldKind::Url => "URL",
            FieldKind::Hidden => "hidden",
            FieldKind::Search => "Search",
        }
    }

    /// Kinds whose value is a list rather than a scalar.
    pub fn is_multiple(self) -> bool {
        matches!(self, FieldKind::AutocompleteMultiple)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Text" | "String" => Ok(FieldKind::Text),
            "Select" => Ok(FieldKind::Select),
            "Autocomplete" => Ok(FieldKind::Autocomplete),
            "AutocompleteMultiple" => Ok(FieldKind::AutocompleteMultiple),
            "Date" => Ok(FieldKind::Date),
            "Datetime" => Ok(FieldKind::Datetime),
            "Checkbox" => Ok(FieldKind::Checkbox),
            "Textarea" => Ok(FieldKind::Textarea),
            "URL" => Ok(FieldKind::Url),
            "hidden" => Ok(FieldKind::Hidden),
            "Search" => Ok(FieldKind::Search),
            other => Err(format!("unknown field kind `{other}`")),
        }
    }
}

/// A boolean that is either fixed or computed from the current form values.
#[derive(Clone)]
pub enum Flag {
    Fixed(bool),
    Computed(Arc<dyn Fn(&Record) -> bool + Send + Sync>),
}

impl Flag {
    pub fn evaluate(&self, values: &Record) -> bool {
        match self {
            Flag::Fixed(flag) => *flag,
            Flag::Computed(f) => f(values),
        }
    }
}

impl From<bool> for Flag {
    fn from(flag: bool) -> Self {
        Flag::Fixed(flag)
    }
}

impl fmt::Debug for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Flag::Fixed(flag) => write!(f, "{flag}"),
            Flag::Computed(_) => f.write_str("<computed>"),
        }
    }
}

/// Where a field's value comes from when a form is opened.
///
/// Producers receive the request explicitly; there is no ambient user.
#[derive(Clone)]
pub enum InitialValue {
    Fixed(Value),
    Produced(Arc<dyn Fn(&Request) -> Value + Send + Sync>),
}

impl InitialValue {
    pub fn produce(&self, req: &Request) -> Value {
        match self {
            InitialValue::Fixed(value) => value.clone(),
            InitialValue::Produced(f) => f(req),
        }
    }
}

impl fmt::Debug for InitialValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitialValue::Fixed(value) => write!(f, "{value}"),
            InitialValue::Produced(_) => f.write_str("<producer>"),
        }
    }
}

/// `(value, all values) -> error message`.
pub type FieldValidator = Arc<dyn Fn(&Value, &Record) -> Option<String> + Send + Sync>;

pub type PropsFuture = BoxFuture<'static, Result<Props, ActionError>>;
pub type PropsLoader = Arc<dyn Fn(Request, ConnectorSet) -> PropsFuture + Send + Sync>;

/// Static props, or props loaded through the connectors.
#[derive(Clone)]
pub enum PropsSource {
    Fixed(Props),
    Loaded(PropsLoader),
}

impl PropsSource {
    pub async fn resolve(&self, req: Request, connectors: ConnectorSet) -> Result<Props, ActionError> {
        match self {
            PropsSource::Fixed(props) => Ok(props.clone()),
            PropsSource::Loaded(load) => load(req, connectors).await,
        }
    }

    pub fn fixed(&self) -> Option<&Props> {
        match self {
            PropsSource::Fixed(props) => Some(props),
            PropsSource::Loaded(_) => None,
        }
    }
}

impl Default for PropsSource {
    fn default() -> Self {
        PropsSource::Fixed(Props::new())
    }
}

impl fmt::Debug for PropsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropsSource::Fixed(props) => f.debug_tuple("Fixed").field(props).finish(),
            PropsSource::Loaded(_) => f.write_str("Loaded(<loader>)"),
        }
    }
}

/// Outcome of a watch's `set_props`: either ready now or still in flight.
pub enum Reaction {
    Ready(Props),
    Pending(PropsFuture),
}

pub type SetProps = Arc<dyn Fn(&Value) -> Reaction + Send + Sync>;

/// A reaction of the owning field to changes of `source`.
#[derive(Clone)]
pub struct Watch {
    source: String,
    set_value: Option<Value>,
    set_props: Option<SetProps>,
}

impl Watch {
    pub fn on(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            set_value: None,
            set_props: None,
        }
    }

    /// Resets the owning field to `value` whenever `source` changes.
    pub fn set_value(mut self, value: impl Into<Value>) -> Self {
        self.set_value = Some(value.into());
        self
    }

    /// Recomputes the owning field's props synchronously.
    pub fn set_props<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> Props + Send + Sync + 'static,
    {
        self.set_props = Some(Arc::new(move |value: &Value| Reaction::Ready(f(value))));
        self
    }

    /// Recomputes the owning field's props through an async round-trip.
    pub fn set_props_async<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Props, ActionError>> + Send + 'static,
    {
        self.set_props = Some(Arc::new(move |value: &Value| Reaction::Pending(Box::pin(f(value.clone())))));
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn value(&self) -> Option<&Value> {
        self.set_value.as_ref()
    }

    pub fn react(&self, value: &Value) -> Option<Reaction> {
        self.set_props.as_ref().map(|f| f(value))
    }

    pub fn has_props(&self) -> bool {
        self.set_props.is_some()
    }
}

impl fmt::Debug for Watch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watch")
            .field("source", &self.source)
            .field("set_value", &self.set_value)
            .field("set_props", &self.set_props.is_some())
            .finish()
    }
}

/// One field of a fieldset, tab or filter bar.
#[derive(Clone)]
pub struct FieldSpec {
    name: String,
    label: Option<String>,
    kind: FieldKind,
    required: Flag,
    read_only: Flag,
    initial: Option<InitialValue>,
    validate: Option<FieldValidator>,
    props: PropsSource,
    watches: Vec<Watch>,
    actions: ActionMap,
}

/// List filters share the field shape.
pub type FilterSpec = FieldSpec;

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            label: None,
            kind,
            required: Flag::Fixed(false),
            read_only: Flag::Fixed(false),
            initial: None,
            validate: None,
            props: PropsSource::default(),
            watches: Vec::new(),
            actions: ActionMap::new(),
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = Flag::Fixed(required);
        self
    }

    pub fn required_when<F>(mut self, f: F) -> Self
    where
        F: Fn(&Record) -> bool + Send + Sync + 'static,
    {
        self.required = Flag::Computed(Arc::new(f));
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = Flag::Fixed(read_only);
        self
    }

    pub fn initial(mut self, value: impl Into<Value>) -> Self {
        self.initial = Some(InitialValue::Fixed(value.into()));
        self
    }

    pub fn initial_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&Request) -> Value + Send + Sync + 'static,
    {
        self.initial = Some(InitialValue::Produced(Arc::new(f)));
        self
    }

    pub fn validate<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value, &Record) -> Option<String> + Send + Sync + 'static,
    {
        self.validate = Some(Arc::new(f));
        self
    }

    pub fn props(mut self, props: Props) -> Self {
        self.props = PropsSource::Fixed(props);
        self
    }

    pub fn props_with<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Request, ConnectorSet) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Props, ActionError>> + Send + 'static,
    {
        self.props = PropsSource::Loaded(Arc::new(move |req, connectors| -> PropsFuture {
            Box::pin(f(req, connectors))
        }));
        self
    }

    pub fn watch(mut self, watch: Watch) -> Self {
        self.watches.push(watch);
        self
    }

    pub fn action(mut self, name: ActionName, action: ActionFn) -> Self {
        self.actions = self.actions.with(name, action);
        self
    }

    /// Returns a copy carrying `props` in place of the current source.
    pub fn replace_props(&self, props: PropsSource) -> Self {
        let mut next = self.clone();
        next.props = props;
        next
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The label, falling back to the field name.
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn required_flag(&self) -> &Flag {
        &self.required
    }

    pub fn read_only_flag(&self) -> &Flag {
        &self.read_only
    }

    pub fn initial_value(&self) -> Option<&InitialValue> {
        self.initial.as_ref()
    }

    pub fn validator(&self) -> Option<&FieldValidator> {
        self.validate.as_ref()
    }

    pub fn props_source(&self) -> &PropsSource {
        &self.props
    }

    pub fn watches(&self) -> &[Watch] {
        &self.watches
    }

    pub fn actions(&self) -> &ActionMap {
        &self.actions
    }
}

impl fmt::Debug for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldSpec")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("required", &self.required)
            .field("read_only", &self.read_only)
            .field("initial", &self.initial)
            .field("props", &self.props)
            .field("watches", &self.watches)
            .field("actions", &self.actions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::record;
    use crate::request::AuthInfo;
    use serde_json::json;

    #[test]
    fn kind_strings_match_the_rendering_layer() {
        assert_eq!(serde_json::to_value(FieldKind::Url).unwrap(), json!("URL"));
        assert_eq!(serde_json::to_value(FieldKind::Hidden).unwrap(), json!("hidden"));
        assert_eq!(
            serde_json::from_value::<FieldKind>(json!("String")).unwrap(),
            FieldKind::Text
        );
        assert_eq!(
            "AutocompleteMultiple".parse::<FieldKind>(),
            Ok(FieldKind::AutocompleteMultiple)
        );
        assert!("Color".parse::<FieldKind>().is_err());
    }

    #[test]
    fn computed_required_follows_values() {
        let summary = FieldSpec::new("summary", FieldKind::Textarea)
            .required_when(|values| values.get("status") == Some(&json!("1")));
        assert!(!summary.required_flag().evaluate(&record(json!({"status": "0"}))));
        assert!(summary.required_flag().evaluate(&record(json!({"status": "1"}))));
    }

    #[test]
    fn initial_producer_reads_the_request() {
        let owner = FieldSpec::new("owner", FieldKind::Select)
            .initial_with(|req| json!(req.auth().user));
        let req = Request::new(AuthInfo::user("demo"));
        assert_eq!(owner.initial_value().unwrap().produce(&req), json!("demo"));
    }

    #[tokio::test]
    async fn async_watch_yields_pending_reaction() {
        let watch = Watch::on("section")
            .set_props_async(|section| async move { Ok::<_, ActionError>(to_props(json!({"section": section}))) });
        match watch.react(&json!(2)) {
            Some(Reaction::Pending(fut)) => assert_eq!(fut.await.unwrap()["section"], 2),
            _ => panic!("expected a pending reaction"),
        }
        assert!(Watch::on("x").react(&json!(1)).is_none());
    }
}

//! # Actions
//!
//! An action is an async function `(Request, ConnectorSet) -> ActionOutput`.
//! Views and fields carry an [`ActionMap`] keyed by the closed [`ActionName`]
//! enumeration; dispatch is a map lookup plus an exhaustive match on the name,
//! never a string lookup.

use crate::connector::ConnectorSet;
use crate::envelope::{Envelope, Payload};
use crate::error::ActionError;
use crate::request::Request;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionName {
    List,
    Get,
    Add,
    Save,
    Delete,
    Search,
    Select,
}

impl ActionName {
    pub const ALL: [ActionName; 7] = [
        ActionName::List,
        ActionName::Get,
        ActionName::Add,
        ActionName::Save,
        ActionName::Delete,
        ActionName::Search,
        ActionName::Select,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionName::List => "list",
            ActionName::Get => "get",
            ActionName::Add => "add",
            ActionName::Save => "save",
            ActionName::Delete => "delete",
            ActionName::Search => "search",
            ActionName::Select => "select",
        }
    }

    /// Actions that write a form's values and so must pass validation first.
    pub fn persists(self) -> bool {
        matches!(self, ActionName::Add | ActionName::Save)
    }

    /// Autocomplete actions, which answer "no candidates" while a cascading
    /// parent is unset.
    pub fn degrades_to_empty(self) -> bool {
        matches!(self, ActionName::Search | ActionName::Select)
    }
}

impl fmt::Display for ActionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| format!("unknown action `{s}`"))
    }
}

/// An autocomplete candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub value: Value,
    pub label: String,
}

impl Choice {
    pub fn new(value: impl Into<Value>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// What an action resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutput {
    /// Records read or written through a connector.
    Data(Envelope<Payload>),
    /// `{value, label}` pairs for `search`/`select`.
    Choices(Envelope<Vec<Choice>>),
}

impl ActionOutput {
    pub fn empty_choices() -> Self {
        ActionOutput::Choices(Envelope::new(Vec::new()).with_total(Some(0)))
    }

    pub fn as_data(&self) -> Option<&Envelope<Payload>> {
        match self {
            ActionOutput::Data(envelope) => Some(envelope),
            ActionOutput::Choices(_) => None,
        }
    }

    pub fn as_choices(&self) -> Option<&[Choice]> {
        match self {
            ActionOutput::Choices(envelope) => Some(envelope.data()),
            ActionOutput::Data(_) => None,
        }
    }
}

impl From<Envelope<Payload>> for ActionOutput {
    fn from(envelope: Envelope<Payload>) -> Self {
        ActionOutput::Data(envelope)
    }
}

impl From<Envelope<Vec<Choice>>> for ActionOutput {
    fn from(envelope: Envelope<Vec<Choice>>) -> Self {
        ActionOutput::Choices(envelope)
    }
}

pub type ActionResult = Result<ActionOutput, ActionError>;
pub type ActionFuture = BoxFuture<'static, ActionResult>;
pub type ActionFn = Arc<dyn Fn(Request, ConnectorSet) -> ActionFuture + Send + Sync>;

/// Wraps an async closure as an [`ActionFn`].
pub fn action<F, Fut>(f: F) -> ActionFn
where
    F: Fn(Request, ConnectorSet) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ActionResult> + Send + 'static,
{
    Arc::new(move |req, connectors| -> ActionFuture { Box::pin(f(req, connectors)) })
}

/// Named actions of one view, tab or field.
#[derive(Clone, Default)]
pub struct ActionMap {
    actions: BTreeMap<ActionName, ActionFn>,
}

impl ActionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: ActionName, action: ActionFn) -> Self {
        self.actions.insert(name, action);
        self
    }

    pub fn get(&self, name: ActionName) -> Option<&ActionFn> {
        self.actions.get(&name)
    }

    pub fn contains(&self, name: ActionName) -> bool {
        self.actions.contains_key(&name)
    }

    pub fn names(&self) -> Vec<ActionName> {
        self.actions.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl fmt::Debug for ActionMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.actions.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_strings() {
        for name in ActionName::ALL {
            assert_eq!(name.to_string().parse::<ActionName>(), Ok(name));
        }
        assert!("patch".parse::<ActionName>().is_err());
    }

    #[test]
    fn only_writes_persist() {
        let persisting: Vec<_> = ActionName::ALL.into_iter().filter(|n| n.persists()).collect();
        assert_eq!(persisting, [ActionName::Add, ActionName::Save]);
        assert!(ActionName::Select.degrades_to_empty());
        assert!(!ActionName::List.degrades_to_empty());
    }

    #[tokio::test]
    async fn map_dispatches_by_name() {
        let map = ActionMap::new().with(
            ActionName::Search,
            action(|_req, _connectors| async { Ok::<_, ActionError>(ActionOutput::empty_choices()) }),
        );
        assert_eq!(map.names(), [ActionName::Search]);

        let run = map.get(ActionName::Search).unwrap();
        let out = run(Request::default(), ConnectorSet::new()).await.unwrap();
        assert_eq!(out.as_choices(), Some(&[][..]));
        assert!(map.get(ActionName::Get).is_none());
    }
}

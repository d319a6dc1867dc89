//! # Request Context
//!
//! A [`Request`] is the immutable bag handed to every action, props producer
//! and connector call: the positional id, the authenticated user, the payload,
//! the accumulated filters and the current values of sibling fields.
//!
//! `filter()` never mutates; it returns a new request with the filter appended,
//! so an action can derive several connector requests from the one it received.

use crate::envelope::Record;
use crate::error::ActionError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Authentication info injected into every request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthInfo {
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl AuthInfo {
    pub fn user(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            token: None,
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_anonymous(&self) -> bool {
        self.user.is_empty()
    }
}

/// One `filter(name, value)` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub name: String,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ascending,
    Descending,
}

/// Ordering by one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub field: String,
    pub direction: Direction,
}

impl Sort {
    pub fn new(field: impl Into<String>, direction: Direction) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Request {
    id: Option<String>,
    auth: AuthInfo,
    data: Record,
    filters: Vec<Filter>,
    context: Record,
    sorting: Vec<Sort>,
    page: Option<usize>,
}

impl Request {
    pub fn new(auth: AuthInfo) -> Self {
        Self {
            auth,
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_data(mut self, data: Record) -> Self {
        self.data = data;
        self
    }

    pub fn with_context(mut self, context: Record) -> Self {
        self.context = context;
        self
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sorting.push(sort);
        self
    }

    pub fn with_page(mut self, page: usize) -> Self {
        self.page = Some(page);
        self
    }

    /// Returns a new request with `name = value` appended to the filters.
    pub fn filter(&self, name: impl Into<String>, value: impl Into<Value>) -> Request {
        let mut next = self.clone();
        next.filters.push(Filter {
            name: name.into(),
            value: value.into(),
        });
        next
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn require_id(&self) -> Result<&str, ActionError> {
        self.id()
            .ok_or_else(|| ActionError::InvalidRequest("request carries no id".into()))
    }

    pub fn auth(&self) -> &AuthInfo {
        &self.auth
    }

    pub fn data(&self) -> &Record {
        &self.data
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn context(&self) -> &Record {
        &self.context
    }

    pub fn sorting(&self) -> &[Sort] {
        &self.sorting
    }

    pub fn page(&self) -> Option<usize> {
        self.page
    }

    /// The autocomplete query (`data.query`), empty when absent.
    pub fn query(&self) -> &str {
        self.data.get("query").and_then(Value::as_str).unwrap_or_default()
    }

    /// Identifiers of the already chosen items (`data.selection`), in order.
    ///
    /// Items may be bare identifiers or `{value, label}` objects.
    pub fn selection(&self) -> Result<Vec<Value>, ActionError> {
        match self.data.get("selection") {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => Ok(items
                .iter()
                .map(|item| match item {
                    Value::Object(choice) => choice.get("value").cloned().unwrap_or(Value::Null),
                    other => other.clone(),
                })
                .collect()),
            Some(other) => Err(ActionError::InvalidRequest(format!(
                "selection must be a list, got {other}"
            ))),
        }
    }

    /// A sibling field value, if set to something non-blank.
    pub fn context_value(&self, name: &str) -> Option<&Value> {
        self.context.get(name).filter(|v| !is_blank(v))
    }

    pub fn require_context(&self, name: &str) -> Result<&Value, ActionError> {
        self.context_value(name)
            .ok_or_else(|| ActionError::MissingContext(name.to_owned()))
    }
}

/// Null, empty strings and empty lists count as "not set".
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Renders an identifier value as a path/lookup key.
pub fn value_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

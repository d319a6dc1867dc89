//! # Engine Errors
//!
//! This module defines the error types shared by connectors, actions and view
//! construction. By centralizing error definitions, connectors built on any
//! transport report failures through the same closed taxonomy.
//!
//! - [`ConnectorError`]: produced by connectors, propagated untouched.
//! - [`ActionError`]: what an action invocation can fail with.
//! - [`ConfigError`]: rejected configuration (watch cycles, bad routes, bad config files).

use crate::action::ActionName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The closed set of failure kinds a caller of an action can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    NotFound,
    ValidationFailed,
    Unauthorized,
    Transport,
}

/// Errors reported by a [`Connector`](crate::connector::Connector).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConnectorError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation failed: {0}")]
    ValidationFailed(ValidationErrors),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Transport error: {0}")]
    Transport(String),
}

impl ConnectorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConnectorError::NotFound(_) => ErrorKind::NotFound,
            ConnectorError::ValidationFailed(_) => ErrorKind::ValidationFailed,
            ConnectorError::Unauthorized(_) => ErrorKind::Unauthorized,
            ConnectorError::Transport(_) => ErrorKind::Transport,
        }
    }
}

/// Field-level and form-level validation messages.
///
/// Serializes flat, the way a form renderer expects it:
/// `{"title": "This field is required.", "_error": "Either ..."}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    #[serde(rename = "_error", default, skip_serializing_if = "Option::is_none")]
    pub form: Option<String>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an error set holding only a form-level message.
    pub fn form(message: impl Into<String>) -> Self {
        Self {
            form: Some(message.into()),
            fields: BTreeMap::new(),
        }
    }

    /// Adds a message for `field`. The first message recorded for a field wins.
    pub fn with_field(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
        self.insert(field, message);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields.entry(field.into()).or_insert_with(|| message.into());
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn form_message(&self) -> Option<&str> {
        self.form.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.form.is_none() && self.fields.is_empty()
    }

    /// Folds `other` into `self`, keeping messages already present.
    pub fn merge(&mut self, other: ValidationErrors) {
        if self.form.is_none() {
            self.form = other.form;
        }
        for (field, message) in other.fields {
            self.insert(field, message);
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(form) = &self.form {
            parts.push(form.clone());
        }
        for (field, message) in &self.fields {
            parts.push(format!("{field}: {message}"));
        }
        write!(f, "{}", parts.join("; "))
    }
}

/// Errors returned when invoking an action.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ActionError {
    /// A connector failure, passed through as-is.
    #[error(transparent)]
    Connector(#[from] ConnectorError),
    /// Field or form validation failed before any connector call was made.
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),
    /// A cascading action needs a sibling value that is not set yet.
    #[error("Missing context value: {0}")]
    MissingContext(String),
    #[error("Action `{action}` is not defined for `{target}`")]
    UnknownAction { target: String, action: ActionName },
    #[error("Unknown connector: {0}")]
    UnknownConnector(String),
    #[error("Unknown field: {0}")]
    UnknownField(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ActionError {
    /// Maps the error onto the caller-facing taxonomy.
    ///
    /// Locally produced request problems count as validation failures;
    /// configuration lookups that miss count as transport failures.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ActionError::Connector(e) => e.kind(),
            ActionError::Validation(_)
            | ActionError::MissingContext(_)
            | ActionError::UnknownField(_)
            | ActionError::InvalidRequest(_) => ErrorKind::ValidationFailed,
            ActionError::UnknownAction { .. } | ActionError::UnknownConnector(_) => {
                ErrorKind::Transport
            }
        }
    }

    pub fn is_missing_context(&self) -> bool {
        matches!(self, ActionError::MissingContext(_))
    }
}

/// Errors raised while building views or loading configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Field `{0}` watches itself")]
    SelfWatch(String),
    #[error("Field `{field}` watches unknown field `{target}`")]
    UnknownWatchTarget { field: String, target: String },
    #[error("Duplicate field name `{0}`")]
    DuplicateField(String),
    #[error("Unknown field `{0}`")]
    UnknownField(String),
    #[error("Watch cycle: {}", .0.join(" -> "))]
    Cycle(Vec<String>),
    #[error("Invalid route template `{0}`")]
    InvalidRoute(String),
    #[error("Duplicate route `{0}`")]
    DuplicateRoute(String),
    #[error("Failed to read config file: {0}")]
    Io(String),
    #[error("Failed to parse config file: {0}")]
    Parse(String),
    #[error("Invalid value for `{key}`: {value}")]
    InvalidValue { key: String, value: String },
}

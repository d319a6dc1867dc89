//! # Action Resolver
//!
//! The single entry point callers use to run a named action of a view, tab or
//! field against the shared [`ConnectorSet`].
//!
//! Around the action itself the resolver enforces two rules:
//!
//! - **Validation first.** For `add`/`save` the request payload is checked
//!   against the source's field rules and form validator; on failure the
//!   action is never started, so no connector sees the write.
//! - **Cascades degrade, everything else surfaces.** A `search`/`select`
//!   failing with `MissingContext` resolves to an empty candidate list. Any
//!   other error, connector errors included, is returned untouched.

use crate::action::{ActionMap, ActionName, ActionOutput, ActionResult};
use crate::connector::ConnectorSet;
use crate::error::ActionError;
use crate::field::FieldSpec;
use crate::request::Request;
use crate::validation::{validate_values, FormValidator};
use tracing::{debug, info, warn};

/// Fields and form rule that guard the writes of a source.
#[derive(Clone, Default)]
pub struct FormRules {
    pub fields: Vec<FieldSpec>,
    pub validator: Option<FormValidator>,
}

/// Anything that owns an action map: views, tabs and fields.
pub trait ActionSource {
    /// Name used in errors and logs (a route or a field name).
    fn target(&self) -> String;

    fn actions(&self) -> &ActionMap;

    /// Validation applied before `add`/`save`. `None` skips validation.
    fn rules(&self) -> Option<FormRules> {
        None
    }

    /// Adjusts the request before dispatch, e.g. a list's default ordering.
    fn prepare(&self, _name: ActionName, req: Request) -> Request {
        req
    }
}

impl ActionSource for FieldSpec {
    fn target(&self) -> String {
        self.name().to_owned()
    }

    fn actions(&self) -> &ActionMap {
        FieldSpec::actions(self)
    }
}

#[derive(Debug, Clone)]
pub struct ActionResolver {
    connectors: ConnectorSet,
}

impl ActionResolver {
    pub fn new(connectors: ConnectorSet) -> Self {
        Self { connectors }
    }

    pub fn connectors(&self) -> &ConnectorSet {
        &self.connectors
    }

    pub async fn invoke<S>(&self, source: &S, name: ActionName, req: Request) -> ActionResult
    where
        S: ActionSource + ?Sized,
    {
        let target = source.target();
        let req = source.prepare(name, req);
        let Some(run) = source.actions().get(name).cloned() else {
            warn!(%target, action = %name, "Unknown action");
            return Err(ActionError::UnknownAction { target, action: name });
        };

        if name.persists() {
            if let Some(rules) = source.rules() {
                if let Err(errors) = validate_values(&rules.fields, rules.validator.as_ref(), req.data()) {
                    info!(%target, action = %name, %errors, "Validation blocked write");
                    return Err(ActionError::Validation(errors));
                }
            }
        }

        debug!(%target, action = %name, user = %req.auth().user, "Dispatch");
        match run(req, self.connectors.clone()).await {
            Ok(output) => {
                debug!(%target, action = %name, "Action ok");
                Ok(output)
            }
            Err(e) if e.is_missing_context() && name.degrades_to_empty() => {
                debug!(%target, action = %name, reason = %e, "No candidates until context is set");
                Ok(ActionOutput::empty_choices())
            }
            Err(e) => {
                warn!(%target, action = %name, error = %e, "Action failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::action;
    use crate::envelope::{record, Record};
    use crate::error::{ConnectorError, ValidationErrors};
    use crate::field::FieldKind;
    use crate::mock::MockConnector;
    use serde_json::json;
    use std::sync::Arc;

    struct Entries {
        actions: ActionMap,
    }

    impl ActionSource for Entries {
        fn target(&self) -> String {
            "entries/:id".into()
        }

        fn actions(&self) -> &ActionMap {
            &self.actions
        }

        fn rules(&self) -> Option<FormRules> {
            Some(FormRules {
                fields: vec![FieldSpec::new("title", FieldKind::Text).required(true)],
                validator: Some(Arc::new(|values: &Record| {
                    (!values.contains_key("tags")).then(|| ValidationErrors::form("tags missing"))
                })),
            })
        }
    }

    fn entries() -> Entries {
        Entries {
            actions: ActionMap::new()
                .with(ActionName::Save, crate::crud::save("entry"))
                .with(ActionName::Get, crate::crud::get("entry")),
        }
    }

    #[tokio::test]
    async fn invalid_save_never_reaches_the_connector() {
        let mock = MockConnector::new();
        let resolver = ActionResolver::new(ConnectorSet::new().with_entry("entry", mock.entry_factory()));
        let req = Request::default().with_id("1").with_data(record(json!({"title": ""})));

        let err = resolver.invoke(&entries(), ActionName::Save, req).await.unwrap_err();
        let ActionError::Validation(errors) = err else { panic!("expected validation error") };
        assert_eq!(errors.field("title"), Some("This field is required."));
        assert_eq!(errors.form_message(), Some("tags missing"));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn connector_errors_pass_through() {
        let mock = MockConnector::new();
        mock.expect_read().return_err(ConnectorError::NotFound("7".into()));
        let resolver = ActionResolver::new(ConnectorSet::new().with_entry("entry", mock.entry_factory()));

        let err = resolver
            .invoke(&entries(), ActionName::Get, Request::default().with_id("7"))
            .await
            .unwrap_err();
        assert_eq!(err, ActionError::Connector(ConnectorError::NotFound("7".into())));
    }

    #[tokio::test]
    async fn missing_context_degrades_only_for_autocomplete() {
        let failing = || action(|_req, _c| async { Err::<ActionOutput, _>(ActionError::MissingContext("section".into())) });
        let field = FieldSpec::new("category", FieldKind::Autocomplete)
            .action(ActionName::Search, failing())
            .action(ActionName::Get, failing());
        let resolver = ActionResolver::new(ConnectorSet::new());

        let out = resolver.invoke(&field, ActionName::Search, Request::default()).await.unwrap();
        assert_eq!(out, ActionOutput::empty_choices());

        let err = resolver.invoke(&field, ActionName::Get, Request::default()).await.unwrap_err();
        assert!(err.is_missing_context());
    }

    #[tokio::test]
    async fn undefined_actions_are_reported() {
        let resolver = ActionResolver::new(ConnectorSet::new());
        let err = resolver
            .invoke(&entries(), ActionName::Delete, Request::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::UnknownAction { action: ActionName::Delete, .. }));
    }
}

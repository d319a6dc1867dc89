//! Field and form validation run before `save`/`add` reach a connector.

use crate::envelope::Record;
use crate::error::ValidationErrors;
use crate::field::FieldSpec;
use crate::request::is_blank;
use serde_json::Value;
use std::sync::Arc;

pub const REQUIRED_MESSAGE: &str = "This field is required.";

/// View-level rule over all values, e.g. "either category or tags".
pub type FormValidator = Arc<dyn Fn(&Record) -> Option<ValidationErrors> + Send + Sync>;

/// Checks `values` against the required flags and validators of `fields`,
/// then against the form validator.
///
/// Per field, a missing required value is reported before the field's own
/// validator is consulted.
pub fn validate_values<'a>(
    fields: impl IntoIterator<Item = &'a FieldSpec>,
    form: Option<&FormValidator>,
    values: &Record,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();

    for field in fields {
        let value = values.get(field.name()).unwrap_or(&Value::Null);
        if field.required_flag().evaluate(values) && is_blank(value) {
            errors.insert(field.name(), REQUIRED_MESSAGE);
            continue;
        }
        if let Some(message) = field.validator().and_then(|validate| validate(value, values)) {
            errors.insert(field.name(), message);
        }
    }

    if let Some(found) = form.and_then(|validate| validate(values)) {
        errors.merge(found);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::record;
    use crate::field::FieldKind;
    use serde_json::json;

    fn category_or_tags() -> FormValidator {
        Arc::new(|values: &Record| {
            let missing = |name: &str| values.get(name).map_or(true, is_blank);
            (missing("category") && missing("tags"))
                .then(|| ValidationErrors::form("Either `Category` or `Tags` is required."))
        })
    }

    #[test]
    fn required_blank_values_are_reported() {
        let fields = [
            FieldSpec::new("title", FieldKind::Text).required(true),
            FieldSpec::new("tags", FieldKind::AutocompleteMultiple).required(true),
        ];
        let errors = validate_values(&fields, None, &record(json!({"title": "", "tags": []})))
            .unwrap_err();
        assert_eq!(errors.field("title"), Some(REQUIRED_MESSAGE));
        assert_eq!(errors.field("tags"), Some(REQUIRED_MESSAGE));
    }

    #[test]
    fn form_rule_reports_under_error_key() {
        let validator = category_or_tags();
        let errors = validate_values([], Some(&validator), &record(json!({"tags": []}))).unwrap_err();
        assert_eq!(errors.form_message(), Some("Either `Category` or `Tags` is required."));

        assert!(validate_values([], Some(&validator), &record(json!({"tags": [1]}))).is_ok());
    }

    #[test]
    fn field_validator_sees_all_values() {
        let summary = FieldSpec::new("summary", FieldKind::Textarea).validate(|value, all| {
            (is_blank(value) && all.get("status") == Some(&json!("1")))
                .then(|| "The summary is required with status \"Online\".".to_owned())
        });
        let fields = [summary];
        assert!(validate_values(&fields, None, &record(json!({"status": "0"}))).is_ok());
        assert!(validate_values(&fields, None, &record(json!({"status": "1"}))).is_err());
    }
}

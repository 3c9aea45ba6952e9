//! Model catalog validation: ids, limits, and the default selection.

use std::collections::HashSet;

use crate::schema::PalaverConfig;

pub(crate) fn validate_models(errors: &mut Vec<String>, config: &PalaverConfig) {
    let models = &config.models;

    if models.catalog.is_empty() {
        errors.push("models.catalog must list at least one model".into());
        return;
    }

    let mut seen = HashSet::new();
    for (i, entry) in models.catalog.iter().enumerate() {
        if entry.id.trim().is_empty() {
            errors.push(format!("models.catalog[{i}].id is empty"));
            continue;
        }
        if !seen.insert(entry.id.as_str()) {
            errors.push(format!("models.catalog has duplicate id '{}'", entry.id));
        }
        if entry.max_context_tokens == 0 {
            errors.push(format!(
                "models.catalog['{}'].max_context_tokens must be greater than 0",
                entry.id
            ));
        }
        if entry.max_output_tokens == 0 {
            errors.push(format!(
                "models.catalog['{}'].max_output_tokens must be greater than 0",
                entry.id
            ));
        }
    }

    if !seen.contains(models.default_model.as_str()) {
        errors.push(format!(
            "models.default_model '{}' is not in models.catalog",
            models.default_model
        ));
    }
}

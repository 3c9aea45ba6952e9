//! Typed per-model token limits.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Context and output limits for one model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBudget {
    pub max_context_tokens: u64,
    pub max_output_tokens: u64,
}

impl TokenBudget {
    pub fn new(max_context_tokens: u64, max_output_tokens: u64) -> Self {
        Self {
            max_context_tokens,
            max_output_tokens,
        }
    }
}

/// Fixed mapping from model identifier to its budget.
///
/// Built once from validated configuration; lookups never touch raw config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCatalog {
    default_model: String,
    budgets: BTreeMap<String, TokenBudget>,
}

impl ModelCatalog {
    /// Build a catalog. Returns `None` when `default_model` is not one of
    /// the supplied entries.
    pub fn new(
        default_model: impl Into<String>,
        entries: impl IntoIterator<Item = (String, TokenBudget)>,
    ) -> Option<Self> {
        let default_model = default_model.into();
        let budgets: BTreeMap<String, TokenBudget> = entries.into_iter().collect();
        if !budgets.contains_key(&default_model) {
            return None;
        }
        Some(Self {
            default_model,
            budgets,
        })
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn budget(&self, model_id: &str) -> Option<TokenBudget> {
        self.budgets.get(model_id).copied()
    }

    pub fn contains(&self, model_id: &str) -> bool {
        self.budgets.contains_key(model_id)
    }

    /// Models in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TokenBudget)> {
        self.budgets.iter().map(|(id, b)| (id.as_str(), b))
    }

    pub fn len(&self) -> usize {
        self.budgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.budgets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ModelCatalog {
        ModelCatalog::new(
            "small",
            [
                ("small".to_string(), TokenBudget::new(1_000, 100)),
                ("large".to_string(), TokenBudget::new(1_000_000, 65_536)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn catalog_lookup() {
        let catalog = sample();
        assert_eq!(catalog.default_model(), "small");
        assert_eq!(catalog.budget("large").unwrap().max_context_tokens, 1_000_000);
        assert!(catalog.budget("missing").is_none());
        assert!(catalog.contains("small"));
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn catalog_rejects_unknown_default() {
        let catalog = ModelCatalog::new("nope", [("a".to_string(), TokenBudget::new(1, 1))]);
        assert!(catalog.is_none());
    }

    #[test]
    fn catalog_iterates_in_id_order() {
        let catalog = sample();
        let ids: Vec<&str> = catalog.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["large", "small"]);
    }

    #[test]
    fn budget_serialization() {
        let budget = TokenBudget::new(128_000, 4_096);
        let json = serde_json::to_string(&budget).unwrap();
        let parsed: TokenBudget = serde_json::from_str(&json).unwrap();
        assert_eq!(budget, parsed);
    }
}

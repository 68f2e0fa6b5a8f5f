//! Chat-model classification.

use {
    modelscout_config::{FilterAction, FilterConfig, FilterRule, default_filter_rules},
    tracing::debug,
};

use crate::{
    parse::is_text_model_type,
    types::{ProviderKind, ProviderModel},
};

#[derive(Debug, Clone)]
struct CompiledRule {
    needle: String,
    action: FilterAction,
}

/// Separates chat-completion models from embeddings, image, audio and other
/// non-chat models.
///
/// Rules are matched in order as case-insensitive substrings of the model id;
/// the first match decides. A model no rule matches is kept unless it
/// declares a non-text `model_type`.
#[derive(Debug, Clone)]
pub struct ChatModelFilter {
    rules: Vec<CompiledRule>,
}

impl Default for ChatModelFilter {
    fn default() -> Self {
        Self::new(&default_filter_rules())
    }
}

impl ChatModelFilter {
    /// Build from a rule table. Blank patterns are ignored.
    pub fn new(rules: &[FilterRule]) -> Self {
        let rules = rules
            .iter()
            .filter_map(|rule| {
                let needle = rule.pattern.trim().to_lowercase();
                (!needle.is_empty()).then_some(CompiledRule {
                    needle,
                    action: rule.action,
                })
            })
            .collect();
        Self { rules }
    }

    pub fn from_config(config: &FilterConfig) -> Self {
        Self::new(&config.rules)
    }

    /// The action of the first rule matching `model_id`, if any.
    pub fn matching_action(&self, model_id: &str) -> Option<FilterAction> {
        let id = model_id.to_lowercase();
        self.rules
            .iter()
            .find(|rule| id.contains(&rule.needle))
            .map(|rule| rule.action)
    }

    /// Whether `model` looks like a chat-completion model.
    pub fn is_chat_model(&self, model: &ProviderModel) -> bool {
        match self.matching_action(&model.id) {
            Some(FilterAction::Include) => true,
            Some(FilterAction::Exclude) => false,
            None => model.model_type.as_deref().is_none_or(is_text_model_type),
        }
    }

    /// Keep only chat models, preserving order. Kinds whose endpoint only
    /// lists chat models pass through untouched.
    pub fn filter(&self, kind: ProviderKind, models: Vec<ProviderModel>) -> Vec<ProviderModel> {
        if kind.lists_chat_only() {
            return models;
        }
        models
            .into_iter()
            .filter(|model| {
                let keep = self.is_chat_model(model);
                if !keep {
                    debug!(id = %model.id, "filtered out non-chat model");
                }
                keep
            })
            .collect()
    }
}

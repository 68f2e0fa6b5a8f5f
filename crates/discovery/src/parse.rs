//! `/models` response parsing, one strategy per [`ProviderKind`].
//!
//! Envelope problems fail the whole response; problems with a single entry
//! (missing id, wrong type) only drop that entry.

use std::collections::HashSet;

use {
    serde_json::{Map, Value},
    tracing::debug,
};

use crate::{
    error::DiscoveryError,
    types::{ModelPricing, ModelTraits, ProviderKind, ProviderModel},
};

/// Keys that may carry a declared model modality, in priority order.
const MODEL_TYPE_KEYS: &[&str] = &["type", "category", "modality", "model_type"];

/// Declared modalities that describe a text-generation model.
const TEXT_MODEL_TYPES: &[&str] = &["text", "chat", "code", "completion", "llm"];

/// Parse a model listing. Duplicate ids keep their first occurrence and
/// provider order is preserved.
pub fn parse(kind: ProviderKind, body: &str) -> Result<Vec<ProviderModel>, DiscoveryError> {
    let root: Value = serde_json::from_str(body)
        .map_err(|e| DiscoveryError::MalformedResponse(format!("invalid JSON: {e}")))?;

    let models = match kind {
        ProviderKind::OpenAiCompatible => parse_openai(&root)?,
        ProviderKind::OpenRouter => parse_openrouter(&root)?,
        ProviderKind::Venice => parse_venice(&root)?,
        ProviderKind::Generic | ProviderKind::Unknown => parse_generic(&root)?,
    };
    Ok(dedupe(models))
}

/// Whether a declared modality means text generation.
pub fn is_text_model_type(model_type: &str) -> bool {
    TEXT_MODEL_TYPES.contains(&model_type)
}

fn data_array(root: &Value) -> Result<&Vec<Value>, DiscoveryError> {
    root.get("data").and_then(Value::as_array).ok_or_else(|| {
        DiscoveryError::MalformedResponse("expected an object with a `data` array".into())
    })
}

fn entry_id(entry: &Map<String, Value>) -> Option<String> {
    let id = entry.get("id")?.as_str()?.trim();
    (!id.is_empty()).then(|| id.to_string())
}

fn str_field<'a>(entry: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| entry.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
}

fn u32_field(entry: &Map<String, Value>, keys: &[&str]) -> Option<u32> {
    keys.iter()
        .filter_map(|k| entry.get(*k).and_then(Value::as_u64))
        .find_map(|n| u32::try_from(n).ok())
}

fn bool_field(entry: &Map<String, Value>, key: &str) -> bool {
    entry.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// Declared modality, lowercased. The bare value `"model"` (used by some
/// gateways as an object tag) is not a modality.
fn declared_model_type(entry: &Map<String, Value>) -> Option<String> {
    let value = str_field(entry, MODEL_TYPE_KEYS)?.to_ascii_lowercase();
    (value != "model").then_some(value)
}

/// Per-token price (string or number) converted to USD per million tokens.
/// Negative sentinel prices (dynamic routers) are treated as unknown.
fn per_token_to_per_million(value: Option<&Value>) -> Option<f64> {
    let per_token = match value? {
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        Value::Number(n) => n.as_f64()?,
        _ => return None,
    };
    (per_token.is_finite() && per_token >= 0.0).then(|| per_token * 1_000_000.0)
}

fn usd_value(value: Option<&Value>) -> Option<f64> {
    let usd = value?.get("usd")?.as_f64()?;
    (usd.is_finite() && usd >= 0.0).then_some(usd)
}

fn skip(reason: &str, entry: &Value) {
    debug!(reason, entry = %truncate_for_log(entry), "skipping model entry");
}

fn truncate_for_log(entry: &Value) -> String {
    let rendered = entry.to_string();
    rendered.chars().take(120).collect()
}

// ── OpenAI-compatible ───────────────────────────────────────────────────────

fn parse_openai(root: &Value) -> Result<Vec<ProviderModel>, DiscoveryError> {
    Ok(data_array(root)?.iter().filter_map(openai_entry).collect())
}

fn openai_entry(entry: &Value) -> Option<ProviderModel> {
    let Some(obj) = entry.as_object() else {
        skip("not an object", entry);
        return None;
    };
    let Some(id) = entry_id(obj) else {
        skip("missing id", entry);
        return None;
    };

    let mut model = ProviderModel::new(id);
    if let Some(name) = str_field(obj, &["name", "display_name"]) {
        model.display_name = name.to_string();
    }
    model.context_length = u32_field(obj, &[
        "context_length",
        "context_window",
        "max_context_length",
    ]);
    model.model_type = declared_model_type(obj);
    Some(model)
}

// ── OpenRouter ──────────────────────────────────────────────────────────────

fn parse_openrouter(root: &Value) -> Result<Vec<ProviderModel>, DiscoveryError> {
    Ok(data_array(root)?.iter().filter_map(openrouter_entry).collect())
}

fn openrouter_entry(entry: &Value) -> Option<ProviderModel> {
    let mut model = openai_entry(entry)?;
    let obj = entry.as_object()?;

    if model.context_length.is_none() {
        model.context_length = obj
            .get("top_provider")
            .and_then(Value::as_object)
            .and_then(|tp| u32_field(tp, &["context_length"]));
    }

    if let Some(pricing) = obj.get("pricing") {
        model.pricing = ModelPricing {
            input_usd_per_million: per_token_to_per_million(pricing.get("prompt")),
            output_usd_per_million: per_token_to_per_million(pricing.get("completion")),
        };
    }

    let params: HashSet<&str> = obj
        .get("supported_parameters")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    model.traits.tools = params.contains("tools");
    model.traits.reasoning = params.contains("reasoning") || params.contains("include_reasoning");
    model.traits.response_schema =
        params.contains("structured_outputs") || params.contains("response_format");
    model.traits.logprobs = params.contains("logprobs");
    model.traits.web_search = params.contains("web_search_options");

    if let Some(arch) = obj.get("architecture").and_then(Value::as_object) {
        let (inputs, outputs) = modalities(arch);
        model.traits.vision = inputs.iter().any(|m| m == "image");
        if !outputs.is_empty() && !outputs.iter().any(|m| m == "text") {
            model.model_type = outputs.first().cloned();
        }
    }
    Some(model)
}

/// Input and output modalities, from the list fields or the older
/// `"text+image->text"` string.
fn modalities(arch: &Map<String, Value>) -> (Vec<String>, Vec<String>) {
    let list = |key: &str| -> Option<Vec<String>> {
        arch.get(key).and_then(Value::as_array).map(|a| {
            a.iter()
                .filter_map(Value::as_str)
                .map(str::to_ascii_lowercase)
                .collect()
        })
    };
    if let (Some(inputs), Some(outputs)) = (list("input_modalities"), list("output_modalities")) {
        return (inputs, outputs);
    }

    let Some(modality) = arch.get("modality").and_then(Value::as_str) else {
        return (Vec::new(), Vec::new());
    };
    let split = |side: &str| -> Vec<String> {
        side.split('+')
            .map(|m| m.trim().to_ascii_lowercase())
            .filter(|m| !m.is_empty())
            .collect()
    };
    match modality.split_once("->") {
        Some((inputs, outputs)) => (split(inputs), split(outputs)),
        None => (split(modality), Vec::new()),
    }
}

// ── Venice ──────────────────────────────────────────────────────────────────

fn parse_venice(root: &Value) -> Result<Vec<ProviderModel>, DiscoveryError> {
    Ok(data_array(root)?.iter().filter_map(venice_entry).collect())
}

fn venice_entry(entry: &Value) -> Option<ProviderModel> {
    let Some(obj) = entry.as_object() else {
        skip("not an object", entry);
        return None;
    };
    let Some(id) = entry_id(obj) else {
        skip("missing id", entry);
        return None;
    };

    let model_type = obj
        .get("type")
        .and_then(Value::as_str)
        .map(str::to_ascii_lowercase);
    if let Some(t) = model_type.as_deref()
        && t != "text"
        && t != "code"
    {
        skip("not a text model", entry);
        return None;
    }

    let mut model = ProviderModel::new(id);
    model.model_type = model_type;

    let Some(spec) = obj.get("model_spec").and_then(Value::as_object) else {
        return Some(model);
    };
    if let Some(name) = str_field(spec, &["name"]) {
        model.display_name = name.to_string();
    }
    model.context_length = u32_field(spec, &["availableContextTokens"]);

    if let Some(caps) = spec.get("capabilities").and_then(Value::as_object) {
        model.traits = ModelTraits {
            vision: bool_field(caps, "supportsVision"),
            tools: bool_field(caps, "supportsFunctionCalling"),
            reasoning: bool_field(caps, "supportsReasoning"),
            web_search: bool_field(caps, "supportsWebSearch"),
            response_schema: bool_field(caps, "supportsResponseSchema"),
            logprobs: bool_field(caps, "supportsLogProbs"),
            code_optimized: bool_field(caps, "optimizedForCode"),
        };
    }
    if let Some(pricing) = spec.get("pricing") {
        model.pricing = ModelPricing {
            input_usd_per_million: usd_value(pricing.get("input")),
            output_usd_per_million: usd_value(pricing.get("output")),
        };
    }
    Some(model)
}

// ── Generic ─────────────────────────────────────────────────────────────────

/// OpenAI shape, or a flat list of ids (`["a", "b"]` / `{"data": ["a"]}`),
/// or an Ollama-style `{"models": [{"name": ...}]}` listing.
fn parse_generic(root: &Value) -> Result<Vec<ProviderModel>, DiscoveryError> {
    let entries = match root {
        Value::Array(items) => items,
        Value::Object(obj) => match (obj.get("data"), obj.get("models")) {
            (Some(Value::Array(items)), _) => items,
            (None, Some(Value::Array(items))) => {
                return Ok(items.iter().filter_map(named_entry).collect());
            },
            _ => {
                return Err(DiscoveryError::MalformedResponse(
                    "expected a `data` array or a list of model ids".into(),
                ));
            },
        },
        _ => {
            return Err(DiscoveryError::MalformedResponse(
                "expected a `data` array or a list of model ids".into(),
            ));
        },
    };

    Ok(entries
        .iter()
        .filter_map(|entry| match entry {
            Value::String(id) if !id.trim().is_empty() => Some(ProviderModel::new(id.trim())),
            Value::Object(_) => openai_entry(entry),
            _ => {
                skip("not an id or object", entry);
                None
            },
        })
        .collect())
}

fn named_entry(entry: &Value) -> Option<ProviderModel> {
    let obj = entry.as_object()?;
    match str_field(obj, &["id", "model", "name"]) {
        Some(id) => Some(ProviderModel::new(id)),
        None => {
            skip("missing id", entry);
            None
        },
    }
}

fn dedupe(models: Vec<ProviderModel>) -> Vec<ProviderModel> {
    let mut seen = HashSet::new();
    models
        .into_iter()
        .filter(|m| {
            let first = seen.insert(m.id.clone());
            if !first {
                debug!(id = %m.id, "dropping duplicate model id");
            }
            first
        })
        .collect()
}

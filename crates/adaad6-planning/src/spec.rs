//! Action specifications
//!
//! Immutable values produced by the planner and consumed by the executor.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpecError {
    #[error("invalid action spec: {field}: {message}")]
    InvalidField { field: String, message: String },
}

pub type Result<T> = std::result::Result<T, SpecError>;

/// Action names that always count as mutation-class.
const MUTATION_ACTION_NAMES: [&str; 5] =
    ["mutate_code", "mutate", "evolve", "autopromote", "autonomous_mutation"];

/// Effects that mark a step as mutation-class regardless of its name.
const MUTATION_EFFECTS: [&str; 2] = ["mutation", "evolution"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    pub id: String,
    pub action: String,
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(default)]
    pub preconditions: Vec<String>,
    #[serde(default)]
    pub effects: Vec<String>,
    #[serde(default)]
    pub cost_hint: Option<f64>,
}

impl ActionSpec {
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "id": self.id,
            "action": self.action,
            "params": self.params,
            "preconditions": self.preconditions,
            "effects": self.effects,
            "cost_hint": self.cost_hint,
        })
    }
}

fn invalid(field: &str, message: impl Into<String>) -> SpecError {
    SpecError::InvalidField {
        field: field.to_string(),
        message: message.into(),
    }
}

fn require_identifier(value: &str, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(invalid(field, "cannot be empty"));
    }
    let valid = trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if !valid {
        return Err(invalid(field, "must match [A-Za-z0-9._-]+"));
    }
    Ok(trimmed.to_string())
}

fn require_non_empty(value: &str, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(invalid(field, "cannot be empty"));
    }
    Ok(trimmed.to_string())
}

fn coerce_effect_list(raw: &[String], field: &str) -> Result<Vec<String>> {
    raw.iter()
        .enumerate()
        .map(|(i, item)| require_non_empty(item, &format!("{field}[{i}]")))
        .collect()
}

fn coerce_cost_hint(raw: Option<f64>) -> Result<Option<f64>> {
    match raw {
        None => Ok(None),
        Some(value) if value.is_finite() => Ok(Some(value)),
        Some(_) => Err(invalid("cost_hint", "must be finite")),
    }
}

/// Normalize and validate a spec, returning the cleaned value.
pub fn validate_action_spec(spec: &ActionSpec) -> Result<ActionSpec> {
    Ok(ActionSpec {
        id: require_identifier(&spec.id, "id")?,
        action: require_non_empty(&spec.action, "action")?,
        params: spec.params.clone(),
        preconditions: coerce_effect_list(&spec.preconditions, "preconditions")?,
        effects: coerce_effect_list(&spec.effects, "effects")?,
        cost_hint: coerce_cost_hint(spec.cost_hint)?,
    })
}

pub fn validate_action_spec_list(specs: &[ActionSpec]) -> Result<Vec<ActionSpec>> {
    specs.iter().map(validate_action_spec).collect()
}

/// Whether an action name alone marks a step as mutation-class.
pub fn is_mutation_action_name(name: &str) -> bool {
    MUTATION_ACTION_NAMES.contains(&name)
}

/// Whether a step is mutation-class: by action name or declared effects.
pub fn is_mutation_step(spec: &ActionSpec) -> bool {
    if is_mutation_action_name(&spec.action) {
        return true;
    }
    spec.effects
        .iter()
        .any(|effect| MUTATION_EFFECTS.contains(&effect.as_str()))
}

//! Deterministic planner
//!
//! Builds the credibility-first action chain for a goal, filters it by
//! resource tier, and bounds it by the configured step and time budgets.
//! Exceeded budgets mark `meta.truncated` / `meta.time_capped` instead of
//! erroring.

use std::time::Instant;

use adaad6_config::{AdaadConfig, ConfigError, ResourceTier};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::spec::{validate_action_spec_list, ActionSpec, SpecError};

#[derive(Error, Debug)]
pub enum PlanError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Spec(#[from] SpecError),
}

#[derive(Debug, Clone)]
pub struct Plan {
    pub goal: String,
    pub steps: Vec<ActionSpec>,
    pub meta: Map<String, Value>,
}

impl Plan {
    pub fn to_value(&self) -> Value {
        json!({
            "goal": self.goal,
            "steps": self.steps.iter().map(ActionSpec::to_value).collect::<Vec<_>>(),
            "meta": self.meta,
        })
    }
}

fn step(
    id: &str,
    action: &str,
    params: Value,
    preconditions: &[&str],
    effects: &[&str],
    cost_hint: f64,
) -> ActionSpec {
    ActionSpec {
        id: id.to_string(),
        action: action.to_string(),
        params: params.as_object().cloned().unwrap_or_default(),
        preconditions: preconditions.iter().map(|s| s.to_string()).collect(),
        effects: effects.iter().map(|s| s.to_string()).collect(),
        cost_hint: Some(cost_hint),
    }
}

fn base_actions(goal: &str) -> Result<Vec<ActionSpec>, SpecError> {
    let normalized = goal.trim();
    if normalized.is_empty() {
        return Ok(Vec::new());
    }

    validate_action_spec_list(&[
        step(
            "clarify",
            "clarify_goal",
            json!({"goal": normalized}),
            &[],
            &["goal_clarity"],
            0.05,
        ),
        step(
            "constraints",
            "identify_constraints",
            json!({"goal": normalized}),
            &["goal_clarity"],
            &["constraints_noted"],
            0.25,
        ),
        step(
            "context",
            "survey_context",
            json!({"goal": normalized, "depth": "light"}),
            &["constraints_noted"],
            &["context_profiled"],
            1.25,
        ),
        step(
            "options",
            "propose_actions",
            json!({"goal": normalized, "fanout": 3}),
            &["constraints_noted"],
            &["options_listed"],
            0.8,
        ),
        step(
            "select",
            "select_minimum_path",
            json!({"goal": normalized, "preference": "credibility_first"}),
            &["options_listed"],
            &["plan_candidate"],
            0.35,
        ),
        step(
            "report",
            "finalize_report",
            json!({"goal": normalized}),
            &["plan_candidate"],
            &["report_ready"],
            0.15,
        ),
    ])
}

/// Mobile filters out expensive and unknown-cost actions; server allows
/// everything. Missing cost hints are treated as unbounded so they never
/// bypass tier caps.
fn filter_for_tier(actions: Vec<ActionSpec>, tier: ResourceTier) -> Vec<ActionSpec> {
    let cutoff = match tier {
        ResourceTier::Mobile => 1.0,
        ResourceTier::Edge => 2.0,
        ResourceTier::Server => f64::INFINITY,
    };
    actions
        .into_iter()
        .filter(|action| action.cost_hint.unwrap_or(f64::INFINITY) <= cutoff)
        .collect()
}

fn apply_limits(
    actions: Vec<ActionSpec>,
    cfg: &AdaadConfig,
    start: Instant,
    meta: &mut Map<String, Value>,
) -> Vec<ActionSpec> {
    let mut bounded = Vec::new();
    for action in actions {
        if start.elapsed().as_secs_f64() > cfg.planner_max_seconds {
            meta.insert("time_capped".to_string(), json!(true));
            break;
        }
        if bounded.len() >= cfg.planner_max_steps as usize {
            meta.insert("truncated".to_string(), json!(true));
            break;
        }
        bounded.push(action);
    }
    bounded
}

fn assign_ids(actions: Vec<ActionSpec>) -> Vec<ActionSpec> {
    actions
        .into_iter()
        .enumerate()
        .map(|(i, action)| ActionSpec {
            id: format!("act-{:03}", i + 1),
            ..action
        })
        .collect()
}

/// Build a plan for a goal under the configured budgets.
pub fn make_plan(goal: &str, cfg: &AdaadConfig) -> Result<Plan, PlanError> {
    cfg.validate()?;
    let start = Instant::now();
    let mut meta = Map::new();
    meta.insert("truncated".to_string(), json!(false));
    meta.insert("time_capped".to_string(), json!(false));
    meta.insert("tier".to_string(), json!(cfg.resource_tier.as_str()));

    let actions = base_actions(goal)?;
    let filtered = filter_for_tier(actions, cfg.resource_tier);
    let bounded = apply_limits(filtered, cfg, start, &mut meta);
    let numbered = assign_ids(bounded);

    Ok(Plan {
        goal: goal.to_string(),
        steps: numbered,
        meta,
    })
}

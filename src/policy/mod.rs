//! Ordered policy resolution with per-policy cooldown.
//!
//! Policies are evaluated in declaration order against the cycle's result
//! map. A policy whose conditions hold fires unless its own cooldown is
//! still running; a cooldown skip moves on to the next policy rather than
//! ending the cycle. At most one policy fires per cycle, and the engine's
//! only mutable state is the per-policy last-fired timestamp, written at
//! fire time.

use crate::eval::EvaluationResult;
use crate::lint;
use crate::region::spec::{ActionSpec, PolicySpec};
use crate::util::{RegionMatchError, RegionMatchResult};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::{Duration, Instant};

/// What a fired policy does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// Pointer click resolved through the region's click binding.
    Click,
    /// Terminate the run.
    Stop,
}

/// Action bound to a policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Action {
    pub kind: ActionKind,
    /// Minimum time before the same policy may fire again.
    pub cooldown: Duration,
}

/// Condition block of a policy. Omitted fields are always satisfied.
#[derive(Debug, Clone)]
pub struct When {
    pub region: String,
    pub matched: Option<bool>,
    pub confidence_gte: Option<f32>,
}

/// One compiled, immutable policy rule.
#[derive(Debug, Clone)]
pub struct Policy {
    pub name: String,
    pub when: When,
    pub action: Action,
}

/// Decision handed to the executor when a policy fires.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub policy: String,
    pub action: Action,
    pub region: String,
    pub confidence: f32,
}

fn compile_action(policy: &str, spec: &ActionSpec) -> RegionMatchResult<Action> {
    let kind = match spec.kind.as_str() {
        "click" => ActionKind::Click,
        "stop" => ActionKind::Stop,
        other => {
            return Err(RegionMatchError::InvalidPolicy {
                policy: policy.to_string(),
                reason: format!("unknown action type '{other}'"),
            })
        }
    };
    if spec.cooldown < 0.0 || !spec.cooldown.is_finite() {
        return Err(RegionMatchError::InvalidPolicy {
            policy: policy.to_string(),
            reason: format!("invalid cooldown {}", spec.cooldown),
        });
    }
    Ok(Action {
        kind,
        cooldown: Duration::from_secs_f64(spec.cooldown),
    })
}

/// Compiles raw policy records into the typed model.
pub fn compile_policies(specs: &[PolicySpec]) -> RegionMatchResult<Vec<Policy>> {
    specs
        .iter()
        .map(|spec| {
            Ok(Policy {
                name: spec.name.clone(),
                when: When {
                    region: spec.when.region.clone(),
                    matched: spec.when.matched,
                    confidence_gte: spec.when.confidence_gte,
                },
                action: compile_action(&spec.name, &spec.action)?,
            })
        })
        .collect()
}

/// Loads, lints, and compiles a policy set in one step.
///
/// `regions` is the region set the policies will run over; error-level
/// diagnostics reject the whole set with the full diagnostic list.
pub fn load_policy_set(
    path: &Path,
    regions: &[crate::region::RegionSpec],
) -> RegionMatchResult<(Vec<Policy>, Vec<lint::Diagnostic>)> {
    let specs = crate::region::load_policy_specs(path)?;
    let diagnostics = lint::lint_policies(&specs, regions);
    if lint::has_errors(&diagnostics) {
        return Err(RegionMatchError::LintRejected { diagnostics });
    }
    let policies = compile_policies(&specs)?;
    Ok((policies, diagnostics))
}

/// Resolves the policy list against per-cycle results.
pub struct PolicyEngine {
    policies: Vec<Policy>,
    last_fired: HashMap<String, Instant>,
}

impl PolicyEngine {
    /// Creates an engine where every policy is immediately firable.
    pub fn new(policies: Vec<Policy>) -> Self {
        Self {
            policies,
            last_fired: HashMap::new(),
        }
    }

    /// Returns the configured policy list.
    pub fn policies(&self) -> &[Policy] {
        &self.policies
    }

    /// Evaluates one cycle at the current time.
    pub fn evaluate(
        &mut self,
        results: &BTreeMap<String, EvaluationResult>,
    ) -> Option<Decision> {
        self.evaluate_at(results, Instant::now())
    }

    /// Evaluates one cycle at an explicit instant.
    ///
    /// Returns the first policy in declaration order whose conditions hold
    /// and whose cooldown has elapsed, recording `now` as its fire time.
    pub fn evaluate_at(
        &mut self,
        results: &BTreeMap<String, EvaluationResult>,
        now: Instant,
    ) -> Option<Decision> {
        for policy in &self.policies {
            // Region not evaluated this cycle: skip the policy.
            let Some(result) = results.get(&policy.when.region) else {
                continue;
            };

            if let Some(expected) = policy.when.matched {
                if result.matched != expected {
                    continue;
                }
            }
            if let Some(gte) = policy.when.confidence_gte {
                if result.confidence < gte {
                    continue;
                }
            }

            if let Some(last) = self.last_fired.get(&policy.name) {
                if now.duration_since(*last) < policy.action.cooldown {
                    tracing::debug!(policy = %policy.name, "cooldown active");
                    continue;
                }
            }

            self.last_fired.insert(policy.name.clone(), now);
            return Some(Decision {
                policy: policy.name.clone(),
                action: policy.action,
                region: policy.when.region.clone(),
                confidence: result.confidence,
            });
        }
        None
    }
}

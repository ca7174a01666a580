use anyhow::{anyhow, Result};
use rhai::{Dynamic, Engine, Scope};
use tracing::warn;

use super::engine::DialogueVars;
use super::quest::QuestNode;

const MAX_CONDITION_OPERATIONS: u64 = 10_000;

/// Evaluates quest `Check` nodes against dialogue variables.
pub struct ConditionEvaluator {
    engine: Engine,
}

impl Default for ConditionEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl ConditionEvaluator {
    pub fn new() -> Self {
        let mut engine = Engine::new();
        engine.set_fast_operators(true);
        engine.set_max_operations(MAX_CONDITION_OPERATIONS);
        engine.set_max_expr_depths(32, 32);
        Self { engine }
    }

    /// `expr` wins over the `variable`/`min`/`max` threshold form. Errors count as failure.
    pub fn check_node(&self, node: &QuestNode, vars: &DialogueVars) -> bool {
        if let Some(expr) = node.str_property("expr") {
            return match self.eval_expr(expr, vars) {
                Ok(passed) => passed,
                Err(err) => {
                    warn!(node = node.id, %expr, "quest condition failed to evaluate: {err}");
                    false
                }
            };
        }
        let Some(variable) = node.str_property("variable") else {
            warn!(node = node.id, "Check node has neither 'expr' nor 'variable'");
            return false;
        };
        let value = vars.number(variable);
        let above_min = node.f64_property("min").map_or(true, |min| value >= min);
        let below_max = node.f64_property("max").map_or(true, |max| value <= max);
        above_min && below_max
    }

    pub fn eval_expr(&self, expr: &str, vars: &DialogueVars) -> Result<bool> {
        let mut scope = Scope::new();
        for (name, value) in vars.values() {
            if !is_identifier(name) {
                continue;
            }
            let dynamic = rhai::serde::to_dynamic(value).map_err(|err| anyhow!("variable '{name}': {err}"))?;
            scope.push_dynamic(name.clone(), dynamic);
        }
        let inventory =
            rhai::serde::to_dynamic(vars.inventory()).map_err(|err| anyhow!("inventory: {err}"))?;
        scope.push_dynamic("inventory", inventory);
        let result: Dynamic =
            self.engine.eval_expression_with_scope(&mut scope, expr).map_err(|err| anyhow!("{err}"))?;
        result.as_bool().map_err(|ty| anyhow!("condition evaluated to {ty}, expected bool"))
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

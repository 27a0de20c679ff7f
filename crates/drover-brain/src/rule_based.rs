use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use drover_core::{Directive, MemoryRecord, Plan, RecordKind, Step, Task, ToolResult, ToolStatus};

use crate::brain::Brain;

/// Blueprint for one step. String argument values may reference
/// `{objective}` and `{task_id}`, substituted at planning time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepTemplate {
    pub tool: String,
    #[serde(default)]
    pub arguments: Value,
    #[serde(default)]
    pub expected_effect: String,
    #[serde(default)]
    pub idempotent: bool,
}

impl StepTemplate {
    pub fn new(tool: impl Into<String>, arguments: Value) -> Self {
        Self {
            tool: tool.into(),
            arguments,
            expected_effect: String::new(),
            idempotent: false,
        }
    }

    pub fn idempotent(mut self) -> Self {
        self.idempotent = true;
        self
    }

    fn render(&self, task: &Task) -> Step {
        let mut step = Step::new(&self.tool, render_value(&self.arguments, task))
            .with_expected_effect(&self.expected_effect);
        if self.idempotent {
            step = step.idempotent();
        }
        step
    }
}

/// One planner rule: when the objective mentions the trigger, these steps
/// accomplish it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerRule {
    pub name: String,
    /// Substring matched case-insensitively against the task objective.
    pub trigger: String,
    pub steps: Vec<StepTemplate>,
}

/// Deterministic reference planner.
///
/// Picks the first rule whose trigger appears in the objective, then plans
/// the rule's steps that have not yet succeeded — a tool counts as done once
/// any successful result for it appears in the trace or the latest
/// observations. When every step has succeeded the directive is `Done`; when
/// no rule matches it is `Done` immediately (there is nothing this brain
/// knows how to do).
#[derive(Debug, Clone, Default)]
pub struct RuleBrain {
    rules: Vec<PlannerRule>,
}

impl RuleBrain {
    pub fn new(rules: Vec<PlannerRule>) -> Self {
        Self { rules }
    }

    pub fn with_rule(
        mut self,
        name: impl Into<String>,
        trigger: impl Into<String>,
        steps: Vec<StepTemplate>,
    ) -> Self {
        self.rules.push(PlannerRule {
            name: name.into(),
            trigger: trigger.into(),
            steps,
        });
        self
    }

    fn matching_rule(&self, objective: &str) -> Option<&PlannerRule> {
        let objective = objective.to_lowercase();
        self.rules
            .iter()
            .find(|rule| objective.contains(&rule.trigger.to_lowercase()))
    }
}

#[async_trait]
impl Brain for RuleBrain {
    fn name(&self) -> &str {
        "rules"
    }

    async fn next_plan(
        &self,
        task: &Task,
        memory: &[MemoryRecord],
        last_observations: &[ToolResult],
    ) -> drover_core::Result<Directive> {
        let Some(rule) = self.matching_rule(&task.objective) else {
            debug!(objective = %task.objective, "no planner rule matches");
            return Ok(Directive::done("no planner rule matches the objective"));
        };

        let succeeded = succeeded_tools(memory, last_observations);
        let remaining: Vec<Step> = rule
            .steps
            .iter()
            .filter(|template| !succeeded.contains(&template.tool))
            .map(|template| template.render(task))
            .collect();

        if remaining.is_empty() {
            return Ok(Directive::done(format!(
                "all steps of rule '{}' have succeeded",
                rule.name
            )));
        }

        debug!(
            rule = %rule.name,
            steps = remaining.len(),
            "planned remaining steps"
        );
        Ok(Directive::Plan(Plan::new(
            task.id,
            remaining,
            format!("rule '{}' matched the objective", rule.name),
        )))
    }
}

/// Tools with at least one successful invocation on record.
fn succeeded_tools(memory: &[MemoryRecord], last_observations: &[ToolResult]) -> Vec<String> {
    let mut tools: Vec<String> = memory
        .iter()
        .filter(|record| record.kind == RecordKind::Result)
        .filter_map(|record| serde_json::from_value::<ToolResult>(record.payload.clone()).ok())
        .filter(|result| result.status == ToolStatus::Success)
        .map(|result| result.tool)
        .collect();
    tools.extend(
        last_observations
            .iter()
            .filter(|result| result.status == ToolStatus::Success)
            .map(|result| result.tool.clone()),
    );
    tools
}

fn render_value(value: &Value, task: &Task) -> Value {
    match value {
        Value::String(s) => Value::String(
            s.replace("{objective}", &task.objective)
                .replace("{task_id}", &task.id.to_string()),
        ),
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| render_value(v, task)).collect())
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), render_value(v, task)))
                .collect(),
        ),
        other => other.clone(),
    }
}

//! Deterministic reference planner.

use crate::context::RequestContext;
use crate::error::CoreError;
use crate::ports::{IdGenerator, Planner};
use async_trait::async_trait;
use jaro_rs_protocol::{Plan, RiskLevel, Step, StepType, Task, ToolMetadata};
use std::sync::Arc;

/// Tool name used when no tools are registered. [`super::NaiveExecutor`]
/// runs it as a mock.
pub const MOCK_TOOL_NAME: &str = "mock_executor";

/// Produces a two-step plan: analyse the request, then call the tool that
/// best matches the intent.
pub struct NaivePlanner {
    ids: Arc<dyn IdGenerator>,
}

impl NaivePlanner {
    pub fn new(ids: Arc<dyn IdGenerator>) -> Self {
        Self { ids }
    }
}

#[async_trait]
impl Planner for NaivePlanner {
    async fn create_plan(
        &self,
        ctx: &RequestContext,
        task: &Task,
        tools: &[ToolMetadata],
    ) -> Result<Plan, CoreError> {
        ctx.check()?;
        let intent = task.normalized_intent.trim();
        if intent.is_empty() {
            return Err(CoreError::NoViablePlan("task intent is empty".to_string()));
        }

        let analyse = Step::new(self.ids.new_id(), "Analyse request", StepType::Think)
            .with_description("Understand the user request and prepare execution")
            .with_input(task.input.clone());

        let (tool_name, risk_level) = match select_tool(intent, tools) {
            Some(tool) => (tool.name.clone(), tool.risk_level),
            None => (MOCK_TOOL_NAME.to_string(), RiskLevel::Low),
        };
        let act = Step::new(self.ids.new_id(), "Execute action", StepType::ToolCall)
            .with_description(format!("Run {tool_name} for the user request"))
            .with_tool(tool_name, task.input.clone())
            .with_risk(risk_level);

        let risk_summary = match risk_level {
            RiskLevel::High => "High risk: the action step requires approval".to_string(),
            RiskLevel::Low => "Low risk: automated execution with 2 simple steps".to_string(),
        };

        Ok(Plan {
            id: self.ids.new_id(),
            task_id: task.id.clone(),
            goal: intent.to_string(),
            steps: vec![analyse, act],
            risk_summary,
        })
    }
}

/// Highest scoring tool; ties keep registry order. Falls back to the first
/// tool when nothing matches.
fn select_tool<'a>(intent: &str, tools: &'a [ToolMetadata]) -> Option<&'a ToolMetadata> {
    let words: Vec<String> = tokens(intent).collect();
    let mut best: Option<(&ToolMetadata, usize)> = None;
    for tool in tools {
        let score = match_score(&words, tool);
        if score > 0 && best.is_none_or(|(_, best_score)| score > best_score) {
            best = Some((tool, score));
        }
    }
    best.map(|(tool, _)| tool).or_else(|| tools.first())
}

fn match_score(words: &[String], tool: &ToolMetadata) -> usize {
    let name_hits = tokens(&tool.name)
        .filter(|token| words.contains(token))
        .count();
    let category_hit = tokens(&tool.category).any(|token| words.contains(&token));
    name_hits * 2 + usize::from(category_hit)
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.len() > 1)
        .map(|token| token.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::{MOCK_TOOL_NAME, NaivePlanner};
    use crate::context::RequestContext;
    use crate::error::CoreError;
    use crate::memory::UuidGenerator;
    use crate::ports::Planner;
    use chrono::Utc;
    use jaro_rs_protocol::{RiskLevel, StepType, Task, ToolMetadata};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn tool(name: &str, category: &str, risk_level: RiskLevel) -> ToolMetadata {
        ToolMetadata {
            name: name.to_string(),
            description: String::new(),
            category: category.to_string(),
            risk_level,
        }
    }

    fn planner() -> NaivePlanner {
        NaivePlanner::new(Arc::new(UuidGenerator))
    }

    #[tokio::test]
    async fn picks_matching_tool_and_inherits_its_risk() {
        let task = Task::new("t1", "book a flight", "user-42", Utc::now());
        let tools = vec![
            tool("echo", "utility", RiskLevel::Low),
            tool("flight_booking", "travel", RiskLevel::High),
        ];
        let plan = planner()
            .create_plan(&RequestContext::new(), &task, &tools)
            .await
            .expect("plan");

        assert_eq!(plan.task_id, "t1");
        assert_eq!(plan.goal, "book a flight");
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.steps[0].step_type, StepType::Think);
        assert!(!plan.steps[0].requires_approval);
        assert_eq!(plan.steps[1].tool_name.as_deref(), Some("flight_booking"));
        assert!(plan.steps[1].requires_approval);
        assert!(plan.validate("t1").is_ok());
    }

    #[tokio::test]
    async fn falls_back_to_first_tool_then_mock() {
        let task = Task::new("t1", "summarise my inbox", "u", Utc::now());
        let tools = vec![tool("echo", "utility", RiskLevel::Low)];
        let plan = planner()
            .create_plan(&RequestContext::new(), &task, &tools)
            .await
            .expect("plan");
        assert_eq!(plan.steps[1].tool_name.as_deref(), Some("echo"));

        let plan = planner()
            .create_plan(&RequestContext::new(), &task, &[])
            .await
            .expect("plan");
        assert_eq!(plan.steps[1].tool_name.as_deref(), Some(MOCK_TOOL_NAME));
        assert!(!plan.steps[1].requires_approval);
    }

    #[tokio::test]
    async fn empty_intent_has_no_viable_plan() {
        let mut task = Task::new("t1", "x", "u", Utc::now());
        task.normalized_intent = "  ".to_string();
        let err = planner()
            .create_plan(&RequestContext::new(), &task, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NoViablePlan(_)));
    }
}

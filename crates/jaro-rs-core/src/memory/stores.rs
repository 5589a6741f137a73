//! In-memory plan and approval stores.

use crate::context::RequestContext;
use crate::error::CoreError;
use crate::ports::{ApprovalRepository, PlanRepository};
use async_trait::async_trait;
use jaro_rs_protocol::{ApprovalRequest, Plan};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Plans keyed by plan id.
#[derive(Default)]
pub struct InMemoryPlanRepository {
    plans: RwLock<HashMap<String, Plan>>,
}

impl InMemoryPlanRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PlanRepository for InMemoryPlanRepository {
    async fn save_plan(&self, ctx: &RequestContext, plan: &Plan) -> Result<(), CoreError> {
        ctx.check()?;
        if plan.id.trim().is_empty() {
            return Err(CoreError::InvalidArgument("plan id is required".to_string()));
        }
        self.plans.write().insert(plan.id.clone(), plan.clone());
        Ok(())
    }

    async fn get_plan(&self, ctx: &RequestContext, plan_id: &str) -> Result<Plan, CoreError> {
        ctx.check()?;
        self.plans
            .read()
            .get(plan_id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("plan {plan_id}")))
    }
}

/// Approvals keyed by `(task_id, step_id)`; a later save for the same
/// step replaces the earlier request.
#[derive(Default)]
pub struct InMemoryApprovalRepository {
    approvals: RwLock<HashMap<(String, String), ApprovalRequest>>,
}

impl InMemoryApprovalRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApprovalRepository for InMemoryApprovalRepository {
    async fn save_approval(
        &self,
        ctx: &RequestContext,
        approval: &ApprovalRequest,
    ) -> Result<(), CoreError> {
        ctx.check()?;
        if approval.task_id.is_empty() || approval.step_id.is_empty() {
            return Err(CoreError::InvalidArgument(
                "approval requires task and step ids".to_string(),
            ));
        }
        let key = (approval.task_id.clone(), approval.step_id.clone());
        self.approvals.write().insert(key, approval.clone());
        Ok(())
    }

    async fn get_approval(
        &self,
        ctx: &RequestContext,
        task_id: &str,
        step_id: &str,
    ) -> Result<ApprovalRequest, CoreError> {
        ctx.check()?;
        let key = (task_id.to_string(), step_id.to_string());
        self.approvals
            .read()
            .get(&key)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("approval for {task_id}/{step_id}")))
    }

    async fn list_open_approvals(
        &self,
        ctx: &RequestContext,
    ) -> Result<Vec<ApprovalRequest>, CoreError> {
        ctx.check()?;
        let mut open: Vec<ApprovalRequest> = self
            .approvals
            .read()
            .values()
            .filter(|approval| approval.is_open())
            .cloned()
            .collect();
        open.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(open)
    }
}

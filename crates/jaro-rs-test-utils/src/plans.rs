use async_trait::async_trait;
use jaro_rs_core::memory::InMemoryPlanRepository;
use jaro_rs_core::{CoreError, PlanRepository, RequestContext};
use jaro_rs_protocol::Plan;
use std::sync::atomic::{AtomicBool, Ordering};

/// Stores the first plan it is given, then cancels the caller's request.
/// Later saves pass straight through.
#[derive(Default)]
pub struct CancelAfterSavePlanRepository {
    inner: InMemoryPlanRepository,
    fired: AtomicBool,
}

impl CancelAfterSavePlanRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PlanRepository for CancelAfterSavePlanRepository {
    async fn save_plan(&self, ctx: &RequestContext, plan: &Plan) -> Result<(), CoreError> {
        self.inner.save_plan(ctx, plan).await?;
        if !self.fired.swap(true, Ordering::SeqCst) {
            ctx.cancel();
        }
        Ok(())
    }

    async fn get_plan(&self, ctx: &RequestContext, plan_id: &str) -> Result<Plan, CoreError> {
        self.inner.get_plan(ctx, plan_id).await
    }
}

/// Accepts every plan and never finds one again.
#[derive(Debug, Default)]
pub struct ForgetfulPlanRepository;

#[async_trait]
impl PlanRepository for ForgetfulPlanRepository {
    async fn save_plan(&self, ctx: &RequestContext, _plan: &Plan) -> Result<(), CoreError> {
        ctx.check()
    }

    async fn get_plan(&self, _ctx: &RequestContext, plan_id: &str) -> Result<Plan, CoreError> {
        Err(CoreError::NotFound(format!("plan {plan_id}")))
    }
}

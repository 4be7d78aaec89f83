use async_trait::async_trait;
use recon_service_core::domains::rules::{ReconciliationRule, RuleScope};
use recon_service_core::repositories::rules::RuleRepository;
use shared_error::AppError;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory rule store preserving insertion order, which decides ties in
/// rule resolution
#[derive(Debug, Default)]
pub struct InMemoryRuleRepository {
    global: RwLock<Vec<ReconciliationRule>>,
    tenants: RwLock<HashMap<Uuid, Vec<ReconciliationRule>>>,
}

impl InMemoryRuleRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn upsert_in(rules: &mut Vec<ReconciliationRule>, rule: ReconciliationRule) {
    match rules.iter_mut().find(|r| r.rule_id == rule.rule_id) {
        Some(existing) => *existing = rule,
        None => rules.push(rule),
    }
}

#[async_trait]
impl RuleRepository for InMemoryRuleRepository {
    async fn global_rules(&self) -> Result<Vec<ReconciliationRule>, AppError> {
        Ok(self.global.read().await.clone())
    }

    async fn tenant_rules(&self, tenant_id: Uuid) -> Result<Vec<ReconciliationRule>, AppError> {
        let tenants = self.tenants.read().await;
        Ok(tenants.get(&tenant_id).cloned().unwrap_or_default())
    }

    async fn upsert(&self, rule: ReconciliationRule) -> Result<(), AppError> {
        match rule.scope {
            RuleScope::Global => {
                let mut global = self.global.write().await;
                upsert_in(&mut global, rule);
            },
            RuleScope::Tenant(tenant_id) => {
                let mut tenants = self.tenants.write().await;
                upsert_in(tenants.entry(tenant_id).or_default(), rule);
            },
        }
        Ok(())
    }
}

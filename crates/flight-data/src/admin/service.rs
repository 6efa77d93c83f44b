use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use super::audit::{AuditAction, AuditEntry, AuditSink};
use crate::errors::Result;
use crate::health::HealthMonitor;
use crate::models::ProviderHealth;
use crate::registry::{ProviderRegistry, ProviderSnapshot};

/// A provider management command.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AdminCommand {
    Toggle { provider: String, active: bool },
    SetPrimary { provider: String },
    UpdatePriority { provider: String, priority: u32 },
    /// Probe now; not audited
    TestHealth { provider: String },
    ResetCircuit { provider: String },
}

impl AdminCommand {
    pub fn provider(&self) -> &str {
        match self {
            Self::Toggle { provider, .. }
            | Self::SetPrimary { provider }
            | Self::UpdatePriority { provider, .. }
            | Self::TestHealth { provider }
            | Self::ResetCircuit { provider } => provider,
        }
    }
}

/// Result of a management command.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum CommandResult {
    /// State of the provider after a mutation
    Updated(ProviderSnapshot),
    Health(ProviderHealth),
}

/// Provider metrics query and management commands.
pub struct AdminService {
    registry: Arc<ProviderRegistry>,
    health: HealthMonitor,
    audit: Arc<dyn AuditSink>,
}

impl AdminService {
    pub fn new(registry: Arc<ProviderRegistry>, audit: Arc<dyn AuditSink>) -> Self {
        let health = HealthMonitor::new(Arc::clone(&registry));
        Self {
            registry,
            health,
            audit,
        }
    }

    /// Read-only view of every provider, in registration order.
    pub fn overview(&self) -> Vec<ProviderSnapshot> {
        self.registry.snapshots()
    }

    pub fn provider(&self, name: &str) -> Result<ProviderSnapshot> {
        self.registry.snapshot(name)
    }

    /// Apply one command on behalf of `actor`.
    ///
    /// Mutations are audited only when they succeed.
    pub async fn execute(&self, actor: &str, command: AdminCommand) -> Result<CommandResult> {
        let name = command.provider();
        let before = self.registry.snapshot(name)?;

        let (action, old, new) = match &command {
            AdminCommand::TestHealth { provider } => {
                let health = self.health.check_provider(provider).await?;
                return Ok(CommandResult::Health(health));
            }
            AdminCommand::Toggle { provider, active } => {
                self.registry.toggle(provider, *active)?;
                (AuditAction::Toggle, json!(before.is_active), json!(active))
            }
            AdminCommand::SetPrimary { provider } => {
                let previous = self.registry.primary();
                self.registry.set_primary(provider)?;
                // Promotion also activates the provider
                (
                    AuditAction::SetPrimary,
                    json!({ "primary": previous, "active": before.is_active }),
                    json!({ "primary": before.name, "active": true }),
                )
            }
            AdminCommand::UpdatePriority { provider, priority } => {
                self.registry.update_priority(provider, *priority)?;
                (
                    AuditAction::UpdatePriority,
                    json!(before.priority),
                    json!(priority),
                )
            }
            AdminCommand::ResetCircuit { provider } => {
                self.registry.reset_circuit(provider)?;
                (
                    AuditAction::ResetCircuit,
                    json!(before.circuit.state),
                    json!(crate::registry::CircuitState::Closed),
                )
            }
        };

        info!(
            "Admin '{}' applied {:?} to '{}': {} -> {}",
            actor, action, before.name, old, new
        );
        self.audit
            .record(AuditEntry::new(actor, action, before.name.as_str(), old, new));

        let after = self.registry.snapshot(&before.name)?;
        Ok(CommandResult::Updated(after))
    }
}

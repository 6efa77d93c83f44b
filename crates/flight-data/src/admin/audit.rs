//! Audit trail for provider management actions.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A management action that changed provider state.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Toggle,
    SetPrimary,
    UpdatePriority,
    ResetCircuit,
}

/// One recorded management action.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: Uuid,
    pub actor: String,
    pub action: AuditAction,
    pub provider: String,
    /// Affected value before the action
    pub before: serde_json::Value,
    pub after: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        actor: impl Into<String>,
        action: AuditAction,
        provider: impl Into<String>,
        before: serde_json::Value,
        after: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor: actor.into(),
            action,
            provider: provider.into(),
            before,
            after,
            timestamp: Utc::now(),
        }
    }
}

/// Receives audit entries after successful mutations.
///
/// `record()` must not block on I/O; a sink that persists entries should
/// queue them. Recording is best-effort and never fails the action.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: AuditEntry);
}

/// Discards entries.
#[derive(Clone, Default)]
pub struct NoOpAuditSink;

impl AuditSink for NoOpAuditSink {
    fn record(&self, _entry: AuditEntry) {}
}

/// Keeps entries in memory, oldest first.
#[derive(Clone, Default)]
pub struct InMemoryAuditLog {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<AuditEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            log::warn!("Audit log lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.lock().clone()
    }

    /// Entries concerning one provider.
    pub fn entries_for(&self, provider: &str) -> Vec<AuditEntry> {
        self.lock()
            .iter()
            .filter(|e| e.provider.eq_ignore_ascii_case(provider))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl AuditSink for InMemoryAuditLog {
    fn record(&self, entry: AuditEntry) {
        self.lock().push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_in_memory_log_collects_entries() {
        let log = InMemoryAuditLog::new();
        assert!(log.is_empty());

        log.record(AuditEntry::new(
            "ops",
            AuditAction::Toggle,
            "KIWI",
            json!(true),
            json!(false),
        ));
        log.record(AuditEntry::new(
            "ops",
            AuditAction::UpdatePriority,
            "DUFFEL",
            json!(100),
            json!(10),
        ));

        assert_eq!(log.len(), 2);
        assert_eq!(log.entries()[0].action, AuditAction::Toggle);
        assert_eq!(log.entries_for("kiwi").len(), 1);
    }

    #[test]
    fn test_clones_share_entries() {
        let log = InMemoryAuditLog::new();
        let sink: Arc<dyn AuditSink> = Arc::new(log.clone());
        sink.record(AuditEntry::new(
            "ops",
            AuditAction::ResetCircuit,
            "AMADEUS",
            json!("OPEN"),
            json!("CLOSED"),
        ));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_entry_serializes_camel_case() {
        let entry = AuditEntry::new(
            "ops",
            AuditAction::SetPrimary,
            "KIWI",
            json!("AMADEUS"),
            json!("KIWI"),
        );
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["action"], "set_primary");
        assert_eq!(value["before"], "AMADEUS");
        assert!(value.get("timestamp").is_some());
    }
}

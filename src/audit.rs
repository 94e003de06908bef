//! Audit trail.
//!
//! Append-only record of every algorithmic run, manual override, lock
//! change, status transition and exception decision. Entries are never
//! edited or removed.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    RunSubmitted,
    RunCompleted,
    RunFailed,
    RunCancelled,
    ManualOverride,
    AssignmentUnlocked,
    EditLocked,
    EditReleased,
    StatusChanged,
    ExceptionRequested,
    ExceptionApproved,
    ExceptionRejected,
    FairnessCommitted,
}

/// One audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    pub recorded_at: DateTime<Utc>,
    pub tenant_id: String,
    /// User or `system`.
    pub actor: String,
    pub action: AuditAction,
    /// Entity type (`schedule`, `run`, `assignment`, `exception`).
    pub entity: String,
    pub entity_id: String,
    /// Free-form context (before/after values, scores).
    #[serde(default)]
    pub detail: Value,
}

impl AuditEntry {
    pub fn new(
        tenant_id: impl Into<String>,
        actor: impl Into<String>,
        action: AuditAction,
        entity: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            recorded_at: Utc::now(),
            tenant_id: tenant_id.into(),
            actor: actor.into(),
            action,
            entity: entity.into(),
            entity_id: entity_id.into(),
            detail: Value::Null,
        }
    }

    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = detail;
        self
    }
}

/// Thread-safe append-only audit log.
#[derive(Debug, Default)]
pub struct AuditLog {
    entries: RwLock<Vec<AuditEntry>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry and returns its ID.
    pub fn record(&self, entry: AuditEntry) -> String {
        let id = entry.id.clone();
        self.entries.write().push(entry);
        id
    }

    /// All entries in recording order.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.read().clone()
    }

    /// Entries about one entity, in recording order.
    pub fn for_entity(&self, entity_id: &str) -> Vec<AuditEntry> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.entity_id == entity_id)
            .cloned()
            .collect()
    }

    /// Entries for one tenant, in recording order.
    pub fn for_tenant(&self, tenant_id: &str) -> Vec<AuditEntry> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.tenant_id == tenant_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

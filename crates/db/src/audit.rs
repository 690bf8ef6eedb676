//! The audit trail: an append-only record of entity creation, status changes and errors.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tbtc_relayer_primitives::types::Timestamp;
use thiserror::Error;
use tracing::info;

use crate::errors::DbError;

/// The kind of entity an audit entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A deposit, keyed by its decimal id.
    Deposit,
    /// A redemption, keyed by its L2 transaction hash.
    Redemption,
}

impl EntityKind {
    /// The persisted name of the kind.
    pub const fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Deposit => "deposit",
            EntityKind::Redemption => "redemption",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to the entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    /// The entity was first observed.
    Created {
        /// Initial status.
        status: String,
    },
    /// The entity moved between statuses.
    StatusChanged {
        /// Status before the change.
        from: String,
        /// Status after the change.
        to: String,
    },
    /// An operation on the entity failed.
    Error {
        /// Failure description.
        reason: String,
    },
}

impl AuditEvent {
    /// Short name of the event, used as the indexed column.
    pub const fn name(&self) -> &'static str {
        match self {
            AuditEvent::Created { .. } => "created",
            AuditEvent::StatusChanged { .. } => "status_changed",
            AuditEvent::Error { .. } => "error",
        }
    }
}

/// A single audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Kind of the entity.
    pub kind: EntityKind,
    /// Id of the entity, rendered as a string.
    pub entity_id: String,
    /// The event.
    pub event: AuditEvent,
    /// When the event was recorded.
    pub recorded_at: Timestamp,
}

/// Errors raised by audit sinks.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The backing store rejected the write.
    #[error("audit store: {0}")]
    Db(#[from] DbError),

    /// The sink cannot accept writes right now.
    #[error("audit sink unavailable: {0}")]
    Unavailable(String),
}

/// A sink for audit entries.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Appends `entry` to the trail.
    async fn record(&self, entry: &AuditEntry) -> Result<(), AuditError>;
}

/// An audit sink that only emits a structured log line per entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditLog;

#[async_trait]
impl AuditLog for TracingAuditLog {
    async fn record(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        info!(
            target: "audit",
            kind = %entry.kind,
            entity_id = %entry.entity_id,
            event = entry.event.name(),
            detail = ?entry.event,
            "audit"
        );

        Ok(())
    }
}

//! Fire-and-forget delivery of audit entries.

use std::sync::Arc;

use chrono::Utc;
use tbtc_relayer_db::audit::{AuditEntry, AuditEvent, AuditLog, EntityKind};
use tokio::{
    sync::mpsc,
    task::{self, JoinHandle},
};
use tracing::{error, warn};

/// Hands audit entries to a background worker so that a slow or failing sink never blocks a
/// state transition.
///
/// Failed writes are logged at `error` level by the worker.
#[derive(Debug, Clone)]
pub struct Auditor {
    sender: mpsc::UnboundedSender<AuditEntry>,
}

impl Auditor {
    /// Spawns the worker that drains entries into `sink`.
    ///
    /// The worker exits once every clone of the returned [`Auditor`] is dropped and the queue is
    /// drained.
    pub fn spawn(sink: Arc<dyn AuditLog>) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::unbounded_channel::<AuditEntry>();

        let worker = task::spawn(async move {
            while let Some(entry) = receiver.recv().await {
                if let Err(err) = sink.record(&entry).await {
                    error!(
                        kind = %entry.kind,
                        entity_id = %entry.entity_id,
                        event = entry.event.name(),
                        %err,
                        "failed to write audit entry"
                    );
                }
            }
        });

        (Self { sender }, worker)
    }

    /// Queues an entry.
    pub fn notify(&self, kind: EntityKind, entity_id: impl ToString, event: AuditEvent) {
        let entry = AuditEntry {
            kind,
            entity_id: entity_id.to_string(),
            event,
            recorded_at: Utc::now(),
        };

        if let Err(mpsc::error::SendError(entry)) = self.sender.send(entry) {
            warn!(
                kind = %entry.kind,
                entity_id = %entry.entity_id,
                event = ?entry.event,
                "audit worker is gone, entry not recorded"
            );
        }
    }

    /// Records the creation of an entity.
    pub fn created(&self, kind: EntityKind, entity_id: impl ToString, status: impl ToString) {
        self.notify(
            kind,
            entity_id,
            AuditEvent::Created {
                status: status.to_string(),
            },
        );
    }

    /// Records a status change. Nothing is recorded if the status did not change.
    pub fn transition(
        &self,
        kind: EntityKind,
        entity_id: impl ToString,
        from: impl ToString,
        to: impl ToString,
    ) {
        let (from, to) = (from.to_string(), to.to_string());
        if from != to {
            self.notify(kind, entity_id, AuditEvent::StatusChanged { from, to });
        }
    }

    /// Records a failed operation.
    pub fn error(&self, kind: EntityKind, entity_id: impl ToString, reason: impl ToString) {
        self.notify(
            kind,
            entity_id,
            AuditEvent::Error {
                reason: reason.to_string(),
            },
        );
    }
}

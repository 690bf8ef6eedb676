//! In-memory audit trail.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::audit::{AuditEntry, AuditError, AuditLog};

/// Keeps every audit entry in memory, in insertion order.
#[derive(Debug, Default, Clone)]
pub struct AuditLogInMemory {
    entries: Arc<RwLock<Vec<AuditEntry>>>,
}

impl AuditLogInMemory {
    /// Returns a snapshot of all entries recorded so far.
    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl AuditLog for AuditLogInMemory {
    async fn record(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        self.entries.write().await.push(entry.clone());

        Ok(())
    }
}

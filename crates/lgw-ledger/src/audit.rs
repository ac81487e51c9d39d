use std::fmt;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

/// How a gateway operation ended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuditOutcome {
    /// Accepted for sequencing, commit not awaited.
    Accepted { submission_id: String },
    Committed { update_id: String, offset: i64 },
    Rejected { code: String },
    Failed { kind: String },
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted { .. } => f.write_str("accepted"),
            Self::Committed { .. } => f.write_str("committed"),
            Self::Rejected { code } => write!(f, "rejected:{code}"),
            Self::Failed { kind } => write!(f, "failed:{kind}"),
        }
    }
}

/// One record per gateway operation, success or failure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AuditRecord {
    pub command_id: String,
    pub act_as: String,
    pub template_id: String,
    pub choice: Option<String>,
    pub contract_id: Option<String>,
    pub command_count: usize,
    pub outcome: AuditOutcome,
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: &AuditRecord);
}

/// Writes audit records as `tracing` events under the `lgw::audit` target.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, record: &AuditRecord) {
        info!(
            target: "lgw::audit",
            command_id = %record.command_id,
            act_as = %record.act_as,
            template_id = %record.template_id,
            choice = record.choice.as_deref().unwrap_or(""),
            contract_id = record.contract_id.as_deref().unwrap_or(""),
            command_count = record.command_count,
            outcome = %record.outcome,
            "ledger command"
        );
    }
}

/// Keeps records in memory, for tests.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, record: &AuditRecord) {
        self.records.lock().expect("lock poisoned").push(record.clone());
    }
}

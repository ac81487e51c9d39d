use async_trait::async_trait;

use crate::command::{CommandEnvelope, SubmissionAccepted};
use crate::error::LedgerResult;
use crate::transaction::TransactionTree;

/// Command submission endpoint of a ledger participant.
///
/// Implementations are long-lived handles shared by all requests.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Submit for sequencing and return once the participant accepts it.
    async fn submit(&self, envelope: &CommandEnvelope) -> LedgerResult<SubmissionAccepted>;

    /// Submit and wait until the transaction is committed.
    async fn submit_and_wait_for_transaction_tree(
        &self,
        envelope: &CommandEnvelope,
    ) -> LedgerResult<TransactionTree>;
}

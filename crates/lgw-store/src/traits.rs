use async_trait::async_trait;
use lgw_types::Identifier;
use serde_json::Value as Json;

use crate::error::StoreResult;
use crate::predicate::Param;
use crate::query::QuerySpec;

/// One projected contract as stored: id plus ledger-JSON payload.
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    pub contract_id: String,
    pub payload: Json,
}

/// A primary row with its optional left-joined partner.
#[derive(Clone, Debug, PartialEq)]
pub struct JoinedRow {
    pub primary: Row,
    pub secondary: Option<Row>,
}

/// Storage backend for the active-contracts projection.
///
/// Implementations return raw rows; decoding into typed payloads happens in
/// the reader.
#[async_trait]
pub trait ProjectionBackend: Send + Sync {
    /// Active contracts of `query.template` matching `query.filter`.
    async fn active(&self, query: &QuerySpec, params: &[Param]) -> StoreResult<Vec<Row>>;

    /// Primary contracts left-joined with `query.join`. One output row per
    /// (primary, matching secondary) pair, or one row with no secondary
    /// when nothing matches.
    async fn active_left_join(
        &self,
        query: &QuerySpec,
        params: &[Param],
    ) -> StoreResult<Vec<JoinedRow>>;

    /// The active contract with this id, if it is of `template`.
    async fn lookup(&self, contract_id: &str, template: &Identifier) -> StoreResult<Option<Row>>;
}

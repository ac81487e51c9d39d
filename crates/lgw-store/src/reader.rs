use std::sync::Arc;

use lgw_codec::{Dictionary, Template};
use lgw_types::{Contract, ContractId};
use tracing::field::Empty;
use tracing::{error, info_span, Instrument, Span};

use crate::error::{StoreError, StoreResult};
use crate::predicate::{Param, Predicate};
use crate::query::QuerySpec;
use crate::traits::{ProjectionBackend, Row};

/// Typed reads over the active-contracts projection.
///
/// Every call re-queries the backend; nothing is cached. The projection lags
/// the ledger, so a contract created a moment ago may not be visible yet and
/// an archived one may still be.
pub struct ContractStore<B: ?Sized = dyn ProjectionBackend> {
    backend: Arc<B>,
    dictionary: Dictionary,
}

impl<B: ?Sized> Clone for ContractStore<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            dictionary: self.dictionary.clone(),
        }
    }
}

impl<B: ProjectionBackend + ?Sized> ContractStore<B> {
    pub fn new(backend: Arc<B>, dictionary: Dictionary) -> Self {
        Self { backend, dictionary }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// All active contracts of `T`, in projection order.
    pub async fn active<T: Template>(&self) -> StoreResult<Vec<Contract<T>>> {
        let template_id = T::template_id();
        let span = info_span!(
            "store.active",
            template_id = %template_id,
            where_clause = Empty,
            result_count = Empty,
        );
        async { observe(self.fetch(QuerySpec::active(template_id.clone()), &[]).await) }
            .instrument(span)
            .await
    }

    /// Active contracts of `T` matching `where_clause`.
    pub async fn active_where<T: Template>(
        &self,
        where_clause: &str,
        params: &[Param],
    ) -> StoreResult<Vec<Contract<T>>> {
        let template_id = T::template_id();
        let span = info_span!(
            "store.active_where",
            template_id = %template_id,
            where_clause,
            result_count = Empty,
        );
        async {
            let query = async {
                let query =
                    QuerySpec::active(template_id.clone()).filter(Predicate::parse(where_clause)?);
                self.fetch(query, params).await
            };
            observe(query.await)
        }
        .instrument(span)
        .await
    }

    /// The only active contract of `T` matching `where_clause`, if any.
    ///
    /// More than one match is [`StoreError::MultipleResults`]; use
    /// [`ContractStore::first_active_where`] to take the first instead.
    pub async fn single_active_where<T: Template>(
        &self,
        where_clause: &str,
        params: &[Param],
    ) -> StoreResult<Option<Contract<T>>> {
        let mut found = self.active_where::<T>(where_clause, params).await?;
        match found.len() {
            0 | 1 => Ok(found.pop()),
            count => {
                error!(
                    template_id = %T::template_id(),
                    where_clause,
                    count,
                    "expected at most one match"
                );
                Err(StoreError::MultipleResults { count })
            }
        }
    }

    /// The first active contract of `T` matching `where_clause`, in
    /// projection order.
    pub async fn first_active_where<T: Template>(
        &self,
        where_clause: &str,
        params: &[Param],
    ) -> StoreResult<Option<Contract<T>>> {
        Ok(self.active_where::<T>(where_clause, params).await?.into_iter().next())
    }

    /// Exact lookup. Archived, unknown, not yet projected and differently
    /// typed contracts are all [`StoreError::NotFound`].
    pub async fn by_contract_id<T: Template>(
        &self,
        contract_id: &ContractId<T>,
    ) -> StoreResult<Contract<T>> {
        let template_id = T::template_id();
        let span = info_span!(
            "store.by_contract_id",
            template_id = %template_id,
            contract_id = %contract_id,
            result_count = Empty,
        );
        async {
            let result = match self.backend.lookup(contract_id.as_str(), &template_id).await {
                Ok(Some(row)) => self.decode::<T>(&row),
                Ok(None) => Err(StoreError::NotFound {
                    template_id: template_id.clone(),
                    contract_id: contract_id.to_string(),
                }),
                Err(e) => Err(e),
            };
            match &result {
                Ok(_) => {
                    Span::current().record("result_count", 1);
                }
                Err(StoreError::NotFound { .. }) => {
                    Span::current().record("result_count", 0);
                }
                Err(e) => error!(error = %e, "contract lookup failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Active `P` contracts left-joined with active `S` contracts on
    /// `join_on`, filtered by `where_clause`, each row assembled by `mapper`.
    ///
    /// Columns are qualified with `prim.` or `sec.`; unqualified columns
    /// refer to `P`. `params` fill the `?` placeholders of `join_on` first,
    /// then those of `where_clause`. A primary without a matching secondary
    /// still yields one row, with `None` for the secondary.
    pub async fn active_left_join_where<P, S, R, F>(
        &self,
        join_on: &str,
        where_clause: Option<&str>,
        params: &[Param],
        mapper: F,
    ) -> StoreResult<Vec<R>>
    where
        P: Template,
        S: Template,
        F: Fn(Contract<P>, Option<Contract<S>>) -> R + Send,
        R: Send,
    {
        let span = info_span!(
            "store.active_left_join_where",
            template_id = %P::template_id(),
            secondary_template_id = %S::template_id(),
            join_on,
            where_clause = where_clause.map(display),
            result_count = Empty,
        );
        async {
            let joined = async {
                let mut query = QuerySpec::active(P::template_id())
                    .left_join(S::template_id(), Predicate::parse(join_on)?);
                if let Some(clause) = where_clause {
                    query = query.filter(Predicate::parse(clause)?);
                }
                let rows = self.backend.active_left_join(&query, params).await?;
                let mut out = Vec::with_capacity(rows.len());
                for row in rows {
                    let primary = self.decode::<P>(&row.primary)?;
                    let secondary =
                        row.secondary.as_ref().map(|r| self.decode::<S>(r)).transpose()?;
                    out.push(mapper(primary, secondary));
                }
                Ok::<_, StoreError>(out)
            };
            observe(joined.await)
        }
        .instrument(span)
        .await
    }

    async fn fetch<T: Template>(
        &self,
        query: QuerySpec,
        params: &[Param],
    ) -> StoreResult<Vec<Contract<T>>> {
        let rows = self.backend.active(&query, params).await?;
        rows.iter().map(|r| self.decode::<T>(r)).collect()
    }

    fn decode<T: Template>(&self, row: &Row) -> StoreResult<Contract<T>> {
        let payload = self.dictionary.template_from_ledger_json::<T>(&row.payload)?;
        Ok(Contract::new(ContractId::new(row.contract_id.clone()), payload))
    }
}

/// Record the outcome of a read on the current span.
fn observe<T>(result: StoreResult<Vec<T>>) -> StoreResult<Vec<T>> {
    match &result {
        Ok(rows) => {
            Span::current().record("result_count", rows.len());
        }
        Err(e) => error!(error = %e, "projection read failed"),
    }
    result
}

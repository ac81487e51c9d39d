//! PostgreSQL projection backend.
//!
//! Reads go through the projection's `active(template)` and
//! `lookup_contract(contract_id, template)` functions; the tables behind
//! them are owned by the projector and never written here.

use std::time::Duration;

use async_trait::async_trait;
use lgw_types::Identifier;
use serde_json::Value as Json;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Postgres, Row as _};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::predicate::Param;
use crate::query::{QuerySpec, SqlQuery};
use crate::traits::{JoinedRow, ProjectionBackend, Row};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
pub struct PgProjection {
    pool: PgPool,
    query_timeout: Duration,
}

impl PgProjection {
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        query_timeout: Duration,
    ) -> StoreResult<Self> {
        let pool = tokio::time::timeout(
            CONNECT_TIMEOUT,
            PgPoolOptions::new()
                .max_connections(max_connections)
                .connect(database_url),
        )
        .await
        .map_err(|_| StoreError::Timeout)??;
        Ok(Self::from_pool(pool, query_timeout))
    }

    pub fn from_pool(pool: PgPool, query_timeout: Duration) -> Self {
        Self { pool, query_timeout }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch(&self, query: &SqlQuery) -> StoreResult<Vec<PgRow>> {
        debug!(sql = %query.sql, binds = query.binds.len(), "projection query");
        let fetch = bind_all(&query.sql, &query.binds).fetch_all(&self.pool);
        let rows = tokio::time::timeout(self.query_timeout, fetch)
            .await
            .map_err(|_| StoreError::Timeout)??;
        Ok(rows)
    }
}

fn bind_all<'q>(sql: &'q str, binds: &'q [Param]) -> Query<'q, Postgres, PgArguments> {
    let mut query = sqlx::query(sql);
    for param in binds {
        query = match param {
            Param::Text(s) => query.bind(s.as_str()),
            Param::Int(i) => query.bind(*i),
            Param::Bool(b) => query.bind(*b),
        };
    }
    query
}

fn row(r: &PgRow, id_column: &str, payload_column: &str) -> StoreResult<Row> {
    Ok(Row {
        contract_id: r.try_get::<String, _>(id_column)?,
        payload: r.try_get::<Json, _>(payload_column)?,
    })
}

#[async_trait]
impl ProjectionBackend for PgProjection {
    async fn active(&self, query: &QuerySpec, params: &[Param]) -> StoreResult<Vec<Row>> {
        let sql = query.to_sql(params)?;
        self.fetch(&sql)
            .await?
            .iter()
            .map(|r| row(r, "contract_id", "payload"))
            .collect()
    }

    async fn active_left_join(
        &self,
        query: &QuerySpec,
        params: &[Param],
    ) -> StoreResult<Vec<JoinedRow>> {
        let sql = query.to_sql(params)?;
        self.fetch(&sql)
            .await?
            .iter()
            .map(|r| {
                let primary = row(r, "primary_contract_id", "primary_payload")?;
                let secondary_id: Option<String> = r.try_get("secondary_contract_id")?;
                let secondary_payload: Option<Json> = r.try_get("secondary_payload")?;
                let secondary = match (secondary_id, secondary_payload) {
                    (Some(contract_id), Some(payload)) => Some(Row { contract_id, payload }),
                    _ => None,
                };
                Ok(JoinedRow { primary, secondary })
            })
            .collect()
    }

    async fn lookup(&self, contract_id: &str, template: &Identifier) -> StoreResult<Option<Row>> {
        let sql = SqlQuery::lookup(contract_id, template);
        let rows = self.fetch(&sql).await?;
        rows.first().map(|r| row(r, "contract_id", "payload")).transpose()
    }
}

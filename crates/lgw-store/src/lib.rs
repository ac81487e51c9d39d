//! Projected contract store reader.
//!
//! Typed queries over a read-side projection of the currently active ledger
//! contracts. The projection lags the ledger by a bounded but unspecified
//! delay, so reads never assume they observe the effects of a command that
//! has just been committed.
//!
//! - [`Predicate`]: filter and join conditions as data, parsed from a
//!   SQL-like grammar
//! - [`QuerySpec`]: template, optional filter and optional left join,
//!   rendered to PostgreSQL with positional binds
//! - [`ProjectionBackend`]: storage seam, implemented by [`PgProjection`] and
//!   [`InMemoryProjection`]
//! - [`ContractStore`]: typed reads decoding payloads through the codec
//!   dictionary

pub mod error;
pub mod memory;
pub mod postgres;
pub mod predicate;
pub mod query;
pub mod reader;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::{InMemoryProjection, ProjectedContract};
pub use postgres::PgProjection;
pub use predicate::{Column, CompareOp, Operand, Param, Predicate, Side};
pub use query::{JoinSpec, QuerySpec, SqlQuery};
pub use reader::ContractStore;
pub use traits::{JoinedRow, ProjectionBackend, Row};

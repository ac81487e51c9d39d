//! Foundation types for the ledger gateway.
//!
//! Every other `lgw-*` crate depends on `lgw-types`.
//!
//! # Key Types
//!
//! - [`Party`]: A ledger party on whose behalf commands are submitted
//! - [`CommandId`]: Caller-supplied idempotency key for a submission
//! - [`Identifier`]: Fully qualified template or interface reference
//! - [`ContractId`]: Opaque contract handle scoped to a template type
//! - [`Contract`]: A contract id together with its decoded payload

pub mod contract;
pub mod error;
pub mod identifier;
pub mod identity;

pub use contract::{Contract, ContractId};
pub use error::TypeError;
pub use identifier::Identifier;
pub use identity::{CommandId, Party};

//! Ledger command gateway.
//!
//! This crate turns typed template payloads and choice arguments into ledger
//! commands and typed results back. It provides:
//! - `Command` / `CommandEnvelope` with a BLAKE3 fingerprint per envelope
//! - `TransactionTree` and the exercise-result selection rule
//! - `LedgerClient` trait boundary with `HttpLedgerClient` (JSON Ledger API v2)
//!   and `InMemoryLedger` for tests and embedding
//! - `CommandGateway` with `create`, `exercise_and_get_result`, `submit_commands`
//! - `AuditSink` receiving one `AuditRecord` per gateway operation

pub mod audit;
pub mod command;
pub mod error;
pub mod gateway;
pub mod http;
pub mod memory;
pub mod traits;
pub mod transaction;

pub use audit::{AuditOutcome, AuditRecord, AuditSink, MemoryAuditSink, TracingAuditSink};
pub use command::{Command, CommandEnvelope, DisclosedContract, SubmissionAccepted};
pub use error::{LedgerError, LedgerResult};
pub use gateway::CommandGateway;
pub use http::HttpLedgerClient;
pub use memory::{ActiveContract, ChoiceCall, ChoiceEffect, InMemoryLedger};
pub use traits::LedgerClient;
pub use transaction::{CreatedEvent, ExercisedEvent, NodeId, TransactionTree, TreeEvent};

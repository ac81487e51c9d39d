//! Value codec for the ledger gateway.
//!
//! Maps strongly typed Rust payloads to and from the structural wire value
//! the ledger protocol carries, and to and from the JSON the read-side
//! projection stores. Conversions are driven by template schemas registered
//! once at startup in a [`Dictionary`]; every conversion is validated against
//! the schema and fails fast with a path-qualified [`CodecError`].
//!
//! Payload types reach the codec through `serde`: a payload is serialized to
//! canonical JSON, checked against its schema, and turned into a [`Value`].
//! Decoding runs the same steps in reverse.

pub mod convert;
pub mod dictionary;
pub mod error;
pub mod schema;
pub mod value;

pub use dictionary::{Choice, ChoiceSchema, Dictionary, DictionaryBuilder, Template, TemplateSchema};
pub use error::{CodecError, CodecResult};
pub use schema::{Field, Type};
pub use value::Value;

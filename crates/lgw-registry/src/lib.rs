//! Disclosed-contract resolution.
//!
//! Some commands must carry contracts the submitting participant does not
//! host, such as the network's amulet rules or the current open mining round.
//! This crate fetches them, with their created-event blobs, from the
//! validator's scan proxy and from token-standard registries.
//!
//! - [`DisclosureResolver`]: resolves [`DisclosureRef`]s into
//!   `DisclosedContract`s and fetches registry choice contexts
//! - [`RegistryTransport`]: upstream seam, implemented over HTTP by
//!   [`HttpRegistry`]

pub mod error;
pub mod http;
pub mod resolver;
pub mod transport;

pub use error::{RegistryError, RegistryResult};
pub use http::HttpRegistry;
pub use resolver::{ChoiceContext, DisclosureRef, DisclosureResolver};
pub use transport::{RegistryTransport, Upstream};

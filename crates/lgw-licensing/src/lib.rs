//! Licensing domain of the ledger gateway.
//!
//! Providers issue licenses to users through app installs; users renew them
//! by funding a renewal request with a token-standard allocation.
//!
//! - [`templates`]: typed payloads of `License`, `LicenseRenewalRequest`,
//!   `AppInstallRequest`, `AppInstall` and the `Allocation` interface view
//! - [`choices`]: typed arguments and results of the licensing choices
//! - [`schema`]: the codec schemas, registered into a [`lgw_codec::Dictionary`]
//! - [`LicensingRepository`]: licensing reads over the contract store

pub mod choices;
pub mod repository;
pub mod schema;
pub mod templates;

pub use choices::{
    AcceptInstallRequest, AnyValue, CancelInstall, CancelInstallRequest, ChoiceContext,
    CompleteRenewal, Completed, CreateLicense, CreateLicenseResult, ExtraArgs, LicenseExpire,
    LicenseRenew, RejectInstallRequest,
};
pub use repository::LicensingRepository;
pub use schema::{dictionary, register};
pub use templates::{
    Allocation, AppInstall, AppInstallRequest, License, LicenseParams, LicenseRenewalRequest,
    LicenseWithRenewalRequests, Metadata, RelTime, RenewalWithAllocation,
};

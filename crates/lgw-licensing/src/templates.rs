use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use lgw_codec::Template;
use lgw_types::{Contract, ContractId, Identifier, Party};
use serde::{Deserialize, Serialize};

const LICENSING_PACKAGE: &str = "#quickstart-licensing";
const ALLOCATION_PACKAGE: &str = "#splice-api-token-allocation-v1";

/// Free-form key/value annotations carried by most licensing payloads.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub values: BTreeMap<String, String>,
}

impl Metadata {
    pub fn new<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: values.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// A relative duration in microseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelTime {
    pub microseconds: i64,
}

impl RelTime {
    pub fn from_days(days: i64) -> Self {
        Self {
            microseconds: days * 24 * 3600 * 1_000_000,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseParams {
    pub meta: Metadata,
}

/// A license granted by a provider to a user, valid until `expires_at`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct License {
    pub dso: Party,
    pub provider: Party,
    pub user: Party,
    pub params: LicenseParams,
    pub expires_at: DateTime<Utc>,
    pub license_num: i64,
}

impl Template for License {
    fn template_id() -> Identifier {
        Identifier::new(LICENSING_PACKAGE, "Licensing.License", "License")
    }
}

/// A pending renewal of license `license_num`, settled through an allocation
/// whose settlement reference is `request_id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseRenewalRequest {
    pub provider: Party,
    pub user: Party,
    pub dso: Party,
    pub license_num: i64,
    /// Decimal amount of the fee, in Canton Coin.
    pub license_fee_amount: String,
    pub license_extension_duration: RelTime,
    pub request_id: String,
    pub requested_at: DateTime<Utc>,
    pub prepare_until: DateTime<Utc>,
    pub settle_before: DateTime<Utc>,
    pub description: String,
}

impl Template for LicenseRenewalRequest {
    fn template_id() -> Identifier {
        Identifier::new(LICENSING_PACKAGE, "Licensing.License", "LicenseRenewalRequest")
    }
}

/// A user's request to install the provider's app.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInstallRequest {
    pub dso: Party,
    pub provider: Party,
    pub user: Party,
    pub meta: Metadata,
}

impl Template for AppInstallRequest {
    fn template_id() -> Identifier {
        Identifier::new(LICENSING_PACKAGE, "Licensing.AppInstall", "AppInstallRequest")
    }
}

/// An accepted install, from which the provider issues licenses.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInstall {
    pub dso: Party,
    pub provider: Party,
    pub user: Party,
    pub meta: Metadata,
    pub num_licenses_created: i64,
}

impl Template for AppInstall {
    fn template_id() -> Identifier {
        Identifier::new(LICENSING_PACKAGE, "Licensing.AppInstall", "AppInstall")
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentId {
    pub admin: Party,
    pub id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub id: String,
    pub cid: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementInfo {
    pub executor: Party,
    pub settlement_ref: Reference,
    pub requested_at: DateTime<Utc>,
    pub allocate_before: DateTime<Utc>,
    pub settle_before: DateTime<Utc>,
    pub meta: Metadata,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferLeg {
    pub sender: Party,
    pub receiver: Party,
    pub amount: String,
    pub instrument_id: InstrumentId,
    pub meta: Metadata,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationSpecification {
    pub settlement: SettlementInfo,
    pub transfer_leg_id: String,
    pub transfer_leg: TransferLeg,
}

/// Token-standard allocation, read through its interface view.
///
/// An allocation belongs to a renewal request when its settlement reference
/// id is the request's `request_id` and its sender is the request's user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    pub allocation: AllocationSpecification,
    pub holding_cids: Vec<String>,
    pub meta: Metadata,
}

impl Template for Allocation {
    fn template_id() -> Identifier {
        Identifier::new(ALLOCATION_PACKAGE, "Splice.Api.Token.AllocationV1", "Allocation")
    }
}

/// A renewal request and the allocation funding it, if one exists yet.
#[derive(Clone, Debug, PartialEq)]
pub struct RenewalWithAllocation {
    pub renewal: Contract<LicenseRenewalRequest>,
    pub allocation_cid: Option<ContractId<Allocation>>,
}

/// A license together with its pending renewals.
#[derive(Clone, Debug, PartialEq)]
pub struct LicenseWithRenewalRequests {
    pub license: Contract<License>,
    pub renewals: Vec<RenewalWithAllocation>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rel_time_days_are_microseconds() {
        assert_eq!(RelTime::from_days(1).microseconds, 86_400_000_000);
    }

    #[test]
    fn licensing_templates_share_a_package() {
        assert_eq!(License::template_id().package_id(), LICENSING_PACKAGE);
        assert_eq!(LicenseRenewalRequest::template_id().package_id(), LICENSING_PACKAGE);
        assert_eq!(
            AppInstall::template_id().qualified_name(),
            "quickstart-licensing:Licensing.AppInstall:AppInstall"
        );
        assert!(!Allocation::template_id().same_entity(&License::template_id()));
    }
}

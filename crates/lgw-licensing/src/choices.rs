use std::collections::BTreeMap;

use lgw_codec::Choice;
use lgw_types::{ContractId, Party};
use serde::{Deserialize, Serialize};

use crate::templates::{
    Allocation, AppInstall, AppInstallRequest, License, LicenseParams, LicenseRenewalRequest,
    Metadata, RelTime,
};

/// Result of a choice that returns nothing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Completed {}

/// Ask the user to pay for another license period. Leaves the license active.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseRenew {
    /// Decimal fee in Canton Coin.
    pub license_fee_cc: String,
    pub license_extension_duration: RelTime,
    pub payment_acceptance_duration: RelTime,
    pub description: String,
}

impl Choice for LicenseRenew {
    type Template = License;
    type Result = ContractId<LicenseRenewalRequest>;
    const NAME: &'static str = "License_Renew";
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LicenseExpire {
    pub actor: Party,
    pub meta: Metadata,
}

impl Choice for LicenseExpire {
    type Template = License;
    type Result = Completed;
    const NAME: &'static str = "License_Expire";
}

/// A value passed through a registry's choice context.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tag", content = "value")]
pub enum AnyValue {
    #[serde(rename = "AV_Text")]
    Text(String),
    #[serde(rename = "AV_Int")]
    Int(i64),
    #[serde(rename = "AV_Bool")]
    Bool(bool),
    #[serde(rename = "AV_Party")]
    Party(Party),
    #[serde(rename = "AV_ContractId")]
    ContractId(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ChoiceContext {
    pub values: BTreeMap<String, AnyValue>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ExtraArgs {
    pub context: ChoiceContext,
    pub meta: Metadata,
}

/// Settle a renewal against its allocation, replacing the license with an
/// extended one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRenewal {
    pub allocation_cid: ContractId<Allocation>,
    pub extra_args: ExtraArgs,
}

impl Choice for CompleteRenewal {
    type Template = LicenseRenewalRequest;
    type Result = ContractId<License>;
    const NAME: &'static str = "LicenseRenewalRequest_CompleteRenewal";
}

/// Issue a license under an install. Replaces the install with one whose
/// license counter is incremented.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CreateLicense {
    pub params: LicenseParams,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLicenseResult {
    pub install_id: ContractId<AppInstall>,
    pub license_id: ContractId<License>,
}

impl Choice for CreateLicense {
    type Template = AppInstall;
    type Result = CreateLicenseResult;
    const NAME: &'static str = "AppInstall_CreateLicense";
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CancelInstall {
    pub actor: Party,
    pub meta: Metadata,
}

impl Choice for CancelInstall {
    type Template = AppInstall;
    type Result = Completed;
    const NAME: &'static str = "AppInstall_Cancel";
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptInstallRequest {
    pub install_meta: Metadata,
    pub meta: Metadata,
}

impl Choice for AcceptInstallRequest {
    type Template = AppInstallRequest;
    type Result = ContractId<AppInstall>;
    const NAME: &'static str = "AppInstallRequest_Accept";
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RejectInstallRequest {
    pub meta: Metadata,
}

impl Choice for RejectInstallRequest {
    type Template = AppInstallRequest;
    type Result = Completed;
    const NAME: &'static str = "AppInstallRequest_Reject";
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CancelInstallRequest {
    pub meta: Metadata,
}

impl Choice for CancelInstallRequest {
    type Template = AppInstallRequest;
    type Result = Completed;
    const NAME: &'static str = "AppInstallRequest_Cancel";
}

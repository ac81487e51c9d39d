//! Schemas of the licensing templates and their choices.

use lgw_codec::{Choice, Dictionary, DictionaryBuilder, TemplateSchema, Type};

use crate::choices::{
    AcceptInstallRequest, CancelInstall, CancelInstallRequest, CompleteRenewal, CreateLicense,
    LicenseExpire, LicenseRenew, RejectInstallRequest,
};
use crate::templates::{
    Allocation, AppInstall, AppInstallRequest, License, LicenseRenewalRequest,
};

fn metadata() -> Type {
    Type::record([("values", Type::text_map(Type::Text))])
}

fn choice_context() -> Type {
    let any_value = Type::variant([
        ("AV_Text", Type::Text),
        ("AV_Int", Type::Int64),
        ("AV_Bool", Type::Bool),
        ("AV_Party", Type::Party),
        ("AV_ContractId", Type::ContractId),
    ]);
    Type::record([("values", Type::text_map(any_value))])
}

fn unit_argument() -> Type {
    Type::record(Vec::<(String, Type)>::new())
}

fn license() -> TemplateSchema {
    TemplateSchema::of::<License>(Type::record([
        ("dso", Type::Party),
        ("provider", Type::Party),
        ("user", Type::Party),
        ("params", Type::record([("meta", metadata())])),
        ("expiresAt", Type::Timestamp),
        ("licenseNum", Type::Int64),
    ]))
    .with_choice(
        LicenseRenew::NAME,
        Type::record([
            ("licenseFeeCc", Type::decimal()),
            ("licenseExtensionDuration", Type::rel_time()),
            ("paymentAcceptanceDuration", Type::rel_time()),
            ("description", Type::Text),
        ]),
        Type::ContractId,
        false,
    )
    .with_choice(
        LicenseExpire::NAME,
        Type::record([("actor", Type::Party), ("meta", metadata())]),
        Type::Unit,
        true,
    )
    .with_choice("Archive", unit_argument(), Type::Unit, true)
}

fn renewal_request() -> TemplateSchema {
    TemplateSchema::of::<LicenseRenewalRequest>(Type::record([
        ("provider", Type::Party),
        ("user", Type::Party),
        ("dso", Type::Party),
        ("licenseNum", Type::Int64),
        ("licenseFeeAmount", Type::decimal()),
        ("licenseExtensionDuration", Type::rel_time()),
        ("requestId", Type::Text),
        ("requestedAt", Type::Timestamp),
        ("prepareUntil", Type::Timestamp),
        ("settleBefore", Type::Timestamp),
        ("description", Type::Text),
    ]))
    .with_choice(
        CompleteRenewal::NAME,
        Type::record([
            ("allocationCid", Type::ContractId),
            (
                "extraArgs",
                Type::record([("context", choice_context()), ("meta", metadata())]),
            ),
        ]),
        Type::ContractId,
        true,
    )
}

fn app_install_request() -> TemplateSchema {
    TemplateSchema::of::<AppInstallRequest>(Type::record([
        ("dso", Type::Party),
        ("provider", Type::Party),
        ("user", Type::Party),
        ("meta", metadata()),
    ]))
    .with_choice(
        AcceptInstallRequest::NAME,
        Type::record([("installMeta", metadata()), ("meta", metadata())]),
        Type::ContractId,
        true,
    )
    .with_choice(
        RejectInstallRequest::NAME,
        Type::record([("meta", metadata())]),
        Type::Unit,
        true,
    )
    .with_choice(
        CancelInstallRequest::NAME,
        Type::record([("meta", metadata())]),
        Type::Unit,
        true,
    )
}

fn app_install() -> TemplateSchema {
    TemplateSchema::of::<AppInstall>(Type::record([
        ("dso", Type::Party),
        ("provider", Type::Party),
        ("user", Type::Party),
        ("meta", metadata()),
        ("numLicensesCreated", Type::Int64),
    ]))
    .with_choice(
        CreateLicense::NAME,
        Type::record([("params", Type::record([("meta", metadata())]))]),
        Type::record([("installId", Type::ContractId), ("licenseId", Type::ContractId)]),
        true,
    )
    .with_choice(
        CancelInstall::NAME,
        Type::record([("actor", Type::Party), ("meta", metadata())]),
        Type::Unit,
        true,
    )
}

fn allocation() -> TemplateSchema {
    let settlement = Type::record([
        ("executor", Type::Party),
        (
            "settlementRef",
            Type::record([("id", Type::Text), ("cid", Type::optional(Type::ContractId))]),
        ),
        ("requestedAt", Type::Timestamp),
        ("allocateBefore", Type::Timestamp),
        ("settleBefore", Type::Timestamp),
        ("meta", metadata()),
    ]);
    let transfer_leg = Type::record([
        ("sender", Type::Party),
        ("receiver", Type::Party),
        ("amount", Type::decimal()),
        ("instrumentId", Type::record([("admin", Type::Party), ("id", Type::Text)])),
        ("meta", metadata()),
    ]);
    TemplateSchema::of::<Allocation>(Type::record([
        (
            "allocation",
            Type::record([
                ("settlement", settlement),
                ("transferLegId", Type::Text),
                ("transferLeg", transfer_leg),
            ]),
        ),
        ("holdingCids", Type::list(Type::ContractId)),
        ("meta", metadata()),
    ]))
}

/// Add the licensing templates to `builder`.
pub fn register(builder: DictionaryBuilder) -> DictionaryBuilder {
    builder
        .register(license())
        .register(renewal_request())
        .register(app_install_request())
        .register(app_install())
        .register(allocation())
}

/// Dictionary holding only the licensing templates.
pub fn dictionary() -> Dictionary {
    register(Dictionary::builder()).build()
}

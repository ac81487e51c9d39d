//! Licensing commands run on the in-memory ledger, read back through the
//! repository once projected.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use lgw_codec::{Choice, Template};
use lgw_ledger::{ChoiceEffect, CommandGateway, InMemoryLedger};
use lgw_licensing::{
    dictionary, AcceptInstallRequest, AppInstall, AppInstallRequest, CreateLicense, License,
    LicenseParams, LicenseRenew, LicenseRenewalRequest, LicensingRepository, Metadata, RelTime,
};
use lgw_store::{ContractStore, InMemoryProjection, ProjectedContract};
use lgw_types::{CommandId, Party};
use serde_json::{json, Value as Json};

struct Harness {
    ledger: Arc<InMemoryLedger>,
    projection: Arc<InMemoryProjection>,
    gateway: CommandGateway,
    repository: LicensingRepository<InMemoryProjection>,
}

fn provider() -> Party {
    Party::parse("app_provider::1220").unwrap()
}

fn user() -> Party {
    Party::parse("app_user::1220").unwrap()
}

fn cmd(id: &str) -> CommandId {
    CommandId::parse(id).unwrap()
}

fn int_field(payload: &Json, field: &str) -> i64 {
    payload[field].as_str().and_then(|s| s.parse().ok()).unwrap_or(0)
}

fn harness() -> Harness {
    let ledger = Arc::new(InMemoryLedger::new());

    ledger.on_choice(&AppInstallRequest::template_id(), AcceptInstallRequest::NAME, true, |call| {
        let mut install = call.payload.clone();
        install["meta"] = call.argument["installMeta"].clone();
        install["numLicensesCreated"] = json!("0");
        Ok(ChoiceEffect {
            result: json!("$0"),
            creates: vec![(AppInstall::template_id(), install)],
        })
    });

    ledger.on_choice(&AppInstall::template_id(), CreateLicense::NAME, true, |call| {
        let num = int_field(call.payload, "numLicensesCreated") + 1;
        let license = json!({
            "dso": call.payload["dso"],
            "provider": call.payload["provider"],
            "user": call.payload["user"],
            "params": call.argument["params"],
            "expiresAt": "2026-01-01T00:00:00Z",
            "licenseNum": num.to_string(),
        });
        let mut install = call.payload.clone();
        install["numLicensesCreated"] = json!(num.to_string());
        Ok(ChoiceEffect {
            result: json!({"installId": "$1", "licenseId": "$0"}),
            creates: vec![(License::template_id(), license), (AppInstall::template_id(), install)],
        })
    });

    ledger.on_choice(&License::template_id(), LicenseRenew::NAME, false, |call| {
        let request = json!({
            "provider": call.payload["provider"],
            "user": call.payload["user"],
            "dso": call.payload["dso"],
            "licenseNum": call.payload["licenseNum"],
            "licenseFeeAmount": call.argument["licenseFeeCc"],
            "licenseExtensionDuration": call.argument["licenseExtensionDuration"],
            "requestId": format!("renewal-{}", call.contract_id),
            "requestedAt": "2025-12-01T00:00:00Z",
            "prepareUntil": "2025-12-08T00:00:00Z",
            "settleBefore": "2025-12-15T00:00:00Z",
            "description": call.argument["description"],
        });
        Ok(ChoiceEffect {
            result: json!("$0"),
            creates: vec![(LicenseRenewalRequest::template_id(), request)],
        })
    });

    let projection = Arc::new(InMemoryProjection::new());
    let gateway = CommandGateway::new(ledger.clone(), dictionary(), "app-provider");
    let repository = LicensingRepository::new(ContractStore::new(projection.clone(), dictionary()));
    Harness {
        ledger,
        projection,
        gateway,
        repository,
    }
}

fn project(h: &Harness) {
    h.projection.sync_from(h.ledger.active_contracts().into_iter().map(|c| ProjectedContract {
        contract_id: c.contract_id,
        template_id: c.template_id,
        payload: c.payload,
        created_at_offset: c.created_at_offset,
    }));
}

#[tokio::test]
async fn install_license_and_renew() {
    let h = harness();
    let request = AppInstallRequest {
        dso: Party::parse("dso::1220").unwrap(),
        provider: provider(),
        user: user(),
        meta: Metadata::new([("app", "quickstart")]),
    };
    h.gateway.create(&user(), &request, cmd("install-request")).await.unwrap();
    project(&h);

    let requests = h.repository.find_active_app_install_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].payload, request);

    let accept = AcceptInstallRequest {
        install_meta: Metadata::new([("seats", "5")]),
        meta: Metadata::default(),
    };
    let request_id = &requests[0].contract_id;
    let install_id = h
        .gateway
        .exercise_and_get_result(&provider(), request_id, &accept, cmd("accept"), vec![])
        .await
        .unwrap();

    let create = CreateLicense {
        params: LicenseParams {
            meta: Metadata::new([("tier", "basic")]),
        },
    };
    let created = h
        .gateway
        .exercise_and_get_result(&provider(), &install_id, &create, cmd("license-1"), vec![])
        .await
        .unwrap();
    assert_ne!(created.install_id, install_id);
    project(&h);

    assert!(h.repository.find_active_app_install_requests().await.unwrap().is_empty());
    let installs = h.repository.find_active_app_installs().await.unwrap();
    assert_eq!(installs.len(), 1);
    assert_eq!(installs[0].contract_id, created.install_id);
    assert_eq!(installs[0].payload.num_licenses_created, 1);
    assert_eq!(installs[0].payload.meta, accept.install_meta);

    let license = h.repository.find_license_by_id(&created.license_id).await.unwrap();
    assert_eq!(license.payload.license_num, 1);
    assert_eq!(license.payload.expires_at, Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());

    let renew = LicenseRenew {
        license_fee_cc: "20.0".into(),
        license_extension_duration: RelTime::from_days(30),
        payment_acceptance_duration: RelTime::from_days(7),
        description: "January".into(),
    };
    let renewal_id = h
        .gateway
        .exercise_and_get_result(&provider(), &created.license_id, &renew, cmd("renew-1"), vec![])
        .await
        .unwrap();
    project(&h);

    let licenses = h.repository.find_active_licenses(&user()).await.unwrap();
    assert_eq!(licenses.len(), 1);
    assert_eq!(licenses[0].license, license);
    let renewals = &licenses[0].renewals;
    assert_eq!(renewals.len(), 1);
    assert_eq!(renewals[0].renewal.contract_id, renewal_id);
    assert_eq!(renewals[0].renewal.payload.license_fee_amount, "20.0");
    assert_eq!(renewals[0].renewal.payload.license_extension_duration, RelTime::from_days(30));
    assert_eq!(renewals[0].allocation_cid, None);

    let by_id = h
        .repository
        .find_active_license_renewal_request_by_id(&renewal_id)
        .await
        .unwrap();
    assert_eq!(by_id.map(|r| r.payload.description), Some("January".to_string()));
}

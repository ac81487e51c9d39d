//! Reads against a projection fed from the in-memory ledger.

use std::sync::Arc;

use lgw_codec::{Choice, Dictionary, Template, TemplateSchema, Type};
use lgw_ledger::{CommandGateway, InMemoryLedger};
use lgw_store::{ContractStore, InMemoryProjection, ProjectedContract, StoreError};
use lgw_types::{CommandId, ContractId, Identifier, Party};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct License {
    provider: String,
    user: String,
    license_num: i64,
}

impl Template for License {
    fn template_id() -> Identifier {
        Identifier::new("#quickstart-licensing", "Licensing.License", "License")
    }
}

#[derive(Serialize)]
struct Archive {}

#[derive(Debug, Deserialize)]
struct Archived {}

impl Choice for Archive {
    type Template = License;
    type Result = Archived;
    const NAME: &'static str = "Archive";
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct AppInstall {
    provider: String,
    user: String,
}

impl Template for AppInstall {
    fn template_id() -> Identifier {
        Identifier::new("#quickstart-licensing", "Licensing.AppInstall", "AppInstall")
    }
}

fn dictionary() -> Dictionary {
    Dictionary::builder()
        .register(TemplateSchema::of::<License>(Type::record([
            ("provider", Type::Party),
            ("user", Type::Party),
            ("licenseNum", Type::Int64),
        ]))
        .with_choice("Archive", Type::record(Vec::<(String, Type)>::new()), Type::Unit, true))
        .register(TemplateSchema::of::<AppInstall>(Type::record([
            ("provider", Type::Party),
            ("user", Type::Party),
        ])))
        .build()
}

fn project(ledger: &InMemoryLedger, projection: &InMemoryProjection) {
    projection.sync_from(ledger.active_contracts().into_iter().map(|c| ProjectedContract {
        contract_id: c.contract_id,
        template_id: c.template_id,
        payload: c.payload,
        created_at_offset: c.created_at_offset,
    }));
}

#[tokio::test]
async fn lookup_after_create_is_lagging_but_never_mistyped() {
    let ledger = Arc::new(InMemoryLedger::new());
    let projection = Arc::new(InMemoryProjection::new());
    let gateway = CommandGateway::new(ledger.clone(), dictionary(), "app");
    let store = ContractStore::new(projection.clone(), dictionary());
    let provider = Party::parse("bob::1220").unwrap();

    let license = License {
        provider: provider.to_string(),
        user: "alice::1220".into(),
        license_num: 7,
    };
    gateway
        .create(&provider, &license, CommandId::parse("create-license").unwrap())
        .await
        .unwrap();
    gateway
        .create(
            &provider,
            &AppInstall {
                provider: provider.to_string(),
                user: "alice::1220".into(),
            },
            CommandId::parse("create-install").unwrap(),
        )
        .await
        .unwrap();

    let created = ledger
        .active_contracts()
        .into_iter()
        .find(|c| c.template_id.same_entity(&License::template_id()))
        .unwrap();
    let install_id = ledger
        .active_contracts()
        .into_iter()
        .find(|c| c.template_id.same_entity(&AppInstall::template_id()))
        .unwrap()
        .contract_id;
    let cid = ContractId::<License>::new(created.contract_id.clone());

    // Not projected yet.
    assert!(matches!(
        store.by_contract_id(&cid).await,
        Err(StoreError::NotFound { .. })
    ));

    project(&ledger, &projection);
    let found = store.by_contract_id(&cid).await.unwrap();
    assert_eq!(found.payload, license);

    // An id of another template is never returned as a License.
    let wrong = ContractId::<License>::new(install_id);
    assert!(matches!(
        store.by_contract_id(&wrong).await,
        Err(StoreError::NotFound { .. })
    ));

    let by_user = store
        .active_where::<License>(
            "user = ? AND licenseNum = ?",
            &["alice::1220".into(), 7i64.into()],
        )
        .await
        .unwrap();
    assert_eq!(by_user, vec![found]);
}

#[tokio::test]
async fn archived_contracts_leave_the_projection() {
    let ledger = Arc::new(InMemoryLedger::new());
    let projection = Arc::new(InMemoryProjection::new());
    let gateway = CommandGateway::new(ledger.clone(), dictionary(), "app");
    let store = ContractStore::new(projection.clone(), dictionary());
    let provider = Party::parse("bob::1220").unwrap();

    for (i, user) in ["alice::1220", "carol::1220"].into_iter().enumerate() {
        let license = License {
            provider: provider.to_string(),
            user: user.into(),
            license_num: i as i64,
        };
        gateway
            .create(&provider, &license, CommandId::parse(format!("create-{i}")).unwrap())
            .await
            .unwrap();
    }
    project(&ledger, &projection);
    let all = store.active::<License>().await.unwrap();
    assert_eq!(all.len(), 2);

    let gone = all[0].contract_id.clone();
    gateway
        .exercise_and_get_result(
            &provider,
            &gone,
            &Archive {},
            CommandId::parse("archive-0").unwrap(),
            Vec::new(),
        )
        .await
        .unwrap();
    assert!(!ledger.is_active(gone.as_str()));

    // Still visible until the projection catches up.
    assert!(store.by_contract_id(&gone).await.is_ok());
    project(&ledger, &projection);
    assert!(matches!(
        store.by_contract_id(&gone).await,
        Err(StoreError::NotFound { .. })
    ));
    let remaining = store.active::<License>().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_ne!(remaining[0].contract_id, gone);
}

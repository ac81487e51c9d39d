//! JSON Ledger API v2 client.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lgw_auth::TokenProvider;
use lgw_types::Identifier;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value as Json};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::command::{CommandEnvelope, SubmissionAccepted};
use crate::error::{LedgerError, LedgerResult};
use crate::traits::LedgerClient;
use crate::transaction::{CreatedEvent, ExercisedEvent, NodeId, TransactionTree, TreeEvent};

const SUBMIT_PATH: &str = "/v2/commands/async/submit";
const SUBMIT_AND_WAIT_PATH: &str = "/v2/commands/submit-and-wait-for-transaction-tree";

/// Ledger client speaking the participant's JSON Ledger API.
///
/// 4xx responses are ledger rejections; 5xx responses, connection failures
/// and timeouts are transport errors. Nothing is retried here.
#[derive(Clone)]
pub struct HttpLedgerClient {
    base_url: String,
    http: reqwest::Client,
    tokens: Arc<dyn TokenProvider>,
}

impl HttpLedgerClient {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        tokens: Arc<dyn TokenProvider>,
    ) -> LedgerResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LedgerError::Transport(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            tokens,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post(&self, path: &str, body: &Json) -> LedgerResult<Json> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.post(&url).json(body);
        let token = self
            .tokens
            .access_token()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        debug!(%url, status = status.as_u16(), "ledger response");
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let text = response.text().await.unwrap_or_default();
        Err(error_from_status(status, &text))
    }
}

fn error_from_status(status: StatusCode, body: &str) -> LedgerError {
    // Throttling and request timeouts leave the command unprocessed.
    let transient = matches!(status, StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS);
    if status.is_client_error() && !transient {
        let parsed: Json = serde_json::from_str(body).unwrap_or(Json::Null);
        let code = parsed["code"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP_{}", status.as_u16()));
        let message = parsed["cause"]
            .as_str()
            .or_else(|| parsed["message"].as_str())
            .unwrap_or(body)
            .to_string();
        warn!(status = status.as_u16(), %code, "ledger rejected command");
        LedgerError::Rejected { code, message }
    } else {
        LedgerError::Transport(format!("ledger returned {status}: {body}"))
    }
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    async fn submit(&self, envelope: &CommandEnvelope) -> LedgerResult<SubmissionAccepted> {
        let submission_id = Uuid::now_v7().to_string();
        let mut body = envelope.to_ledger_json()?;
        body["submissionId"] = json!(submission_id);
        self.post(SUBMIT_PATH, &body).await?;
        Ok(SubmissionAccepted {
            command_id: envelope.command_id.clone(),
            submission_id,
        })
    }

    async fn submit_and_wait_for_transaction_tree(
        &self,
        envelope: &CommandEnvelope,
    ) -> LedgerResult<TransactionTree> {
        let response = self.post(SUBMIT_AND_WAIT_PATH, &envelope.to_ledger_json()?).await?;
        parse_tree_response(response)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TreeResponse {
    transaction_tree: JsTransactionTree,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsTransactionTree {
    update_id: String,
    offset: i64,
    #[serde(default)]
    events_by_id: BTreeMap<String, JsTreeEvent>,
}

#[derive(Deserialize)]
enum JsTreeEvent {
    CreatedTreeEvent { value: JsCreated },
    ExercisedTreeEvent { value: JsExercised },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsCreated {
    node_id: NodeId,
    contract_id: String,
    template_id: Identifier,
    #[serde(default)]
    create_argument: Json,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsExercised {
    node_id: NodeId,
    contract_id: String,
    template_id: Identifier,
    #[serde(default)]
    interface_id: Option<Identifier>,
    choice: String,
    #[serde(default)]
    choice_argument: Json,
    #[serde(default)]
    exercise_result: Json,
    consuming: bool,
    last_descendant_node_id: NodeId,
}

fn parse_tree_response(json: Json) -> LedgerResult<TransactionTree> {
    let response: TreeResponse =
        serde_json::from_value(json).map_err(|e| LedgerError::InvalidResponse(e.to_string()))?;
    let tree = response.transaction_tree;
    let events = tree.events_by_id.into_values().map(|event| match event {
        JsTreeEvent::CreatedTreeEvent { value } => TreeEvent::Created(CreatedEvent {
            node_id: value.node_id,
            contract_id: value.contract_id,
            template_id: value.template_id,
            create_argument: value.create_argument,
        }),
        JsTreeEvent::ExercisedTreeEvent { value } => TreeEvent::Exercised(ExercisedEvent {
            node_id: value.node_id,
            contract_id: value.contract_id,
            template_id: value.template_id,
            interface_id: value.interface_id,
            choice: value.choice,
            choice_argument: value.choice_argument,
            exercise_result: value.exercise_result,
            consuming: value.consuming,
            last_descendant_node_id: value.last_descendant_node_id,
        }),
    });
    Ok(TransactionTree::new(tree.update_id, tree.offset, events))
}

#[cfg(test)]
mod tests {
    use lgw_auth::StaticTokenProvider;

    use super::*;

    #[test]
    fn parses_transaction_tree() {
        let response = json!({
            "transactionTree": {
                "updateId": "1220upd",
                "commandId": "cmd-1",
                "offset": 42,
                "eventsById": {
                    "0": {"ExercisedTreeEvent": {"value": {
                        "nodeId": 0,
                        "contractId": "00lic",
                        "templateId": "abc:Licensing.License:License",
                        "choice": "License_Renew",
                        "choiceArgument": {"description": "x"},
                        "exerciseResult": "00req",
                        "consuming": false,
                        "lastDescendantNodeId": 1,
                        "actingParties": ["provider::1220"]
                    }}},
                    "1": {"CreatedTreeEvent": {"value": {
                        "nodeId": 1,
                        "contractId": "00req",
                        "templateId": "abc:Licensing.License:LicenseRenewalRequest",
                        "createArgument": {"licenseNum": "1"},
                        "signatories": ["provider::1220"]
                    }}}
                }
            }
        });
        let tree = parse_tree_response(response).unwrap();
        assert_eq!(tree.update_id, "1220upd");
        assert_eq!(tree.offset, 42);
        assert_eq!(tree.root_event_ids, vec![0]);
        let license = Identifier::parse("abc:Licensing.License:License").unwrap();
        let ev = tree.exercise_result_event(&license, "License_Renew").unwrap();
        assert_eq!(ev.exercise_result, json!("00req"));
    }

    #[test]
    fn malformed_tree_is_invalid_response() {
        let err = parse_tree_response(json!({"transactionTree": {"offset": "x"}})).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidResponse(_)));
    }

    #[test]
    fn status_mapping() {
        let err = error_from_status(
            StatusCode::CONFLICT,
            r#"{"code":"CONTRACT_NOT_ACTIVE","cause":"contract 00abc is archived"}"#,
        );
        assert_eq!(
            err,
            LedgerError::rejected("CONTRACT_NOT_ACTIVE", "contract 00abc is archived")
        );

        let err = error_from_status(StatusCode::BAD_REQUEST, "not json");
        assert_eq!(err, LedgerError::rejected("HTTP_400", "not json"));

        let err = error_from_status(StatusCode::SERVICE_UNAVAILABLE, "down");
        assert!(err.is_retryable());

        for status in [StatusCode::REQUEST_TIMEOUT, StatusCode::TOO_MANY_REQUESTS] {
            let err = error_from_status(status, r#"{"code":"RESOURCE_EXHAUSTED"}"#);
            assert!(matches!(err, LedgerError::Transport(_)), "{status}");
            assert!(err.is_retryable());
        }
    }

    #[tokio::test]
    async fn unreachable_ledger_is_transport_error() {
        let client = HttpLedgerClient::new(
            "http://127.0.0.1:9/",
            Duration::from_millis(500),
            Arc::new(StaticTokenProvider::new("token")),
        )
        .unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:9");
        let env = CommandEnvelope::single_party(
            "app",
            lgw_types::CommandId::parse("cmd-1").unwrap(),
            lgw_types::Party::parse("alice::1").unwrap(),
            Vec::new(),
            Vec::new(),
        );
        let err = client.submit(&env).await.unwrap_err();
        assert!(err.is_retryable(), "{err:?}");
    }
}

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use lgw_types::Identifier;
use serde_json::{json, Value as Json};
use tracing::debug;
use uuid::Uuid;

use crate::command::{Command, CommandEnvelope, SubmissionAccepted};
use crate::error::{LedgerError, LedgerResult};
use crate::traits::LedgerClient;
use crate::transaction::{CreatedEvent, ExercisedEvent, NodeId, TransactionTree, TreeEvent};

/// Rejection code for a command id reused with a different payload.
pub const DUPLICATE_COMMAND: &str = "DUPLICATE_COMMAND";
/// Rejection code for an exercise on an archived contract.
pub const CONTRACT_NOT_ACTIVE: &str = "CONTRACT_NOT_ACTIVE";
pub const CONTRACT_NOT_FOUND: &str = "CONTRACT_NOT_FOUND";
pub const WRONGLY_TYPED_CONTRACT: &str = "WRONGLY_TYPED_CONTRACT";
pub const CHOICE_NOT_FOUND: &str = "CHOICE_NOT_FOUND";
/// Rejection code for a choice body that aborted.
pub const INTERPRETATION_ERROR: &str = "INTERPRETATION_ERROR";

/// What a choice handler sees.
pub struct ChoiceCall<'a> {
    pub contract_id: &'a str,
    pub template_id: &'a Identifier,
    pub payload: &'a Json,
    pub argument: &'a Json,
}

/// What a choice handler produces.
#[derive(Clone, Debug, Default)]
pub struct ChoiceEffect {
    /// Result in the ledger JSON dialect. Contract ids of contracts created
    /// by this exercise can be referenced as `"$0"`, `"$1"`, ... and are
    /// substituted once the new contracts have ids.
    pub result: Json,
    pub creates: Vec<(Identifier, Json)>,
}

type ChoiceHandler = Arc<dyn Fn(&ChoiceCall<'_>) -> Result<ChoiceEffect, String> + Send + Sync>;

struct RegisteredChoice {
    consuming: bool,
    handler: ChoiceHandler,
}

/// A contract as held by the in-memory ledger.
#[derive(Clone, Debug, PartialEq)]
pub struct ActiveContract {
    pub contract_id: String,
    pub template_id: Identifier,
    pub payload: Json,
    pub created_at_offset: i64,
}

/// In-memory ledger for tests, local demos, and embedding.
///
/// Executes commands synchronously at submission, so rejections surface from
/// both `submit` and `submit_and_wait_for_transaction_tree`. Deduplicates by
/// `(actAs, commandId)` once a command has committed: resubmitting an
/// identical envelope replays the committed transaction, resubmitting a
/// different one is rejected with [`DUPLICATE_COMMAND`]. Rejected commands
/// are not remembered and may be retried under the same command id.
#[derive(Default)]
pub struct InMemoryLedger {
    inner: RwLock<LedgerState>,
    choices: RwLock<HashMap<(String, String), RegisteredChoice>>,
}

#[derive(Default)]
struct LedgerState {
    offset: i64,
    contracts: BTreeMap<String, ActiveContract>,
    archived: BTreeMap<String, ActiveContract>,
    dedup: HashMap<(Vec<String>, String), ([u8; 32], TransactionTree)>,
    submissions: Vec<CommandEnvelope>,
    fail_next: Option<LedgerError>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the body of a choice.
    pub fn on_choice<F>(&self, template_id: &Identifier, choice: &str, consuming: bool, handler: F)
    where
        F: Fn(&ChoiceCall<'_>) -> Result<ChoiceEffect, String> + Send + Sync + 'static,
    {
        self.choices.write().expect("lock poisoned").insert(
            (template_id.qualified_name(), choice.to_string()),
            RegisteredChoice {
                consuming,
                handler: Arc::new(handler),
            },
        );
    }

    /// Fail the next submission with `err` before it reaches the ledger.
    pub fn fail_next(&self, err: LedgerError) {
        self.inner.write().expect("lock poisoned").fail_next = Some(err);
    }

    /// Snapshot of the active contract set, in contract id order.
    pub fn active_contracts(&self) -> Vec<ActiveContract> {
        self.inner
            .read()
            .expect("lock poisoned")
            .contracts
            .values()
            .cloned()
            .collect()
    }

    pub fn is_active(&self, contract_id: &str) -> bool {
        self.inner
            .read()
            .expect("lock poisoned")
            .contracts
            .contains_key(contract_id)
    }

    /// Every envelope that reached the ledger, including duplicates.
    pub fn submissions(&self) -> Vec<CommandEnvelope> {
        self.inner.read().expect("lock poisoned").submissions.clone()
    }

    pub fn offset(&self) -> i64 {
        self.inner.read().expect("lock poisoned").offset
    }

    fn execute(&self, envelope: &CommandEnvelope) -> LedgerResult<TransactionTree> {
        let mut state = self.inner.write().expect("lock poisoned");
        if let Some(err) = state.fail_next.take() {
            return Err(err);
        }
        state.submissions.push(envelope.clone());

        let key = (
            envelope.act_as.iter().map(|p| p.to_string()).collect::<Vec<_>>(),
            envelope.command_id.to_string(),
        );
        let fingerprint = envelope.fingerprint()?;
        if let Some((seen, committed)) = state.dedup.get(&key) {
            if *seen == fingerprint {
                debug!(command_id = %envelope.command_id, "replaying deduplicated command");
                return Ok(committed.clone());
            }
            return Err(LedgerError::rejected(
                DUPLICATE_COMMAND,
                format!(
                    "command id {} was already submitted by {} with a different payload",
                    envelope.command_id,
                    key.0.join(",")
                ),
            ));
        }

        let tree = self.interpret(&mut state, envelope)?;
        state.dedup.insert(key, (fingerprint, tree.clone()));
        Ok(tree)
    }

    /// Run all commands atomically: either every effect lands or none does.
    fn interpret(
        &self,
        state: &mut LedgerState,
        envelope: &CommandEnvelope,
    ) -> LedgerResult<TransactionTree> {
        let offset = state.offset + 1;
        let update_id = format!("upd-{offset:08}");
        let mut staged = Staged::default();
        let choices = self.choices.read().expect("lock poisoned");

        for command in &envelope.commands {
            match command {
                Command::Create {
                    template_id,
                    arguments,
                } => {
                    staged.create(&update_id, template_id, arguments.to_ledger_json()?);
                }
                Command::Exercise {
                    template_id,
                    contract_id,
                    choice,
                    argument,
                } => {
                    let contract = staged.lookup(state, contract_id)?.clone();
                    if !contract.template_id.same_entity(template_id) {
                        return Err(LedgerError::rejected(
                            WRONGLY_TYPED_CONTRACT,
                            format!(
                                "{contract_id} is a {}, not a {template_id}",
                                contract.template_id
                            ),
                        ));
                    }
                    let registered = if choice == "Archive" {
                        None
                    } else {
                        Some(
                            choices
                                .get(&(template_id.qualified_name(), choice.clone()))
                                .ok_or_else(|| {
                                    LedgerError::rejected(
                                        CHOICE_NOT_FOUND,
                                        format!("{template_id} has no choice {choice}"),
                                    )
                                })?,
                        )
                    };
                    let argument = argument.to_ledger_json()?;
                    let (consuming, effect) = match registered {
                        None => (true, ChoiceEffect { result: json!({}), creates: Vec::new() }),
                        Some(reg) => {
                            let call = ChoiceCall {
                                contract_id,
                                template_id: &contract.template_id,
                                payload: &contract.payload,
                                argument: &argument,
                            };
                            let effect = (reg.handler)(&call)
                                .map_err(|msg| LedgerError::rejected(INTERPRETATION_ERROR, msg))?;
                            (reg.consuming, effect)
                        }
                    };
                    staged.exercise(&update_id, &contract, choice, argument, consuming, effect);
                }
            }
        }

        state.offset = offset;
        for cid in staged.archived {
            if let Some(contract) = state.contracts.remove(&cid) {
                state.archived.insert(cid, contract);
            }
        }
        for mut contract in staged.created {
            contract.created_at_offset = offset;
            state.contracts.insert(contract.contract_id.clone(), contract);
        }
        debug!(%update_id, offset, events = staged.events.len(), "transaction committed");
        Ok(TransactionTree::new(update_id, offset, staged.events))
    }
}

#[derive(Default)]
struct Staged {
    events: Vec<TreeEvent>,
    created: Vec<ActiveContract>,
    archived: Vec<String>,
}

impl Staged {
    fn next_node(&self) -> NodeId {
        self.events.len() as NodeId
    }

    fn lookup<'a>(
        &'a self,
        state: &'a LedgerState,
        contract_id: &str,
    ) -> LedgerResult<&'a ActiveContract> {
        let archived_here = self.archived.iter().any(|c| c == contract_id);
        if archived_here || state.archived.contains_key(contract_id) {
            return Err(LedgerError::rejected(
                CONTRACT_NOT_ACTIVE,
                format!("contract {contract_id} is archived"),
            ));
        }
        self.created
            .iter()
            .find(|c| c.contract_id == contract_id)
            .or_else(|| state.contracts.get(contract_id))
            .ok_or_else(|| {
                LedgerError::rejected(
                    CONTRACT_NOT_FOUND,
                    format!("contract {contract_id} not found"),
                )
            })
    }

    fn create(&mut self, update_id: &str, template_id: &Identifier, payload: Json) -> String {
        let node_id = self.next_node();
        let contract_id = format!("00{}", hex_id(update_id, node_id));
        self.events.push(TreeEvent::Created(CreatedEvent {
            node_id,
            contract_id: contract_id.clone(),
            template_id: template_id.clone(),
            create_argument: payload.clone(),
        }));
        self.created.push(ActiveContract {
            contract_id: contract_id.clone(),
            template_id: template_id.clone(),
            payload,
            created_at_offset: 0,
        });
        contract_id
    }

    fn exercise(
        &mut self,
        update_id: &str,
        contract: &ActiveContract,
        choice: &str,
        argument: Json,
        consuming: bool,
        effect: ChoiceEffect,
    ) {
        let node_id = self.next_node();
        self.events.push(TreeEvent::Exercised(ExercisedEvent {
            node_id,
            contract_id: contract.contract_id.clone(),
            template_id: contract.template_id.clone(),
            interface_id: None,
            choice: choice.to_string(),
            choice_argument: argument,
            exercise_result: Json::Null,
            consuming,
            last_descendant_node_id: node_id,
        }));
        if consuming {
            self.archived.push(contract.contract_id.clone());
        }
        let new_ids: Vec<String> = effect
            .creates
            .into_iter()
            .map(|(template_id, payload)| self.create(update_id, &template_id, payload))
            .collect();
        let last = self.next_node().saturating_sub(1).max(node_id);
        let result = substitute_created_ids(effect.result, &new_ids);
        if let Some(TreeEvent::Exercised(ex)) = self.events.get_mut(node_id as usize) {
            ex.exercise_result = result;
            ex.last_descendant_node_id = last;
        }
    }
}

fn hex_id(update_id: &str, node_id: NodeId) -> String {
    let digest = blake3::hash(format!("{update_id}/{node_id}/{}", Uuid::now_v7()).as_bytes());
    hex::encode(&digest.as_bytes()[..16])
}

fn substitute_created_ids(result: Json, ids: &[String]) -> Json {
    match result {
        Json::String(s) => match s.strip_prefix('$').and_then(|i| i.parse::<usize>().ok()) {
            Some(i) if i < ids.len() => Json::String(ids[i].clone()),
            _ => Json::String(s),
        },
        Json::Array(items) => Json::Array(
            items
                .into_iter()
                .map(|v| substitute_created_ids(v, ids))
                .collect(),
        ),
        Json::Object(map) => Json::Object(
            map.into_iter()
                .map(|(k, v)| (k, substitute_created_ids(v, ids)))
                .collect(),
        ),
        other => other,
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn submit(&self, envelope: &CommandEnvelope) -> LedgerResult<SubmissionAccepted> {
        self.execute(envelope)?;
        Ok(SubmissionAccepted {
            command_id: envelope.command_id.clone(),
            submission_id: Uuid::now_v7().to_string(),
        })
    }

    async fn submit_and_wait_for_transaction_tree(
        &self,
        envelope: &CommandEnvelope,
    ) -> LedgerResult<TransactionTree> {
        self.execute(envelope)
    }
}

#[cfg(test)]
mod tests {
    use lgw_codec::Value;
    use lgw_types::{CommandId, Party};

    use super::*;

    fn license() -> Identifier {
        Identifier::new("#quickstart-licensing", "Licensing.License", "License")
    }

    fn request() -> Identifier {
        Identifier::new("#quickstart-licensing", "Licensing.License", "LicenseRenewalRequest")
    }

    fn envelope(command_id: &str, commands: Vec<Command>) -> CommandEnvelope {
        CommandEnvelope::single_party(
            "app",
            CommandId::parse(command_id).unwrap(),
            Party::parse("provider::1220").unwrap(),
            commands,
            Vec::new(),
        )
    }

    fn create(num: i64) -> Command {
        Command::Create {
            template_id: license(),
            arguments: Value::Record(vec![("licenseNum".into(), Value::Int64(num))]),
        }
    }

    fn exercise(cid: &str, choice: &str) -> Command {
        Command::Exercise {
            template_id: license(),
            contract_id: cid.into(),
            choice: choice.into(),
            argument: Value::Record(Vec::new()),
        }
    }

    async fn create_one(ledger: &InMemoryLedger, cmd: &str) -> String {
        let tree = ledger
            .submit_and_wait_for_transaction_tree(&envelope(cmd, vec![create(1)]))
            .await
            .unwrap();
        let contract_id = tree.created_events().next().unwrap().contract_id.clone();
        contract_id
    }

    #[tokio::test]
    async fn create_then_consume() {
        let ledger = InMemoryLedger::new();
        let cid = create_one(&ledger, "c1").await;
        assert!(ledger.is_active(&cid));
        assert_eq!(ledger.active_contracts()[0].payload, json!({"licenseNum": "1"}));

        ledger
            .submit_and_wait_for_transaction_tree(&envelope("c2", vec![exercise(&cid, "Archive")]))
            .await
            .unwrap();
        assert!(!ledger.is_active(&cid));

        let err = ledger
            .submit_and_wait_for_transaction_tree(&envelope("c3", vec![exercise(&cid, "Archive")]))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Rejected { code, .. } if code == CONTRACT_NOT_ACTIVE));
    }

    #[tokio::test]
    async fn duplicate_command_replays_or_rejects() {
        let ledger = InMemoryLedger::new();
        let first = ledger
            .submit_and_wait_for_transaction_tree(&envelope("dup", vec![create(1)]))
            .await
            .unwrap();
        let replay = ledger
            .submit_and_wait_for_transaction_tree(&envelope("dup", vec![create(1)]))
            .await
            .unwrap();
        assert_eq!(first, replay);
        assert_eq!(ledger.active_contracts().len(), 1);

        let err = ledger
            .submit_and_wait_for_transaction_tree(&envelope("dup", vec![create(2)]))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Rejected { code, .. } if code == DUPLICATE_COMMAND));
        assert_eq!(ledger.active_contracts().len(), 1);
        assert_eq!(ledger.submissions().len(), 3);
    }

    #[tokio::test]
    async fn choice_handler_creates_children() {
        let ledger = InMemoryLedger::new();
        ledger.on_choice(&license(), "License_Renew", false, |call| {
            let num = call.payload["licenseNum"].clone();
            Ok(ChoiceEffect {
                result: json!("$0"),
                creates: vec![(request(), json!({"licenseNum": num}))],
            })
        });
        let cid = create_one(&ledger, "c1").await;
        let renew = envelope("c2", vec![exercise(&cid, "License_Renew")]);
        let tree = ledger
            .submit_and_wait_for_transaction_tree(&renew)
            .await
            .unwrap();
        assert_eq!(tree.root_event_ids, vec![0]);
        let ev = tree.exercise_result_event(&license(), "License_Renew").unwrap();
        assert_eq!(ev.last_descendant_node_id, 1);
        let child = tree.created_events().next().unwrap();
        assert_eq!(ev.exercise_result, json!(child.contract_id));
        assert!(ledger.is_active(&cid));
        assert_eq!(ledger.active_contracts().len(), 2);
    }

    #[tokio::test]
    async fn failed_command_has_no_effect() {
        let ledger = InMemoryLedger::new();
        ledger.on_choice(&license(), "License_Expire", true, |_| Err("not expired yet".into()));
        let cid = create_one(&ledger, "c1").await;
        let err = ledger
            .submit_and_wait_for_transaction_tree(&envelope(
                "c2",
                vec![create(2), exercise(&cid, "License_Expire")],
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Rejected { code, .. } if code == INTERPRETATION_ERROR));
        assert_eq!(ledger.active_contracts().len(), 1);
        assert_eq!(ledger.offset(), 1);
    }

    #[tokio::test]
    async fn rejected_command_can_be_retried_with_same_id() {
        let ledger = InMemoryLedger::new();
        let expired = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = expired.clone();
        ledger.on_choice(&license(), "License_Expire", true, move |_| {
            if flag.load(std::sync::atomic::Ordering::SeqCst) {
                Ok(ChoiceEffect {
                    result: json!({}),
                    creates: Vec::new(),
                })
            } else {
                Err("not expired yet".into())
            }
        });
        let cid = create_one(&ledger, "c1").await;
        let expire = envelope("c2", vec![exercise(&cid, "License_Expire")]);

        let err = ledger.submit_and_wait_for_transaction_tree(&expire).await.unwrap_err();
        assert!(matches!(err, LedgerError::Rejected { code, .. } if code == INTERPRETATION_ERROR));

        expired.store(true, std::sync::atomic::Ordering::SeqCst);
        let tree = ledger.submit_and_wait_for_transaction_tree(&expire).await.unwrap();
        assert!(tree.exercise_result_event(&license(), "License_Expire").is_some());
        assert!(!ledger.is_active(&cid));

        // Committed now, so a further retry replays instead of re-executing.
        let replay = ledger.submit_and_wait_for_transaction_tree(&expire).await.unwrap();
        assert_eq!(tree, replay);
    }

    #[tokio::test]
    async fn unknown_choice_and_wrong_template() {
        let ledger = InMemoryLedger::new();
        let cid = create_one(&ledger, "c1").await;
        let err = ledger
            .submit(&envelope("c2", vec![exercise(&cid, "Nope")]))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Rejected { code, .. } if code == CHOICE_NOT_FOUND));

        let wrong = Command::Exercise {
            template_id: request(),
            contract_id: cid,
            choice: "Archive".into(),
            argument: Value::Record(Vec::new()),
        };
        let err = ledger.submit(&envelope("c3", vec![wrong])).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Rejected { code, .. } if code == WRONGLY_TYPED_CONTRACT
        ));
    }

    #[tokio::test]
    async fn injected_failure_is_not_recorded() {
        let ledger = InMemoryLedger::new();
        ledger.fail_next(LedgerError::Timeout);
        let err = ledger.submit(&envelope("c1", vec![create(1)])).await.unwrap_err();
        assert_eq!(err, LedgerError::Timeout);
        // Retrying the same command id after a transport failure succeeds.
        ledger.submit(&envelope("c1", vec![create(1)])).await.unwrap();
        assert_eq!(ledger.active_contracts().len(), 1);
    }
}

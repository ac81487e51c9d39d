use std::future::Future;
use std::sync::Arc;

use lgw_codec::{Choice, Dictionary, Template};
use lgw_types::{CommandId, ContractId, Party};
use tracing::field::{display, Empty};
use tracing::{info, info_span, warn, Instrument, Span};

use crate::audit::{AuditOutcome, AuditRecord, AuditSink, TracingAuditSink};
use crate::command::{Command, CommandEnvelope, DisclosedContract, SubmissionAccepted};
use crate::error::{LedgerError, LedgerResult};
use crate::traits::LedgerClient;

/// Builds, submits, and audits ledger commands.
///
/// Stateless apart from long-lived handles, so one gateway serves all
/// requests concurrently. Commands act and read as a single party. Failures
/// are never retried here: a retry under a new command id would duplicate
/// effects, and a retry under the same id is the caller's decision.
#[derive(Clone)]
pub struct CommandGateway {
    client: Arc<dyn LedgerClient>,
    dictionary: Dictionary,
    audit: Arc<dyn AuditSink>,
    user_id: String,
}

struct AuditContext {
    command_id: String,
    act_as: String,
    template_id: String,
    choice: Option<String>,
    contract_id: Option<String>,
    command_count: usize,
}

impl CommandGateway {
    pub fn new(
        client: Arc<dyn LedgerClient>,
        dictionary: Dictionary,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            dictionary,
            audit: Arc::new(TracingAuditSink),
            user_id: user_id.into(),
        }
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = sink;
        self
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Create a contract of template `T` and wait for the commit.
    pub async fn create<T: Template>(
        &self,
        actor: &Party,
        payload: &T,
        command_id: CommandId,
    ) -> LedgerResult<()> {
        let template_id = T::template_id();
        let span = info_span!(
            "ledger.create",
            command_id = %command_id,
            party = %actor,
            template_id = %template_id,
            choice = Empty,
            contract_id = Empty,
            outcome = Empty,
        );
        let ctx = AuditContext {
            command_id: command_id.to_string(),
            act_as: actor.to_string(),
            template_id: template_id.to_string(),
            choice: None,
            contract_id: None,
            command_count: 1,
        };

        self.audited(span, ctx, async {
            let arguments = self.dictionary.encode_template(payload)?;
            let create = Command::Create {
                template_id,
                arguments,
            };
            let envelope = self.envelope(actor, command_id, vec![create], Vec::new());
            let tree = self.client.submit_and_wait_for_transaction_tree(&envelope).await?;
            Ok(((), committed(&tree.update_id, tree.offset)))
        })
        .await
    }

    /// Exercise choice `C` on `contract_id`, wait for the commit, and decode
    /// the choice result.
    ///
    /// The result comes from the root exercised event matching the template
    /// and choice; when several match, the lowest node id wins. Dropping the
    /// returned future abandons only the local wait: a submission that
    /// already reached the ledger still takes effect.
    pub async fn exercise_and_get_result<C: Choice>(
        &self,
        actor: &Party,
        contract_id: &ContractId<C::Template>,
        choice: &C,
        command_id: CommandId,
        disclosed_contracts: Vec<DisclosedContract>,
    ) -> LedgerResult<C::Result> {
        let template_id = <C::Template as Template>::template_id();
        let span = info_span!(
            "ledger.exercise",
            command_id = %command_id,
            party = %actor,
            template_id = %template_id,
            choice = C::NAME,
            contract_id = %contract_id,
            outcome = Empty,
        );
        let ctx = AuditContext {
            command_id: command_id.to_string(),
            act_as: actor.to_string(),
            template_id: template_id.to_string(),
            choice: Some(C::NAME.to_string()),
            contract_id: Some(contract_id.to_string()),
            command_count: 1,
        };

        self.audited(span, ctx, async {
            let argument = self.dictionary.encode_choice(choice)?;
            let command = Command::Exercise {
                template_id: template_id.clone(),
                contract_id: contract_id.to_string(),
                choice: C::NAME.to_string(),
                argument,
            };
            let envelope = self.envelope(actor, command_id, vec![command], disclosed_contracts);
            let tree = self.client.submit_and_wait_for_transaction_tree(&envelope).await?;
            let event = tree
                .exercise_result_event(&template_id, C::NAME)
                .ok_or_else(|| LedgerError::MissingExerciseResult {
                    template_id: template_id.clone(),
                    choice: C::NAME.to_string(),
                })?;
            let result = self
                .dictionary
                .choice_result_from_ledger_json::<C>(&event.exercise_result)?;
            Ok((result, committed(&tree.update_id, tree.offset)))
        })
        .await
    }

    /// Submit pre-built commands and return once they are accepted for
    /// sequencing, without waiting for the commit.
    pub async fn submit_commands(
        &self,
        actor: &Party,
        commands: Vec<Command>,
        command_id: CommandId,
        disclosed_contracts: Vec<DisclosedContract>,
    ) -> LedgerResult<SubmissionAccepted> {
        let first = commands.first();
        let template_id = first.map(|c| c.template_id().to_string()).unwrap_or_default();
        let choice = first.and_then(Command::choice).map(str::to_string);
        let contract_id = first.and_then(Command::contract_id).map(str::to_string);
        let span = info_span!(
            "ledger.submit",
            command_id = %command_id,
            party = %actor,
            template_id = %template_id,
            choice = choice.as_deref().unwrap_or(""),
            contract_id = contract_id.as_deref().unwrap_or(""),
            outcome = Empty,
        );
        let ctx = AuditContext {
            command_id: command_id.to_string(),
            act_as: actor.to_string(),
            template_id,
            choice,
            contract_id,
            command_count: commands.len(),
        };

        self.audited(span, ctx, async {
            let envelope = self.envelope(actor, command_id, commands, disclosed_contracts);
            let accepted = self.client.submit(&envelope).await?;
            let outcome = AuditOutcome::Accepted {
                submission_id: accepted.submission_id.clone(),
            };
            Ok((accepted, outcome))
        })
        .await
    }

    fn envelope(
        &self,
        actor: &Party,
        command_id: CommandId,
        commands: Vec<Command>,
        disclosed_contracts: Vec<DisclosedContract>,
    ) -> CommandEnvelope {
        CommandEnvelope::single_party(
            self.user_id.clone(),
            command_id,
            actor.clone(),
            commands,
            disclosed_contracts,
        )
    }

    async fn audited<T, F>(&self, span: Span, ctx: AuditContext, op: F) -> LedgerResult<T>
    where
        F: Future<Output = LedgerResult<(T, AuditOutcome)>>,
    {
        let result = op.instrument(span.clone()).await;
        let (result, outcome) = match result {
            Ok((value, outcome)) => (Ok(value), outcome),
            Err(err) => {
                let outcome = match &err {
                    LedgerError::Rejected { code, .. } => {
                        AuditOutcome::Rejected { code: code.clone() }
                    }
                    other => AuditOutcome::Failed {
                        kind: other.kind().to_string(),
                    },
                };
                (Err(err), outcome)
            }
        };

        span.record("outcome", display(&outcome));
        match &result {
            Ok(_) => info!(parent: &span, %outcome, "ledger command completed"),
            Err(err) => warn!(parent: &span, %outcome, error = %err, "ledger command failed"),
        }

        let record = AuditRecord {
            command_id: ctx.command_id,
            act_as: ctx.act_as,
            template_id: ctx.template_id,
            choice: ctx.choice,
            contract_id: ctx.contract_id,
            command_count: ctx.command_count,
            outcome,
        };
        self.audit.record(&record).await;
        result
    }
}

fn committed(update_id: &str, offset: i64) -> AuditOutcome {
    AuditOutcome::Committed {
        update_id: update_id.to_string(),
        offset,
    }
}

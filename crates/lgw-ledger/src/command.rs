use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use lgw_codec::{CodecResult, Value};
use lgw_types::{CommandId, Identifier, Party};
use serde_json::{json, Value as Json};

/// A single ledger command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Create {
        template_id: Identifier,
        arguments: Value,
    },
    Exercise {
        template_id: Identifier,
        contract_id: String,
        choice: String,
        argument: Value,
    },
}

impl Command {
    pub fn template_id(&self) -> &Identifier {
        match self {
            Self::Create { template_id, .. } | Self::Exercise { template_id, .. } => template_id,
        }
    }

    pub fn choice(&self) -> Option<&str> {
        match self {
            Self::Create { .. } => None,
            Self::Exercise { choice, .. } => Some(choice),
        }
    }

    pub fn contract_id(&self) -> Option<&str> {
        match self {
            Self::Create { .. } => None,
            Self::Exercise { contract_id, .. } => Some(contract_id),
        }
    }

    pub fn to_ledger_json(&self) -> CodecResult<Json> {
        Ok(match self {
            Self::Create {
                template_id,
                arguments,
            } => json!({
                "CreateCommand": {
                    "templateId": template_id.ledger_ref(),
                    "createArguments": arguments.to_ledger_json()?,
                }
            }),
            Self::Exercise {
                template_id,
                contract_id,
                choice,
                argument,
            } => json!({
                "ExerciseCommand": {
                    "templateId": template_id.ledger_ref(),
                    "contractId": contract_id,
                    "choice": choice,
                    "choiceArgument": argument.to_ledger_json()?,
                }
            }),
        })
    }
}

/// A contract attached to a command so the ledger can validate state the
/// submitting participant does not host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisclosedContract {
    pub template_id: Identifier,
    pub contract_id: String,
    /// Opaque created-event blob, passed through untouched.
    pub created_event_blob: Bytes,
    pub synchronizer_id: Option<String>,
}

impl DisclosedContract {
    pub fn to_ledger_json(&self) -> Json {
        let mut out = json!({
            "templateId": self.template_id.ledger_ref(),
            "contractId": self.contract_id,
            "createdEventBlob": STANDARD.encode(&self.created_event_blob),
        });
        if let Some(sync) = &self.synchronizer_id {
            out["synchronizerId"] = Json::String(sync.clone());
        }
        out
    }
}

/// Everything submitted to the ledger for one command id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandEnvelope {
    pub user_id: String,
    pub command_id: CommandId,
    pub act_as: Vec<Party>,
    pub read_as: Vec<Party>,
    pub commands: Vec<Command>,
    pub disclosed_contracts: Vec<DisclosedContract>,
}

impl CommandEnvelope {
    /// Envelope acting and reading as a single party.
    pub fn single_party(
        user_id: impl Into<String>,
        command_id: CommandId,
        party: Party,
        commands: Vec<Command>,
        disclosed_contracts: Vec<DisclosedContract>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            command_id,
            act_as: vec![party.clone()],
            read_as: vec![party],
            commands,
            disclosed_contracts,
        }
    }

    /// Request body for the JSON Ledger API command endpoints.
    pub fn to_ledger_json(&self) -> CodecResult<Json> {
        let commands = self
            .commands
            .iter()
            .map(Command::to_ledger_json)
            .collect::<CodecResult<Vec<_>>>()?;
        Ok(json!({
            "userId": self.user_id,
            "commandId": self.command_id.as_str(),
            "actAs": self.act_as.iter().map(Party::as_str).collect::<Vec<_>>(),
            "readAs": self.read_as.iter().map(Party::as_str).collect::<Vec<_>>(),
            "commands": commands,
            "disclosedContracts": self
                .disclosed_contracts
                .iter()
                .map(DisclosedContract::to_ledger_json)
                .collect::<Vec<_>>(),
        }))
    }

    /// BLAKE3 digest of the whole envelope in its ledger encoding.
    ///
    /// Object keys serialize in sorted order, so equal envelopes always
    /// produce equal fingerprints.
    pub fn fingerprint(&self) -> CodecResult<[u8; 32]> {
        let bytes = self.to_ledger_json()?.to_string();
        Ok(*blake3::hash(bytes.as_bytes()).as_bytes())
    }

    pub fn fingerprint_hex(&self) -> CodecResult<String> {
        self.fingerprint().map(hex::encode)
    }
}

/// Acknowledgement that a command was accepted for sequencing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmissionAccepted {
    pub command_id: CommandId,
    pub submission_id: String,
}

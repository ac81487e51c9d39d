use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use lgw_ledger::DisclosedContract;
use lgw_types::Identifier;
use serde::Deserialize;
use serde_json::{json, Map, Value as Json};
use tracing::{error, info, info_span, Instrument};

use crate::error::{RegistryError, RegistryResult};
use crate::transport::{RegistryTransport, Upstream};

const AMULET_RULES_PATH: &str = "/api/validator/v0/scan-proxy/amulet-rules";
const MINING_ROUNDS_PATH: &str = "/api/validator/v0/scan-proxy/open-and-issuing-mining-rounds";
const DSO_PARTY_PATH: &str = "/api/validator/v0/scan-proxy/dso-party-id";
const CONTRACTS_PATH: &str = "/api/validator/v0/scan-proxy/contracts";
const REGISTRY_INFO_PATH: &str = "/registry/metadata/v1/info";

/// A logical reference to a contract that must be disclosed with a command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DisclosureRef {
    /// The network's current amulet rules.
    AmuletRules,
    /// The open mining round with the highest number that has opened.
    OpenMiningRound,
    /// A specific contract known to the scan service.
    Contract {
        template_id: Identifier,
        contract_id: String,
    },
}

impl fmt::Display for DisclosureRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AmuletRules => f.write_str("amulet-rules"),
            Self::OpenMiningRound => f.write_str("open-mining-round"),
            Self::Contract { contract_id, .. } => write!(f, "contract {contract_id}"),
        }
    }
}

/// Extra context a registry supplies for exercising one of its choices.
#[derive(Clone, Debug, PartialEq)]
pub struct ChoiceContext {
    /// Opaque values to pass through as the choice's context argument.
    pub values: Map<String, Json>,
    pub disclosed_contracts: Vec<DisclosedContract>,
}

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Fetches disclosures from upstream registries.
///
/// Every failure propagates as a typed error: an empty disclosure would only
/// turn into a less specific authorization failure on the ledger.
#[derive(Clone)]
pub struct DisclosureResolver {
    transport: Arc<dyn RegistryTransport>,
    clock: Clock,
}

impl DisclosureResolver {
    pub fn new(transport: Arc<dyn RegistryTransport>) -> Self {
        Self {
            transport,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the clock used to decide which mining rounds are open.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub async fn resolve(&self, reference: &DisclosureRef) -> RegistryResult<DisclosedContract> {
        let span = info_span!("registry.resolve", reference = %reference);
        async {
            let result = match reference {
                DisclosureRef::AmuletRules => self.amulet_rules().await,
                DisclosureRef::OpenMiningRound => self.open_mining_round().await,
                DisclosureRef::Contract {
                    template_id,
                    contract_id,
                } => self.contract(template_id, contract_id).await,
            };
            match &result {
                Ok(disclosed) => info!(contract_id = %disclosed.contract_id, "disclosure resolved"),
                Err(e) => error!(error = %e, kind = e.kind(), "disclosure failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Resolve in order; the first failure aborts.
    pub async fn resolve_all(
        &self,
        references: &[DisclosureRef],
    ) -> RegistryResult<Vec<DisclosedContract>> {
        let mut out = Vec::with_capacity(references.len());
        for reference in references {
            out.push(self.resolve(reference).await?);
        }
        Ok(out)
    }

    pub async fn dso_party_id(&self) -> RegistryResult<String> {
        #[derive(Deserialize)]
        struct Response {
            dso_party_id: String,
        }
        let json = self.transport.get(Upstream::ScanProxy, DSO_PARTY_PATH).await?;
        let response: Response = parse(json)?;
        info!(dso_party_id = %response.dso_party_id, "fetched DSO party id");
        Ok(response.dso_party_id)
    }

    pub async fn registry_admin_id(&self) -> RegistryResult<String> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Response {
            admin_id: String,
        }
        let json = self.transport.get(Upstream::TokenRegistry, REGISTRY_INFO_PATH).await?;
        let response: Response = parse(json)?;
        info!(admin_id = %response.admin_id, "fetched registry admin id");
        Ok(response.admin_id)
    }

    /// Context and disclosures needed to execute the transfer of an
    /// allocation.
    pub async fn allocation_transfer_context(
        &self,
        allocation_id: &str,
    ) -> RegistryResult<ChoiceContext> {
        let span = info_span!("registry.allocation_transfer_context", allocation_id);
        async {
            let path = format!(
                "/registry/allocations/v1/{allocation_id}/choice-contexts/execute-transfer"
            );
            let json = self
                .transport
                .post(Upstream::TokenRegistry, &path, &json!({"meta": {}}))
                .await
                .inspect_err(|e| {
                    error!(error = %e, "fetching allocation transfer context failed")
                })?;
            let response: RegistryChoiceContext = parse(json)?;
            let disclosed_contracts = response
                .disclosed_contracts
                .into_iter()
                .map(RegistryDisclosure::into_disclosed)
                .collect::<RegistryResult<Vec<_>>>()?;
            info!(disclosed = disclosed_contracts.len(), "fetched allocation transfer context");
            Ok::<_, RegistryError>(ChoiceContext {
                values: response.choice_context_data.values,
                disclosed_contracts,
            })
        }
        .instrument(span)
        .await
    }

    async fn amulet_rules(&self) -> RegistryResult<DisclosedContract> {
        #[derive(Deserialize)]
        struct Response {
            amulet_rules: ScanContractWithState,
        }
        let json = self.transport.get(Upstream::ScanProxy, AMULET_RULES_PATH).await?;
        let response: Response = parse(json)?;
        response.amulet_rules.into_disclosed()
    }

    async fn open_mining_round(&self) -> RegistryResult<DisclosedContract> {
        #[derive(Deserialize)]
        struct Response {
            #[serde(default)]
            open_mining_rounds: Vec<ScanContractWithState>,
        }
        let json = self.transport.get(Upstream::ScanProxy, MINING_ROUNDS_PATH).await?;
        let response: Response = parse(json)?;
        let now = (self.clock)();
        let mut best: Option<(i64, ScanContractWithState)> = None;
        for round in response.open_mining_rounds {
            let (number, opens_at) = round_info(&round.contract.payload)?;
            if opens_at > now {
                continue;
            }
            if best.as_ref().map_or(true, |(n, _)| number > *n) {
                best = Some((number, round));
            }
        }
        let (_, round) =
            best.ok_or_else(|| RegistryError::NotFound("no open mining round".into()))?;
        round.into_disclosed()
    }

    async fn contract(
        &self,
        template_id: &Identifier,
        contract_id: &str,
    ) -> RegistryResult<DisclosedContract> {
        let path = format!("{CONTRACTS_PATH}/{contract_id}");
        let json = self.transport.get(Upstream::ScanProxy, &path).await?;
        let found: ScanContractWithState = parse(json)?;
        let disclosed = found.into_disclosed()?;
        // Scan reports package ids; match on module and entity only.
        let found_id = &disclosed.template_id;
        if found_id.module_name() != template_id.module_name()
            || found_id.entity_name() != template_id.entity_name()
        {
            return Err(RegistryError::NotFound(format!(
                "{contract_id} is a {}, not a {template_id}",
                disclosed.template_id
            )));
        }
        Ok(disclosed)
    }
}

fn parse<T: serde::de::DeserializeOwned>(json: Json) -> RegistryResult<T> {
    serde_json::from_value(json).map_err(|e| RegistryError::invalid(e.to_string()))
}

fn decode_blob(blob: &str) -> RegistryResult<Bytes> {
    STANDARD
        .decode(blob)
        .map(Bytes::from)
        .map_err(|e| RegistryError::invalid(format!("created event blob: {e}")))
}

fn parse_template(template_id: &str) -> RegistryResult<Identifier> {
    Identifier::parse(template_id).map_err(|e| RegistryError::invalid(e.to_string()))
}

/// Round number and opening time of an open mining round payload.
fn round_info(payload: &Json) -> RegistryResult<(i64, DateTime<Utc>)> {
    let number = match &payload["round"]["number"] {
        Json::String(s) => s.parse().ok(),
        Json::Number(n) => n.as_i64(),
        _ => None,
    }
    .ok_or_else(|| RegistryError::invalid("mining round without a round number"))?;
    let opens_at = payload["opensAt"]
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .ok_or_else(|| RegistryError::invalid("mining round without a valid opensAt"))?;
    Ok((number, opens_at.with_timezone(&Utc)))
}

#[derive(Deserialize)]
struct ScanContractWithState {
    contract: ScanContract,
    #[serde(default)]
    domain_id: Option<String>,
}

#[derive(Deserialize)]
struct ScanContract {
    template_id: String,
    contract_id: String,
    #[serde(default)]
    payload: Json,
    created_event_blob: String,
}

impl ScanContractWithState {
    fn into_disclosed(self) -> RegistryResult<DisclosedContract> {
        Ok(DisclosedContract {
            template_id: parse_template(&self.contract.template_id)?,
            contract_id: self.contract.contract_id,
            created_event_blob: decode_blob(&self.contract.created_event_blob)?,
            synchronizer_id: self.domain_id,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistryChoiceContext {
    choice_context_data: ChoiceContextData,
    #[serde(default)]
    disclosed_contracts: Vec<RegistryDisclosure>,
}

#[derive(Deserialize)]
struct ChoiceContextData {
    #[serde(default)]
    values: Map<String, Json>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistryDisclosure {
    template_id: String,
    contract_id: String,
    created_event_blob: String,
    #[serde(default)]
    synchronizer_id: Option<String>,
}

impl RegistryDisclosure {
    fn into_disclosed(self) -> RegistryResult<DisclosedContract> {
        Ok(DisclosedContract {
            template_id: parse_template(&self.template_id)?,
            contract_id: self.contract_id,
            created_event_blob: decode_blob(&self.created_event_blob)?,
            synchronizer_id: self.synchronizer_id,
        })
    }
}
